// src/reports.rs

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{ProfileError, Result};
use crate::profile::genome_profile::{AbundanceProfile, TaxonAbundance};
use crate::profile::hit_table::MeanHitStats;
use crate::profile::GenomeReport;
use crate::taxdb::RankSchema;

/// Rendered in place of statistics that do not exist (unclassified calls).
pub const NOT_APPLICABLE: &str = "na";

fn fmt_stats(stats: Option<MeanHitStats>) -> String {
    match stats {
        Some(s) => format!("{:.1e}\t{:.1}\t{:.1}", s.evalue, s.perc_identity, s.aln_length),
        None => format!("{NOT_APPLICABLE}\t{NOT_APPLICABLE}\t{NOT_APPLICABLE}"),
    }
}

/// taxa, percent of bps, percent of sequences, avg. evalue, avg. identity, avg. align length
fn fmt_taxon(profile: &AbundanceProfile, entry: &TaxonAbundance) -> String {
    format!(
        "{}\t{:.2}\t{:.2}\t{}",
        entry.taxon,
        entry.abundance * 100.0,
        profile.percent_of_sequences(entry),
        fmt_stats(entry.stats.hit_stats)
    )
}

fn rank_header(schema: &RankSchema, columns: &[&str]) -> String {
    let mut cols = Vec::with_capacity(schema.len() * columns.len());
    for rank in schema.labels() {
        for c in columns {
            cols.push(format!("{rank}: {c}"));
        }
    }
    cols.join("\t")
}

const PROFILE_COLUMNS: [&str; 6] = [
    "taxa",
    "percent of bps",
    "percent of sequences",
    "avg. evalue",
    "avg. perc identity",
    "avg. align length (AA)",
];

/// One row per sequence: length, fragment count and, per rank, the call,
/// its supporting hits and their mean statistics.
pub fn seq_summary_text(report: &GenomeReport, schema: &RankSchema) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Sequence id\tLength (bp)\t# fragments\t{}",
        rank_header(
            schema,
            &["taxa", "hits (%)", "avg. evalue", "avg. perc identity", "avg. align length (AA)"]
        )
    );

    for seq in &report.classification.sequences {
        let _ = write!(output, "{}\t{}\t{}", seq.seq_id, seq.info.length, seq.info.fragments);
        for call in &seq.ranks {
            if call.is_classified() {
                let n = call.num_hits();
                let _ = write!(
                    output,
                    "\t{}\t{} ({:.1}%)\t{}",
                    call.taxon,
                    n,
                    n as f64 * 100.0 / seq.info.fragments.max(1) as f64,
                    fmt_stats(call.mean_stats())
                );
            } else {
                let _ = write!(
                    output,
                    "\t{}\t{NOT_APPLICABLE}\t{}",
                    call.taxon,
                    fmt_stats(None)
                );
            }
        }
        output.push('\n');
    }
    output
}

/// Every taxon at every rank, most abundant first. Ranks with fewer taxa are
/// padded with empty cells.
pub fn genome_profile_text(report: &GenomeReport, schema: &RankSchema) -> String {
    let profile = &report.abundance;
    let mut output = String::new();
    let _ = writeln!(output, "{}", rank_header(schema, &PROFILE_COLUMNS));

    let max_taxa = profile.ranks.iter().map(|r| r.taxa().len()).max().unwrap_or(0);
    let empty = vec![""; PROFILE_COLUMNS.len()].join("\t");

    for i in 0..max_taxa {
        let cells: Vec<String> = profile
            .ranks
            .iter()
            .map(|rank| match rank.taxa().get(i) {
                Some(entry) => fmt_taxon(profile, entry),
                None => empty.clone(),
            })
            .collect();
        let _ = writeln!(output, "{}", cells.join("\t"));
    }
    output
}

/// Compare ids so that embedded numbers sort numerically (`bin_2` < `bin_10`).
pub fn alphanumeric_cmp(a: &str, b: &str) -> Ordering {
    let (mut ai, mut bi) = (a.chars().peekable(), b.chars().peekable());
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let mut na = String::new();
                while let Some(c) = ai.peek().copied().filter(char::is_ascii_digit) {
                    na.push(c);
                    ai.next();
                }
                let mut nb = String::new();
                while let Some(c) = bi.peek().copied().filter(char::is_ascii_digit) {
                    nb.push(c);
                    bi.next();
                }
                let ta = na.trim_start_matches('0');
                let tb = nb.trim_start_matches('0');
                let ord = ta.len().cmp(&tb.len()).then_with(|| ta.cmp(tb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.cmp(&cb);
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

/// One row per genome with the most abundant taxon at each rank.
pub fn genome_summary_text(reports: &[GenomeReport], schema: &RankSchema) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Genome id\tLength (bp)\t# sequences\t{}",
        rank_header(schema, &PROFILE_COLUMNS)
    );

    let mut sorted: Vec<&GenomeReport> = reports.iter().collect();
    sorted.sort_by(|a, b| alphanumeric_cmp(a.genome_id(), b.genome_id()));

    for report in sorted {
        let profile = &report.abundance;
        let _ = write!(
            output,
            "{}\t{}\t{}",
            profile.genome_id, profile.total_length, profile.num_sequences
        );
        for rank in &profile.ranks {
            let _ = write!(output, "\t{}", fmt_taxon(profile, rank.headline()));
        }
        output.push('\n');
    }
    output
}

/// Full lineage path of each sequence -> summed sequence length.
pub fn krona_profile(report: &GenomeReport) -> BTreeMap<Vec<String>, u64> {
    let mut paths: BTreeMap<Vec<String>, u64> = BTreeMap::new();
    for seq in &report.classification.sequences {
        let path: Vec<String> = seq.lineage().map(str::to_string).collect();
        *paths.entry(path).or_insert(0) += seq.info.length;
    }
    paths
}

/// Krona text input: `weight\ttaxon_1\t...\ttaxon_N` per lineage path.
pub fn krona_text(report: &GenomeReport) -> String {
    let mut output = String::new();
    for (path, weight) in krona_profile(report) {
        let _ = writeln!(output, "{}\t{}", weight, path.join("\t"));
    }
    output
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| ProfileError::io(path, e))
}

/// Files written for one genome.
#[derive(Debug, Clone)]
pub struct GenomeReportFiles {
    pub genome_id: String,
    pub sequences: PathBuf,
    pub profile: PathBuf,
    pub krona: PathBuf,
}

/// Write the sequence summary, profile table and Krona text of one genome.
pub fn write_genome_reports(
    report: &GenomeReport,
    schema: &RankSchema,
    report_dir: &Path,
) -> Result<GenomeReportFiles> {
    let id = report.genome_id();
    let files = GenomeReportFiles {
        genome_id: id.to_string(),
        sequences: report_dir.join(format!("{id}.sequences.tsv")),
        profile: report_dir.join(format!("{id}.profile.tsv")),
        krona: report_dir.join(format!("{id}.krona.tsv")),
    };

    write_file(&files.sequences, &seq_summary_text(report, schema))?;
    write_file(&files.profile, &genome_profile_text(report, schema))?;
    write_file(&files.krona, &krona_text(report))?;
    Ok(files)
}

pub fn write_genome_summary(reports: &[GenomeReport], schema: &RankSchema, path: &Path) -> Result<()> {
    write_file(path, &genome_summary_text(reports, schema))
}

/// Fail early when the Krona renderer cannot be started, so nothing is
/// written for a run that could not finish.
pub fn check_krona(executable: &Path) -> Result<()> {
    Command::new(executable)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|_| ())
        .map_err(|e| ProfileError::ExternalTool {
            tool: executable.display().to_string(),
            detail: format!("could not start: {e}"),
        })
}

/// Combine per-genome Krona text files into one HTML chart with `ktImportText`.
pub fn render_krona_html(
    executable: &Path,
    files: &[GenomeReportFiles],
    out_html: &Path,
) -> Result<()> {
    let tool = executable.display().to_string();
    let mut cmd = Command::new(executable);
    cmd.arg("-o").arg(out_html);
    for f in files {
        cmd.arg(format!("{},{}", f.krona.display(), f.genome_id));
    }

    let output = cmd.output().map_err(|e| ProfileError::ExternalTool {
        tool: tool.clone(),
        detail: format!("could not start: {e}"),
    })?;
    if !output.status.success() {
        return Err(ProfileError::ExternalTool {
            tool,
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Delete report files of a run that failed after writing them.
pub fn remove_reports(files: &[GenomeReportFiles], summary: &Path) {
    let paths = files
        .iter()
        .flat_map(|f| [&f.sequences, &f.profile, &f.krona])
        .map(PathBuf::as_path)
        .chain(std::iter::once(summary));
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            log::debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}
