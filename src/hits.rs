// src/hits.rs

use ahash::AHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{ProfileError, Result};
use crate::fasta::FRAGMENT_SEPARATOR;
use crate::profile::hit_table::{HitAccumulator, HitInfo};
use crate::taxdb::LineageTable;
use crate::types::HitRecord;

/// Parse one row of BLAST/diamond tabular output (format 6):
/// ```text
/// qseqid sseqid pident length mismatch gapopen qstart qend sstart send evalue bitscore
/// ```
pub fn parse_hit_line(line: &str, line_no: usize) -> Result<HitRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 12 {
        return Err(ProfileError::MalformedHit {
            line: line_no,
            detail: format!("expected 12 tab-separated columns, found {}", fields.len()),
        });
    }

    let bad = |column: &str, value: &str| ProfileError::MalformedHit {
        line: line_no,
        detail: format!("invalid {column} '{value}'"),
    };

    Ok(HitRecord {
        query_id: fields[0].to_string(),
        subject_id: fields[1].to_string(),
        perc_identity: fields[2].trim().parse().map_err(|_| bad("percent identity", fields[2]))?,
        aln_length: fields[3].trim().parse().map_err(|_| bad("alignment length", fields[3]))?,
        evalue: fields[10].trim().parse().map_err(|_| bad("e-value", fields[10]))?,
    })
}

/// Sequence id of a fragment: the window id without its final `~<index>`.
pub fn sequence_id_from_window(window_id: &str) -> Result<&str> {
    match window_id.rfind(FRAGMENT_SEPARATOR) {
        Some(idx) if window_id[idx + 1..].parse::<u32>().is_ok() => Ok(&window_id[..idx]),
        _ => Err(ProfileError::MalformedWindowId(window_id.to_string())),
    }
}

/// Reference genome id of a database subject: text after the final `~`,
/// or the whole id when it has none.
pub fn reference_id_from_subject(subject_id: &str) -> &str {
    match subject_id.rfind(FRAGMENT_SEPARATOR) {
        Some(idx) => &subject_id[idx + 1..],
        None => subject_id,
    }
}

/// Hits per reference genome for each genome.
#[derive(Debug, Default, Clone)]
pub struct HitSummary {
    pub total_hits: u64,
    pub per_genome: AHashMap<String, AHashMap<String, u32>>,
}

impl HitSummary {
    pub fn record(&mut self, genome_id: &str, ref_id: &str) {
        self.total_hits += 1;
        *self
            .per_genome
            .entry(genome_id.to_string())
            .or_default()
            .entry(ref_id.to_string())
            .or_insert(0) += 1;
    }

    /// The `n` references with the most hits in a genome, most hits first (ties by id).
    pub fn top_references(&self, genome_id: &str, n: usize) -> Vec<(&str, u32)> {
        let mut refs: Vec<(&str, u32)> = self
            .per_genome
            .get(genome_id)
            .map(|m| m.iter().map(|(r, &c)| (r.as_str(), c)).collect())
            .unwrap_or_default();
        refs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        refs.truncate(n);
        refs
    }
}

/// Route every hit of a tabular search result to the accumulator of its genome.
///
/// A hit whose sequence has no genome, or whose reference has no lineage,
/// aborts ingestion.
pub fn ingest_hits<P: AsRef<Path>>(
    path: P,
    lineages: &LineageTable,
    seq_to_genome: &AHashMap<String, String>,
    accumulators: &mut AHashMap<String, HitAccumulator>,
) -> Result<HitSummary> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ProfileError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut summary = HitSummary::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ProfileError::io(path, e))?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let hit = parse_hit_line(&line, idx + 1)?;
        let seq_id = sequence_id_from_window(&hit.query_id)?;
        let genome_id = seq_to_genome
            .get(seq_id)
            .ok_or_else(|| ProfileError::UnknownSequence(seq_id.to_string()))?;
        let ref_id = reference_id_from_subject(&hit.subject_id);
        let lineage = lineages
            .get(ref_id)
            .ok_or_else(|| ProfileError::UnknownReference(ref_id.to_string()))?;
        let acc = accumulators
            .get_mut(genome_id)
            .ok_or_else(|| ProfileError::UnknownSequence(seq_id.to_string()))?;

        acc.add_hit(
            seq_id,
            lineage,
            HitInfo {
                evalue: hit.evalue,
                perc_identity: hit.perc_identity,
                aln_length: hit.aln_length,
            },
        )?;
        summary.record(genome_id, ref_id);
    }

    log::info!("Read {} hits from {}", summary.total_hits, path.display());
    for genome_id in summary.per_genome.keys() {
        for (ref_id, count) in summary.top_references(genome_id, 3) {
            log::debug!("Genome {}: {} hits to reference {}", genome_id, count, ref_id);
        }
    }
    Ok(summary)
}
