use std::fs;
use std::path::{Path, PathBuf};

use taxprofile_rs::config::ProfileConfig;
use taxprofile_rs::error::ProfileError;
use taxprofile_rs::taxdb::UNCLASSIFIED;
use taxprofile_rs::{HitSource, TaxonomicProfiler};

const TAXONOMY: &str = "\
G1\tk__Bacteria;p__Firmicutes;c__Bacilli;o__Bacillales;f__Bacillaceae;g__Bacillus;s__subtilis
G2\tk__Bacteria;p__Proteobacteria;c__Gammaproteobacteria;o__Enterobacterales;f__Enterobacteriaceae;g__Escherichia;s__coli
G3\tk__Archaea;p__Euryarchaeota;c__Methanobacteria;o__Methanobacteriales;f__Methanobacteriaceae;g__Methanobrevibacter;s__smithii
";

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn hit(window: &str, reference: &str) -> String {
    format!("{window}\tprot~{reference}\t80.0\t100\t10\t0\t1\t300\t1\t100\t1e-20\t200.0\n")
}

/// bin_1: c1 (100 bp, 10 windows of 10/step 10) and c2 (30 bp, 3 windows).
/// bin_2: c3 (10 bp, 1 window) and c4 (5 bp, no windows).
fn fixture(dir: &Path, hits: &str) -> (Vec<PathBuf>, PathBuf, PathBuf) {
    let bin1 = write(
        dir,
        "bin_1.fna",
        &format!(">c1\n{}\n>c2 second contig\n{}\n", "A".repeat(100), "C".repeat(30)),
    );
    let bin2 = write(dir, "bin_2.fna", ">c3\nGGGGGGGGGG\n>c4\nTTTTT\n");
    let taxonomy = write(dir, "taxonomy.tsv", TAXONOMY);
    let hits = write(dir, "hits.tsv", hits);
    (vec![bin1, bin2], taxonomy, hits)
}

fn profiler(out: &Path) -> TaxonomicProfiler {
    let mut config = ProfileConfig::new(out);
    config.window_size = 10;
    config.step_size = 10;
    TaxonomicProfiler::new(config).unwrap()
}

#[test]
fn profiles_genomes_from_precomputed_hits() {
    let dir = tempfile::tempdir().unwrap();
    let mut hits = String::new();
    // c1: 1 of 10 windows hit -> below threshold
    hits += &hit("c1~4", "G1");
    // c2: Bacteria at domain, Euryarchaeota wins the phylum vote -> collapse below domain
    hits += &hit("c2~0", "G1");
    hits += &hit("c2~1", "G2");
    hits += &hit("c2~2", "G3");
    hits += &hit("c2~2", "G1");
    hits += &hit("c2~1", "G3");
    hits += &hit("c2~0", "G2");
    hits += &hit("c2~0", "G3");
    // c3: single window, fully classified
    hits += &hit("c3~0", "G1");

    let (genomes, taxonomy, hits) = fixture(dir.path(), &hits);
    let out = dir.path().join("out");
    let results = profiler(&out)
        .run(&genomes, &taxonomy, &HitSource::Precomputed(hits))
        .unwrap();

    assert_eq!(results.reports.len(), 2);
    assert_eq!(results.hit_summary.total_hits, 9);

    let bin1 = results.get("bin_1").unwrap();
    let c1 = bin1.classification.get("c1").unwrap();
    assert_eq!(c1.info.fragments, 10);
    assert!(c1.lineage().all(|t| t == UNCLASSIFIED));

    let c2: Vec<&str> = bin1.classification.get("c2").unwrap().lineage().collect();
    assert_eq!(c2[0], "k__Bacteria");
    assert!(c2[1..].iter().all(|&t| t == UNCLASSIFIED));

    let bin2 = results.get("bin_2").unwrap();
    let c3: Vec<&str> = bin2.classification.get("c3").unwrap().lineage().collect();
    assert_eq!(c3[6], "s__subtilis");
    let c4 = bin2.classification.get("c4").unwrap();
    assert_eq!(c4.info.fragments, 0);
    assert!(c4.ranks.iter().all(|r| r.hits.is_none()));

    // bin_2 phylum: 10 bp Firmicutes, 5 bp unclassified
    let phylum = &bin2.abundance.ranks[1];
    assert!((phylum.get("p__Firmicutes").unwrap().abundance - 10.0 / 15.0).abs() < 1e-12);
    for report in &results.reports {
        for rank in &report.abundance.ranks {
            assert!((rank.total_abundance() - 1.0).abs() < 1e-9);
            assert!(rank.get(UNCLASSIFIED).is_some());
        }
    }

    let reports = out.join("bin_reports");
    for name in [
        "bin_1.sequences.tsv",
        "bin_1.profile.tsv",
        "bin_1.krona.tsv",
        "bin_2.sequences.tsv",
        "bin_2.profile.tsv",
        "bin_2.krona.tsv",
    ] {
        assert!(reports.join(name).exists(), "missing {name}");
    }
    assert!(out.join("diamond").join("fragments.fna").exists());

    let summary = fs::read_to_string(out.join("genome_summary.tsv")).unwrap();
    let rows: Vec<&str> = summary.lines().collect();
    assert_eq!(rows.len(), 3);
    // bin_1 is mostly c1, which stays unclassified
    assert!(rows[1].starts_with("bin_1\t130\t2\tunclassified\t76.92"));
    assert!(rows[2].starts_with("bin_2\t15\t2\tk__Bacteria"));
    assert_eq!(summary, results.get_genome_summary());
}

#[test]
fn unmapped_window_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let (genomes, taxonomy, hits) = fixture(dir.path(), &hit("c99~0", "G1"));
    let out = dir.path().join("out");
    let err = profiler(&out)
        .run(&genomes, &taxonomy, &HitSource::Precomputed(hits))
        .unwrap_err();
    assert!(matches!(err, ProfileError::UnknownSequence(s) if s == "c99"));
    assert!(!out.join("genome_summary.tsv").exists());
}

#[test]
fn short_lineage_fails_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let (genomes, _, hits) = fixture(dir.path(), "");
    let taxonomy = write(dir.path(), "bad_taxonomy.tsv", "G1\tk__Bacteria;p__Firmicutes\n");
    let err = profiler(&dir.path().join("out"))
        .run(&genomes, &taxonomy, &HitSource::Precomputed(hits))
        .unwrap_err();
    assert!(matches!(err, ProfileError::LineageLength { found: 2, expected: 7, .. }));
}

#[test]
fn missing_krona_renderer_writes_no_reports() {
    let dir = tempfile::tempdir().unwrap();
    let (genomes, taxonomy, hits) = fixture(dir.path(), &hit("c3~0", "G1"));
    let out = dir.path().join("out");

    let mut config = ProfileConfig::new(&out);
    config.window_size = 10;
    config.step_size = 10;
    config.krona_html = true;
    config.krona_executable = dir.path().join("no-such-ktImportText");
    let err = TaxonomicProfiler::new(config)
        .unwrap()
        .run(&genomes, &taxonomy, &HitSource::Precomputed(hits))
        .unwrap_err();

    assert!(matches!(err, ProfileError::ExternalTool { .. }));
    assert!(!out.join("genome_summary.tsv").exists());
    assert!(!out.join("bin_reports").join("bin_1.profile.tsv").exists());
}

#[cfg(unix)]
#[test]
fn failing_krona_renderer_removes_written_reports() {
    let dir = tempfile::tempdir().unwrap();
    let (genomes, taxonomy, hits) = fixture(dir.path(), &hit("c3~0", "G1"));
    let out = dir.path().join("out");

    // starts fine but exits non-zero when asked to render
    let mut config = ProfileConfig::new(&out);
    config.window_size = 10;
    config.step_size = 10;
    config.krona_html = true;
    config.krona_executable = PathBuf::from("false");
    let err = TaxonomicProfiler::new(config)
        .unwrap()
        .run(&genomes, &taxonomy, &HitSource::Precomputed(hits))
        .unwrap_err();

    assert!(matches!(err, ProfileError::ExternalTool { .. }));
    assert!(!out.join("genome_summary.tsv").exists());
    for name in ["bin_1.sequences.tsv", "bin_1.profile.tsv", "bin_2.krona.tsv"] {
        assert!(!out.join("bin_reports").join(name).exists(), "left {name}");
    }
}
