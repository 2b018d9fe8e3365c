// src/lib.rs
pub mod config;
pub mod diamond;
pub mod error;
pub mod fasta;
pub mod hits;
pub mod logging;
pub mod profile;
pub mod reports;
pub mod taxdb;
pub mod types;

use ahash::AHashMap;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::ProfileConfig;
use crate::diamond::Diamond;
use crate::error::{ProfileError, Result};
use crate::fasta::{genome_id_from_path, write_fragments};
use crate::hits::{ingest_hits, HitSummary};
use crate::profile::hit_table::{HitAccumulator, HitTable};
use crate::profile::{profile_genome, GenomeReport};
use crate::reports::{
    check_krona, genome_summary_text, remove_reports, render_krona_html, write_genome_reports,
    write_genome_summary, GenomeReportFiles,
};
use crate::taxdb::Taxonomy;

/// Where fragment hits come from.
#[derive(Debug, Clone)]
pub enum HitSource {
    /// Run `diamond blastx` of the fragments against this database.
    Diamond { db: PathBuf },
    /// Use an existing tabular hit table whose query ids are `<seq_id>~<window>`.
    Precomputed(PathBuf),
}

/// Everything produced by a run, in genome input order.
#[derive(Debug)]
pub struct ProfileResults {
    pub reports: Vec<GenomeReport>,
    pub report_files: Vec<GenomeReportFiles>,
    pub hit_summary: HitSummary,
    pub taxonomy: Taxonomy,
}

impl ProfileResults {
    pub fn get(&self, genome_id: &str) -> Option<&GenomeReport> {
        self.reports.iter().find(|r| r.genome_id() == genome_id)
    }

    /// Genome summary table generated on demand.
    pub fn get_genome_summary(&self) -> String {
        genome_summary_text(&self.reports, self.taxonomy.schema())
    }
}

/// Fragmented genomes waiting for hits.
pub struct FragmentedGenomes {
    /// Genome ids in input order.
    pub genome_ids: Vec<String>,
    pub accumulators: AHashMap<String, HitAccumulator>,
    pub seq_to_genome: AHashMap<String, String>,
    pub num_fragments: usize,
}

impl FragmentedGenomes {
    /// Close ingestion for every genome.
    pub fn seal(mut self) -> Vec<HitTable> {
        self.genome_ids
            .iter()
            .filter_map(|id| self.accumulators.remove(id))
            .map(HitAccumulator::seal)
            .collect()
    }
}

/// Builds taxonomic profiles for a set of genomes.
///
/// Each sequence is cut into fixed-size windows, the windows are searched
/// against a reference database, and the hits are voted into one call per
/// rank per sequence. Sequences are then rolled up into per-genome profiles
/// weighted by base pairs.
pub struct TaxonomicProfiler {
    config: ProfileConfig,
}

impl TaxonomicProfiler {
    pub fn new(config: ProfileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Write the windows of every genome to `fragment_file` and register
    /// sequence lengths and fragment counts.
    pub fn fragment_genomes(
        &self,
        genome_files: &[PathBuf],
        fragment_file: &Path,
    ) -> Result<FragmentedGenomes> {
        let file = File::create(fragment_file).map_err(|e| ProfileError::io(fragment_file, e))?;
        let mut out = BufWriter::new(file);

        let mut genome_ids = Vec::with_capacity(genome_files.len());
        let mut accumulators = AHashMap::with_capacity(genome_files.len());
        let mut seq_to_genome = AHashMap::new();
        let mut num_fragments = 0;

        for genome_file in genome_files {
            let genome_id = genome_id_from_path(genome_file);
            if accumulators.contains_key(&genome_id) {
                return Err(ProfileError::InvalidConfig(format!(
                    "genome id '{genome_id}' derived from more than one input file"
                )));
            }

            let mut acc = HitAccumulator::new(&genome_id, self.config.schema.clone());
            num_fragments += write_fragments(
                genome_file,
                self.config.window_size,
                self.config.step_size,
                &mut acc,
                &mut seq_to_genome,
                &mut out,
                fragment_file,
            )?;
            genome_ids.push(genome_id.clone());
            accumulators.insert(genome_id, acc);
        }
        out.flush().map_err(|e| ProfileError::io(fragment_file, e))?;

        log::info!(
            "Fragmented {} genomes into {} windows",
            genome_ids.len(),
            num_fragments
        );
        Ok(FragmentedGenomes {
            genome_ids,
            accumulators,
            seq_to_genome,
            num_fragments,
        })
    }

    /// Full run: taxonomy, fragmentation, search, classification and reports.
    ///
    /// All genomes are classified before any report is written, and a failed
    /// run leaves no reports behind.
    pub fn run(
        &self,
        genome_files: &[PathBuf],
        taxonomy_file: &Path,
        source: &HitSource,
    ) -> Result<ProfileResults> {
        let cfg = &self.config;
        if cfg.krona_html {
            check_krona(&cfg.krona_executable)?;
        }

        log::info!("Reading taxonomic assignment of reference genomes");
        let taxonomy = Taxonomy::from_file(taxonomy_file, cfg.schema.clone())?;

        let diamond_dir = cfg.diamond_dir();
        fs::create_dir_all(&diamond_dir).map_err(|e| ProfileError::io(&diamond_dir, e))?;

        log::info!("Fragmenting sequences in each genome");
        let fragment_file = diamond_dir.join("fragments.fna");
        let mut fragmented = self.fragment_genomes(genome_files, &fragment_file)?;

        let hit_table = match source {
            HitSource::Diamond { db } => {
                log::info!("Running diamond blastx with {} threads", cfg.cpus);
                let out = diamond_dir.join("diamond_hits.tsv");
                Diamond::new(cfg.cpus).blastx(
                    &fragment_file,
                    db,
                    cfg.evalue,
                    cfg.per_identity,
                    1,
                    &out,
                )?;
                out
            }
            HitSource::Precomputed(path) => path.clone(),
        };

        log::info!("Creating taxonomic profile for each genome");
        let hit_summary = ingest_hits(
            &hit_table,
            &taxonomy.lineages,
            &fragmented.seq_to_genome,
            &mut fragmented.accumulators,
        )?;
        let tables = fragmented.seal();

        let reports: Vec<GenomeReport> = tables
            .par_iter()
            .map(|table| profile_genome(table, &taxonomy.consistency))
            .collect();

        log::info!("Writing taxonomic profile for each genome");
        let report_dir = cfg.report_dir();
        fs::create_dir_all(&report_dir).map_err(|e| ProfileError::io(&report_dir, e))?;

        let schema = taxonomy.schema();
        let summary_file = cfg.output_dir.join("genome_summary.tsv");
        let written: Vec<Result<GenomeReportFiles>> = reports
            .par_iter()
            .map(|report| write_genome_reports(report, schema, &report_dir))
            .collect();
        let mut report_files = Vec::with_capacity(written.len());
        let mut first_err = None;
        for result in written {
            match result {
                Ok(files) => report_files.push(files),
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_err {
            remove_reports(&report_files, &summary_file);
            return Err(e);
        }

        if let Err(e) = write_genome_summary(&reports, schema, &summary_file) {
            remove_reports(&report_files, &summary_file);
            return Err(e);
        }

        if cfg.krona_html {
            let rendered = render_krona_html(
                &cfg.krona_executable,
                &report_files,
                &cfg.output_dir.join("taxonomic_profiles.krona.html"),
            );
            if let Err(e) = rendered {
                remove_reports(&report_files, &summary_file);
                return Err(e);
            }
        }

        Ok(ProfileResults {
            reports,
            report_files,
            hit_summary,
            taxonomy,
        })
    }
}
