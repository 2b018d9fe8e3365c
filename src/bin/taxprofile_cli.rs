use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;

use taxprofile_rs::config::{
    ProfileConfig, DEFAULT_EVALUE, DEFAULT_KRONA_EXECUTABLE, DEFAULT_PER_IDENTITY,
    DEFAULT_STEP_SIZE, DEFAULT_WINDOW_SIZE,
};
use taxprofile_rs::logging::init_logger;
use taxprofile_rs::{HitSource, TaxonomicProfiler};

/// Taxonomic profiles of genomes from homology hits to fixed-size sequence windows.
#[derive(Parser, Debug)]
#[command(name = "taxprofile", version, about)]
struct Args {
    /// Taxonomy of reference genomes: <ref_id>\t<k__...;p__...;...;s__...>
    taxonomy_file: PathBuf,

    /// Directory for all output files
    output_dir: PathBuf,

    /// Genome FASTA files (optionally gzipped)
    #[arg(required = true)]
    genome_files: Vec<PathBuf>,

    /// Diamond database of reference proteins
    #[arg(long, required_unless_present = "hits")]
    db: Option<PathBuf>,

    /// Precomputed tabular hit table for the fragments; skips the diamond search
    #[arg(long, conflicts_with = "db")]
    hits: Option<PathBuf>,

    /// E-value threshold for reporting hits
    #[arg(short = 'e', long, default_value_t = DEFAULT_EVALUE)]
    evalue: f64,

    /// Percent identity threshold for reporting hits
    #[arg(short = 'p', long, default_value_t = DEFAULT_PER_IDENTITY)]
    per_identity: f64,

    /// Size of each fragment (bp)
    #[arg(short = 'w', long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window_size: usize,

    /// Number of bases to move after each window
    #[arg(short = 's', long, default_value_t = DEFAULT_STEP_SIZE)]
    step_size: usize,

    /// Threads for the homology search (default: all)
    #[arg(short = 'c', long)]
    cpus: Option<usize>,

    /// Render the Krona exports to HTML with ktImportText
    #[arg(long)]
    krona_html: bool,

    /// ktImportText executable used with --krona-html
    #[arg(long, default_value = DEFAULT_KRONA_EXECUTABLE)]
    krona_executable: PathBuf,

    /// Log progress
    #[arg(short, long)]
    verbose: bool,
}

fn spinner(color: &str, msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&format!("{{spinner:.{color}}} {{msg}}"))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(msg);
    spinner
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.verbose);

    let mut config = ProfileConfig::new(&args.output_dir);
    config.evalue = args.evalue;
    config.per_identity = args.per_identity;
    config.window_size = args.window_size;
    config.step_size = args.step_size;
    config.krona_html = args.krona_html;
    config.krona_executable = args.krona_executable.clone();
    if let Some(cpus) = args.cpus {
        config.cpus = cpus;
    }

    let source = match (&args.hits, &args.db) {
        (Some(hits), _) => HitSource::Precomputed(hits.clone()),
        (None, Some(db)) => HitSource::Diamond { db: db.clone() },
        (None, None) => {
            log::error!("either --db or --hits is required");
            return ExitCode::FAILURE;
        }
    };

    let profiler = match TaxonomicProfiler::new(config) {
        Ok(p) => p,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let progress = spinner("green", "Profiling genomes...");
    progress.enable_steady_tick(std::time::Duration::from_millis(100));
    let results = profiler.run(&args.genome_files, &args.taxonomy_file, &source);
    match results {
        Ok(results) => {
            progress.finish_with_message(format!(
                "Profiled {} genome(s) from {} hits.",
                results.reports.len(),
                results.hit_summary.total_hits
            ));
            let done = spinner("cyan", "All done!");
            done.finish_with_message(format!(
                "Reports written to {}",
                profiler.config().output_dir.display()
            ));
            ExitCode::SUCCESS
        }
        Err(e) => {
            progress.abandon_with_message("Profiling failed.");
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
