// src/config.rs

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ProfileError, Result};
use crate::taxdb::RankSchema;

pub const DEFAULT_WINDOW_SIZE: usize = 2000;
pub const DEFAULT_STEP_SIZE: usize = 200;
pub const DEFAULT_EVALUE: f64 = 1e-3;
pub const DEFAULT_PER_IDENTITY: f64 = 30.0;
pub const DEFAULT_KRONA_EXECUTABLE: &str = "ktImportText";

#[derive(Debug, Clone)]
pub struct ProfileConfig {
    /// Fragment length in bp.
    pub window_size: usize,
    /// Bases between the starts of consecutive fragments.
    pub step_size: usize,
    /// E-value threshold passed to the search.
    pub evalue: f64,
    /// Percent identity threshold passed to the search.
    pub per_identity: f64,
    pub cpus: usize,
    pub output_dir: PathBuf,
    pub schema: Arc<RankSchema>,
    /// Render the Krona text exports to HTML with `ktImportText`.
    pub krona_html: bool,
    pub krona_executable: PathBuf,
}

impl ProfileConfig {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            step_size: DEFAULT_STEP_SIZE,
            evalue: DEFAULT_EVALUE,
            per_identity: DEFAULT_PER_IDENTITY,
            cpus: rayon::current_num_threads(),
            output_dir: output_dir.into(),
            schema: Arc::new(RankSchema::default()),
            krona_html: false,
            krona_executable: PathBuf::from(DEFAULT_KRONA_EXECUTABLE),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(ProfileError::InvalidConfig("window size must be positive".into()));
        }
        if self.step_size == 0 {
            return Err(ProfileError::InvalidConfig("step size must be positive".into()));
        }
        if !(self.evalue > 0.0) {
            return Err(ProfileError::InvalidConfig(format!(
                "e-value must be positive, got {}",
                self.evalue
            )));
        }
        if !(0.0..=100.0).contains(&self.per_identity) {
            return Err(ProfileError::InvalidConfig(format!(
                "percent identity must be within [0, 100], got {}",
                self.per_identity
            )));
        }
        if self.cpus == 0 {
            return Err(ProfileError::InvalidConfig("at least one cpu is required".into()));
        }
        if self.schema.is_empty() {
            return Err(ProfileError::InvalidConfig("rank schema has no ranks".into()));
        }
        Ok(())
    }

    pub fn diamond_dir(&self) -> PathBuf {
        self.output_dir.join("diamond")
    }

    pub fn report_dir(&self) -> PathBuf {
        self.output_dir.join("bin_reports")
    }
}
