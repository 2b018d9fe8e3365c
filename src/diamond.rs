// src/diamond.rs

use std::path::Path;
use std::process::Command;

use crate::error::{ProfileError, Result};

/// Runs `diamond blastx` and leaves a tabular (format 6) hit table behind.
#[derive(Debug, Clone)]
pub struct Diamond {
    pub cpus: usize,
    pub executable: String,
}

impl Diamond {
    pub fn new(cpus: usize) -> Self {
        Self {
            cpus,
            executable: "diamond".to_string(),
        }
    }

    /// Argument list for a blastx search keeping the `top_hits` best hits per window.
    pub fn blastx_args(
        &self,
        query: &Path,
        db: &Path,
        evalue: f64,
        per_identity: f64,
        top_hits: u32,
        out_tsv: &Path,
    ) -> Vec<String> {
        vec![
            "blastx".to_string(),
            "--query".to_string(),
            query.display().to_string(),
            "--db".to_string(),
            db.display().to_string(),
            "--evalue".to_string(),
            evalue.to_string(),
            "--id".to_string(),
            per_identity.to_string(),
            "--max-target-seqs".to_string(),
            top_hits.to_string(),
            "--threads".to_string(),
            self.cpus.to_string(),
            "--outfmt".to_string(),
            "6".to_string(),
            "--out".to_string(),
            out_tsv.display().to_string(),
        ]
    }

    pub fn blastx(
        &self,
        query: &Path,
        db: &Path,
        evalue: f64,
        per_identity: f64,
        top_hits: u32,
        out_tsv: &Path,
    ) -> Result<()> {
        let args = self.blastx_args(query, db, evalue, per_identity, top_hits, out_tsv);
        log::debug!("Running {} {}", self.executable, args.join(" "));

        let output = Command::new(&self.executable)
            .args(&args)
            .output()
            .map_err(|e| ProfileError::ExternalTool {
                tool: self.executable.clone(),
                detail: format!("could not start: {e}"),
            })?;

        if !output.status.success() {
            return Err(ProfileError::ExternalTool {
                tool: self.executable.clone(),
                detail: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}
