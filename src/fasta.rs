use ahash::AHashMap;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{ProfileError, Result};
use crate::profile::hit_table::HitAccumulator;
use crate::types::FastaRecord;

/// Separator between a sequence id and the index of one of its windows.
pub const FRAGMENT_SEPARATOR: char = '~';

/// Minimal FASTA reader that also supports .gz
pub fn read_fasta_records<P: AsRef<Path>>(path: P) -> Result<Vec<FastaRecord>> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| ProfileError::io(path, e))?;

    let is_gz = path.extension().map(|ext| ext == "gz").unwrap_or(false);
    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };

    let mut records = Vec::new();
    let mut current: Option<FastaRecord> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ProfileError::io(path, e))?;
        let line = line.trim_end();
        if let Some(header) = line.strip_prefix('>') {
            if let Some(rec) = current.take() {
                records.push(rec);
            }
            current = Some(FastaRecord {
                id: header.split_whitespace().next().unwrap_or_default().to_string(),
                header_line: header.to_string(),
                seq: String::new(),
            });
        } else if let Some(rec) = current.as_mut() {
            let residues = line.trim();
            if !residues.is_ascii() {
                return Err(ProfileError::MalformedFasta {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    detail: format!("non-ASCII residue in sequence '{}'", rec.id),
                });
            }
            rec.seq.push_str(residues);
        }
        // sequence data before the first header is ignored
    }
    if let Some(rec) = current {
        records.push(rec);
    }

    Ok(records)
}

/// Windows of `window` bases starting every `step` bases. The last window must
/// fit entirely, so a sequence shorter than `window` has no fragments.
///
/// Positions are bytes; records from [`read_fasta_records`] are ASCII. A window
/// that would split a multi-byte character is skipped.
pub fn fragment(seq: &str, window: usize, step: usize) -> Vec<&str> {
    if window == 0 || step == 0 || seq.len() < window {
        return Vec::new();
    }
    (0..=seq.len() - window)
        .step_by(step)
        .filter_map(|start| seq.get(start..start + window))
        .collect()
}

/// Genome id of a FASTA path: the file name without `.gz` and without its extension.
pub fn genome_id_from_path<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[..idx].to_string(),
        _ => name.to_string(),
    }
}

/// Fragment every sequence of one genome, writing `>seqid~i` windows to `out`.
///
/// Every sequence is registered with `acc` (length and fragment count) and
/// mapped to the genome in `seq_to_genome`, including sequences too short to
/// yield a window.
pub fn write_fragments<P: AsRef<Path>, W: Write>(
    genome_file: P,
    window: usize,
    step: usize,
    acc: &mut HitAccumulator,
    seq_to_genome: &mut AHashMap<String, String>,
    out: &mut W,
    out_path: &Path,
) -> Result<usize> {
    let records = read_fasta_records(genome_file)?;
    let mut total = 0usize;

    for rec in &records {
        let windows = fragment(&rec.seq, window, step);
        for (i, frag) in windows.iter().enumerate() {
            writeln!(out, ">{}{}{}\n{}", rec.id, FRAGMENT_SEPARATOR, i, frag)
                .map_err(|e| ProfileError::io(out_path, e))?;
        }
        total += windows.len();

        acc.add_sequence(&rec.id, rec.seq.len() as u64, windows.len() as u32)?;
        if let Some(previous) = seq_to_genome.insert(rec.id.clone(), acc.genome_id().to_string()) {
            return Err(ProfileError::DuplicateSequence {
                seq_id: rec.id.clone(),
                genome_id: previous,
            });
        }
    }

    log::debug!(
        "Genome {}: {} sequences, {} fragments",
        acc.genome_id(),
        records.len(),
        total
    );
    Ok(total)
}
