//src/types.rs

/// One FASTA record of an input genome.
#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub header_line: String,
    pub seq: String,
}

/// A parsed row of a tabular (BLAST format 6) homology search result.
/// Only the columns used for profiling are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub query_id: String,
    pub subject_id: String,
    pub perc_identity: f64,
    pub aln_length: u32,
    pub evalue: f64,
}
