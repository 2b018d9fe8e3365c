pub mod hit_table;
pub mod classify_sequence;
pub mod genome_profile;

use classify_sequence::{classify_sequences, GenomeClassification};
use genome_profile::AbundanceProfile;
use hit_table::HitTable;
use super::taxdb::ConsistencyTable;

/// Classification and abundance profile of one genome.
#[derive(Debug, Clone)]
pub struct GenomeReport {
    pub classification: GenomeClassification,
    pub abundance: AbundanceProfile,
}

impl GenomeReport {
    pub fn genome_id(&self) -> &str {
        &self.classification.genome_id
    }
}

/// Classify every sequence of a sealed genome and roll the calls up into its profile.
pub fn profile_genome(table: &HitTable, consistency: &ConsistencyTable) -> GenomeReport {
    let classification = classify_sequences(table, consistency);
    let abundance = AbundanceProfile::build(&classification);
    GenomeReport {
        classification,
        abundance,
    }
}
