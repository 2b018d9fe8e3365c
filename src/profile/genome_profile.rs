// src/profile/genome_profile.rs

use ahash::AHashMap;

use super::classify_sequence::GenomeClassification;
use super::hit_table::{HitInfo, MeanHitStats};
use crate::taxdb::UNCLASSIFIED;

/// Per-taxon statistics at one rank.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonStats {
    /// Means over every supporting hit; `None` for `unclassified`.
    pub hit_stats: Option<MeanHitStats>,
    pub num_seqs: usize,
    pub num_basepairs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxonAbundance {
    pub taxon: String,
    /// Fraction of the genome's base pairs assigned to this taxon.
    pub abundance: f64,
    pub stats: TaxonStats,
}

impl TaxonAbundance {
    pub fn is_unclassified(&self) -> bool {
        self.taxon == UNCLASSIFIED
    }
}

/// All taxa at one rank, most abundant first (ties by label).
/// `unclassified` is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct RankProfile {
    taxa: Vec<TaxonAbundance>,
}

impl RankProfile {
    pub fn taxa(&self) -> &[TaxonAbundance] {
        &self.taxa
    }

    pub fn get(&self, taxon: &str) -> Option<&TaxonAbundance> {
        self.taxa.iter().find(|t| t.taxon == taxon)
    }

    /// Taxon with the largest share of base pairs.
    pub fn headline(&self) -> &TaxonAbundance {
        // never empty: unclassified is always inserted
        &self.taxa[0]
    }

    pub fn total_abundance(&self) -> f64 {
        self.taxa.iter().map(|t| t.abundance).sum()
    }
}

/// Relative abundance profile of a genome at every rank.
#[derive(Debug, Clone, PartialEq)]
pub struct AbundanceProfile {
    pub genome_id: String,
    pub total_length: u64,
    pub num_sequences: usize,
    pub ranks: Vec<RankProfile>,
}

#[derive(Default)]
struct TaxonTally<'a> {
    num_seqs: usize,
    num_basepairs: u64,
    hits: Vec<&'a HitInfo>,
}

impl AbundanceProfile {
    /// Abundance is weighted by sequence length. Hit statistics pool the
    /// supporting hits of every sequence assigned to the taxon.
    pub fn build(classification: &GenomeClassification) -> Self {
        let total_length: u64 = classification.sequences.iter().map(|s| s.info.length).sum();
        let num_ranks = classification.num_ranks;

        let mut ranks = Vec::with_capacity(num_ranks);
        for r in 0..num_ranks {
            let mut tallies: AHashMap<&str, TaxonTally> = AHashMap::new();
            tallies.entry(UNCLASSIFIED).or_default();

            for seq in &classification.sequences {
                let call = &seq.ranks[r];
                let tally = tallies.entry(call.taxon.as_str()).or_default();
                tally.num_seqs += 1;
                tally.num_basepairs += seq.info.length;
                if let Some(hits) = &call.hits {
                    tally.hits.extend(hits.iter());
                }
            }

            let mut taxa: Vec<TaxonAbundance> = tallies
                .into_iter()
                .map(|(taxon, tally)| TaxonAbundance {
                    taxon: taxon.to_string(),
                    abundance: if total_length > 0 {
                        tally.num_basepairs as f64 / total_length as f64
                    } else {
                        0.0
                    },
                    stats: TaxonStats {
                        hit_stats: if taxon == UNCLASSIFIED {
                            None
                        } else {
                            MeanHitStats::from_hits(tally.hits.iter().copied())
                        },
                        num_seqs: tally.num_seqs,
                        num_basepairs: tally.num_basepairs,
                    },
                })
                .collect();

            taxa.sort_by(|a, b| {
                b.stats
                    .num_basepairs
                    .cmp(&a.stats.num_basepairs)
                    .then_with(|| a.taxon.cmp(&b.taxon))
            });
            ranks.push(RankProfile { taxa });
        }

        Self {
            genome_id: classification.genome_id.clone(),
            total_length,
            num_sequences: classification.len(),
            ranks,
        }
    }

    /// Percentage of the genome's sequences assigned to `entry`.
    pub fn percent_of_sequences(&self, entry: &TaxonAbundance) -> f64 {
        if self.num_sequences == 0 {
            0.0
        } else {
            entry.stats.num_seqs as f64 * 100.0 / self.num_sequences as f64
        }
    }
}
