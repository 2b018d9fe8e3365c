// src/profile/classify_sequence.rs

use ahash::AHashMap;

use super::hit_table::{HitInfo, HitTable, MeanHitStats, SequenceInfo, TaxonBuckets};
use crate::taxdb::{ConsistencyTable, UNCLASSIFIED};

/// A candidate taxon needs hits from at least this percentage of the
/// sequence's fragments (hit or not) to be accepted.
pub const MIN_SUPPORT_PERCENT: u64 = 20;

/// Call made for one sequence at one rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankAssignment {
    pub taxon: String,
    /// Hits supporting the call; `None` when unclassified.
    pub hits: Option<Vec<HitInfo>>,
}

impl RankAssignment {
    pub fn unclassified() -> Self {
        Self {
            taxon: UNCLASSIFIED.to_string(),
            hits: None,
        }
    }

    #[inline]
    pub fn is_classified(&self) -> bool {
        self.hits.is_some()
    }

    pub fn num_hits(&self) -> usize {
        self.hits.as_ref().map_or(0, Vec::len)
    }

    pub fn mean_stats(&self) -> Option<MeanHitStats> {
        self.hits.as_ref().and_then(|h| MeanHitStats::from_hits(h))
    }
}

/// One call per rank for a sequence, plus the length and fragment count it was made from.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceClassification {
    pub seq_id: String,
    pub info: SequenceInfo,
    pub ranks: Vec<RankAssignment>,
}

impl SequenceClassification {
    /// Taxon labels from rank 0 down, `unclassified` included.
    pub fn lineage(&self) -> impl Iterator<Item = &str> {
        self.ranks.iter().map(|r| r.taxon.as_str())
    }
}

/// Classification of every sequence in a genome, in registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomeClassification {
    pub genome_id: String,
    pub num_ranks: usize,
    pub sequences: Vec<SequenceClassification>,
    index: AHashMap<String, usize>,
}

impl GenomeClassification {
    pub fn get(&self, seq_id: &str) -> Option<&SequenceClassification> {
        self.index.get(seq_id).map(|&i| &self.sequences[i])
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

/// Taxon with the most hits. Ties go to the lexicographically smallest label,
/// so the result does not depend on hash or insertion order.
pub fn majority_taxon(buckets: &TaxonBuckets) -> Option<(&str, &[HitInfo])> {
    buckets
        .iter()
        .max_by(|(ta, ha), (tb, hb)| ha.len().cmp(&hb.len()).then_with(|| tb.cmp(ta)))
        .map(|(t, h)| (t.as_str(), h.as_slice()))
}

/// Whether `support` hits out of `fragments` meet [`MIN_SUPPORT_PERCENT`].
/// A sequence without fragments never passes.
#[inline]
pub fn passes_threshold(support: usize, fragments: u32) -> bool {
    fragments > 0 && (support as u64) * 100 >= MIN_SUPPORT_PERCENT * fragments as u64
}

/// Classify one sequence from domain to species.
///
/// At each rank the majority taxon is accepted if it passes the support
/// threshold and, below rank 0, its expected parent is the taxon accepted
/// at the rank above. The first rejection sets that rank and every lower rank
/// to unclassified.
pub fn classify_sequence(
    info: SequenceInfo,
    rank_hits: Option<&[TaxonBuckets]>,
    consistency: &ConsistencyTable,
    num_ranks: usize,
) -> Vec<RankAssignment> {
    let mut ranks = Vec::with_capacity(num_ranks);

    if let Some(rank_hits) = rank_hits {
        let mut parent_taxon: Option<&str> = None;
        for rank in 0..num_ranks {
            let Some((taxon, hits)) = rank_hits.get(rank).and_then(majority_taxon) else {
                break;
            };
            if !passes_threshold(hits.len(), info.fragments) {
                break;
            }
            if rank > 0 && consistency.expected_parent(rank, taxon) != parent_taxon {
                break;
            }

            ranks.push(RankAssignment {
                taxon: taxon.to_string(),
                hits: Some(hits.to_vec()),
            });
            parent_taxon = Some(taxon);
        }
    }

    ranks.resize_with(num_ranks, RankAssignment::unclassified);
    ranks
}

/// Classify every sequence of a sealed hit table.
pub fn classify_sequences(table: &HitTable, consistency: &ConsistencyTable) -> GenomeClassification {
    let num_ranks = table.schema().len();
    let mut sequences = Vec::with_capacity(table.num_sequences());
    let mut index = AHashMap::with_capacity(table.num_sequences());

    for (seq_id, info) in table.sequences() {
        let ranks = classify_sequence(info, table.rank_hits(seq_id), consistency, num_ranks);
        index.insert(seq_id.to_string(), sequences.len());
        sequences.push(SequenceClassification {
            seq_id: seq_id.to_string(),
            info,
            ranks,
        });
    }

    let classified = sequences.iter().filter(|s| s.ranks[0].is_classified()).count();
    log::debug!(
        "Genome {}: {} of {} sequences classified at rank 0",
        table.genome_id(),
        classified,
        sequences.len()
    );

    GenomeClassification {
        genome_id: table.genome_id().to_string(),
        num_ranks,
        sequences,
        index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::hit_table::HitAccumulator;
    use crate::taxdb::{LineageTable, RankSchema, Taxonomy};
    use std::sync::Arc;

    fn lineage(s: &str) -> Vec<String> {
        s.split(';').map(str::to_string).collect()
    }

    fn hit() -> HitInfo {
        HitInfo {
            evalue: 1e-10,
            perc_identity: 75.0,
            aln_length: 300,
        }
    }

    fn taxonomy() -> Taxonomy {
        let schema = Arc::new(RankSchema::new(&[
            ("domain", "k__"),
            ("phylum", "p__"),
            ("class", "c__"),
        ]));
        let mut table = LineageTable::new(schema);
        for (id, l) in [
            ("R1", "k__Bacteria;p__Firmicutes;c__Bacilli"),
            ("R2", "k__Bacteria;p__Proteobacteria;c__Gammaproteobacteria"),
            ("R3", "k__Archaea;p__Euryarchaeota;c__Methanobacteria"),
        ] {
            table.insert(id, lineage(l)).unwrap();
        }
        Taxonomy::new(table)
    }

    fn accumulate(tax: &Taxonomy, fragments: u32, refs: &[(&str, usize)]) -> HitTable {
        let mut acc = HitAccumulator::new("bin", tax.schema().clone());
        acc.add_sequence("c1", fragments as u64 * 1000, fragments).unwrap();
        for &(ref_id, count) in refs {
            let l = tax.lineages.get(ref_id).unwrap().to_vec();
            for _ in 0..count {
                acc.add_hit("c1", &l, hit()).unwrap();
            }
        }
        acc.seal()
    }

    fn taxa(c: &GenomeClassification) -> Vec<&str> {
        c.get("c1").unwrap().lineage().collect()
    }

    #[test]
    fn below_threshold_is_unclassified() {
        // 1 of 10 fragments hit: 10% < 20%
        let tax = taxonomy();
        let table = accumulate(&tax, 10, &[("R1", 1)]);
        let c = classify_sequences(&table, &tax.consistency);
        assert_eq!(taxa(&c), vec![UNCLASSIFIED; 3]);
    }

    #[test]
    fn at_threshold_is_classified() {
        // 2 of 10 fragments: exactly 20%
        let tax = taxonomy();
        let table = accumulate(&tax, 10, &[("R1", 2)]);
        let c = classify_sequences(&table, &tax.consistency);
        assert_eq!(taxa(&c), vec!["k__Bacteria", "p__Firmicutes", "c__Bacilli"]);
        assert_eq!(c.get("c1").unwrap().ranks[1].num_hits(), 2);
    }

    #[test]
    fn threshold_applies_per_rank() {
        // Bacteria has 4 hits, but they split 2/2 across phyla with 15 fragments.
        let tax = taxonomy();
        let table = accumulate(&tax, 15, &[("R1", 2), ("R2", 2)]);
        let c = classify_sequences(&table, &tax.consistency);
        assert_eq!(taxa(&c), vec!["k__Bacteria", UNCLASSIFIED, UNCLASSIFIED]);
    }

    #[test]
    fn inconsistent_parent_collapses_lower_ranks() {
        // Bacteria wins the domain vote over two phyla, but Euryarchaeota wins the phylum vote.
        let tax = taxonomy();
        let table = accumulate(&tax, 10, &[("R1", 3), ("R2", 3), ("R3", 4)]);
        let c = classify_sequences(&table, &tax.consistency);
        assert_eq!(taxa(&c), vec!["k__Bacteria", UNCLASSIFIED, UNCLASSIFIED]);
        assert!(c.get("c1").unwrap().ranks[0].is_classified());
        assert!(c.get("c1").unwrap().ranks[1].hits.is_none());
    }

    #[test]
    fn zero_hits_is_unclassified() {
        let tax = taxonomy();
        let table = accumulate(&tax, 5, &[]);
        let c = classify_sequences(&table, &tax.consistency);
        let seq = c.get("c1").unwrap();
        assert!(seq.ranks.iter().all(|r| r.taxon == UNCLASSIFIED && r.hits.is_none()));
    }

    #[test]
    fn zero_fragments_is_unclassified() {
        assert!(!passes_threshold(0, 0));
        assert!(!passes_threshold(3, 0));
        assert!(passes_threshold(1, 5));
        assert!(!passes_threshold(1, 6));
    }

    #[test]
    fn ties_go_to_smallest_label() {
        let mut buckets = TaxonBuckets::default();
        buckets.insert("p__Zeta".to_string(), vec![hit(), hit()]);
        buckets.insert("p__Alpha".to_string(), vec![hit(), hit()]);
        buckets.insert("p__Mid".to_string(), vec![hit()]);
        assert_eq!(majority_taxon(&buckets).unwrap().0, "p__Alpha");
        assert!(majority_taxon(&TaxonBuckets::default()).is_none());
    }

    #[test]
    fn collapse_is_monotonic_and_idempotent() {
        let tax = taxonomy();
        for refs in [
            vec![("R1", 1)],
            vec![("R1", 3), ("R2", 3), ("R3", 4)],
            vec![("R2", 5)],
            vec![("R3", 2), ("R1", 1)],
        ] {
            let table = accumulate(&tax, 10, &refs);
            let first = classify_sequences(&table, &tax.consistency);
            let second = classify_sequences(&table, &tax.consistency);
            assert_eq!(first, second);

            let ranks = &first.get("c1").unwrap().ranks;
            if let Some(pos) = ranks.iter().position(|r| !r.is_classified()) {
                assert!(ranks[pos..].iter().all(|r| r.taxon == UNCLASSIFIED));
            }
            for r in 1..ranks.len() {
                if ranks[r].is_classified() {
                    assert_eq!(
                        tax.consistency.expected_parent(r, &ranks[r].taxon),
                        Some(ranks[r - 1].taxon.as_str())
                    );
                }
            }
        }
    }
}
