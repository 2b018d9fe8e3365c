// src/profile/hit_table.rs

use ahash::AHashMap;
use std::sync::Arc;

use crate::error::{ProfileError, Result};
use crate::taxdb::RankSchema;

/// Quality statistics of one fragment hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitInfo {
    pub evalue: f64,
    pub perc_identity: f64,
    pub aln_length: u32,
}

/// Arithmetic means over a set of hits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanHitStats {
    pub evalue: f64,
    pub perc_identity: f64,
    pub aln_length: f64,
}

impl MeanHitStats {
    /// `None` for an empty slice.
    pub fn from_hits<'a, I>(hits: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a HitInfo>,
    {
        let mut n = 0usize;
        let (mut evalue, mut perc_identity, mut aln_length) = (0.0, 0.0, 0.0);
        for h in hits {
            n += 1;
            evalue += h.evalue;
            perc_identity += h.perc_identity;
            aln_length += h.aln_length as f64;
        }
        if n == 0 {
            return None;
        }
        let n = n as f64;
        Some(Self {
            evalue: evalue / n,
            perc_identity: perc_identity / n,
            aln_length: aln_length / n,
        })
    }
}

/// Taxon label -> every hit whose reference lineage passes through it.
pub type TaxonBuckets = AHashMap<String, Vec<HitInfo>>;

/// Length and fragment count recorded for a sequence at fragmentation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceInfo {
    pub length: u64,
    pub fragments: u32,
}

/// Ingestion phase of a genome profile. Only appends; call [`HitAccumulator::seal`]
/// to obtain the read-only [`HitTable`] used by classification.
#[derive(Debug)]
pub struct HitAccumulator {
    genome_id: String,
    schema: Arc<RankSchema>,
    seq_order: Vec<String>,
    sequences: AHashMap<String, SequenceInfo>,
    hits: AHashMap<String, Box<[TaxonBuckets]>>,
}

impl HitAccumulator {
    pub fn new(genome_id: &str, schema: Arc<RankSchema>) -> Self {
        Self {
            genome_id: genome_id.to_string(),
            schema,
            seq_order: Vec::new(),
            sequences: AHashMap::new(),
            hits: AHashMap::new(),
        }
    }

    pub fn genome_id(&self) -> &str {
        &self.genome_id
    }

    /// Register a sequence with its length (bp) and number of fragments.
    pub fn add_sequence(&mut self, seq_id: &str, length: u64, fragments: u32) -> Result<()> {
        if self.sequences.contains_key(seq_id) {
            return Err(ProfileError::DuplicateSequence {
                seq_id: seq_id.to_string(),
                genome_id: self.genome_id.clone(),
            });
        }
        self.seq_order.push(seq_id.to_string());
        self.sequences
            .insert(seq_id.to_string(), SequenceInfo { length, fragments });
        Ok(())
    }

    /// Append `hit` to the bucket of `lineage[r]` at every rank `r`.
    ///
    /// Windows are not deduplicated: K hit windows contribute K entries per rank.
    /// The lineage must have one label per rank; the lineage table checks that at load time.
    pub fn add_hit(&mut self, seq_id: &str, lineage: &[String], hit: HitInfo) -> Result<()> {
        if !self.sequences.contains_key(seq_id) {
            return Err(ProfileError::UnknownSequence(seq_id.to_string()));
        }
        debug_assert_eq!(lineage.len(), self.schema.len());

        let n = self.schema.len();
        let ranks = self
            .hits
            .entry(seq_id.to_string())
            .or_insert_with(|| vec![TaxonBuckets::default(); n].into_boxed_slice());

        for (buckets, taxon) in ranks.iter_mut().zip(lineage) {
            match buckets.get_mut(taxon) {
                Some(list) => list.push(hit),
                None => {
                    buckets.insert(taxon.clone(), vec![hit]);
                }
            }
        }
        Ok(())
    }

    /// Close ingestion. No hit can be added to the returned table.
    pub fn seal(self) -> HitTable {
        log::debug!(
            "Genome {}: {} sequences, {} with hits",
            self.genome_id,
            self.seq_order.len(),
            self.hits.len()
        );
        HitTable {
            genome_id: self.genome_id,
            schema: self.schema,
            seq_order: self.seq_order,
            sequences: self.sequences,
            hits: self.hits,
        }
    }
}

/// Read-only hit table of one genome: sequence id x rank x taxon -> hits.
#[derive(Debug)]
pub struct HitTable {
    genome_id: String,
    schema: Arc<RankSchema>,
    seq_order: Vec<String>,
    sequences: AHashMap<String, SequenceInfo>,
    hits: AHashMap<String, Box<[TaxonBuckets]>>,
}

impl HitTable {
    pub fn genome_id(&self) -> &str {
        &self.genome_id
    }

    pub fn schema(&self) -> &Arc<RankSchema> {
        &self.schema
    }

    /// Sequences in registration order.
    pub fn sequences(&self) -> impl Iterator<Item = (&str, SequenceInfo)> {
        self.seq_order
            .iter()
            .map(|id| (id.as_str(), self.sequences.get(id).copied().unwrap_or_default()))
    }

    pub fn sequence(&self, seq_id: &str) -> Option<SequenceInfo> {
        self.sequences.get(seq_id).copied()
    }

    pub fn num_sequences(&self) -> usize {
        self.seq_order.len()
    }

    /// Total genome length in bp.
    pub fn total_length(&self) -> u64 {
        self.sequences.values().map(|s| s.length).sum()
    }

    /// Per-rank buckets for a sequence, or `None` when it has no hits.
    pub fn rank_hits(&self, seq_id: &str) -> Option<&[TaxonBuckets]> {
        self.hits.get(seq_id).map(|b| &b[..])
    }

    /// Bucket for one (sequence, rank, taxon). Empty when never hit.
    pub fn bucket(&self, seq_id: &str, rank: usize, taxon: &str) -> &[HitInfo] {
        self.rank_hits(seq_id)
            .and_then(|ranks| ranks.get(rank))
            .and_then(|b| b.get(taxon))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
