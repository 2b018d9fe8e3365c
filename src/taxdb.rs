//src/taxdb.rs

use ahash::{AHashMap, AHashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::error::{ProfileError, Result};

/// Label assigned to a rank when no taxon could be called.
pub const UNCLASSIFIED: &str = "unclassified";

/// Ordered rank schema, fixed for a run. Rank 0 is the most general rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankSchema {
    labels: Vec<String>,
    prefixes: Vec<String>,
}

impl Default for RankSchema {
    /// The seven GreenGenes ranks, `k__` through `s__`.
    fn default() -> Self {
        Self::new(&[
            ("domain", "k__"),
            ("phylum", "p__"),
            ("class", "c__"),
            ("order", "o__"),
            ("family", "f__"),
            ("genus", "g__"),
            ("species", "s__"),
        ])
    }
}

impl RankSchema {
    pub fn new(ranks: &[(&str, &str)]) -> Self {
        Self {
            labels: ranks.iter().map(|(l, _)| l.to_string()).collect(),
            prefixes: ranks.iter().map(|(_, p)| p.to_string()).collect(),
        }
    }

    /// Number of ranks (N).
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

/// Reference id -> lineage, one label per rank.
///
/// File order is kept alongside the hash index so that anything derived by
/// scanning the table (the consistency table) is reproducible.
#[derive(Debug, Clone)]
pub struct LineageTable {
    schema: Arc<RankSchema>,
    order: Vec<String>,
    lineages: AHashMap<String, Vec<String>>,
}

impl LineageTable {
    pub fn new(schema: Arc<RankSchema>) -> Self {
        Self {
            schema,
            order: Vec::new(),
            lineages: AHashMap::new(),
        }
    }

    /// Add a lineage, rejecting anything that is not exactly one label per rank.
    /// A repeated reference id is ignored: the first lineage in the file wins,
    /// as it does for parent conflicts.
    pub fn insert(&mut self, ref_id: &str, lineage: Vec<String>) -> Result<()> {
        if lineage.len() != self.schema.len() {
            return Err(ProfileError::LineageLength {
                ref_id: ref_id.to_string(),
                expected: self.schema.len(),
                found: lineage.len(),
            });
        }
        if self.lineages.contains_key(ref_id) {
            log::warn!("Reference '{}' listed twice in taxonomy; keeping the first entry", ref_id);
            return Ok(());
        }
        self.lineages.insert(ref_id.to_string(), lineage);
        self.order.push(ref_id.to_string());
        Ok(())
    }

    pub fn get(&self, ref_id: &str) -> Option<&[String]> {
        self.lineages.get(ref_id).map(Vec::as_slice)
    }

    pub fn schema(&self) -> &Arc<RankSchema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Lineages in the order they were loaded.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.order
            .iter()
            .filter_map(|id| self.lineages.get(id).map(|l| (id.as_str(), l.as_slice())))
    }
}

/// Parses a taxonomy file in the format:
/// ```text
/// <ref_id>\t<k__...>;<p__...>;...;<s__...>
/// ```
/// Blank lines and lines starting with `#` are skipped.
pub fn parse_taxonomy<P: AsRef<Path>>(filepath: P, schema: Arc<RankSchema>) -> Result<LineageTable> {
    let path = filepath.as_ref();
    let file = File::open(path).map_err(|e| ProfileError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut table = LineageTable::new(schema);
    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| ProfileError::io(path, e))?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (ref_id, taxa) = line.split_once('\t').ok_or_else(|| ProfileError::MalformedTaxonomy {
            line: idx + 1,
            detail: "expected '<ref_id>\\t<taxonomy string>'".to_string(),
        })?;

        let lineage: Vec<String> = taxa.split(';').map(|t| t.trim().to_string()).collect();
        table.insert(ref_id.trim(), lineage)?;
    }

    log::info!("Read taxonomy for {} reference genomes", table.len());
    Ok(table)
}

/// A taxon observed under a different parent than the one recorded first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentConflict {
    pub rank: usize,
    pub taxon: String,
    pub kept_parent: String,
    pub other_parent: String,
}

/// (rank, taxon) -> expected taxon at rank - 1, for every rank > 0.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyTable {
    parents: Vec<AHashMap<String, String>>,
    conflicts: Vec<ParentConflict>,
}

impl ConsistencyTable {
    /// Scan every lineage in load order. The first parent seen for a taxon
    /// is kept; later disagreements are recorded as conflicts.
    pub fn build(lineages: &LineageTable) -> Self {
        let n = lineages.schema().len();
        let mut parents: Vec<AHashMap<String, String>> = vec![AHashMap::new(); n];
        let mut conflicts = Vec::new();
        let mut reported: AHashSet<(usize, String, String)> = AHashSet::new();

        for (_, lineage) in lineages.iter() {
            for rank in 1..n {
                let taxon = &lineage[rank];
                let parent = &lineage[rank - 1];
                match parents[rank].get(taxon) {
                    None => {
                        parents[rank].insert(taxon.clone(), parent.clone());
                    }
                    Some(kept) if kept != parent => {
                        if reported.insert((rank, taxon.clone(), parent.clone())) {
                            conflicts.push(ParentConflict {
                                rank,
                                taxon: taxon.clone(),
                                kept_parent: kept.clone(),
                                other_parent: parent.clone(),
                            });
                        }
                    }
                    Some(_) => {}
                }
            }
        }

        if !conflicts.is_empty() {
            log::warn!(
                "{} parent conflicts in the reference taxonomy; using the first parent seen for each taxon",
                conflicts.len()
            );
            for c in &conflicts {
                log::debug!(
                    "Taxon {} (rank {}): parent {} kept, {} ignored",
                    c.taxon, c.rank, c.kept_parent, c.other_parent
                );
            }
        }

        Self { parents, conflicts }
    }

    /// Expected parent of `taxon` at `rank`. Always `None` for rank 0.
    pub fn expected_parent(&self, rank: usize, taxon: &str) -> Option<&str> {
        if rank == 0 {
            return None;
        }
        self.parents.get(rank)?.get(taxon).map(String::as_str)
    }

    pub fn conflicts(&self) -> &[ParentConflict] {
        &self.conflicts
    }
}

/// The loaded reference taxonomy: rank schema, lineages and the derived
/// consistency table. Built once and shared read-only.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    pub lineages: LineageTable,
    pub consistency: ConsistencyTable,
}

impl Taxonomy {
    pub fn new(lineages: LineageTable) -> Self {
        let consistency = ConsistencyTable::build(&lineages);
        Self {
            lineages,
            consistency,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P, schema: Arc<RankSchema>) -> Result<Self> {
        Ok(Self::new(parse_taxonomy(path, schema)?))
    }

    pub fn schema(&self) -> &Arc<RankSchema> {
        self.lineages.schema()
    }
}
