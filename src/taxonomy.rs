//! Loading and querying of the NCBI-style taxonomy tree.
//!
//! Mirrors `kun_peng::taxonomy`'s `parse_nodes_file`/`parse_names_file`
//! parsing style (tab-delimited NCBI dump files, first name per id wins)
//! but keeps the node representation as the flat `{parent, rank}` map the
//! filter/LCA stages actually need, rather than the teacher's
//! BFS-reindexed binary-on-disk `Taxonomy` layout (this profiler never
//! persists a taxonomy between runs, see spec Non-goals).

use crate::errors::{ProfilerError, Result};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// `0` is reserved as "none/root-unknown".
pub type TaxonId = u32;

/// Ancestor walks are bounded at this many steps; exceeding it means the
/// taxonomy contains a cycle.
const CYCLE_GUARD: usize = 64;

#[derive(Debug, Clone)]
pub struct TaxonomyNode {
    pub parent: TaxonId,
    pub rank: String,
}

/// Immutable after load. Mapping from taxon id to node, plus a separate
/// id-to-display-name mapping.
#[derive(Debug, Default)]
pub struct TaxonomyStore {
    nodes: HashMap<TaxonId, TaxonomyNode>,
    names: HashMap<TaxonId, String>,
}

fn open_dump_file<P: AsRef<Path>>(path: P) -> Result<BufReader<File>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|_| ProfilerError::MissingTaxonomy(path.to_path_buf()))?;
    Ok(BufReader::new(file))
}

/// Splits a `nodes.dmp`/`names.dmp` style line on the NCBI `\t|\t` field
/// separator, trimming the trailing `\t|` line terminator some dumps carry.
fn split_dump_fields(line: &str) -> Vec<&str> {
    let line = line.trim_end_matches(|c| c == '\t' || c == '|');
    line.split("\t|\t").collect()
}

impl TaxonomyStore {
    /// Loads the taxonomy from `nodes.dmp` and `names.dmp` files.
    ///
    /// `nodes.dmp`: each line `taxon_id<ws>parent_id<tab>rank<tab>...`,
    /// extra columns ignored. `names.dmp`: each line
    /// `taxon_id<tab>name<tab>...`; only the first name line per id is
    /// retained.
    pub fn from_dumps<P: AsRef<Path>>(nodes_path: P, names_path: P) -> Result<Self> {
        let nodes_path = nodes_path.as_ref().to_path_buf();
        let names_path = names_path.as_ref().to_path_buf();

        let nodes = Self::parse_nodes(&nodes_path)?;
        let names = Self::parse_names(&names_path)?;

        Ok(TaxonomyStore { nodes, names })
    }

    fn parse_nodes(path: &PathBuf) -> Result<HashMap<TaxonId, TaxonomyNode>> {
        let reader = open_dump_file(path)?;
        let mut nodes = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_dump_fields(&line);
            if fields.len() < 3 {
                return Err(ProfilerError::MalformedTaxonomy {
                    file: path.clone(),
                    line: idx + 1,
                    detail: "expected at least taxon_id, parent_id, rank".to_string(),
                });
            }

            let taxon_id: TaxonId = fields[0].trim().parse().map_err(|_| {
                ProfilerError::MalformedTaxonomy {
                    file: path.clone(),
                    line: idx + 1,
                    detail: format!("invalid taxon id {:?}", fields[0]),
                }
            })?;
            let parent_id: TaxonId = fields[1].trim().parse().map_err(|_| {
                ProfilerError::MalformedTaxonomy {
                    file: path.clone(),
                    line: idx + 1,
                    detail: format!("invalid parent id {:?}", fields[1]),
                }
            })?;
            let rank = fields[2].trim().to_string();

            nodes.insert(taxon_id, TaxonomyNode { parent: parent_id, rank });
        }

        Ok(nodes)
    }

    fn parse_names(path: &PathBuf) -> Result<HashMap<TaxonId, String>> {
        let reader = open_dump_file(path)?;
        let mut names = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_dump_fields(&line);
            if fields.len() < 2 {
                return Err(ProfilerError::MalformedTaxonomy {
                    file: path.clone(),
                    line: idx + 1,
                    detail: "expected at least taxon_id, name".to_string(),
                });
            }

            let taxon_id: TaxonId = fields[0].trim().parse().map_err(|_| {
                ProfilerError::MalformedTaxonomy {
                    file: path.clone(),
                    line: idx + 1,
                    detail: format!("invalid taxon id {:?}", fields[0]),
                }
            })?;

            names
                .entry(taxon_id)
                .or_insert_with(|| fields[1].trim().to_string());
        }

        Ok(names)
    }

    pub fn parent_of(&self, taxon: TaxonId) -> Option<TaxonId> {
        self.nodes.get(&taxon).map(|n| n.parent)
    }

    pub fn rank_of(&self, taxon: TaxonId) -> &str {
        self.nodes.get(&taxon).map(|n| n.rank.as_str()).unwrap_or("")
    }

    pub fn name_of(&self, taxon: TaxonId) -> &str {
        self.names.get(&taxon).map(|s| s.as_str()).unwrap_or("")
    }

    /// Test-only node/name insertion, used by other modules' test suites to
    /// build a small in-memory taxonomy without a dump file.
    #[cfg(test)]
    pub(crate) fn insert_for_test(&mut self, id: TaxonId, parent: TaxonId, rank: &str, name: &str) {
        self.nodes.insert(id, TaxonomyNode { parent, rank: rank.to_string() });
        self.names.insert(id, name.to_string());
    }

    /// Ancestors of `taxon`, parent-first, excluding `taxon` itself.
    /// Stops at an unresolvable parent, taxon `0`, or a self-referencing
    /// root node. Fails with `TaxonomyCycle` past `CYCLE_GUARD` steps.
    pub fn ancestors(&self, taxon: TaxonId) -> Result<Vec<TaxonId>> {
        let mut out = Vec::new();
        let mut current = taxon;
        let mut steps = 0usize;

        loop {
            steps += 1;
            if steps > CYCLE_GUARD {
                return Err(ProfilerError::TaxonomyCycle(taxon));
            }
            let parent = match self.parent_of(current) {
                Some(p) => p,
                None => break,
            };
            if parent == 0 || parent == current {
                break;
            }
            out.push(parent);
            current = parent;
        }

        Ok(out)
    }

    /// Inclusive ancestor chain: `taxon` itself followed by `ancestors(taxon)`.
    fn ancestor_chain(&self, taxon: TaxonId) -> Result<Vec<TaxonId>> {
        if taxon == 0 {
            return Ok(Vec::new());
        }
        let mut chain = vec![taxon];
        chain.extend(self.ancestors(taxon)?);
        Ok(chain)
    }

    fn pairwise_lca(&self, a: TaxonId, b: TaxonId) -> Result<TaxonId> {
        if a == 0 || b == 0 {
            return Ok(0);
        }
        if a == b {
            return Ok(a);
        }
        let chain_a = self.ancestor_chain(a)?;
        let chain_b: HashSet<TaxonId> = self.ancestor_chain(b)?.into_iter().collect();

        for candidate in chain_a {
            if chain_b.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Ok(0)
    }

    /// Least common ancestor of `taxa`, restricted to `restrict`.
    ///
    /// Taxa outside `restrict` are dropped first; if nothing remains the
    /// result is `0`. Pairs are folded left to right (LCA is associative
    /// and commutative, so tie-break order doesn't matter); any pair that
    /// fails to meet collapses the whole result to `0`.
    pub fn lca(&self, taxa: &HashSet<TaxonId>, restrict: &HashSet<TaxonId>) -> Result<TaxonId> {
        let mut working: Vec<TaxonId> = taxa
            .iter()
            .copied()
            .filter(|t| restrict.contains(t))
            .collect();

        if working.is_empty() {
            return Ok(0);
        }

        while working.len() > 1 {
            let b = working.pop().unwrap();
            let a = working.pop().unwrap();
            let combined = self.pairwise_lca(a, b)?;
            if combined == 0 {
                return Ok(0);
            }
            working.push(combined);
        }

        Ok(working[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_from(nodes: &[(TaxonId, TaxonId, &str)]) -> TaxonomyStore {
        let mut store = TaxonomyStore::default();
        for &(id, parent, rank) in nodes {
            store
                .nodes
                .insert(id, TaxonomyNode { parent, rank: rank.to_string() });
        }
        store
    }

    #[test]
    fn ancestors_walk_to_self_loop_root() {
        let store = store_from(&[(1, 1, "superkingdom"), (5, 1, "genus"), (11, 5, "species")]);
        assert_eq!(store.ancestors(11).unwrap(), vec![5, 1]);
        assert_eq!(store.ancestors(1).unwrap(), Vec::<TaxonId>::new());
    }

    #[test]
    fn ancestors_detects_cycle() {
        let store = store_from(&[(2, 3, "genus"), (3, 2, "family")]);
        assert!(matches!(
            store.ancestors(2),
            Err(ProfilerError::TaxonomyCycle(2))
        ));
    }

    #[test]
    fn lca_of_two_siblings_is_genus() {
        let store = store_from(&[
            (1, 1, "superkingdom"),
            (5, 1, "genus"),
            (11, 5, "species"),
            (12, 5, "species"),
        ]);
        let restrict: HashSet<TaxonId> = [11, 12].into_iter().collect();
        let taxa: HashSet<TaxonId> = [11, 12].into_iter().collect();
        assert_eq!(store.lca(&taxa, &restrict).unwrap(), 5);
    }

    #[test]
    fn lca_disjoint_subtrees_is_zero() {
        let store = store_from(&[
            (1, 1, "root"),
            (100, 1, "superkingdom"),
            (200, 1, "superkingdom"),
            (11, 100, "species"),
            (12, 200, "species"),
        ]);
        let restrict: HashSet<TaxonId> = [11, 12].into_iter().collect();
        let taxa: HashSet<TaxonId> = [11, 12].into_iter().collect();
        assert_eq!(store.lca(&taxa, &restrict).unwrap(), 0);
    }

    #[test]
    fn lca_restrict_drops_invalid_taxa() {
        let store = store_from(&[
            (1, 1, "root"),
            (5, 1, "genus"),
            (11, 5, "species"),
            (12, 5, "species"),
        ]);
        let restrict: HashSet<TaxonId> = [11].into_iter().collect();
        let taxa: HashSet<TaxonId> = [11, 12].into_iter().collect();
        assert_eq!(store.lca(&taxa, &restrict).unwrap(), 11);
    }

    #[test]
    fn lca_is_associative() {
        let store = store_from(&[
            (1, 1, "root"),
            (5, 1, "genus"),
            (11, 5, "species"),
            (12, 5, "species"),
            (13, 5, "species"),
        ]);
        let restrict: HashSet<TaxonId> = [11, 12, 13].into_iter().collect();
        let all: HashSet<TaxonId> = [11, 12, 13].into_iter().collect();
        let ab: HashSet<TaxonId> = [11, 12].into_iter().collect();
        let lca_ab = store.lca(&ab, &restrict).unwrap();
        let lca_ab_c: HashSet<TaxonId> = [lca_ab, 13].into_iter().collect();
        assert_eq!(
            store.lca(&all, &restrict).unwrap(),
            store.lca(&lca_ab_c, &restrict).unwrap()
        );
    }
}
