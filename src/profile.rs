//! LCA-based read assignment and rank aggregation into the emitted
//! abundance profile (spec §4.6).

use crate::errors::Result;
use crate::filter::ReassignedRead;
use crate::reference::ReferenceTable;
use crate::taxonomy::{TaxonId, TaxonomyStore};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct AbundanceRow {
    pub taxon_id: TaxonId,
    pub name: String,
    pub rank: String,
    pub reads_assigned: u64,
    pub relative_abundance: f64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AssignmentStats {
    pub lca_dropped: u64,
}

/// Resolves every reassigned read to a taxon: unique reads go straight to
/// their reference's taxon, multi-mapping reads go through `lca`
/// restricted to `valid_taxon_ids`. A read whose LCA is `0` is dropped.
/// Returns per-taxon read counts plus how many reads were LCA-dropped.
pub fn assign_reads(
    reassigned: &[ReassignedRead],
    reference_table: &ReferenceTable,
    taxonomy: &TaxonomyStore,
    valid_taxon_ids: &HashSet<TaxonId>,
) -> Result<(HashMap<TaxonId, u64>, AssignmentStats)> {
    let mut counts: HashMap<TaxonId, u64> = HashMap::new();
    let mut stats = AssignmentStats::default();

    for read in reassigned {
        match read {
            ReassignedRead::Unique { reference_index } => {
                let taxon = reference_table.references[*reference_index].taxon_id;
                *counts.entry(taxon).or_insert(0) += 1;
            }
            ReassignedRead::Multi { reference_indices } => {
                let taxa: HashSet<TaxonId> = reference_indices
                    .iter()
                    .map(|&idx| reference_table.references[idx].taxon_id)
                    .collect();
                let lca = taxonomy.lca(&taxa, valid_taxon_ids)?;
                if lca == 0 {
                    stats.lca_dropped += 1;
                } else {
                    *counts.entry(lca).or_insert(0) += 1;
                }
            }
        }
    }

    Ok((counts, stats))
}

/// Walks `taxon`'s inclusive ancestor chain for the first node at `rank`.
/// `0` (unclassified at that rank) if none is found.
fn find_ancestor_at_rank(taxonomy: &TaxonomyStore, taxon: TaxonId, rank: &str) -> Result<TaxonId> {
    if taxonomy.rank_of(taxon) == rank {
        return Ok(taxon);
    }
    for ancestor in taxonomy.ancestors(taxon)? {
        if taxonomy.rank_of(ancestor) == rank {
            return Ok(ancestor);
        }
    }
    Ok(0)
}

/// Aggregates per-taxon read counts up to `rank`, computes relative
/// abundance, and sorts descending by it (spec §4.6). Reads with no
/// ancestor at `rank` land in the `0` ("unclassified") bucket.
pub fn aggregate_to_rank(
    counts: &HashMap<TaxonId, u64>,
    taxonomy: &TaxonomyStore,
    rank: &str,
) -> Result<Vec<AbundanceRow>> {
    let mut buckets: HashMap<TaxonId, u64> = HashMap::new();

    for (&taxon, &count) in counts {
        if count == 0 {
            continue;
        }
        let target = find_ancestor_at_rank(taxonomy, taxon, rank)?;
        *buckets.entry(target).or_insert(0) += count;
    }

    let total: u64 = buckets.values().sum();

    let mut rows: Vec<AbundanceRow> = buckets
        .into_iter()
        .map(|(taxon_id, reads)| {
            let relative_abundance = if total > 0 {
                reads as f64 / total as f64
            } else {
                0.0
            };
            let name = if taxon_id == 0 {
                "unclassified".to_string()
            } else {
                taxonomy.name_of(taxon_id).to_string()
            };
            AbundanceRow {
                taxon_id,
                name,
                rank: rank.to_string(),
                reads_assigned: reads,
                relative_abundance,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.relative_abundance
            .partial_cmp(&a.relative_abundance)
            .unwrap()
            .then_with(|| a.taxon_id.cmp(&b.taxon_id))
    });

    Ok(rows)
}
