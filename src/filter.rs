//! Two-stage present/absent filter and read reassignment (spec §4.5).

use crate::ingest::ReadTable;
use crate::reference::ReferenceTable;
use crate::stats::{quantile_cutoff, reference_stats, ReferenceStats};
use crate::taxonomy::TaxonId;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
    /// `q` in `C(v, q)`, shared by both stages (spec §4.5).
    pub cov_cutoff_quantile: f64,
    /// `None` triggers the `max(1, ceil(num_matched / 10000))` default.
    pub min_reads: Option<u64>,
}

#[derive(Debug, Default)]
pub struct FilterResult {
    pub valid_references: HashSet<usize>,
    pub valid_taxon_ids: HashSet<TaxonId>,
    pub failed_by_cov: u64,
    pub failed_by_uniq_cov: u64,
}

fn effective_min_reads(config: &FilterConfig, num_matched: u64) -> u64 {
    config.min_reads.unwrap_or_else(|| {
        let auto = (num_matched as f64 / 10000.0).ceil() as u64;
        auto.max(1)
    })
}

/// Runs Stage A (coverage) then Stage B (unique coverage, restricted to
/// Stage A survivors) and returns the surviving reference/taxon sets.
pub fn filter(
    reference_table: &ReferenceTable,
    num_matched: u64,
    config: &FilterConfig,
) -> FilterResult {
    let min_reads = effective_min_reads(config, num_matched);

    let active: Vec<(usize, ReferenceStats)> = reference_table
        .references
        .iter()
        .enumerate()
        .filter_map(|(idx, reference)| reference_stats(reference).map(|stats| (idx, stats)))
        .collect();

    let cov_values: Vec<f64> = active.iter().map(|(_, s)| s.coverage_depth).collect();
    let cov_cutoff = quantile_cutoff(&cov_values, config.cov_cutoff_quantile);

    let mut stage_a_survivors = Vec::new();
    let mut failed_by_cov = 0u64;

    for (idx, stats) in active {
        let hits = reference_table.references[idx].hits;
        if stats.coverage_depth < cov_cutoff || hits < min_reads {
            failed_by_cov += 1;
        } else {
            stage_a_survivors.push((idx, stats));
        }
    }

    let uniq_values: Vec<f64> = stage_a_survivors
        .iter()
        .map(|(_, s)| s.unique_coverage_depth)
        .collect();
    let uniq_cutoff = quantile_cutoff(&uniq_values, config.cov_cutoff_quantile);

    let mut result = FilterResult::default();

    for (idx, stats) in stage_a_survivors {
        if stats.unique_coverage_depth < uniq_cutoff {
            result.failed_by_uniq_cov += 1;
        } else {
            result.valid_references.insert(idx);
            result
                .valid_taxon_ids
                .insert(reference_table.references[idx].taxon_id);
        }
    }

    result.failed_by_cov = failed_by_cov;
    result
}

/// A read after reassignment: either resolved to a single reference, or
/// still multi-mapping across several surviving references.
#[derive(Debug, Clone)]
pub enum ReassignedRead {
    Unique { reference_index: usize },
    Multi { reference_indices: Vec<usize> },
}

/// Drops alignments to non-surviving references from every read's list
/// (spec §4.5, single-pass — Stage B's cutoff is not iterated to a fixed
/// point, an explicit open question resolved that way in spec.md's Design
/// Notes). Reads left with zero alignments are dropped from the profile;
/// reads newly reduced to one alignment bump `uniq_cov2`/`unique_hits2`.
pub fn reassign(
    read_table: &ReadTable,
    reference_table: &mut ReferenceTable,
    valid_references: &HashSet<usize>,
) -> Vec<ReassignedRead> {
    let mut reassigned = Vec::new();

    for entry in read_table.reads.values() {
        let surviving: Vec<usize> = entry
            .alignments
            .iter()
            .filter(|a| valid_references.contains(&a.reference_index))
            .map(|a| a.reference_index)
            .collect();

        match surviving.len() {
            0 => continue,
            1 => {
                let reference_index = surviving[0];
                let alignment = entry
                    .alignments
                    .iter()
                    .find(|a| a.reference_index == reference_index)
                    .expect("reference_index came from this entry's alignments");

                let reference = &mut reference_table.references[reference_index];
                reference.add_uniq_cov2(alignment.position, alignment.span);
                reference.unique_hits2 += 1;

                reassigned.push(ReassignedRead::Unique { reference_index });
            }
            _ => {
                reassigned.push(ReassignedRead::Multi {
                    reference_indices: surviving,
                });
            }
        }
    }

    reassigned
}
