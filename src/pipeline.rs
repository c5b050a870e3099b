//! Per-file state machine (spec §4.7) orchestrating taxonomy lookup,
//! ingestion, statistics, filtering, reassignment, and profiling.

use crate::align_reader::AlignmentReader;
use crate::config::RunConfig;
use crate::errors::{ProfilerError, Result};
use crate::filter::{self, FilterConfig};
use crate::ingest;
use crate::profile::{self, AbundanceRow};
use crate::taxonomy::TaxonomyStore;
use crate::writer::{self, RawRow};
use std::path::Path;

/// `Opened -> HeaderRead -> (SamplingBinWidth) -> Ingesting -> Ingested ->
/// StatsComputed -> FilteredA -> FilteredB -> Reassigned -> Profiled ->
/// Closed` (spec §4.7). A failure at any transition aborts this file only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Opened,
    HeaderRead,
    SamplingBinWidth,
    Ingesting,
    Ingested,
    StatsComputed,
    FilteredA,
    FilteredB,
    Reassigned,
    Profiled,
    Closed,
}

fn transition(from: PipelineState, to: PipelineState) -> PipelineState {
    tracing::debug!(?from, ?to, "pipeline state transition");
    to
}

/// Everything produced for one input file.
pub struct FileOutcome {
    pub rows: Vec<AbundanceRow>,
    pub raw_rows: Vec<RawRow>,
    pub hit_count: u64,
    pub num_matched: u64,
    pub num_uniquely_matched: u64,
    pub failed_by_cov: u64,
    pub failed_by_uniq_cov: u64,
    pub lca_dropped: u64,
}

impl FileOutcome {
    fn empty() -> Self {
        FileOutcome {
            rows: Vec::new(),
            raw_rows: Vec::new(),
            hit_count: 0,
            num_matched: 0,
            num_uniquely_matched: 0,
            failed_by_cov: 0,
            failed_by_uniq_cov: 0,
            lca_dropped: 0,
        }
    }
}

/// Runs the full per-file pipeline against an already-constructed reader.
///
/// `EmptyInput` (no mapped reads) is not a failure: it is logged as a
/// warning and produces a zero-row outcome (spec §7). Every other error
/// propagates to the caller, which aborts this file and continues with
/// the next.
pub fn run_file(
    reader: &mut dyn AlignmentReader,
    path: &Path,
    taxonomy: &TaxonomyStore,
    config: &RunConfig,
) -> Result<FileOutcome> {
    let mut state = PipelineState::Opened;
    reader.open(path)?;
    state = transition(state, PipelineState::HeaderRead);

    if config.bin_width == 0 {
        state = transition(state, PipelineState::SamplingBinWidth);
    }
    state = transition(state, PipelineState::Ingesting);
    let (mut reference_table, ingest_result) = ingest::run(reader, config.bin_width)?;
    reader.close()?;
    state = transition(state, PipelineState::Ingested);

    if ingest_result.counters.hit_count == 0 {
        tracing::warn!(file = %path.display(), "{}", ProfilerError::EmptyInput);
        transition(state, PipelineState::Closed);
        return Ok(FileOutcome::empty());
    }

    state = transition(state, PipelineState::StatsComputed);

    let filter_config = FilterConfig {
        cov_cutoff_quantile: config.cov_cutoff,
        min_reads: config.min_reads,
    };
    let filtered = filter::filter(&reference_table, ingest_result.counters.num_matched, &filter_config);
    state = transition(state, PipelineState::FilteredA);
    state = transition(state, PipelineState::FilteredB);

    let reassigned = filter::reassign(
        &ingest_result.read_table,
        &mut reference_table,
        &filtered.valid_references,
    );
    state = transition(state, PipelineState::Reassigned);

    let (counts, assignment_stats) = profile::assign_reads(
        &reassigned,
        &reference_table,
        taxonomy,
        &filtered.valid_taxon_ids,
    )?;
    let rows = profile::aggregate_to_rank(&counts, taxonomy, &config.rank)?;
    state = transition(state, PipelineState::Profiled);

    let raw_rows = if config.output_raw {
        writer::build_raw_rows(&reference_table)
    } else {
        Vec::new()
    };

    transition(state, PipelineState::Closed);

    Ok(FileOutcome {
        rows,
        raw_rows,
        hit_count: ingest_result.counters.hit_count,
        num_matched: ingest_result.counters.num_matched,
        num_uniquely_matched: ingest_result.counters.num_uniquely_matched,
        failed_by_cov: filtered.failed_by_cov,
        failed_by_uniq_cov: filtered.failed_by_uniq_cov,
        lca_dropped: assignment_stats.lca_dropped,
    })
}
