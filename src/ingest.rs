//! Streams alignment records into per-reference coverage and a per-read
//! alignment table (spec §4.3).
//!
//! The shape — stream records, bump per-slot counters, finalize once the
//! stream ends — mirrors how `kun_peng::classify` walks a k-mer stream and
//! accumulates hits into `compact_hash` slots; here the slot is a coverage
//! bin and the per-read table plays the role k-mer's per-read hit counts
//! play upstream.

use crate::align_reader::{AlignmentReader, AlignmentRecord};
use crate::errors::Result;
use crate::reference::ReferenceTable;
use std::collections::HashMap;

/// One surviving alignment for a read, trimmed down to what the filter and
/// LCA stages need.
#[derive(Debug, Clone)]
pub struct ReadAlignment {
    pub reference_index: usize,
    pub position: u64,
    pub span: u64,
    pub edit_distance: u32,
}

#[derive(Debug, Default, Clone)]
pub struct ReadEntry {
    pub alignments: Vec<ReadAlignment>,
}

impl ReadEntry {
    pub fn is_unique(&self) -> bool {
        self.alignments.len() == 1
    }
}

/// Keyed by read id; a read is *unique* iff its entry holds exactly one
/// alignment (spec §3).
#[derive(Debug, Default)]
pub struct ReadTable {
    pub reads: HashMap<String, ReadEntry>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestCounters {
    pub num_matched: u64,
    pub num_uniquely_matched: u64,
    pub hit_count: u64,
}

pub struct IngestResult {
    pub read_table: ReadTable,
    pub counters: IngestCounters,
}

/// Minimum sample size for bin-width auto-discovery (spec §4.3).
const BIN_WIDTH_SAMPLE_SIZE: usize = 1000;

/// Fallback bin width when no records are available to sample.
const DEFAULT_BIN_WIDTH: u32 = 100;

/// Integer mean of observed sequence lengths, rounded to the nearest bp.
/// Empty input falls back to [`DEFAULT_BIN_WIDTH`].
fn discover_bin_width(sample: &[AlignmentRecord]) -> u32 {
    if sample.is_empty() {
        return DEFAULT_BIN_WIDTH;
    }
    let sum: u64 = sample.iter().map(|r| r.seq_len).sum();
    let n = sample.len() as u64;
    let mean = (sum + n / 2) / n;
    mean.max(1) as u32
}

fn ingest_one(
    record: &AlignmentRecord,
    reference_table: &mut ReferenceTable,
    read_table: &mut ReadTable,
    hit_count: &mut u64,
) {
    let ref_index = match record.ref_index {
        Some(idx) => idx,
        None => return,
    };
    if ref_index >= reference_table.references.len() {
        return;
    }

    *hit_count += 1;
    let span = record.cigar.reference_span();

    let reference = &mut reference_table.references[ref_index];
    reference.add_cov(record.position, span);
    reference.hits += 1;

    let entry = read_table.reads.entry(record.read_id.clone()).or_default();
    entry.alignments.push(ReadAlignment {
        reference_index: ref_index,
        position: record.position,
        span,
        edit_distance: record.edit_distance,
    });
}

/// Marks `uniq_cov`/`unique_hits` for every read with exactly one
/// alignment, and returns `(num_matched, num_uniquely_matched)`.
fn finalize(reference_table: &mut ReferenceTable, read_table: &ReadTable) -> (u64, u64) {
    let mut num_matched = 0u64;
    let mut num_uniquely_matched = 0u64;

    for entry in read_table.reads.values() {
        if entry.alignments.is_empty() {
            continue;
        }
        num_matched += 1;

        if entry.is_unique() {
            num_uniquely_matched += 1;
            let a = &entry.alignments[0];
            let reference = &mut reference_table.references[a.reference_index];
            reference.add_uniq_cov(a.position, a.span);
            reference.unique_hits += 1;
        }
    }

    (num_matched, num_uniquely_matched)
}

/// Runs the full ingestion contract for one input file: optional bin-width
/// discovery, reference table construction, record streaming, and
/// finalization.
///
/// When `configured_bin_width` is `0`, the first [`BIN_WIDTH_SAMPLE_SIZE`]
/// records are buffered in memory to compute `W` before the reference
/// table (whose bin vectors are sized by `W`) can be built; this avoids a
/// physical stream rewind, per the preferred implementation spec.md calls
/// out. The buffered records are then replayed through the same ingestion
/// path as the rest of the stream.
pub fn run(
    reader: &mut dyn AlignmentReader,
    configured_bin_width: u32,
) -> Result<(ReferenceTable, IngestResult)> {
    let (names, lengths) = reader.header();

    let (bin_width, buffered) = if configured_bin_width == 0 {
        let mut buffered = Vec::with_capacity(BIN_WIDTH_SAMPLE_SIZE);
        while buffered.len() < BIN_WIDTH_SAMPLE_SIZE {
            match reader.next_record()? {
                Some(record) => buffered.push(record),
                None => break,
            }
        }
        (discover_bin_width(&buffered), buffered)
    } else {
        (configured_bin_width, Vec::new())
    };

    let mut reference_table = ReferenceTable::from_header(&names, &lengths, bin_width)?;
    let mut read_table = ReadTable::default();
    let mut hit_count = 0u64;

    for record in &buffered {
        ingest_one(record, &mut reference_table, &mut read_table, &mut hit_count);
    }
    while let Some(record) = reader.next_record()? {
        ingest_one(&record, &mut reference_table, &mut read_table, &mut hit_count);
    }

    let (num_matched, num_uniquely_matched) = finalize(&mut reference_table, &read_table);

    Ok((
        reference_table,
        IngestResult {
            read_table,
            counters: IngestCounters {
                num_matched,
                num_uniquely_matched,
                hit_count,
            },
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align_reader::CigarSummary;
    use crate::align_reader::CigarOp;
    use crate::align_reader::recorded::RecordedAlignmentReader;

    fn rec(read_id: &str, ref_index: Option<usize>, position: u64, span: u32) -> AlignmentRecord {
        AlignmentRecord {
            read_id: read_id.to_string(),
            ref_index,
            position,
            cigar: CigarSummary { ops: vec![(CigarOp::Match, span)] },
            edit_distance: 0,
            seq_len: span as u64,
        }
    }

    #[test]
    fn discover_bin_width_rounds_mean() {
        let sample: Vec<AlignmentRecord> = (90..=110)
            .map(|len| rec("r", Some(0), 0, len))
            .collect();
        let w = discover_bin_width(&sample);
        assert!((95..=105).contains(&w), "w={w} out of expected range");
    }

    #[test]
    fn discover_bin_width_empty_is_default() {
        assert_eq!(discover_bin_width(&[]), DEFAULT_BIN_WIDTH);
    }

    #[test]
    fn unmapped_records_are_skipped() {
        let mut reader = RecordedAlignmentReader::new(
            vec!["a|ti|1".to_string()],
            vec![1000],
            vec![rec("r1", None, 0, 50)],
        );
        let (_table, result) = run(&mut reader, 100).unwrap();
        assert_eq!(result.counters.hit_count, 0);
        assert_eq!(result.read_table.reads.len(), 0);
    }

    #[test]
    fn unique_read_bumps_uniq_cov_and_counters() {
        let mut reader = RecordedAlignmentReader::new(
            vec!["a|ti|1".to_string(), "b|ti|2".to_string()],
            vec![1000, 1000],
            vec![
                rec("r1", Some(0), 0, 100),
                rec("r2", Some(0), 0, 100),
                rec("r2", Some(1), 0, 100),
            ],
        );
        let (table, result) = run(&mut reader, 100).unwrap();
        assert_eq!(result.counters.hit_count, 3);
        assert_eq!(result.counters.num_matched, 2);
        assert_eq!(result.counters.num_uniquely_matched, 1);
        assert_eq!(table.references[0].unique_hits, 1);
        assert_eq!(table.references[0].hits, 2);
        assert_eq!(table.references[1].unique_hits, 0);
        assert!(table.references[0].uniq_cov.iter().sum::<u32>() > 0);
    }

    /// spec.md §8 invariants 1-3, checked against a mixed unique/multi-
    /// mapping stream rather than specific expected numbers:
    /// `unique_hits <= hits` per reference, `sum(hits) >= num_matched`
    /// (a multi-mapping read contributes to several references' `hits`),
    /// and `num_uniquely_matched <= num_matched <= hit_count`. The
    /// `unique_hits <= unique_hits2` half of invariant 1 is checked in
    /// `filter`'s tests instead, since `unique_hits2` is only populated
    /// by reassignment after filtering, not by ingestion.
    #[test]
    fn invariants_hold_over_a_mixed_stream() {
        let mut records = Vec::new();
        for i in 0..5 {
            records.push(rec(&format!("unique{i}"), Some(0), 0, 100));
        }
        for i in 0..3 {
            records.push(rec(&format!("multi{i}"), Some(0), 0, 100));
            records.push(rec(&format!("multi{i}"), Some(1), 0, 100));
        }
        records.push(rec("unmapped", None, 0, 100));

        let mut reader = RecordedAlignmentReader::new(
            vec!["a|ti|1".to_string(), "b|ti|2".to_string()],
            vec![1000, 1000],
            records,
        );
        let (table, result) = run(&mut reader, 100).unwrap();

        for reference in &table.references {
            assert!(
                reference.unique_hits <= reference.hits,
                "unique_hits ({}) must not exceed hits ({}) for {}",
                reference.unique_hits,
                reference.hits,
                reference.name
            );
        }

        let total_hits: u64 = table.references.iter().map(|r| r.hits).sum();
        assert!(
            total_hits >= result.counters.num_matched,
            "sum(hits) ({total_hits}) must be >= num_matched ({})",
            result.counters.num_matched
        );

        assert!(result.counters.num_uniquely_matched <= result.counters.num_matched);
        assert!(result.counters.num_matched <= result.counters.hit_count);
    }
}
