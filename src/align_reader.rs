//! The alignment-reading boundary (spec §6.2).
//!
//! Spec.md treats the alignment reader as an external collaborator reached
//! through a trait; the shape below mirrors `seqkmer::reader::Reader<R>`'s
//! `trait Reader<R: Read + Send>: Send { fn next(&mut self) -> ... }`
//! seam. Two implementations ship: a real BAM/SAM reader built on
//! `noodles` (the crate `metaBayes`, in this same example pack, uses for
//! exactly this purpose), and an in-memory reader used by tests and by the
//! scenario fixtures in `tests/scenarios.rs`.

use crate::errors::{ProfilerError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Reference-consuming vs. non-reference-consuming CIGAR operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    Match,
    Insertion,
    Deletion,
    Skip,
    SoftClip,
    HardClip,
    Pad,
    SequenceMatch,
    SequenceMismatch,
}

impl CigarOp {
    fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarOp::Match
                | CigarOp::Deletion
                | CigarOp::Skip
                | CigarOp::SequenceMatch
                | CigarOp::SequenceMismatch
        )
    }

    fn is_indel(self) -> bool {
        matches!(self, CigarOp::Insertion | CigarOp::Deletion)
    }
}

/// Per-operation `(op, count)` pairs for one alignment record.
#[derive(Debug, Clone, Default)]
pub struct CigarSummary {
    pub ops: Vec<(CigarOp, u32)>,
}

impl CigarSummary {
    /// Sum of counts for reference-consuming ops (`M`/`D`/`N`/`=`/`X`) —
    /// the genomic span a record contributes coverage for.
    pub fn reference_span(&self) -> u64 {
        self.ops
            .iter()
            .filter(|(op, _)| op.consumes_reference())
            .map(|(_, count)| *count as u64)
            .sum()
    }

    /// Sum of insertion/deletion counts, used only for the informational
    /// alignment score (spec §6.2, §9 — not consumed by the core filter).
    pub fn indel_count(&self) -> u32 {
        self.ops
            .iter()
            .filter(|(op, _)| op.is_indel())
            .map(|(_, count)| count)
            .sum()
    }

    /// `(indels + edit_distance) / seq_len`, informational only.
    pub fn alignment_score(&self, edit_distance: u32, seq_len: u64) -> f64 {
        if seq_len == 0 {
            return 0.0;
        }
        (self.indel_count() as f64 + edit_distance as f64) / seq_len as f64
    }
}

/// One alignment record as seen by the ingestion driver.
#[derive(Debug, Clone)]
pub struct AlignmentRecord {
    pub read_id: String,
    /// `None` for unmapped records / records lacking a reference binding.
    pub ref_index: Option<usize>,
    pub position: u64,
    pub cigar: CigarSummary,
    pub edit_distance: u32,
    pub seq_len: u64,
}

/// Streaming alignment reader. Implementations are out of this crate's
/// core (spec §1) but still need a real backing implementation to exist
/// as a complete crate; see [`bam::BamAlignmentReader`] and
/// [`recorded::RecordedAlignmentReader`].
pub trait AlignmentReader: Send {
    fn open(&mut self, path: &Path) -> Result<()>;
    fn header(&self) -> (Vec<String>, Vec<u64>);
    fn next_record(&mut self) -> Result<Option<AlignmentRecord>>;
    fn rewind(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

pub mod bam {
    use super::*;
    use noodles::bam;
    use noodles::sam::alignment::record::cigar::op::Kind;
    use noodles::sam::alignment::record::data::field::Tag;
    use noodles::sam::alignment::record::Cigar;
    use noodles::sam::Header;

    fn map_kind(kind: Kind) -> CigarOp {
        match kind {
            Kind::Match => CigarOp::Match,
            Kind::Insertion => CigarOp::Insertion,
            Kind::Deletion => CigarOp::Deletion,
            Kind::Skip => CigarOp::Skip,
            Kind::SoftClip => CigarOp::SoftClip,
            Kind::HardClip => CigarOp::HardClip,
            Kind::Pad => CigarOp::Pad,
            Kind::SequenceMatch => CigarOp::SequenceMatch,
            Kind::SequenceMismatch => CigarOp::SequenceMismatch,
        }
    }

    /// BAM-backed `AlignmentReader`, grounded in `metaBayes::step1_parser`'s
    /// use of `noodles::bam::io::Reader` to read a header and stream
    /// records via `record_bufs`.
    pub struct BamAlignmentReader {
        path: Option<PathBuf>,
        reader: Option<bam::io::Reader<BufReader<File>>>,
        header: Option<Header>,
        names: Vec<String>,
        lengths: Vec<u64>,
    }

    impl Default for BamAlignmentReader {
        fn default() -> Self {
            BamAlignmentReader {
                path: None,
                reader: None,
                header: None,
                names: Vec::new(),
                lengths: Vec::new(),
            }
        }
    }

    impl BamAlignmentReader {
        pub fn new() -> Self {
            Self::default()
        }

        fn open_at(&mut self, path: &Path) -> Result<()> {
            let file = File::open(path)
                .map_err(|e| ProfilerError::AlignmentReadError(e.to_string()))?;
            let mut reader = bam::io::Reader::new(BufReader::new(file));
            let header = reader
                .read_header()
                .map_err(|e| ProfilerError::AlignmentReadError(e.to_string()))?;

            let names: Vec<String> = header
                .reference_sequences()
                .keys()
                .map(|k| k.to_string())
                .collect();
            let lengths: Vec<u64> = header
                .reference_sequences()
                .values()
                .map(|rs| rs.length().get() as u64)
                .collect();

            self.reader = Some(reader);
            self.header = Some(header);
            self.names = names;
            self.lengths = lengths;
            Ok(())
        }
    }

    impl AlignmentReader for BamAlignmentReader {
        fn open(&mut self, path: &Path) -> Result<()> {
            self.path = Some(path.to_path_buf());
            self.open_at(path)
        }

        fn header(&self) -> (Vec<String>, Vec<u64>) {
            (self.names.clone(), self.lengths.clone())
        }

        fn next_record(&mut self) -> Result<Option<AlignmentRecord>> {
            let header = self
                .header
                .as_ref()
                .ok_or_else(|| ProfilerError::AlignmentReadError("reader not open".to_string()))?;
            let reader = self
                .reader
                .as_mut()
                .ok_or_else(|| ProfilerError::AlignmentReadError("reader not open".to_string()))?;

            let mut buf = noodles::sam::alignment::record_buf::RecordBuf::default();
            match reader
                .read_record_buf(header, &mut buf)
                .map_err(|e| ProfilerError::AlignmentReadError(e.to_string()))?
            {
                0 => Ok(None),
                _ => {
                    let read_id = buf
                        .name()
                        .map(|n| String::from_utf8_lossy(n.as_ref()).to_string())
                        .unwrap_or_else(|| "unknown".to_string());

                    let ref_index = buf.reference_sequence_id();
                    let position = buf
                        .alignment_start()
                        .map(|p| p.get() as u64 - 1)
                        .unwrap_or(0);

                    let ops: Vec<(CigarOp, u32)> = buf
                        .cigar()
                        .as_ref()
                        .iter()
                        .map(|op| (map_kind(op.kind()), op.len() as u32))
                        .collect();

                    let edit_distance = buf
                        .data()
                        .get(&Tag::EDIT_DISTANCE)
                        .and_then(|v| v.as_int())
                        .unwrap_or(0) as u32;

                    let seq_len = buf.sequence().len() as u64;

                    Ok(Some(AlignmentRecord {
                        read_id,
                        ref_index,
                        position,
                        cigar: CigarSummary { ops },
                        edit_distance,
                        seq_len,
                    }))
                }
            }
        }

        fn rewind(&mut self) -> Result<()> {
            let path = self
                .path
                .clone()
                .ok_or_else(|| ProfilerError::AlignmentReadError("reader not open".to_string()))?;
            self.open_at(&path)
        }

        fn close(&mut self) -> Result<()> {
            self.reader = None;
            self.header = None;
            Ok(())
        }
    }
}

pub mod recorded {
    use super::*;

    /// In-memory `AlignmentReader` used by unit and scenario tests.
    #[derive(Debug, Clone, Default)]
    pub struct RecordedAlignmentReader {
        names: Vec<String>,
        lengths: Vec<u64>,
        records: Vec<AlignmentRecord>,
        pos: usize,
    }

    impl RecordedAlignmentReader {
        pub fn new(names: Vec<String>, lengths: Vec<u64>, records: Vec<AlignmentRecord>) -> Self {
            RecordedAlignmentReader {
                names,
                lengths,
                records,
                pos: 0,
            }
        }
    }

    impl AlignmentReader for RecordedAlignmentReader {
        fn open(&mut self, _path: &Path) -> Result<()> {
            self.pos = 0;
            Ok(())
        }

        fn header(&self) -> (Vec<String>, Vec<u64>) {
            (self.names.clone(), self.lengths.clone())
        }

        fn next_record(&mut self) -> Result<Option<AlignmentRecord>> {
            if self.pos < self.records.len() {
                let record = self.records[self.pos].clone();
                self.pos += 1;
                Ok(Some(record))
            } else {
                Ok(None)
            }
        }

        fn rewind(&mut self) -> Result<()> {
            self.pos = 0;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }
}
