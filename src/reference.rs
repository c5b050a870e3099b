//! Per-reference metadata and coverage bins (spec §3, §4.2, §6.3).
//!
//! Coverage accumulation here plays the role `kun_peng::compact_hash`'s
//! per-slot counters play for k-mer tables, but the unit is a fixed-width
//! genomic bin rather than a hash slot, and mutation happens by plain
//! index (single-threaded per input file, see spec §5) rather than through
//! a shared concurrent table.

use crate::errors::{ProfilerError, Result};
use crate::taxonomy::TaxonId;

/// One row per sequence in the alignment header.
#[derive(Debug, Clone)]
pub struct Reference {
    pub name: String,
    pub length: u64,
    pub taxon_id: TaxonId,
    pub bin_width: u32,
    /// Coverage bins for all hits touching this reference.
    pub cov: Vec<u32>,
    /// Coverage bins for reads whose only alignment is this reference.
    pub uniq_cov: Vec<u32>,
    /// Coverage bins filled during reassignment, by reads that became
    /// unique after filtering.
    pub uniq_cov2: Vec<u32>,
    pub hits: u64,
    pub unique_hits: u64,
    pub unique_hits2: u64,
}

/// Number of bins of width `w` needed to cover a sequence of `length` bp.
pub fn bin_count(length: u64, w: u32) -> usize {
    debug_assert!(w > 0);
    ((length + w as u64 - 1) / w as u64) as usize
}

/// Inclusive `[lo, hi]` bin range touched by a record starting at `p` with
/// aligned span `s`.
fn bin_range(p: u64, s: u64, w: u32) -> (usize, usize) {
    let w = w as u64;
    let lo = p / w;
    let hi = if s == 0 { lo } else { (p + s - 1) / w };
    (lo as usize, hi as usize)
}

impl Reference {
    pub fn new(name: String, length: u64, taxon_id: TaxonId, bin_width: u32) -> Self {
        let bins = bin_count(length, bin_width);
        Reference {
            name,
            length,
            taxon_id,
            bin_width,
            cov: vec![0; bins],
            uniq_cov: vec![0; bins],
            uniq_cov2: vec![0; bins],
            hits: 0,
            unique_hits: 0,
            unique_hits2: 0,
        }
    }

    fn bump(bins: &mut [u32], p: u64, span: u64, w: u32) {
        let (lo, hi) = bin_range(p, span, w);
        let hi = hi.min(bins.len().saturating_sub(1));
        let lo = lo.min(hi);
        for bin in &mut bins[lo..=hi] {
            *bin += 1;
        }
    }

    pub fn add_cov(&mut self, position: u64, span: u64) {
        Self::bump(&mut self.cov, position, span, self.bin_width);
    }

    pub fn add_uniq_cov(&mut self, position: u64, span: u64) {
        Self::bump(&mut self.uniq_cov, position, span, self.bin_width);
    }

    pub fn add_uniq_cov2(&mut self, position: u64, span: u64) {
        Self::bump(&mut self.uniq_cov2, position, span, self.bin_width);
    }
}

/// Reference-name -> taxon-id extraction (spec §6.3).
///
/// Names are pipe-delimited tokens. Scan left to right; when a token
/// equals `ti`, the next token is the taxon id. Falls back to
/// `kraken:taxid` the same way. Neither present is `MissingTaxonTag`.
pub fn parse_taxon_id(name: &str) -> Result<TaxonId> {
    let tokens: Vec<&str> = name.split('|').collect();

    for tag in ["ti", "kraken:taxid"] {
        if let Some(pos) = tokens.iter().position(|&t| t == tag) {
            if let Some(value) = tokens.get(pos + 1) {
                if let Ok(taxon_id) = value.parse::<TaxonId>() {
                    return Ok(taxon_id);
                }
            }
        }
    }

    Err(ProfilerError::MissingTaxonTag(name.to_string()))
}

/// Per-reference metadata built from an alignment header.
pub struct ReferenceTable {
    pub references: Vec<Reference>,
}

impl ReferenceTable {
    /// Builds one `Reference` per `(name, length)` pair, extracting each
    /// taxon id via [`parse_taxon_id`]. Fails the whole input file on the
    /// first reference missing a taxon tag.
    pub fn from_header(names: &[String], lengths: &[u64], bin_width: u32) -> Result<Self> {
        let mut references = Vec::with_capacity(names.len());
        for (name, &length) in names.iter().zip(lengths.iter()) {
            let taxon_id = parse_taxon_id(name)?;
            references.push(Reference::new(name.clone(), length, taxon_id, bin_width));
        }
        Ok(ReferenceTable { references })
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}
