//! Command-line argument definitions (spec §6.4), in the same
//! `clap::Parser` derive style `kun_peng`'s per-binary `Args` structs use.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(
    author,
    version,
    about = "Species-level microbial abundance profiling from metagenomic alignments",
    long_about = "Filters a reference database down to the genomes actually present in an alignment file and reports a taxonomic abundance profile at a chosen rank."
)]
pub struct Args {
    /// Alignment file, or a directory of alignment files with --directory
    #[arg(value_name = "IN")]
    pub input: PathBuf,

    /// Output path prefix (default: IN)
    #[arg(short = 'o', long = "output-prefix")]
    pub output_prefix: Option<PathBuf>,

    /// Directory containing nodes.dmp, names.dmp
    #[arg(short = 'm', long = "mapping-files", required = true)]
    pub mapping_files: PathBuf,

    /// Bin width W in bp; 0 = auto
    #[arg(short = 'w', long = "bin-width", default_value_t = 0)]
    pub bin_width: u32,

    /// Min reads per reference; unset = auto (spec §4.5).
    ///
    /// spec.md §6.4 names this flag `-mr/--min-reads`. clap's derive
    /// `short` only accepts a single character, so the literal single-dash
    /// token `-mr` cannot be produced this way; `--mr` is offered as the
    /// closest equivalent alongside the canonical `--min-reads`.
    #[arg(long = "min-reads", visible_alias = "mr", value_name = "N")]
    pub min_reads: Option<u64>,

    /// Target rank
    #[arg(short = 'r', long = "rank", default_value = "species")]
    pub rank: String,

    /// Quantile q in [0,1] used by both filter stages
    #[arg(short = 'c', long = "cov-cutoff", default_value_t = 0.99)]
    pub cov_cutoff: f64,

    /// IN is a directory of alignment files
    #[arg(short = 'd', long = "directory", default_value_t = false)]
    pub directory: bool,

    /// Also emit per-reference raw TSV.
    ///
    /// spec.md §6.4 names this flag `-or/--output-raw`; see the `-mr` note
    /// above on `min_reads` for why `--or` (not a literal single-dash
    /// `-or`) is the closest achievable alias.
    #[arg(long = "output-raw", visible_alias = "or", default_value_t = false)]
    pub output_raw: bool,

    /// Verbose progress logging
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    pub verbose: bool,
}
