//! Assembles CLI arguments into the domain-level configuration the
//! pipeline actually runs with, mirroring `kr2r::args::Build::as_meros`'s
//! CLI-to-config adapter.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mapping_files: PathBuf,
    pub output_prefix: PathBuf,
    /// `0` means auto-discover from the first 1000 records (spec §4.3).
    pub bin_width: u32,
    /// `None` triggers the `max(1, ceil(num_matched / 10000))` default.
    pub min_reads: Option<u64>,
    pub rank: String,
    pub cov_cutoff: f64,
    pub output_raw: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bin_width_is_auto() {
        let config = RunConfig {
            mapping_files: PathBuf::from("."),
            output_prefix: PathBuf::from("out"),
            bin_width: 0,
            min_reads: None,
            rank: "species".to_string(),
            cov_cutoff: 0.99,
            output_raw: false,
        };
        assert_eq!(config.bin_width, 0);
    }
}
