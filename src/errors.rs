use std::path::PathBuf;

/// Error kinds surfaced by the taxonomy loader, the per-file ingestion
/// driver, and the filter/reassignment/profiling stages.
///
/// Taxonomy and CLI failures are fatal to the whole run; per-file failures
/// (`AlignmentReadError`, `MissingTaxonTag`, a malformed header line) abort
/// only the input file that triggered them. `EmptyInput` is not a failure:
/// it produces a profile with zero rows.
#[derive(thiserror::Error, Debug)]
pub enum ProfilerError {
    #[error("missing taxonomy file: {0}")]
    MissingTaxonomy(PathBuf),

    #[error("malformed taxonomy line in {file}:{line}: {detail}")]
    MalformedTaxonomy {
        file: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("reference {0:?} has no ti|kraken:taxid tag")]
    MissingTaxonTag(String),

    #[error("alignment read error: {0}")]
    AlignmentReadError(String),

    #[error("ancestor walk for taxon {0} exceeded cycle guard")]
    TaxonomyCycle(u32),

    #[error("no mapped reads in input")]
    EmptyInput,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProfilerError>;
