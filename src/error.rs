use thiserror::Error;

/// Fatal problems with the CSV text itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("CSV must contain a header row and at least one data row (found {found} non-empty lines)")]
    TooFewLines { found: usize },
}

/// Anything that aborts a conversion run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no records left after {stage}: {detail}")]
    Empty { stage: &'static str, detail: String },

    #[error("{stage} stage panicked: {message}")]
    Panicked { stage: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, ConversionError>;
