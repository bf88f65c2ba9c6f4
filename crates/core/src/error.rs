use thiserror::Error;

/// Errors reported by plugin capabilities or raised while turning their
/// return values into results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("Unsupported item key.")]
    UnsupportedMetric,

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Multiple return values are not supported for single passive checks")]
    MultipleValues,

    #[error("Invalid item key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("Invalid pattern: {0}")]
    Pattern(String),

    #[error("{0}")]
    Failed(String),
}

/// Item key syntax errors. Positions are byte offsets into the key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("empty key")]
    Empty,

    #[error("invalid character at position {0}")]
    InvalidChar(usize),

    #[error("unterminated quoted parameter starting at position {0}")]
    UnterminatedQuote(usize),

    #[error("unterminated parameter list")]
    UnterminatedParams,

    #[error("nested array at position {0}")]
    NestedArray(usize),

    #[error("unexpected data after parameter list at position {0}")]
    TrailingData(usize),
}
