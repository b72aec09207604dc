use thiserror::Error;

/// Structural failures raised by the join and scale engines.
///
/// Sparse or odd data (unmatched keys, non-integer counts, all-zero tables)
/// is never reported here; it is normalized to defaults instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChoroplethError {
    /// A base feature or aggregate record is missing a required key field.
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// The color ramp cannot be used to build a scale.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, ChoroplethError>;
