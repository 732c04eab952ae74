/// Errors produced by the `virtbus-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A string is not a valid bus object path.
    #[error("invalid object path '{path}': {reason}")]
    InvalidObjectPath { path: String, reason: String },

    /// A string is not a valid domain UUID.
    #[error("invalid domain uuid '{value}': {reason}")]
    InvalidUuid { value: String, reason: String },
}
