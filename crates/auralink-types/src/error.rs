//! Error types for data parsing in auralink-types.

use thiserror::Error;

/// Errors that can occur when parsing AuraLink data.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The priority label is not one of HIGH, MEDIUM or LOW.
    #[error("Unknown priority: {0}")]
    UnknownPriority(String),

    /// A required field was empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Result type alias using auralink-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
