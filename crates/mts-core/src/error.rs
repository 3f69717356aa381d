//! Error type shared by the foundational layer.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! `#[from]` variant.

use thiserror::Error;

/// Errors raised while validating configuration or resolving ids.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("id {0} does not fit into a 32-bit handle")]
    IdOverflow(usize),
}

/// Shorthand result type for `mts-core`.
pub type CoreResult<T> = Result<T, CoreError>;
