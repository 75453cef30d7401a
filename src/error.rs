//! Error types for panel construction, codec, I/O and CLI plumbing.

use std::io;
use thiserror::Error;

/// Errors that can occur anywhere in the PBWT engine.
#[derive(Error, Debug)]
pub enum PbwtError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("format error ({context}): {detail}")]
    Format { context: String, detail: String },

    #[error("shape error ({context}): {detail}")]
    Shape { context: String, detail: String },

    #[error("invalid argument: {detail}")]
    Argument { detail: String },

    #[error("invariant violation at site {site}: {detail}")]
    Invariant { site: usize, detail: String },
}

pub type Result<T> = std::result::Result<T, PbwtError>;

impl PbwtError {
    pub fn format(context: impl Into<String>, detail: impl Into<String>) -> Self {
        PbwtError::Format {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn shape(context: impl Into<String>, detail: impl Into<String>) -> Self {
        PbwtError::Shape {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn argument(detail: impl Into<String>) -> Self {
        PbwtError::Argument {
            detail: detail.into(),
        }
    }

    pub fn invariant(site: usize, detail: impl Into<String>) -> Self {
        PbwtError::Invariant {
            site,
            detail: detail.into(),
        }
    }
}
