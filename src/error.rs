//! Error taxonomy for the ingest and read paths.
//!
//! Per-message errors (`ParseError`, `ShapeError`, `ScoringError`) are
//! recoverable: the message is dropped and the stream continues.
//! `PersistenceError` is logged and swallowed at the message level.
//! `QueryError` is returned to whoever asked for the read.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid number {token:?} at field {position}")]
    InvalidNumber { position: usize, token: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("expected at least 2 fields, got {len}")]
    TooShort { len: usize },
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring engine failed: {0:#}")]
    EngineFailure(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("store unreachable: {0}")]
    Transport(String),

    #[error("store rejected write ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid duration literal: {0:?}")]
    InvalidDuration(String),

    #[error("store unreachable: {0}")]
    Transport(String),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("cannot decode store response: {0}")]
    Decode(String),
}

/// Everything that can make a single inbound message get dropped.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

impl MessageError {
    /// Short label used for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            MessageError::Parse(_) => "parse",
            MessageError::Shape(_) => "shape",
            MessageError::Scoring(_) => "scoring",
        }
    }
}
