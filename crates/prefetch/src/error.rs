//! Prefetch error types.

use thiserror::Error;

use feedshelf_core::ShelfError;

/// Failures of the fetch transport. Contained by the item resolver.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("invalid URL: {0}")]
    Url(String),

    #[error("response decode error: {0}")]
    Decode(String),

    #[error("request cancelled")]
    Cancelled,
}

/// Scheduler construction failures, and category-run failures surfaced to
/// the orchestrator as `category_failed`.
#[derive(Debug, Error)]
pub enum PrefetchError {
    #[error("category run failed: {0}")]
    Runner(String),

    #[error("config error: {0}")]
    Config(#[from] ShelfError),

    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),
}
