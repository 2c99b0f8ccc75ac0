// SPDX-License-Identifier: GPL-3.0-or-later
//! Error types for the ingestion half of the pipeline.
//!
//! Decode failures and slow-subscriber evictions are not represented here;
//! per spec they are handled inline (dropped, or evicted) and never
//! surfaced as a [Result]. Only bootstrap and device-level failures
//! propagate to the caller.
use std::io;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that can terminate the TUN ingestion half of the pipeline.
///
/// Every variant here is fatal: the reader (blocking or io_uring) stops and
/// the error is expected to propagate out to `main` and end the process.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to open TUN device {name:?}: {source}")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("TUN read failed: {0}")]
    Read(#[source] io::Error),

    #[error("io_uring submission failed: {0}")]
    Submit(#[source] io::Error),
}
