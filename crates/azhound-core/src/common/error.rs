//! Error types for the collection pipeline.
//!
//! This module defines the central `Error` enum shared by API clients,
//! paginators, collectors and sinks. Cancellation is not an error: a cancelled
//! run ends with a cancelled outcome instead.
//!
//! ## Error Cases
//! - `Item`: A single item of a page could not be decoded or validated.
//! - `PageRequest`: A page-level remote call failed (network, auth,
//!   throttling).
//! - `ChannelError`: The consumer side of the output stream went away.
//! - `Output`: A sink failed to write an envelope.
//! - `InvalidConfig`: Configuration was rejected before a run started.
//! - `Fixture`: A replay fixture could not be loaded.
//! - `Task`: The producer task panicked or was aborted.

use crate::Kind;

pub type Result<T> = core::result::Result<T, Error>;

/// A per-item decode or validation failure.
///
/// Distinct from a page request failure: the page itself arrived, but one of
/// its entries could not be turned into the expected resource.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[error("unable to decode {kind} at position {position} of page {page}: {reason}")]
pub struct ItemError {
    pub kind: Kind,
    /// Zero-based page number within the enumeration.
    pub page: usize,
    /// Zero-based position within the page.
    pub position: usize,
    pub reason: String,
}

/// Unified error type for the collection pipeline.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// One item of a page failed to decode.
    #[error(transparent)]
    Item(#[from] ItemError),

    /// A page request failed after any retries were exhausted.
    #[error("page request failed{}: {context}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    PageRequest {
        status: Option<u16>,
        context: String,
    },

    /// Internal channel send/receive failure (e.g., the receiver was dropped).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// A sink could not write to its destination.
    #[error("Output error: {context}")]
    Output { context: String },

    /// Configuration was rejected.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A replay fixture could not be read or parsed.
    #[error("Fixture error: {context}")]
    Fixture { context: String },

    /// The producer task did not finish cleanly.
    #[error("Task error: {context}")]
    Task { context: String },
}

impl Error {
    pub fn page_request(context: impl Into<String>) -> Self {
        Self::PageRequest {
            status: None,
            context: context.into(),
        }
    }
}
