//! API clients consumed by the collection pipeline.
//!
//! The pipeline depends only on [`AzureClient`]: something that knows the
//! tenant it talks to and can fetch one page of a collection at a time. Two
//! implementations ship with the crate:
//!
//! - [`graph::GraphClient`] - Microsoft Graph over HTTPS.
//! - [`memory::MemoryClient`] - scripted pages for replays, tests and benches.
//!
//! Clients are shared read-only (`Arc<C>`) across concurrent collectors; the
//! page cursor of a sequence belongs to the paginator driving it.

pub mod graph;
pub mod memory;

use azhound_core::{ItemError, ListQuery, Resource, Result, TenantContext};
use core::future::Future;
use serde_json::Value;

/// Opaque continuation token for the next page of a listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a listing.
#[derive(Debug)]
pub struct Page<R> {
    /// Items in server order. Entries that failed to decode are kept in place.
    pub items: Vec<core::result::Result<R, ItemError>>,
    /// Continuation for the next page; `None` ends the listing.
    pub next: Option<Cursor>,
}

impl<R: Resource> Page<R> {
    /// Decodes raw JSON objects into resources, keeping failures in position.
    pub fn decode(page: usize, values: Vec<Value>, next: Option<Cursor>) -> Self {
        let items = values
            .into_iter()
            .enumerate()
            .map(|(position, value)| {
                serde_json::from_value::<R>(value).map_err(|e| ItemError {
                    kind: R::KIND,
                    page,
                    position,
                    reason: e.to_string(),
                })
            })
            .collect();

        Self { items, next }
    }
}

/// The remote directory API.
pub trait AzureClient: Send + Sync + 'static {
    /// Tenant the client is connected to, cached at connect time.
    fn tenant_info(&self) -> TenantContext;

    /// Fetches one page of `R`'s collection.
    ///
    /// `cursor` is `None` for the first page and the previous page's
    /// [`Page::next`] afterwards; `page` is the zero-based page number, used
    /// only for error reporting.
    ///
    /// # Errors
    ///
    /// Returns [`azhound_core::Error::PageRequest`] when the page could not be
    /// retrieved. Per-item decode failures are reported inside the page.
    fn list_page<R: Resource>(
        &self,
        query: &ListQuery,
        cursor: Option<&Cursor>,
        page: usize,
    ) -> impl Future<Output = Result<Page<R>>> + Send;
}
