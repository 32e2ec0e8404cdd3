//! Scripted, in-memory [`AzureClient`].
//!
//! Serves a fixed sequence of pages. Each page is either a list of raw JSON
//! objects (decoded exactly like Graph responses, so malformed entries become
//! item errors) or a page-level failure. Used for `--replay`, tests and
//! benchmarks.
//!
//! ## Fixture format
//!
//! ```json
//! {
//!   "tenant": { "tenantId": "6c12...", "tenantName": "Contoso" },
//!   "pages": [
//!     { "value": [ { "id": "g-1", "displayName": "Tier0" } ] },
//!     { "error": "throttled", "status": 429 }
//!   ]
//! }
//! ```
//!
//! Two knobs make timing-sensitive behavior reproducible: [`MemoryClient::gate_page`]
//! holds a page request until released, and [`MemoryClient::set_tenant`]
//! swaps the tenant the client reports.

use super::{AzureClient, Cursor, Page};
use azhound_core::{Error, ListQuery, Resource, Result, TenantContext};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::Value;
use std::{collections::HashMap, path::Path, sync::Arc};
use tokio::sync::Notify;

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum MemoryPage {
    Items {
        value: Vec<Value>,
    },
    Failure {
        error: String,
        #[serde(default)]
        status: Option<u16>,
    },
}

#[derive(Debug, Deserialize)]
struct Fixture {
    tenant: TenantContext,
    #[serde(default)]
    pages: Vec<MemoryPage>,
}

/// A page request observed by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageCall {
    pub page: usize,
    pub query: ListQuery,
}

pub struct MemoryClient {
    tenant: RwLock<TenantContext>,
    pages: Vec<MemoryPage>,
    gates: Mutex<HashMap<usize, Arc<Notify>>>,
    calls: Mutex<Vec<PageCall>>,
}

impl MemoryClient {
    pub fn new(tenant: TenantContext) -> Self {
        Self {
            tenant: RwLock::new(tenant),
            pages: Vec::new(),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Loads a replay fixture from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fixture`] if the file cannot be read or parsed.
    pub fn from_fixture(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| Error::Fixture {
            context: format!("{}: {e}", path.display()),
        })?;
        Self::from_slice(&raw).map_err(|e| match e {
            Error::Fixture { context } => Error::Fixture {
                context: format!("{}: {context}", path.display()),
            },
            other => other,
        })
    }

    /// Parses a replay fixture.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fixture`] if the bytes are not a valid fixture.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let fixture: Fixture = serde_json::from_slice(raw).map_err(|e| Error::Fixture {
            context: e.to_string(),
        })?;
        let mut client = Self::new(fixture.tenant);
        client.pages = fixture.pages;
        Ok(client)
    }

    /// Appends a page of raw objects.
    #[must_use]
    pub fn with_page(mut self, value: Vec<Value>) -> Self {
        self.pages.push(MemoryPage::Items { value });
        self
    }

    /// Appends a page whose request fails.
    #[must_use]
    pub fn with_failure(mut self, error: impl Into<String>, status: Option<u16>) -> Self {
        self.pages.push(MemoryPage::Failure {
            error: error.into(),
            status,
        });
        self
    }

    /// Holds requests for `page` until the returned [`Notify`] is signalled.
    ///
    /// A held request is not recorded in [`MemoryClient::calls`] until it is
    /// released.
    pub fn gate_page(&self, page: usize) -> Arc<Notify> {
        Arc::clone(
            self.gates
                .lock()
                .entry(page)
                .or_insert_with(|| Arc::new(Notify::new())),
        )
    }

    /// Replaces the tenant reported by [`AzureClient::tenant_info`].
    pub fn set_tenant(&self, tenant: TenantContext) {
        *self.tenant.write() = tenant;
    }

    /// Page requests served so far, in order.
    pub fn calls(&self) -> Vec<PageCall> {
        self.calls.lock().clone()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl AzureClient for MemoryClient {
    fn tenant_info(&self) -> TenantContext {
        self.tenant.read().clone()
    }

    async fn list_page<R: Resource>(
        &self,
        query: &ListQuery,
        cursor: Option<&Cursor>,
        page: usize,
    ) -> Result<Page<R>> {
        let index = match cursor {
            None => 0,
            Some(cursor) => cursor
                .as_str()
                .parse::<usize>()
                .map_err(|_| Error::page_request(format!("unknown cursor {:?}", cursor.as_str())))?,
        };

        let gate = self.gates.lock().get(&index).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.calls.lock().push(PageCall {
            page,
            query: query.clone(),
        });

        let next = (index + 1 < self.pages.len()).then(|| Cursor::new((index + 1).to_string()));

        match self.pages.get(index) {
            None => Ok(Page {
                items: Vec::new(),
                next: None,
            }),
            Some(MemoryPage::Items { value }) => Ok(Page::decode(page, value.clone(), next)),
            Some(MemoryPage::Failure { error, status }) => Err(Error::PageRequest {
                status: *status,
                context: error.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azhound_core::Group;
    use serde_json::json;

    #[test]
    fn parses_fixture() {
        let raw = br#"{
            "tenant": { "tenantId": "t-1", "tenantName": "Contoso" },
            "pages": [
                { "value": [ { "id": "g-1" } ] },
                { "error": "throttled", "status": 429 }
            ]
        }"#;

        let client = MemoryClient::from_slice(raw).unwrap();
        assert_eq!(client.tenant_info(), TenantContext::new("t-1", "Contoso"));
        assert_eq!(client.page_count(), 2);
    }

    #[test]
    fn rejects_fixture_without_tenant() {
        let err = MemoryClient::from_slice(br#"{ "pages": [] }"#)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Fixture { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn serves_pages_by_cursor() {
        let client = MemoryClient::new(TenantContext::new("t-1", "Contoso"))
            .with_page(vec![json!({ "id": "a" })])
            .with_failure("boom", Some(503));
        let query = ListQuery::new().top(5);

        let first = client.list_page::<Group>(&query, None, 0).await.unwrap();
        assert_eq!(first.items.len(), 1);
        let next = first.next.unwrap();
        assert_eq!(next.as_str(), "1");

        let err = client
            .list_page::<Group>(&query, Some(&next), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PageRequest { status: Some(503), .. }));

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], PageCall { page: 1, query });
    }
}
