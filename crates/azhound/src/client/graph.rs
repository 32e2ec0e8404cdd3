//! Microsoft Graph client.
//!
//! Lists directory collections page by page, following `@odata.nextLink`
//! continuation links. Token acquisition is out of scope: the client sends the
//! bearer token it was configured with.
//!
//! ## Responsibilities
//!
//! - Resolve and cache the tenant context at connect time.
//! - Translate a [`ListQuery`] into OData query parameters.
//! - Retry throttled and temporarily unavailable responses, honoring
//!   `Retry-After`.
//! - Fold Graph error bodies into [`Error::PageRequest`] context.

use super::{AzureClient, Cursor, Page};
use azhound_core::{Error, ListQuery, Resource, Result, TenantContext};
use core::time::Duration;
use reqwest::{StatusCode, Url, header::HeaderValue, header::RETRY_AFTER};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

const API_VERSION: &str = "v1.0";
const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Connection settings for [`GraphClient`].
#[derive(Clone)]
pub struct GraphSettings {
    pub base_url: Url,
    pub access_token: String,
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl core::fmt::Debug for GraphSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GraphSettings")
            .field("base_url", &self.base_url.as_str())
            .field("access_token", &"<redacted>")
            .field("max_retries", &self.max_retries)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct ODataPage {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organization {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct GraphErrorBody {
    error: GraphError,
}

#[derive(Deserialize)]
struct GraphError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// [`AzureClient`] backed by Microsoft Graph.
pub struct GraphClient {
    http: reqwest::Client,
    settings: GraphSettings,
    tenant: TenantContext,
}

impl GraphClient {
    /// Builds a client and resolves the tenant it is connected to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the HTTP client cannot be built and
    /// [`Error::PageRequest`] if the organization lookup fails.
    pub async fn connect(settings: GraphSettings) -> Result<Self> {
        let mut client = Self::with_tenant(settings, TenantContext::new("", ""))?;

        let url = client.endpoint("organization")?;
        let orgs: ODataPage = client.get_json(url, false).await?;
        let org = orgs
            .value
            .into_iter()
            .next()
            .ok_or_else(|| Error::page_request("organization listing returned no tenant"))?;
        let org: Organization = serde_json::from_value(org)
            .map_err(|e| Error::page_request(format!("malformed organization: {e}")))?;

        tracing::debug!(tenant_id = %org.id, "resolved tenant");
        client.tenant = TenantContext::new(org.id, org.display_name.unwrap_or_default());
        Ok(client)
    }

    /// Builds a client for a tenant that is already known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the HTTP client cannot be built.
    pub fn with_tenant(mut settings: GraphSettings, tenant: TenantContext) -> Result<Self> {
        // `Url::join` replaces the last segment unless the base ends with `/`.
        if !settings.base_url.path().ends_with('/') {
            let path = format!("{}/", settings.base_url.path());
            settings.base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("azhound/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InvalidConfig {
                reason: format!("unable to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            settings,
            tenant,
        })
    }

    fn endpoint(&self, segment: &str) -> Result<Url> {
        self.settings
            .base_url
            .join(&format!("{API_VERSION}/{segment}"))
            .map_err(|e| Error::InvalidConfig {
                reason: format!("invalid Graph URL for {segment}: {e}"),
            })
    }

    /// URL of the first page of `R`'s collection for `query`.
    pub fn collection_url<R: Resource>(&self, query: &ListQuery) -> Result<Url> {
        let mut url = self.endpoint(R::COLLECTION)?;
        let params = query.params();
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// Parses a `@odata.nextLink`, refusing links to another origin so the
    /// bearer token only ever goes to the configured Graph endpoint.
    fn continuation_url(&self, cursor: &Cursor) -> Result<Url> {
        let url = Url::parse(cursor.as_str())
            .map_err(|e| Error::page_request(format!("invalid continuation link: {e}")))?;

        if url.origin() != self.settings.base_url.origin() {
            return Err(Error::page_request(format!(
                "continuation link {} leaves {}",
                url.origin().ascii_serialization(),
                self.settings.base_url.origin().ascii_serialization()
            )));
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, eventual: bool) -> Result<T> {
        let mut attempt = 0;

        loop {
            let mut request = self
                .http
                .get(url.clone())
                .bearer_auth(&self.settings.access_token);
            // Advanced queries ($search, $count) require eventual consistency.
            if eventual {
                request = request.header("ConsistencyLevel", "eventual");
            }

            let response = request.send().await.map_err(|e| Error::PageRequest {
                status: e.status().map(|s| s.as_u16()),
                context: format!("GET {}: {e}", url.path()),
            })?;

            let status = response.status();
            if status.is_success() {
                return response.json::<T>().await.map_err(|e| Error::PageRequest {
                    status: Some(status.as_u16()),
                    context: format!("GET {}: invalid response body: {e}", url.path()),
                });
            }

            if is_retryable(status) && attempt < self.settings.max_retries {
                let delay = retry_delay(response.headers().get(RETRY_AFTER), attempt);
                tracing::warn!(
                    status = status.as_u16(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Graph request throttled, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(Error::PageRequest {
                status: Some(status.as_u16()),
                context: format!("GET {}: {}", url.path(), describe_failure(status, &body)),
            });
        }
    }
}

impl AzureClient for GraphClient {
    fn tenant_info(&self) -> TenantContext {
        self.tenant.clone()
    }

    async fn list_page<R: Resource>(
        &self,
        query: &ListQuery,
        cursor: Option<&Cursor>,
        page: usize,
    ) -> Result<Page<R>> {
        let url = match cursor {
            Some(cursor) => self.continuation_url(cursor)?,
            None => self.collection_url::<R>(query)?,
        };

        let body: ODataPage = self.get_json(url, query.search.is_some()).await?;
        Ok(Page::decode(page, body.value, body.next_link.map(Cursor::new)))
    }
}

const fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Delay before retry number `attempt` (zero-based).
///
/// A `Retry-After` given in seconds wins; otherwise the delay doubles from
/// one second. Both are capped at thirty seconds.
fn retry_delay(retry_after: Option<&HeaderValue>, attempt: u32) -> Duration {
    let hinted = retry_after
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    hinted
        .unwrap_or_else(|| BASE_RETRY_DELAY.saturating_mul(2_u32.saturating_pow(attempt)))
        .min(MAX_RETRY_DELAY)
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<GraphErrorBody>(body) {
        Ok(GraphErrorBody { error }) if !error.code.is_empty() => {
            format!("{}: {}", error.code, error.message)
        }
        _ if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        _ => body.chars().take(256).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azhound_core::{Group, User};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    fn settings(base: &str) -> GraphSettings {
        GraphSettings {
            base_url: Url::parse(base).unwrap(),
            access_token: "token".to_string(),
            max_retries: 3,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn client(base: &str) -> GraphClient {
        GraphClient::with_tenant(settings(base), TenantContext::new("t-1", "Contoso")).unwrap()
    }

    /// A canned HTTP/1.1 response.
    struct Reply {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        body: String,
    }

    impl Reply {
        fn json(status: u16, body: Value) -> Self {
            Self {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            }
        }

        fn throttled() -> Self {
            Self {
                status: 429,
                headers: vec![("Retry-After", "0")],
                body: String::new(),
            }
        }
    }

    /// Local Graph stand-in answering one connection per reply, in order.
    struct FakeGraph {
        base: String,
        listener: TcpListener,
    }

    impl FakeGraph {
        async fn bind() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            Self { base, listener }
        }

        /// Serves `replies`; returns the request heads received.
        fn serve(self, replies: Vec<Reply>) -> Arc<Mutex<Vec<String>>> {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let log = Arc::clone(&seen);

            tokio::spawn(async move {
                for reply in replies {
                    let (mut stream, _) = self.listener.accept().await.unwrap();

                    let mut head = Vec::new();
                    let mut buf = [0_u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        let n = stream.read(&mut buf).await.unwrap();
                        if n == 0 {
                            break;
                        }
                        head.extend_from_slice(&buf[..n]);
                    }
                    log.lock().push(String::from_utf8_lossy(&head).into_owned());

                    let reason = StatusCode::from_u16(reply.status)
                        .ok()
                        .and_then(|s| s.canonical_reason())
                        .unwrap_or("Unknown");
                    let mut response = format!(
                        "HTTP/1.1 {} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                        reply.status,
                        reply.body.len()
                    );
                    for (name, value) in &reply.headers {
                        response.push_str(&format!("{name}: {value}\r\n"));
                    }
                    response.push_str("\r\n");
                    response.push_str(&reply.body);

                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.shutdown().await.unwrap();
                }
            });

            seen
        }
    }

    fn request_lines(seen: &Mutex<Vec<String>>) -> Vec<String> {
        seen.lock()
            .iter()
            .map(|head| {
                let line = head.lines().next().unwrap_or_default();
                line.trim_end_matches(" HTTP/1.1").to_string()
            })
            .collect()
    }

    #[test]
    fn collection_url_encodes_query() {
        let url = client("https://graph.microsoft.com")
            .collection_url::<Group>(
                &ListQuery::new()
                    .filter("securityEnabled eq true")
                    .select(["id", "displayName"])
                    .top(999),
            )
            .unwrap();

        assert_eq!(url.path(), "/v1.0/groups");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("$filter".to_string(), "securityEnabled eq true".to_string()),
                ("$select".to_string(), "id,displayName".to_string()),
                ("$top".to_string(), "999".to_string()),
            ]
        );
    }

    #[test]
    fn base_path_is_kept() {
        let url = client("https://proxy.internal/graph")
            .collection_url::<User>(&ListQuery::new())
            .unwrap();
        assert_eq!(url.as_str(), "https://proxy.internal/graph/v1.0/users");
    }

    #[test]
    fn retry_delay_prefers_header_and_caps() {
        let header = HeaderValue::from_static("7");
        assert_eq!(retry_delay(Some(&header), 0), Duration::from_secs(7));

        let huge = HeaderValue::from_static("3600");
        assert_eq!(retry_delay(Some(&huge), 0), MAX_RETRY_DELAY);

        assert_eq!(retry_delay(None, 0), Duration::from_secs(1));
        assert_eq!(retry_delay(None, 2), Duration::from_secs(4));
        assert_eq!(retry_delay(None, 40), MAX_RETRY_DELAY);
    }

    #[test]
    fn describes_graph_errors() {
        let body = r#"{"error":{"code":"Authorization_RequestDenied","message":"Insufficient privileges"}}"#;
        assert_eq!(
            describe_failure(StatusCode::FORBIDDEN, body),
            "Authorization_RequestDenied: Insufficient privileges"
        );
        assert_eq!(describe_failure(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
        assert_eq!(describe_failure(StatusCode::BAD_REQUEST, "nope"), "nope");
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn debug_redacts_token() {
        let settings = client("https://graph.microsoft.com").settings;
        assert!(!format!("{settings:?}").contains("token\""));
        assert!(format!("{settings:?}").contains("<redacted>"));
    }

    #[tokio::test]
    async fn connect_resolves_tenant_from_organization() {
        let graph = FakeGraph::bind().await;
        let base = graph.base.clone();
        let seen = graph.serve(vec![Reply::json(
            200,
            json!({ "value": [ { "id": "t-9", "displayName": "Fabrikam" } ] }),
        )]);

        let client = GraphClient::connect(settings(&base)).await.unwrap();

        assert_eq!(client.tenant_info(), TenantContext::new("t-9", "Fabrikam"));
        assert_eq!(request_lines(&seen), ["GET /v1.0/organization"]);
        assert!(
            seen.lock()[0]
                .to_ascii_lowercase()
                .contains("authorization: bearer token")
        );
    }

    #[tokio::test]
    async fn throttled_request_succeeds_on_retry() {
        let graph = FakeGraph::bind().await;
        let base = graph.base.clone();
        let seen = graph.serve(vec![
            Reply::throttled(),
            Reply::json(200, json!({ "value": [ { "id": "g-1" } ] })),
        ]);

        let page = client(&base)
            .list_page::<Group>(&ListQuery::new(), None, 0)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].as_ref().unwrap().id, "g-1");
        assert!(page.next.is_none());
        assert_eq!(request_lines(&seen), ["GET /v1.0/groups", "GET /v1.0/groups"]);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let graph = FakeGraph::bind().await;
        let base = graph.base.clone();
        // The first attempt plus three retries.
        let seen = graph.serve((0..4).map(|_| Reply::throttled()).collect());

        let err = client(&base)
            .list_page::<Group>(&ListQuery::new(), None, 0)
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::PageRequest { status: Some(429), .. }),
            "{err:?}"
        );
        assert_eq!(seen.lock().len(), 4);
    }

    #[tokio::test]
    async fn next_link_becomes_cursor_and_is_followed() {
        let graph = FakeGraph::bind().await;
        let base = graph.base.clone();
        let next_link = format!("{base}/v1.0/groups?$skiptoken=abc");
        let seen = graph.serve(vec![
            Reply::json(
                200,
                json!({ "value": [ { "id": "g-1" } ], "@odata.nextLink": next_link }),
            ),
            Reply::json(200, json!({ "value": [ { "id": "g-2" } ] })),
        ]);
        let client = client(&base);
        let query = ListQuery::new();

        let first = client.list_page::<Group>(&query, None, 0).await.unwrap();
        let cursor = first.next.unwrap();
        assert_eq!(cursor.as_str(), next_link);

        let second = client
            .list_page::<Group>(&query, Some(&cursor), 1)
            .await
            .unwrap();
        assert_eq!(second.items[0].as_ref().unwrap().id, "g-2");
        assert!(second.next.is_none());

        assert_eq!(
            request_lines(&seen),
            ["GET /v1.0/groups", "GET /v1.0/groups?$skiptoken=abc"]
        );
    }

    #[tokio::test]
    async fn graph_error_body_is_folded_into_page_request() {
        let graph = FakeGraph::bind().await;
        let base = graph.base.clone();
        let _seen = graph.serve(vec![Reply::json(
            403,
            json!({
                "error": {
                    "code": "Authorization_RequestDenied",
                    "message": "Insufficient privileges to complete the operation."
                }
            }),
        )]);

        let err = client(&base)
            .list_page::<User>(&ListQuery::new(), None, 0)
            .await
            .unwrap_err();

        match err {
            Error::PageRequest { status, context } => {
                assert_eq!(status, Some(403));
                assert!(
                    context.contains(
                        "Authorization_RequestDenied: Insufficient privileges to complete the operation."
                    ),
                    "{context}"
                );
            }
            other => panic!("expected page request failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn foreign_continuation_link_is_refused() {
        let client = client("https://graph.microsoft.com");
        let cursor = Cursor::new("https://attacker.example/v1.0/groups?$skiptoken=abc");

        let err = client
            .list_page::<Group>(&ListQuery::new(), Some(&cursor), 1)
            .await
            .unwrap_err();

        assert!(
            matches!(&err, Error::PageRequest { status: None, context } if context.contains("attacker.example")),
            "{err:?}"
        );
    }
}
