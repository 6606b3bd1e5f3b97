//! Catalog transport: package listing, package documents, allow-list and
//! network classification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use extmarket_schema::{AllowListEntry, PackageSummary, RegistryDocument, SearchResponse};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use crate::config::Registries;
use crate::error::CatalogError;

/// User Agent string for registry requests
pub const USER_AGENT: &str = concat!("extmarket-core/", env!("CARGO_PKG_VERSION"));

/// A registry that can list packages by keyword and serve package documents.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Packages tagged with `keyword`.
    async fn fetch_list(&self, keyword: &str) -> Result<Vec<PackageSummary>, CatalogError>;

    /// Full document (every version plus dist-tags) for one package.
    async fn fetch_detail(&self, name: &str) -> Result<RegistryDocument, CatalogError>;
}

/// Decides whether we are on the restricted (internal) network.
#[async_trait]
pub trait NetworkClassifier: Send + Sync {
    /// True when the internal mirror should be used. Never fails; an
    /// unreachable probe means "public".
    async fn is_restricted_network(&self) -> bool;
}

/// Source of the package allow-list.
#[async_trait]
pub trait AllowListSource: Send + Sync {
    /// Fetch the allow-list at `url`; an empty url yields an empty list.
    async fn fetch(&self, url: &str) -> Result<Vec<AllowListEntry>, CatalogError>;
}

/// GET `url` as JSON with the cache-busting query the registries expect.
async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, CatalogError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(CatalogError::BadUrl(url.to_string()));
    }

    let t = chrono::Utc::now().timestamp_millis().to_string();
    let resp = client
        .get(url)
        .query(&[("type", "json"), ("t", t.as_str())])
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?
        .error_for_status()?;

    Ok(resp.json().await?)
}

/// Registry client that picks its mirror from the network classification.
pub struct RegistryClient {
    client: Client,
    registries: Registries,
    classifier: Arc<dyn NetworkClassifier>,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("registries", &self.registries)
            .finish_non_exhaustive()
    }
}

impl RegistryClient {
    /// Client choosing a mirror from `registries` by network classification.
    pub fn new(client: Client, registries: Registries, classifier: Arc<dyn NetworkClassifier>) -> Self {
        Self {
            client,
            registries,
            classifier,
        }
    }
}

#[async_trait]
impl CatalogClient for RegistryClient {
    async fn fetch_list(&self, keyword: &str) -> Result<Vec<PackageSummary>, CatalogError> {
        let restricted = self.classifier.is_restricted_network().await;
        let url = format!("{}{keyword}", self.registries.select(restricted).search);
        tracing::debug!("Searching {url}");

        let resp: SearchResponse = get_json(&self.client, &url).await?;
        Ok(resp.packages)
    }

    async fn fetch_detail(&self, name: &str) -> Result<RegistryDocument, CatalogError> {
        let restricted = self.classifier.is_restricted_network().await;
        let base = self.registries.select(restricted).registry.trim_end_matches('/');
        // Scoped names keep their '@' but escape the slash.
        let url = format!("{base}/{}", name.replace('/', "%2F"));
        tracing::debug!("Fetching package document {url}");

        let mut doc: RegistryDocument = get_json(&self.client, &url).await?;
        if doc.name.is_empty() {
            doc.name = name.to_string();
        }
        Ok(doc)
    }
}

/// Classifies the network by probing a resource only reachable from the
/// restricted network. Probed once; the answer is cached.
pub struct ProbeClassifier {
    client: Client,
    probe_url: String,
    timeout: Duration,
    cached: OnceCell<bool>,
}

impl std::fmt::Debug for ProbeClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeClassifier")
            .field("probe_url", &self.probe_url)
            .field("cached", &self.cached.get())
            .finish_non_exhaustive()
    }
}

impl ProbeClassifier {
    /// Classifier probing `probe_url` once, giving up after `timeout`.
    pub fn new(client: Client, probe_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            probe_url: probe_url.into(),
            timeout,
            cached: OnceCell::new(),
        }
    }
}

#[async_trait]
impl NetworkClassifier for ProbeClassifier {
    async fn is_restricted_network(&self) -> bool {
        *self
            .cached
            .get_or_init(|| async {
                if self.probe_url.is_empty() {
                    return false;
                }
                let restricted = self
                    .client
                    .get(&self.probe_url)
                    .timeout(self.timeout)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .is_ok();
                tracing::debug!(restricted, "Network classified via {}", self.probe_url);
                restricted
            })
            .await
    }
}

/// Allow-list fetched over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpAllowList {
    client: Client,
}

impl HttpAllowList {
    /// Allow-list fetched with `client`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AllowListSource for HttpAllowList {
    async fn fetch(&self, url: &str) -> Result<Vec<AllowListEntry>, CatalogError> {
        if url.is_empty() {
            return Ok(Vec::new());
        }
        get_json(&self.client, url).await
    }
}
