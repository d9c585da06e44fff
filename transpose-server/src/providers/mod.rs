//! Provider adapters
//!
//! Each streaming provider is integrated through the [`ProviderAdapter`]
//! capability trait: credential refresh, share-link parsing, catalog
//! lookup and search. Dispatch is closed over [`ProviderId`] via the
//! [`ProviderRegistry`]; an unknown provider name is rejected as a typed
//! error at the HTTP boundary, never looked up dynamically.

pub mod apple;
pub mod query;
pub mod spotify;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use transpose_common::config::Config;
use transpose_common::model::{
    ElementMetadata, ElementReference, ElementType, ProviderId, ProviderResult,
};

use query::SearchQuery;

pub use apple::AppleMusicProvider;
pub use spotify::SpotifyProvider;

/// Timeout applied to every outbound provider API call, so one slow
/// provider cannot stall a whole fan-out join.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider adapter errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Link does not match this provider's URL grammar
    #[error("Unparseable link: {0}")]
    Parse(String),

    /// Credential refresh or missing-credential failure
    #[error("Auth failure: {0}")]
    Auth(String),

    /// Source element lookup failed upstream
    #[error("Element fetch failed: {0}")]
    Fetch(String),

    /// Source element does not exist in the provider's catalog
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Destination search failed (transport or upstream error)
    #[error("Search failed: {0}")]
    Search(String),

    /// Element type not handled by this adapter
    #[error("Unsupported element type: {0}")]
    UnsupportedType(ElementType),
}

/// Shared in-memory credential slot for one adapter instance.
///
/// Read by every concurrent request on the adapter, written only by
/// explicit refresh calls; last refresh wins. A stale token costs one
/// transient auth failure on the next upstream call, nothing worse.
pub struct TokenCell {
    token: RwLock<Option<String>>,
}

impl TokenCell {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            token: RwLock::new(initial),
        }
    }

    /// Current bearer token, or an auth error if none has been issued yet.
    pub async fn bearer(&self) -> Result<String, ProviderError> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| ProviderError::Auth("No credential issued; refresh first".to_string()))
    }

    pub async fn store(&self, token: String) {
        *self.token.write().await = Some(token);
    }
}

/// Uniform capability set over one provider's REST API.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Obtain a fresh bearer credential and store it in the adapter's
    /// credential cell. No automatic scheduling; the caller decides when.
    async fn refresh_token(&self) -> Result<(), ProviderError>;

    /// Apply the provider's URL grammar to a share link.
    fn parse_link(&self, link: &str) -> Result<ElementReference, ProviderError>;

    /// Rebuild the provider's share URL for an already-parsed reference.
    fn canonical_url(&self, reference: &ElementReference) -> String;

    /// Fetch the catalog item and shape it into canonical metadata.
    async fn get_element(
        &self,
        element_type: ElementType,
        id: &str,
        storefront: Option<&str>,
    ) -> Result<ElementMetadata, ProviderError>;

    /// Issue a single search call (limit 1). `Ok(None)` means the provider
    /// answered but had no match; errors are transport or upstream faults.
    async fn search_once(
        &self,
        element_type: ElementType,
        query: &SearchQuery,
    ) -> Result<Option<ProviderResult>, ProviderError>;

    /// Search with the title-relaxation retry: on an empty result for a
    /// track, strip the trailing parenthetical/bracketed title segment and
    /// re-issue exactly once. A title with no such suffix makes the empty
    /// result final.
    async fn search(
        &self,
        element_type: ElementType,
        metadata: &ElementMetadata,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        let query = SearchQuery::from_metadata(metadata);

        if let Some(hit) = self.search_once(element_type, &query).await? {
            return Ok(Some(hit));
        }

        if element_type == ElementType::Track {
            if let Some(relaxed) = query.relaxed() {
                tracing::debug!(provider = %self.id(), "Empty result, retrying with relaxed title");
                return self.search_once(element_type, &relaxed).await;
            }
        }

        Ok(None)
    }
}

/// Closed dispatch table over the configured adapters, in fixed priority
/// order ([`ProviderId::ALL`]).
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Build a registry from explicit adapters. Order is preserved and
    /// used as the priority order for metadata selection.
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self { adapters }
    }

    /// Construct the production registry from service configuration.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Ok(Self::new(vec![
            Arc::new(SpotifyProvider::new(&config.spotify)?),
            Arc::new(AppleMusicProvider::new(&config.apple)?),
        ]))
    }

    pub fn get(&self, id: ProviderId) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.iter().find(|adapter| adapter.id() == id)
    }

    /// All adapters, in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ProviderAdapter>> {
        self.adapters.iter()
    }

    /// Every adapter except the given one; the destination set for a
    /// transposition fan-out.
    pub fn others(&self, id: ProviderId) -> impl Iterator<Item = &Arc<dyn ProviderAdapter>> {
        self.adapters.iter().filter(move |adapter| adapter.id() != id)
    }

    /// Try each provider's link grammar in turn; the first that parses
    /// wins. Fails with a parse error when no grammar matches.
    pub fn parse_any(&self, link: &str) -> Result<ElementReference, ProviderError> {
        for adapter in &self.adapters {
            if let Ok(reference) = adapter.parse_link(link) {
                return Ok(reference);
            }
        }
        Err(ProviderError::Parse(format!(
            "Link does not match any known provider grammar: {}",
            link
        )))
    }
}

/// Build the reqwest client shared by an adapter's API calls.
pub(crate) fn http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Fetch(e.to_string()))
}
