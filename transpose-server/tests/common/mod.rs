//! Shared test helpers: stub provider adapters and state construction
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use transpose_common::config::{AppleConfig, Config, SpotifyConfig};
use transpose_common::model::{
    ElementMetadata, ElementReference, ElementType, ImageSet, ProviderId, ProviderResult,
};
use transpose_server::db::{init_memory_pool, TransposeStore};
use transpose_server::providers::query::SearchQuery;
use transpose_server::providers::{ProviderAdapter, ProviderError, ProviderRegistry};
use transpose_server::transposer::Transposer;

pub const LINK_BASE: &str = "https://transpose.test";

/// How a stub answers `search_once`.
pub enum SearchBehavior {
    /// Always return a hit built from the query.
    Match,
    /// Always report "provider answered, no match".
    NoMatch,
    /// Always fail with a transport-style search error.
    Fail,
    /// No match while the queried title still carries a parenthetical;
    /// match once it has been relaxed away.
    MatchOnlyWithoutParens,
    /// No match for one specific title, match for everything else.
    NoMatchFor(String),
}

pub struct StubProvider {
    provider: ProviderId,
    element: Option<ElementMetadata>,
    behavior: SearchBehavior,
    refresh_fails: bool,
    pub get_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub search_queries: Mutex<Vec<SearchQuery>>,
}

impl StubProvider {
    pub fn new(
        provider: ProviderId,
        element: Option<ElementMetadata>,
        behavior: SearchBehavior,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            element,
            behavior,
            refresh_fails: false,
            get_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            search_queries: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_refresh(provider: ProviderId) -> Arc<Self> {
        Arc::new(Self {
            provider,
            element: None,
            behavior: SearchBehavior::NoMatch,
            refresh_fails: true,
            get_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            search_queries: Mutex::new(Vec::new()),
        })
    }

    pub fn search_call_count(&self) -> usize {
        self.search_queries.lock().unwrap().len()
    }

    fn hit_for(&self, element_type: ElementType, query: &SearchQuery) -> ProviderResult {
        let artist = query.artist.clone().unwrap_or_default();
        let metadata = match element_type {
            ElementType::Track => ElementMetadata::Track {
                title: query.title.clone().unwrap_or_default(),
                artist,
                album: None,
                images: ImageSet::default(),
            },
            ElementType::Artist => ElementMetadata::Artist {
                name: artist,
                images: ImageSet::default(),
            },
            _ => ElementMetadata::Album {
                title: query.album.clone().unwrap_or_default(),
                artist: query.artist.clone(),
                images: ImageSet::default(),
            },
        };

        ProviderResult {
            provider: self.provider,
            id: format!("{}-match", self.provider),
            link: format!(
                "https://{}.example/{}/{}-match",
                self.provider, element_type, self.provider
            ),
            metadata,
        }
    }
}

#[async_trait]
impl ProviderAdapter for StubProvider {
    fn id(&self) -> ProviderId {
        self.provider
    }

    async fn refresh_token(&self) -> Result<(), ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.refresh_fails {
            Err(ProviderError::Auth("stub refresh failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn parse_link(&self, link: &str) -> Result<ElementReference, ProviderError> {
        let prefix = format!("https://{}.example/", self.provider);
        let rest = link
            .strip_prefix(&prefix)
            .ok_or_else(|| ProviderError::Parse(format!("Not a {} link", self.provider)))?;
        let (element_type, id) = rest
            .split_once('/')
            .ok_or_else(|| ProviderError::Parse(format!("Malformed link: {}", link)))?;
        Ok(ElementReference {
            provider: self.provider,
            element_type: element_type
                .parse()
                .map_err(|_| ProviderError::Parse(format!("Bad type in {}", link)))?,
            id: id.to_string(),
            storefront: None,
        })
    }

    fn canonical_url(&self, reference: &ElementReference) -> String {
        format!(
            "https://{}.example/{}/{}",
            self.provider, reference.element_type, reference.id
        )
    }

    async fn get_element(
        &self,
        element_type: ElementType,
        id: &str,
        _storefront: Option<&str>,
    ) -> Result<ElementMetadata, ProviderError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.element.clone().ok_or_else(|| {
            ProviderError::NotFound(format!("{} {} {} not found", self.provider, element_type, id))
        })
    }

    async fn search_once(
        &self,
        element_type: ElementType,
        query: &SearchQuery,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        self.search_queries.lock().unwrap().push(query.clone());

        match &self.behavior {
            SearchBehavior::Match => Ok(Some(self.hit_for(element_type, query))),
            SearchBehavior::NoMatch => Ok(None),
            SearchBehavior::Fail => Err(ProviderError::Search("stub transport failure".to_string())),
            SearchBehavior::MatchOnlyWithoutParens => {
                let title = query.title.as_deref().unwrap_or_default();
                if title.contains('(') {
                    Ok(None)
                } else {
                    Ok(Some(self.hit_for(element_type, query)))
                }
            }
            SearchBehavior::NoMatchFor(skipped) => {
                if query.title.as_deref() == Some(skipped.as_str()) {
                    Ok(None)
                } else {
                    Ok(Some(self.hit_for(element_type, query)))
                }
            }
        }
    }
}

pub fn sample_track(title: &str, artist: &str) -> ElementMetadata {
    ElementMetadata::Track {
        title: title.to_string(),
        artist: artist.to_string(),
        album: None,
        images: ImageSet::default(),
    }
}

/// Transposer wired to stub adapters and an in-memory store.
pub async fn test_transposer(
    adapters: Vec<Arc<StubProvider>>,
    min_matches: usize,
) -> Transposer {
    let registry = ProviderRegistry::new(
        adapters
            .into_iter()
            .map(|adapter| adapter as Arc<dyn ProviderAdapter>)
            .collect(),
    );
    let store = TransposeStore::new(init_memory_pool().await.unwrap());
    Transposer::new(Arc::new(registry), store, LINK_BASE.to_string(), min_matches, 4)
}

/// Config with dummy credentials for HTTP-level tests.
pub fn test_config(min_matches: usize) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        database_path: PathBuf::from(":memory:"),
        link_base_url: LINK_BASE.to_string(),
        min_matches,
        playlist_concurrency: 4,
        spotify: SpotifyConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            initial_token: None,
        },
        apple: AppleConfig {
            team_id: "TEAM123456".to_string(),
            key_id: "KEY1234567".to_string(),
            private_key_path: PathBuf::from("MusicKitKey.p8"),
            initial_token: None,
        },
    }
}
