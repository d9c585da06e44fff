//! Transposition orchestrator
//!
//! Given a parsed source reference, fetches the source element, fans the
//! search out concurrently to every other configured provider, and persists
//! the assembled result keyed by link identity. Destination failures are
//! tolerated; only the source fetch is fatal to the whole operation.

use futures::future;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use transpose_common::error::Error;
use transpose_common::model::{
    ElementMetadata, ElementReference, ElementType, ImageSet, LinkId, ProviderId, ProviderResult,
    TransposeContent, TransposeRecord,
};

use crate::db::{self, TransposeStore};
use crate::providers::query::SearchQuery;
use crate::providers::{ProviderAdapter, ProviderError, ProviderRegistry};

/// Orchestration errors
#[derive(Debug, Error)]
pub enum TransposeError {
    /// Source-side provider failure (parse, fetch, auth)
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Unknown transpose ID on resolve
    #[error("Unknown transpose ID: {0}")]
    NotFound(String),

    /// Fewer destination providers matched than the configured minimum
    #[error("Matched {found} destination provider(s), {needed} required")]
    NoMatches { needed: usize, found: usize },

    /// Short-ID generation collided twice in a row
    #[error("Transpose ID collision: {0}")]
    Collision(String),

    /// Storage failure
    #[error("Storage error: {0}")]
    Database(#[from] Error),
}

/// One converted playlist entry; `link` is absent when the destination
/// provider had no match for that track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedTrack {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Result of a link conversion: a single destination link, or the per-track
/// listing for a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConvertOutcome {
    Single { link: String },
    Playlist { name: String, tracks: Vec<ConvertedTrack> },
}

/// The transposition engine: provider registry + record store.
pub struct Transposer {
    registry: Arc<ProviderRegistry>,
    store: TransposeStore,
    link_base_url: String,
    min_matches: usize,
    playlist_concurrency: usize,
}

impl Transposer {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: TransposeStore,
        link_base_url: String,
        min_matches: usize,
        playlist_concurrency: usize,
    ) -> Self {
        Self {
            registry,
            store,
            link_base_url: link_base_url.trim_end_matches('/').to_string(),
            min_matches,
            playlist_concurrency,
        }
    }

    fn adapter(&self, id: ProviderId) -> Result<Arc<dyn ProviderAdapter>, TransposeError> {
        self.registry.get(id).cloned().ok_or_else(|| {
            TransposeError::Database(Error::Internal(format!(
                "Provider {} is not configured",
                id
            )))
        })
    }

    /// Transpose a source element to every other configured provider.
    ///
    /// Looking up an existing link identity short-circuits the whole
    /// operation: the stored record is returned unchanged and no provider
    /// call is made.
    pub async fn transpose_by_link(
        &self,
        provider: ProviderId,
        element_type: ElementType,
        id: &str,
    ) -> Result<TransposeRecord, TransposeError> {
        let link_id = LinkId::new(provider, element_type, id);
        tracing::info!(link_id = %link_id, "Transpose requested");

        if let Some(record) = self.store.find_by_link_id(&link_id).await? {
            tracing::debug!(
                link_id = %link_id,
                transpose_id = %record.transpose_id,
                "Cache hit, skipping provider fan-out"
            );
            return Ok(record);
        }

        let source = self.adapter(provider)?;
        let element = source.get_element(element_type, id, None).await?;

        // Concurrent join across every other provider. Results are keyed
        // by provider id afterwards, so arrival order cannot influence the
        // assembled output.
        let destinations: Vec<_> = self.registry.others(provider).cloned().collect();
        let searches = destinations
            .iter()
            .map(|adapter| adapter.search(element_type, &element));
        let outcomes = future::join_all(searches).await;

        let mut results: BTreeMap<ProviderId, ProviderResult> = BTreeMap::new();
        for (adapter, outcome) in destinations.iter().zip(outcomes) {
            match outcome {
                Ok(Some(hit)) => {
                    results.insert(adapter.id(), hit);
                }
                Ok(None) => {
                    tracing::warn!(provider = %adapter.id(), link_id = %link_id, "No match on destination provider");
                }
                Err(err) => {
                    tracing::warn!(provider = %adapter.id(), link_id = %link_id, error = %err, "Destination search failed");
                }
            }
        }

        if results.len() < self.min_matches {
            return Err(TransposeError::NoMatches {
                needed: self.min_matches,
                found: results.len(),
            });
        }

        let search_terms = SearchQuery::from_metadata(&element).terms();

        let source_reference = ElementReference {
            provider,
            element_type,
            id: id.to_string(),
            storefront: None,
        };
        let mut links = BTreeMap::new();
        links.insert(
            provider.to_string(),
            source.canonical_url(&source_reference),
        );
        for (provider_id, hit) in &results {
            links.insert(provider_id.to_string(), hit.link.clone());
        }

        // Response metadata comes from the first provider in fixed priority
        // order that has data; the fetched source element stands in for the
        // source provider.
        let metadata = ProviderId::ALL
            .iter()
            .find_map(|candidate| {
                if *candidate == provider {
                    Some(element.clone())
                } else {
                    results.get(candidate).map(|hit| hit.metadata.clone())
                }
            })
            .unwrap_or_else(|| element.clone());

        self.mint_record(link_id, search_terms, metadata, links).await
    }

    /// Mint a short ID and insert the record. A primary-key collision gets
    /// one fresh ID and retry; a second collision is fatal to the request.
    async fn mint_record(
        &self,
        link_id: LinkId,
        search_terms: String,
        metadata: ElementMetadata,
        links: BTreeMap<String, String>,
    ) -> Result<TransposeRecord, TransposeError> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            let transpose_id = db::generate_short_id();
            let mut links = links.clone();
            links.insert(
                "transpose".to_string(),
                format!("{}/t/{}", self.link_base_url, transpose_id),
            );

            let record = TransposeRecord {
                transpose_id,
                link_id: link_id.clone(),
                search_terms: search_terms.clone(),
                content: TransposeContent {
                    metadata: metadata.clone(),
                    links,
                },
            };

            match self.store.insert(&record).await {
                Ok(()) => {
                    tracing::info!(
                        link_id = %record.link_id,
                        transpose_id = %record.transpose_id,
                        "Transpose complete"
                    );
                    return Ok(record);
                }
                Err(Error::Collision(id)) if attempts < 2 => {
                    tracing::warn!(transpose_id = %id, "Short-ID collision, regenerating");
                }
                Err(Error::Collision(id)) => return Err(TransposeError::Collision(id)),
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Pure primary-key lookup; never triggers provider calls.
    pub async fn resolve_transpose_id(
        &self,
        transpose_id: &str,
    ) -> Result<TransposeRecord, TransposeError> {
        self.store
            .get_by_transpose_id(transpose_id)
            .await?
            .ok_or_else(|| TransposeError::NotFound(transpose_id.to_string()))
    }

    /// Convert a pasted share link to a single destination provider.
    ///
    /// Playlists are converted track by track with a bounded concurrent
    /// fan-out; track order is preserved and per-track failures become
    /// linkless entries rather than errors.
    pub async fn convert_link(
        &self,
        link: &str,
        destination: ProviderId,
    ) -> Result<ConvertOutcome, TransposeError> {
        let reference = self.registry.parse_any(link)?;
        tracing::info!(
            link_id = %reference.link_id(),
            destination = %destination,
            "Convert requested"
        );

        if reference.provider == destination {
            let adapter = self.adapter(destination)?;
            return Ok(ConvertOutcome::Single {
                link: adapter.canonical_url(&reference),
            });
        }

        let source = self.adapter(reference.provider)?;
        let element = source
            .get_element(
                reference.element_type,
                &reference.id,
                reference.storefront.as_deref(),
            )
            .await?;
        let destination_adapter = self.adapter(destination)?;

        match element {
            ElementMetadata::Playlist { name, tracks, .. } => {
                let converted = stream::iter(tracks.into_iter().map(|track| {
                    let adapter = destination_adapter.clone();
                    async move {
                        let metadata = ElementMetadata::Track {
                            title: track.title.clone(),
                            artist: track.artist.clone(),
                            album: None,
                            images: ImageSet::default(),
                        };
                        let link = match adapter.search(ElementType::Track, &metadata).await {
                            Ok(Some(hit)) => Some(hit.link),
                            Ok(None) => {
                                tracing::warn!(title = %track.title, "Playlist track has no destination match");
                                None
                            }
                            Err(err) => {
                                tracing::warn!(title = %track.title, error = %err, "Playlist track conversion failed");
                                None
                            }
                        };
                        ConvertedTrack {
                            title: track.title,
                            artist: track.artist,
                            link,
                        }
                    }
                }))
                .buffered(self.playlist_concurrency)
                .collect::<Vec<_>>()
                .await;

                Ok(ConvertOutcome::Playlist {
                    name,
                    tracks: converted,
                })
            }
            other => {
                let element_type = other.element_type();
                match destination_adapter.search(element_type, &other).await? {
                    Some(hit) => Ok(ConvertOutcome::Single { link: hit.link }),
                    None => Err(TransposeError::NoMatches {
                        needed: 1,
                        found: 0,
                    }),
                }
            }
        }
    }
}
