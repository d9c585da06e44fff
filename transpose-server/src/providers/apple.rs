//! Apple Music provider adapter
//!
//! Credentials are self-issued ES256 developer tokens signed with the
//! configured MusicKit key
//! (https://developer.apple.com/documentation/applemusicapi/getting_keys_and_creating_tokens);
//! catalog lookups and search go through the storefront-scoped catalog API.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use transpose_common::config::AppleConfig;
use transpose_common::model::{
    ElementMetadata, ElementReference, ElementType, ImageSet, PlaylistTrack, ProviderId,
    ProviderResult,
};

use super::query::SearchQuery;
use super::{http_client, ProviderAdapter, ProviderError, TokenCell};

const API_BASE: &str = "https://api.music.apple.com/v1/catalog";
const WEB_BASE: &str = "https://music.apple.com";
const DEFAULT_STOREFRONT: &str = "us";
const TOKEN_TTL_SECONDS: i64 = 3600;

/// Share-link grammar, matched against the URL with its query string
/// removed. The title path segment is display-only and discarded.
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https://music\.apple\.com/(?P<storefront>[a-zA-Z]{2})/(?P<type>album|artist|playlist|song)/(?:[^/]+/)?(?P<id>[A-Za-z0-9][A-Za-z0-9.\-]*)$",
    )
    .expect("valid regex")
});

pub struct AppleMusicProvider {
    client: reqwest::Client,
    team_id: String,
    key_id: String,
    private_key_path: PathBuf,
    token: TokenCell,
}

#[derive(Serialize)]
struct DeveloperTokenClaims {
    iss: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct DataEnvelope {
    data: Vec<Resource>,
}

#[derive(Deserialize)]
struct Resource {
    id: String,
    attributes: Attributes,
    relationships: Option<Relationships>,
}

#[derive(Deserialize)]
struct Attributes {
    name: String,
    #[serde(rename = "artistName")]
    artist_name: Option<String>,
    #[serde(rename = "albumName")]
    album_name: Option<String>,
    artwork: Option<Artwork>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct Artwork {
    url: String,
}

#[derive(Deserialize)]
struct Relationships {
    tracks: Option<TracksRelationship>,
}

#[derive(Deserialize)]
struct TracksRelationship {
    data: Vec<Resource>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: SearchResults,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SearchResults {
    songs: Option<DataEnvelope>,
    artists: Option<DataEnvelope>,
    albums: Option<DataEnvelope>,
}

/// Apple's API vocabulary: tracks are "songs", and resource paths are
/// pluralized.
fn resource_path(element_type: ElementType) -> &'static str {
    match element_type {
        ElementType::Track => "songs",
        ElementType::Artist => "artists",
        ElementType::Album => "albums",
        ElementType::Playlist => "playlists",
    }
}

/// Expand the artwork URL template into the conventional 640/300/64 set.
fn image_set(artwork: Option<&Artwork>) -> ImageSet {
    let Some(artwork) = artwork else {
        return ImageSet::default();
    };

    ImageSet(
        [640, 300, 64]
            .iter()
            .map(|size| {
                artwork
                    .url
                    .replace("{w}", &size.to_string())
                    .replace("{h}", &size.to_string())
            })
            .collect(),
    )
}

fn metadata_from_resource(element_type: ElementType, resource: &Resource) -> ElementMetadata {
    let attributes = &resource.attributes;
    let images = image_set(attributes.artwork.as_ref());

    match element_type {
        ElementType::Track => ElementMetadata::Track {
            title: attributes.name.clone(),
            artist: attributes.artist_name.clone().unwrap_or_default(),
            album: attributes.album_name.clone(),
            images,
        },
        ElementType::Artist => ElementMetadata::Artist {
            name: attributes.name.clone(),
            images,
        },
        ElementType::Album => ElementMetadata::Album {
            title: attributes.name.clone(),
            artist: attributes.artist_name.clone(),
            images,
        },
        ElementType::Playlist => {
            let tracks = resource
                .relationships
                .as_ref()
                .and_then(|rel| rel.tracks.as_ref())
                .map(|tracks| {
                    tracks
                        .data
                        .iter()
                        .map(|track| PlaylistTrack {
                            title: track.attributes.name.clone(),
                            artist: track.attributes.artist_name.clone().unwrap_or_default(),
                        })
                        .collect()
                })
                .unwrap_or_default();

            ElementMetadata::Playlist {
                name: attributes.name.clone(),
                tracks,
                images,
            }
        }
    }
}

impl AppleMusicProvider {
    pub fn new(config: &AppleConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            team_id: config.team_id.clone(),
            key_id: config.key_id.clone(),
            private_key_path: config.private_key_path.clone(),
            token: TokenCell::new(config.initial_token.clone()),
        })
    }

    async fn get_authorized(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        let bearer = self.token.bearer().await?;
        self.client
            .get(url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| ProviderError::Fetch(e.to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for AppleMusicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Apple
    }

    /// Self-issue an ES256 developer token good for one hour.
    async fn refresh_token(&self) -> Result<(), ProviderError> {
        let key_pem = tokio::fs::read(&self.private_key_path).await.map_err(|e| {
            ProviderError::Auth(format!(
                "Failed to read {}: {}",
                self.private_key_path.display(),
                e
            ))
        })?;

        let encoding_key = EncodingKey::from_ec_pem(&key_pem)
            .map_err(|e| ProviderError::Auth(format!("Invalid MusicKit key: {}", e)))?;

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());

        let now = chrono::Utc::now().timestamp();
        let claims = DeveloperTokenClaims {
            iss: self.team_id.clone(),
            iat: now,
            exp: now + TOKEN_TTL_SECONDS,
        };

        let token = jsonwebtoken::encode(&header, &claims, &encoding_key)
            .map_err(|e| ProviderError::Auth(format!("Token signing failed: {}", e)))?;

        self.token.store(token).await;
        tracing::info!("Issued Apple Music developer token");
        Ok(())
    }

    /// Apple's URL shape overloads albums and tracks: a track link is an
    /// album path with an `i` query parameter carrying the track id. The
    /// presence of `i` reclassifies the element and overrides the path id.
    fn parse_link(&self, link: &str) -> Result<ElementReference, ProviderError> {
        let (path, query) = match link.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (link, None),
        };

        let captures = LINK_RE
            .captures(path)
            .ok_or_else(|| ProviderError::Parse(format!("Not an Apple Music link: {}", link)))?;

        let path_type = match &captures["type"] {
            "song" => ElementType::Track,
            other => other
                .parse()
                .map_err(|_| ProviderError::Parse(format!("Unknown element type in {}", link)))?,
        };

        let track_id = query.and_then(|query| {
            query.split('&').find_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                (key == "i" && !value.is_empty()).then(|| value.to_string())
            })
        });

        let (element_type, id) = match track_id {
            Some(track_id) => (ElementType::Track, track_id),
            None => (path_type, captures["id"].to_string()),
        };

        let reference = ElementReference {
            provider: ProviderId::Apple,
            element_type,
            id,
            storefront: Some(captures["storefront"].to_lowercase()),
        };

        tracing::debug!(
            element_type = %reference.element_type,
            id = %reference.id,
            storefront = ?reference.storefront,
            "Parsed Apple Music link"
        );
        Ok(reference)
    }

    fn canonical_url(&self, reference: &ElementReference) -> String {
        let storefront = reference.storefront.as_deref().unwrap_or(DEFAULT_STOREFRONT);
        let segment = match reference.element_type {
            ElementType::Track => "song",
            other => other.as_str(),
        };
        format!("{}/{}/{}/{}", WEB_BASE, storefront, segment, reference.id)
    }

    async fn get_element(
        &self,
        element_type: ElementType,
        id: &str,
        storefront: Option<&str>,
    ) -> Result<ElementMetadata, ProviderError> {
        let storefront = storefront.unwrap_or(DEFAULT_STOREFRONT);
        let url = format!(
            "{}/{}/{}/{}",
            API_BASE,
            storefront,
            resource_path(element_type),
            id
        );

        let response = self.get_authorized(&url).await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(format!(
                "Apple Music {} {} not found",
                element_type, id
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::Fetch(format!(
                "Apple Music returned {} for {}",
                status, url
            )));
        }

        let envelope: DataEnvelope = response
            .json()
            .await
            .map_err(|e| ProviderError::Fetch(e.to_string()))?;

        let resource = envelope.data.first().ok_or_else(|| {
            ProviderError::NotFound(format!("Apple Music {} {} not found", element_type, id))
        })?;

        Ok(metadata_from_resource(element_type, resource))
    }

    async fn search_once(
        &self,
        element_type: ElementType,
        query: &SearchQuery,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        if element_type == ElementType::Playlist {
            return Err(ProviderError::UnsupportedType(element_type));
        }

        // Terms are already percent-encoded; build the URL by hand.
        let url = format!(
            "{}/{}/search?term={}&types={}&limit=1",
            API_BASE,
            DEFAULT_STOREFRONT,
            query.encoded(),
            resource_path(element_type)
        );

        let bearer = self.token.bearer().await?;
        let response = self
            .client
            .get(&url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| ProviderError::Search(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Search(format!(
                "Apple Music search returned {}",
                status
            )));
        }

        let results: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Search(e.to_string()))?;

        let envelope = match element_type {
            ElementType::Track => results.results.songs,
            ElementType::Artist => results.results.artists,
            ElementType::Album => results.results.albums,
            ElementType::Playlist => None,
        };

        let hit = envelope
            .and_then(|envelope| envelope.data.into_iter().next())
            .map(|resource| {
                let link = resource.attributes.url.clone().unwrap_or_else(|| {
                    self.canonical_url(&ElementReference {
                        provider: ProviderId::Apple,
                        element_type,
                        id: resource.id.clone(),
                        storefront: None,
                    })
                });
                ProviderResult {
                    provider: ProviderId::Apple,
                    id: resource.id.clone(),
                    link,
                    metadata: metadata_from_resource(element_type, &resource),
                }
            });

        if hit.is_none() {
            tracing::debug!(terms = %query.terms(), "Apple Music search returned no match");
        }

        Ok(hit)
    }
}
