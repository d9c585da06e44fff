//! Spotify provider adapter
//!
//! Credentials come from the client-credentials grant
//! (https://developer.spotify.com/documentation/general/guides/authorization-guide/),
//! catalog lookups and search go through the Web API v1.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use transpose_common::config::SpotifyConfig;
use transpose_common::model::{
    ElementMetadata, ElementReference, ElementType, ImageSet, PlaylistTrack, ProviderId,
    ProviderResult,
};

use super::query::SearchQuery;
use super::{http_client, ProviderAdapter, ProviderError, TokenCell};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";
const WEB_BASE: &str = "https://open.spotify.com";

/// Share-link grammar. The optional `intl-xx` locale segment and any query
/// string (`?si=...` share noise) never reach the parsed reference.
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https://open\.spotify\.com/(?:intl-[a-zA-Z-]+/)?(?P<type>track|artist|album|playlist)/(?P<id>[A-Za-z0-9]+)",
    )
    .expect("valid regex")
});

pub struct SpotifyProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: TokenCell,
}

impl SpotifyProvider {
    pub fn new(config: &SpotifyConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client()?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
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

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Image {
    url: String,
}

#[derive(Deserialize)]
struct ExternalUrls {
    spotify: String,
}

#[derive(Deserialize)]
struct ArtistRef {
    name: String,
}

#[derive(Deserialize)]
struct AlbumRef {
    name: String,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Deserialize)]
struct TrackObject {
    id: String,
    name: String,
    artists: Vec<ArtistRef>,
    album: Option<AlbumRef>,
    external_urls: ExternalUrls,
}

#[derive(Deserialize)]
struct ArtistObject {
    id: String,
    name: String,
    #[serde(default)]
    images: Vec<Image>,
    external_urls: ExternalUrls,
}

#[derive(Deserialize)]
struct AlbumObject {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    #[serde(default)]
    images: Vec<Image>,
    external_urls: ExternalUrls,
}

#[derive(Deserialize)]
struct PlaylistObject {
    name: String,
    #[serde(default)]
    images: Vec<Image>,
    tracks: PlaylistTracks,
}

#[derive(Deserialize)]
struct PlaylistTracks {
    items: Vec<PlaylistItem>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    track: Option<TrackObject>,
}

#[derive(Deserialize)]
struct Paging<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: Option<Paging<TrackObject>>,
    artists: Option<Paging<ArtistObject>>,
    albums: Option<Paging<AlbumObject>>,
}

/// Spotify returns images ordered large to small already.
fn image_set(images: Vec<Image>) -> ImageSet {
    ImageSet(images.into_iter().take(3).map(|image| image.url).collect())
}

fn first_artist(artists: &[ArtistRef]) -> String {
    artists
        .first()
        .map(|artist| artist.name.clone())
        .unwrap_or_default()
}

fn track_metadata(track: &TrackObject) -> ElementMetadata {
    ElementMetadata::Track {
        title: track.name.clone(),
        artist: first_artist(&track.artists),
        album: track.album.as_ref().map(|album| album.name.clone()),
        images: track
            .album
            .as_ref()
            .map(|album| {
                ImageSet(album.images.iter().take(3).map(|i| i.url.clone()).collect())
            })
            .unwrap_or_default(),
    }
}

#[async_trait]
impl ProviderAdapter for SpotifyProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Spotify
    }

    /// Client-credentials grant; the resulting token is good for one hour.
    async fn refresh_token(&self) -> Result<(), ProviderError> {
        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .client
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ProviderError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Auth(format!(
                "Spotify token endpoint returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Auth(e.to_string()))?;

        self.token.store(body.access_token).await;
        tracing::info!("Refreshed Spotify access token");
        Ok(())
    }

    fn parse_link(&self, link: &str) -> Result<ElementReference, ProviderError> {
        let captures = LINK_RE
            .captures(link)
            .ok_or_else(|| ProviderError::Parse(format!("Not a Spotify link: {}", link)))?;

        let element_type: ElementType = captures["type"]
            .parse()
            .map_err(|_| ProviderError::Parse(format!("Unknown element type in {}", link)))?;

        let reference = ElementReference {
            provider: ProviderId::Spotify,
            element_type,
            id: captures["id"].to_string(),
            storefront: None,
        };

        tracing::debug!(element_type = %reference.element_type, id = %reference.id, "Parsed Spotify link");
        Ok(reference)
    }

    fn canonical_url(&self, reference: &ElementReference) -> String {
        format!(
            "{}/{}/{}",
            WEB_BASE, reference.element_type, reference.id
        )
    }

    async fn get_element(
        &self,
        element_type: ElementType,
        id: &str,
        _storefront: Option<&str>,
    ) -> Result<ElementMetadata, ProviderError> {
        let url = format!("{}/{}s/{}", API_BASE, element_type, id);
        let response = self.get_authorized(&url).await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(format!(
                "Spotify {} {} not found",
                element_type, id
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::Fetch(format!(
                "Spotify returned {} for {}",
                status, url
            )));
        }

        match element_type {
            ElementType::Track => {
                let track: TrackObject = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::Fetch(e.to_string()))?;
                Ok(track_metadata(&track))
            }
            ElementType::Artist => {
                let artist: ArtistObject = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::Fetch(e.to_string()))?;
                Ok(ElementMetadata::Artist {
                    name: artist.name,
                    images: image_set(artist.images),
                })
            }
            ElementType::Album => {
                let album: AlbumObject = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::Fetch(e.to_string()))?;
                Ok(ElementMetadata::Album {
                    title: album.name,
                    artist: album.artists.first().map(|artist| artist.name.clone()),
                    images: image_set(album.images),
                })
            }
            ElementType::Playlist => {
                let playlist: PlaylistObject = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::Fetch(e.to_string()))?;
                let tracks = playlist
                    .tracks
                    .items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .map(|track| PlaylistTrack {
                        artist: first_artist(&track.artists),
                        title: track.name,
                    })
                    .collect();
                Ok(ElementMetadata::Playlist {
                    name: playlist.name,
                    tracks,
                    images: image_set(playlist.images),
                })
            }
        }
    }

    async fn search_once(
        &self,
        element_type: ElementType,
        query: &SearchQuery,
    ) -> Result<Option<ProviderResult>, ProviderError> {
        if element_type == ElementType::Playlist {
            return Err(ProviderError::UnsupportedType(element_type));
        }

        // The query terms are already percent-encoded, so the URL is built
        // by hand rather than through the client's query serializer.
        let url = format!(
            "{}/search?q={}&type={}&limit=1",
            API_BASE,
            query.encoded(),
            element_type
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
                "Spotify search returned {}",
                status
            )));
        }

        let results: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Search(e.to_string()))?;

        let hit = match element_type {
            ElementType::Track => results
                .tracks
                .and_then(|page| page.items.into_iter().next())
                .map(|track| ProviderResult {
                    provider: ProviderId::Spotify,
                    id: track.id.clone(),
                    link: track.external_urls.spotify.clone(),
                    metadata: track_metadata(&track),
                }),
            ElementType::Artist => results
                .artists
                .and_then(|page| page.items.into_iter().next())
                .map(|artist| ProviderResult {
                    provider: ProviderId::Spotify,
                    id: artist.id,
                    link: artist.external_urls.spotify,
                    metadata: ElementMetadata::Artist {
                        name: artist.name,
                        images: image_set(artist.images),
                    },
                }),
            ElementType::Album => results
                .albums
                .and_then(|page| page.items.into_iter().next())
                .map(|album| ProviderResult {
                    provider: ProviderId::Spotify,
                    id: album.id,
                    link: album.external_urls.spotify,
                    metadata: ElementMetadata::Album {
                        title: album.name,
                        artist: album.artists.first().map(|artist| artist.name.clone()),
                        images: image_set(album.images),
                    },
                }),
            ElementType::Playlist => None,
        };

        if hit.is_none() {
            tracing::debug!(terms = %query.terms(), "Spotify search returned no match");
        }

        Ok(hit)
    }
}
