//! Domain model for the Transpose service
//!
//! A "transposition" takes one provider's catalog element (track, artist,
//! album, playlist) and finds its equivalent on every other configured
//! provider. These types are shared between the provider adapters, the
//! orchestrator, the persistence layer and the HTTP boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Supported streaming providers, in fixed priority order.
///
/// The declaration order is load-bearing: when assembling a transposition
/// result, metadata is taken from the first provider in this order that
/// produced data, never from response arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Spotify,
    Apple,
}

impl ProviderId {
    /// All providers, in priority order.
    pub const ALL: [ProviderId; 2] = [ProviderId::Spotify, ProviderId::Apple];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Spotify => "spotify",
            ProviderId::Apple => "apple",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spotify" => Ok(ProviderId::Spotify),
            "apple" => Ok(ProviderId::Apple),
            other => Err(Error::InvalidInput(format!("Unknown provider: {}", other))),
        }
    }
}

/// Catalog element types understood by the service.
///
/// Providers that use a different vocabulary (Apple calls a track a "song")
/// translate at their own API boundary; this is the canonical naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Track,
    Artist,
    Album,
    Playlist,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Track => "track",
            ElementType::Artist => "artist",
            ElementType::Album => "album",
            ElementType::Playlist => "playlist",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(ElementType::Track),
            "artist" => Ok(ElementType::Artist),
            "album" => Ok(ElementType::Album),
            "playlist" => Ok(ElementType::Playlist),
            other => Err(Error::InvalidInput(format!("Unknown element type: {}", other))),
        }
    }
}

/// A single catalog item inside one provider's namespace.
///
/// Immutable once parsed from a share link. The storefront is only
/// meaningful for providers with region-scoped catalogs (Apple Music); it
/// never participates in link identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementReference {
    pub provider: ProviderId,
    pub element_type: ElementType,
    pub id: String,
    pub storefront: Option<String>,
}

impl ElementReference {
    /// Canonical identity of the referenced element.
    pub fn link_id(&self) -> LinkId {
        LinkId::new(self.provider, self.element_type, &self.id)
    }
}

/// Canonical `"{provider}:{type}:{id}"` identity of a source element.
///
/// A pure function of the triple: two share links that differ only by
/// storefront, locale segment or query-string noise normalize to the same
/// `LinkId` once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    pub fn new(provider: ProviderId, element_type: ElementType, id: &str) -> Self {
        LinkId(format!("{}:{}:{}", provider, element_type, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rehydrate a stored canonical id. Formatting is not re-validated; only
/// values produced by [`LinkId::new`] are ever persisted.
impl From<String> for LinkId {
    fn from(raw: String) -> Self {
        LinkId(raw)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Artwork URLs ordered large to small (by convention 640, 300, 64).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageSet(pub Vec<String>);

impl ImageSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One entry of a playlist's track listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistTrack {
    pub title: String,
    pub artist: String,
}

/// Metadata for a catalog element, tagged by element type.
///
/// Each variant carries only the fields meaningful for its type, so there
/// is never a question of which optional fields are populated for which
/// kind of element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementMetadata {
    Track {
        title: String,
        artist: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        album: Option<String>,
        #[serde(default, skip_serializing_if = "ImageSet::is_empty")]
        images: ImageSet,
    },
    Artist {
        name: String,
        #[serde(default, skip_serializing_if = "ImageSet::is_empty")]
        images: ImageSet,
    },
    Album {
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        artist: Option<String>,
        #[serde(default, skip_serializing_if = "ImageSet::is_empty")]
        images: ImageSet,
    },
    Playlist {
        name: String,
        tracks: Vec<PlaylistTrack>,
        #[serde(default, skip_serializing_if = "ImageSet::is_empty")]
        images: ImageSet,
    },
}

impl ElementMetadata {
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementMetadata::Track { .. } => ElementType::Track,
            ElementMetadata::Artist { .. } => ElementType::Artist,
            ElementMetadata::Album { .. } => ElementType::Album,
            ElementMetadata::Playlist { .. } => ElementType::Playlist,
        }
    }
}

/// Outcome of one destination provider's search: the matched element and
/// its share link on that provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider: ProviderId,
    pub id: String,
    pub link: String,
    pub metadata: ElementMetadata,
}

/// The stored and served payload of a transposition: what was matched and
/// where to find it on each provider.
///
/// `links` maps provider names to catalog URLs and additionally carries the
/// minted short link under the `"transpose"` key. A BTreeMap keeps the
/// serialized order deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransposeContent {
    pub metadata: ElementMetadata,
    pub links: BTreeMap<String, String>,
}

/// The persisted unit: one transposition, created at most once per distinct
/// `LinkId` and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransposeRecord {
    pub transpose_id: String,
    pub link_id: LinkId,
    pub search_terms: String,
    pub content: TransposeContent,
}
