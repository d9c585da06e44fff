//! Provider-agnostic search query construction
//!
//! Both providers search on free-text terms built from the source element's
//! metadata. The vocabulary split between them (Spotify says "track", Apple
//! says "song") is reconciled upstream by `ElementMetadata`; this module
//! only deals in the canonical title/artist/album slots.

use once_cell::sync::Lazy;
use regex::Regex;

use transpose_common::model::ElementMetadata;

static TRAILING_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("valid regex"));
static TRAILING_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[[^\]]*\]\s*$").expect("valid regex"));

/// A normalized search query. Building one from the same metadata is
/// deterministic, which keeps the relaxation retry reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
}

impl SearchQuery {
    pub fn from_metadata(metadata: &ElementMetadata) -> Self {
        match metadata {
            ElementMetadata::Track { title, artist, .. } => SearchQuery {
                artist: Some(artist.clone()),
                title: Some(title.clone()),
                album: None,
            },
            ElementMetadata::Artist { name, .. } => SearchQuery {
                artist: Some(name.clone()),
                title: None,
                album: None,
            },
            ElementMetadata::Album { title, artist, .. } => SearchQuery {
                artist: artist.clone(),
                title: None,
                album: Some(title.clone()),
            },
            ElementMetadata::Playlist { name, .. } => SearchQuery {
                artist: None,
                title: Some(name.clone()),
                album: None,
            },
        }
    }

    fn fields(&self) -> impl Iterator<Item = &str> {
        [&self.artist, &self.title, &self.album]
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Plain-text search terms, space separated. This is what gets stored
    /// alongside a transpose record.
    pub fn terms(&self) -> String {
        self.fields().collect::<Vec<_>>().join(" ")
    }

    /// URL-encoded search terms for use in provider query strings. Each
    /// field is encoded separately and joined with `%20`.
    pub fn encoded(&self) -> String {
        self.fields()
            .map(|field| urlencoding::encode(field).into_owned())
            .collect::<Vec<_>>()
            .join("%20")
    }

    /// Title relaxation: strip a trailing parenthetical or bracketed
    /// segment from the title, e.g. `"Song (feat. X)"` becomes `"Song"`.
    ///
    /// Returns `None` when relaxation changes nothing, which makes the
    /// caller's retry terminate after a single pass.
    pub fn relaxed(&self) -> Option<SearchQuery> {
        let title = self.title.as_deref()?;

        let cleaned = TRAILING_PAREN.replace(title, "");
        let cleaned = TRAILING_BRACKET.replace(&cleaned, "");
        let cleaned = cleaned.trim_end();

        // Trailing whitespace alone is not a relaxation; the retried query
        // would be identical to the original.
        if cleaned == title.trim_end() {
            return None;
        }

        tracing::debug!(title = %title, cleaned = %cleaned, "Relaxed search title");

        Some(SearchQuery {
            title: Some(cleaned.to_string()),
            ..self.clone()
        })
    }
}
