//! Data structures and types for ReelStream
//!
//! Canonical shapes every upstream payload is normalized into:
//! - **Catalog**: listing items and title details with episodes
//! - **Streams**: playable sources, subtitle tracks and the resolved bundle

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// Catalog Models
// =============================================================================

/// Media type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Tv,
}

impl MediaType {
    /// Normalize the loose type labels used upstream.
    ///
    /// `tv`, `tv series`, `tvs` and `series` (any case) are TV; everything
    /// else, including a missing label, is a movie.
    pub fn from_str_loose(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("tv") | Some("tv series") | Some("tvs") | Some("series") => MediaType::Tv,
            _ => MediaType::Movie,
        }
    }

    /// Query-string value expected by the info endpoint
    pub fn as_query(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }

    /// The other type, used when an info lookup must be retried
    pub fn flipped(&self) -> Self {
        match self {
            MediaType::Movie => MediaType::Tv,
            MediaType::Tv => MediaType::Movie,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Movie => write!(f, "Movie"),
            MediaType::Tv => write!(f, "TV Show"),
        }
    }
}

/// A title as it appears in trending, popular and search listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub media_type: MediaType,
    pub release_date: Option<String>,
    pub rating: Option<f32>,
}

impl CatalogItem {
    /// Release year, when the date string starts with one
    pub fn year(&self) -> Option<u16> {
        self.release_date.as_deref().and_then(extract_year)
    }
}

impl fmt::Display for CatalogItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let year_str = self.year().map(|y| format!(" ({})", y)).unwrap_or_default();
        write!(f, "{}{} [{}]", self.title, year_str, self.media_type)
    }
}

/// One playable episode. Movies carry a single synthesized episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub number: u32,
    pub season: u32,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02} - {}", self.season, self.number, self.title)
    }
}

/// Full title details from the info endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub media_type: MediaType,
    pub description: Option<String>,
    pub release_date: Option<String>,
    pub rating: Option<f32>,
    pub genres: Vec<String>,
    pub duration: Option<String>,
    pub status: Option<String>,
    pub total_episodes: Option<u32>,
    pub recommendations: Vec<CatalogItem>,
    pub episodes: Vec<Episode>,
}

impl MediaInfo {
    /// Distinct season numbers, ascending
    pub fn seasons(&self) -> Vec<u32> {
        self.episodes
            .iter()
            .map(|e| e.season)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Episodes of one season ordered by episode number
    pub fn episodes_in_season(&self, season: u32) -> Vec<&Episode> {
        let mut episodes: Vec<&Episode> =
            self.episodes.iter().filter(|e| e.season == season).collect();
        episodes.sort_by_key(|e| e.number);
        episodes
    }

    /// Episode played when the user hits Play without picking one
    pub fn first_episode(&self) -> Option<&Episode> {
        self.episodes.first()
    }

    /// Look up an episode by id
    pub fn episode(&self, id: &str) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.id == id)
    }

    /// Whether the detail view lists episodes at all
    pub fn shows_episode_list(&self) -> bool {
        self.media_type == MediaType::Tv || self.episodes.len() > 1
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let year_str = self
            .release_date
            .as_deref()
            .and_then(extract_year)
            .map(|y| format!(" ({})", y))
            .unwrap_or_default();
        write!(
            f,
            "{}{} [{}] - {} episodes",
            self.title,
            year_str,
            self.media_type,
            self.episodes.len()
        )
    }
}

// =============================================================================
// Stream Models
// =============================================================================

/// One playable candidate. Position in its bundle encodes preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSource {
    pub url: String,
    #[serde(rename = "isM3U8")]
    pub is_m3u8: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quality = self.quality.as_deref().unwrap_or("auto");
        let format = if self.is_m3u8 { "HLS" } else { "file" };
        write!(f, "[{}] {} ({})", quality, self.url, format)
    }
}

/// External subtitle track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub url: String,
    pub lang: String,
}

/// Resolved streams for one (episode, media) pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamBundle {
    pub sources: Vec<StreamSource>,
    pub subtitles: Vec<SubtitleTrack>,
    /// Headers that must accompany manifest and segment requests
    pub headers: BTreeMap<String, String>,
}

impl StreamBundle {
    /// The soft-failure value: nothing to play
    pub fn empty() -> Self {
        Self::default()
    }

    /// A bundle without sources is unresolved even if the lookup succeeded
    pub fn is_playable(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Extract year from a date string like "2022-03-04"
pub fn extract_year(date: &str) -> Option<u16> {
    date.get(..4).and_then(|y| y.parse().ok())
}
