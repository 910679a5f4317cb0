//! Consumet metadata/streaming API client
//!
//! Catalog listings, title details and stream resolution from the
//! `meta/tmdb` provider. Upstream payloads are loosely shaped (the same
//! field shows up under different names depending on the endpoint), so
//! every response goes through the `parse_*` functions below before
//! anything else sees it.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::models::{
    CatalogItem, Episode, MediaInfo, MediaType, StreamBundle, StreamSource, SubtitleTrack,
};

/// Public Consumet deployment used when nothing is configured
pub const DEFAULT_BASE_URL: &str = "https://consumet-alpha-steel.vercel.app";

const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

/// Consumet API error types
#[derive(Error, Debug)]
pub enum ConsumetError {
    #[error("Resource not found (404)")]
    NotFound,

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// Which slice of the trending feed to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendingKind {
    #[default]
    All,
    Movie,
    Tv,
}

impl TrendingKind {
    fn as_query(&self) -> &'static str {
        match self {
            TrendingKind::All => "all",
            TrendingKind::Movie => "movie",
            TrendingKind::Tv => "tv",
        }
    }
}

/// Listing endpoint a catalog payload came from. Each one names the media
/// type differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    /// `media_type` first, then `type`
    Trending,
    /// Always movies
    Popular,
    /// `type` first, then `media_type`
    Search,
}

/// Anything that can turn an episode into a bundle of playable sources
#[allow(async_fn_in_trait)]
pub trait StreamResolver {
    /// Resolve streams. Never fails: failures come back as an empty bundle.
    async fn resolve_stream(&self, episode_id: &str, media_id: &str) -> StreamBundle;
}

/// Consumet API client
#[derive(Debug, Clone)]
pub struct ConsumetClient {
    base_url: String,
    client: reqwest::Client,
}

impl ConsumetClient {
    /// Create a client against the public deployment
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing or self-hosting)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_http_client(Duration::from_secs(30)),
        }
    }

    /// Replace the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_http_client(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET an endpoint under `meta/tmdb` and return the body on 2xx
    async fn get_body(&self, endpoint: &str) -> Result<String, ConsumetError> {
        let url = format!("{}/meta/tmdb{}", self.base_url, endpoint);
        tracing::debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.text().await?),
            StatusCode::NOT_FOUND => Err(ConsumetError::NotFound),
            status => Err(ConsumetError::Status(status.as_u16())),
        }
    }

    /// Trending titles. Empty on any failure.
    pub async fn trending(&self, kind: TrendingKind) -> Vec<CatalogItem> {
        let endpoint = format!("/trending?type={}", kind.as_query());
        self.catalog(&endpoint, CatalogSource::Trending).await
    }

    /// Popular titles (movies). Empty on any failure.
    pub async fn popular(&self) -> Vec<CatalogItem> {
        self.catalog("/popular", CatalogSource::Popular).await
    }

    /// Free-text search. Empty on any failure or blank query.
    pub async fn search(&self, query: &str) -> Vec<CatalogItem> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let endpoint = format!("/{}", urlencoding::encode(query));
        self.catalog(&endpoint, CatalogSource::Search).await
    }

    async fn catalog(&self, endpoint: &str, source: CatalogSource) -> Vec<CatalogItem> {
        let result = match self.get_body(endpoint).await {
            Ok(body) => parse_catalog(&body, source),
            Err(e) => Err(e),
        };

        match result {
            Ok(items) => {
                tracing::debug!(?source, count = items.len(), "Catalog loaded");
                items
            }
            Err(e) => {
                tracing::error!(?source, error = %e, "Catalog fetch failed");
                Vec::new()
            }
        }
    }

    /// Title details including the flattened episode list.
    ///
    /// The lookup is tried with the requested type first and once more with
    /// the other type. When both fail the first error is returned.
    pub async fn info(&self, id: &str, media_type: MediaType) -> Result<MediaInfo, ConsumetError> {
        let first = self.info_as(id, media_type).await;
        let first_err = match first {
            Ok(info) => return Ok(info),
            Err(e) => e,
        };

        let fallback = media_type.flipped();
        tracing::warn!(
            id,
            tried = media_type.as_query(),
            error = %first_err,
            "Info lookup failed, retrying with alternate type"
        );

        match self.info_as(id, fallback).await {
            Ok(info) => Ok(info),
            Err(e) => {
                tracing::error!(id, tried = fallback.as_query(), error = %e, "Info retry failed");
                Err(first_err)
            }
        }
    }

    async fn info_as(&self, id: &str, media_type: MediaType) -> Result<MediaInfo, ConsumetError> {
        let endpoint = format!(
            "/info/{}?type={}",
            urlencoding::encode(id),
            media_type.as_query()
        );
        let body = self.get_body(&endpoint).await?;
        parse_media_info(&body, id, media_type)
    }

    /// Stream lookup with the error surfaced (used by diagnostics)
    pub async fn try_resolve_stream(
        &self,
        episode_id: &str,
        media_id: &str,
    ) -> Result<StreamBundle, ConsumetError> {
        let endpoint = format!(
            "/watch/{}?id={}",
            urlencoding::encode(episode_id),
            urlencoding::encode(media_id)
        );
        let body = self.get_body(&endpoint).await?;
        parse_stream_bundle(&body)
    }
}

impl StreamResolver for ConsumetClient {
    async fn resolve_stream(&self, episode_id: &str, media_id: &str) -> StreamBundle {
        if episode_id.trim().is_empty() || media_id.trim().is_empty() {
            tracing::warn!(episode_id, media_id, "Refusing stream lookup with empty id");
            return StreamBundle::empty();
        }

        tracing::info!(episode_id, media_id, "Resolving stream");
        match self.try_resolve_stream(episode_id, media_id).await {
            Ok(bundle) => {
                if !bundle.is_playable() {
                    tracing::warn!(episode_id, "No stream sources returned");
                }
                bundle
            }
            Err(e) => {
                tracing::error!(episode_id, error = %e, "Stream lookup failed");
                StreamBundle::empty()
            }
        }
    }
}

impl Default for ConsumetClient {
    fn default() -> Self {
        Self::new()
    }
}

fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

// =============================================================================
// Normalization
// =============================================================================

/// Parse a listing payload (`{"results": [...]}`)
pub fn parse_catalog(body: &str, source: CatalogSource) -> Result<Vec<CatalogItem>, ConsumetError> {
    let raw: CatalogResponse = from_json(body)?;
    Ok(raw
        .results
        .into_iter()
        .map(|r| r.into_item(source))
        .collect())
}

/// Parse an info payload into a [`MediaInfo`].
///
/// `requested_id` and `used_type` stand in for fields the payload omits.
pub fn parse_media_info(
    body: &str,
    requested_id: &str,
    used_type: MediaType,
) -> Result<MediaInfo, ConsumetError> {
    let raw: InfoRaw = from_json(body)?;
    Ok(raw.into_info(requested_id, used_type))
}

/// Parse a watch payload. Missing fields become empty containers.
pub fn parse_stream_bundle(body: &str) -> Result<StreamBundle, ConsumetError> {
    let raw: WatchResponse = from_json(body)?;
    Ok(StreamBundle {
        sources: raw.sources.into_iter().map(SourceRaw::into_source).collect(),
        subtitles: raw
            .subtitles
            .into_iter()
            .map(|s| SubtitleTrack {
                url: s.url,
                lang: s.lang.unwrap_or_else(|| "Unknown".to_string()),
            })
            .collect(),
        headers: raw.headers,
    })
}

fn from_json<T: DeserializeOwned>(body: &str) -> Result<T, ConsumetError> {
    serde_json::from_str(body)
        .map_err(|e| ConsumetError::InvalidResponse(format!("JSON parse error: {}", e)))
}

fn tmdb_image(path: Option<&str>) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{}{}", TMDB_IMAGE_BASE, p))
}

fn pick_image(
    image: Option<String>,
    poster: Option<&str>,
    backdrop: Option<&str>,
) -> Option<String> {
    image
        .filter(|i| !i.is_empty())
        .or_else(|| tmdb_image(poster))
        .or_else(|| tmdb_image(backdrop))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

/// Ids arrive as numbers from TMDB-backed endpoints and as strings elsewhere
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LooseId {
    Text(String),
    Number(serde_json::Number),
}

impl LooseId {
    fn into_string(self) -> String {
        match self {
            LooseId::Text(s) => s,
            LooseId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    fn as_f64(&self) -> Option<f64> {
        match self {
            LooseNumber::Number(n) => Some(*n),
            LooseNumber::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_u32(&self) -> Option<u32> {
        self.as_f64()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u32)
    }
}

/// Episode artwork: a URL or an object of size variants
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ImageRaw {
    Url(String),
    Variants {
        hd: Option<String>,
        mobile: Option<String>,
    },
}

impl ImageRaw {
    fn into_url(self) -> Option<String> {
        match self {
            ImageRaw::Url(url) => non_empty(Some(url)),
            ImageRaw::Variants { hd, mobile } => non_empty(hd).or_else(|| non_empty(mobile)),
        }
    }
}

/// Accept any JSON for a list field: non-arrays become empty and elements
/// that do not fit `T` are skipped.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Header maps: non-object becomes empty, non-string values are stringified
fn lenient_headers<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                Value::Null => None,
                other => Some((k, other.to_string())),
            })
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Deserialize leniently, turning a value of the wrong shape into `None`
fn lenient_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    results: Vec<CatalogRaw>,
}

#[derive(Debug, Deserialize)]
struct CatalogRaw {
    id: LooseId,
    // Movies use "title", TV uses "name"
    title: Option<String>,
    name: Option<String>,
    image: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    media_type: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
    first_air_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt")]
    rating: Option<LooseNumber>,
}

impl CatalogRaw {
    fn into_item(self, source: CatalogSource) -> CatalogItem {
        let media_type = match source {
            CatalogSource::Trending => {
                MediaType::from_str_loose(self.media_type.as_deref().or(self.kind.as_deref()))
            }
            CatalogSource::Search => {
                MediaType::from_str_loose(self.kind.as_deref().or(self.media_type.as_deref()))
            }
            CatalogSource::Popular => MediaType::Movie,
        };

        let release_date = match source {
            CatalogSource::Popular => non_empty(self.release_date),
            _ => non_empty(self.release_date).or_else(|| non_empty(self.first_air_date)),
        };

        CatalogItem {
            id: self.id.into_string(),
            title: non_empty(self.title).or(self.name).unwrap_or_default(),
            image: pick_image(
                self.image,
                self.poster_path.as_deref(),
                self.backdrop_path.as_deref(),
            ),
            media_type,
            release_date,
            rating: self.rating.and_then(|r| r.as_f64()).map(|r| r as f32),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InfoRaw {
    #[serde(default, deserialize_with = "lenient_opt")]
    id: Option<LooseId>,
    title: Option<String>,
    name: Option<String>,
    image: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "episodeId", default, deserialize_with = "lenient_opt")]
    episode_id: Option<LooseId>,
    description: Option<String>,
    overview: Option<String>,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
    first_air_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt")]
    rating: Option<LooseNumber>,
    #[serde(default, deserialize_with = "lenient_vec")]
    genres: Vec<String>,
    #[serde(default, deserialize_with = "lenient_opt")]
    duration: Option<LooseId>,
    status: Option<String>,
    #[serde(rename = "totalEpisodes", default, deserialize_with = "lenient_opt")]
    total_episodes: Option<LooseNumber>,
    #[serde(default, deserialize_with = "lenient_vec")]
    recommendations: Vec<CatalogRaw>,
    #[serde(default, deserialize_with = "lenient_vec")]
    seasons: Vec<SeasonRaw>,
    #[serde(default, deserialize_with = "lenient_vec")]
    episodes: Vec<EpisodeRaw>,
}

impl InfoRaw {
    fn into_info(self, requested_id: &str, used_type: MediaType) -> MediaInfo {
        let media_type = match self.kind.as_deref() {
            Some(kind) if !kind.is_empty() => MediaType::from_str_loose(Some(kind)),
            _ => used_type,
        };
        let title = non_empty(self.title).or(self.name);

        // Season-nested episodes win; the root list is the fallback
        let mut episodes: Vec<Episode> = Vec::new();
        for season in self.seasons {
            let season_number = season
                .season_number
                .as_ref()
                .or(season.season.as_ref())
                .and_then(LooseNumber::as_u32)
                .filter(|n| *n > 0);
            for raw in season.episodes {
                episodes.push(raw.into_episode(season_number));
            }
        }
        if episodes.is_empty() {
            episodes = self
                .episodes
                .into_iter()
                .map(|raw| raw.into_episode(None))
                .collect();
        }

        if media_type == MediaType::Movie && episodes.is_empty() {
            let episode_id = self
                .episode_id
                .map(LooseId::into_string)
                .unwrap_or_else(|| requested_id.to_string());
            episodes.push(Episode {
                id: episode_id,
                title: title.clone().unwrap_or_else(|| "Full Movie".to_string()),
                number: 1,
                season: 1,
                description: None,
                image: None,
            });
        }

        let recommendations = self
            .recommendations
            .into_iter()
            .map(|r| r.into_item(CatalogSource::Search))
            .collect();

        MediaInfo {
            id: self
                .id
                .map(LooseId::into_string)
                .unwrap_or_else(|| requested_id.to_string()),
            title: title.unwrap_or_default(),
            image: pick_image(
                self.image,
                self.poster_path.as_deref(),
                self.backdrop_path.as_deref(),
            ),
            media_type,
            description: non_empty(self.description).or_else(|| non_empty(self.overview)),
            release_date: non_empty(self.release_date).or_else(|| non_empty(self.first_air_date)),
            rating: self.rating.and_then(|r| r.as_f64()).map(|r| r as f32),
            genres: self.genres,
            duration: self.duration.map(LooseId::into_string),
            status: self.status,
            total_episodes: self.total_episodes.and_then(|n| n.as_u32()),
            recommendations,
            episodes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeasonRaw {
    #[serde(default, deserialize_with = "lenient_opt")]
    season_number: Option<LooseNumber>,
    #[serde(default, deserialize_with = "lenient_opt")]
    season: Option<LooseNumber>,
    #[serde(default, deserialize_with = "lenient_vec")]
    episodes: Vec<EpisodeRaw>,
}

#[derive(Debug, Deserialize)]
struct EpisodeRaw {
    #[serde(default, deserialize_with = "lenient_opt")]
    id: Option<LooseId>,
    #[serde(rename = "episodeId", default, deserialize_with = "lenient_opt")]
    episode_id: Option<LooseId>,
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt")]
    episode_number: Option<LooseNumber>,
    #[serde(default, deserialize_with = "lenient_opt")]
    number: Option<LooseNumber>,
    #[serde(default, deserialize_with = "lenient_opt")]
    season_number: Option<LooseNumber>,
    #[serde(default, deserialize_with = "lenient_opt")]
    season: Option<LooseNumber>,
    overview: Option<String>,
    description: Option<String>,
    still_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt")]
    img: Option<ImageRaw>,
    image: Option<String>,
}

impl EpisodeRaw {
    fn into_episode(self, parent_season: Option<u32>) -> Episode {
        let number = self
            .episode_number
            .as_ref()
            .and_then(LooseNumber::as_u32)
            .filter(|n| *n > 0)
            .or_else(|| self.number.as_ref().and_then(LooseNumber::as_u32))
            .unwrap_or(0);

        let season_number = self
            .season_number
            .as_ref()
            .and_then(LooseNumber::as_u32)
            .filter(|n| *n > 0);
        let season = self
            .season
            .as_ref()
            .and_then(LooseNumber::as_u32)
            .filter(|n| *n > 0);

        // TMDB still -> img variants -> plain image
        let image = tmdb_image(self.still_path.as_deref())
            .or_else(|| self.img.and_then(ImageRaw::into_url))
            .or_else(|| non_empty(self.image));

        Episode {
            id: self
                .episode_id
                .or(self.id)
                .map(LooseId::into_string)
                .unwrap_or_default(),
            title: non_empty(self.title).unwrap_or_else(|| format!("Episode {}", number)),
            number,
            season: season_number.or(parent_season).or(season).unwrap_or(1),
            description: non_empty(self.overview).or_else(|| non_empty(self.description)),
            image,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WatchResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    sources: Vec<SourceRaw>,
    #[serde(default, deserialize_with = "lenient_vec")]
    subtitles: Vec<SubtitleRaw>,
    #[serde(default, deserialize_with = "lenient_headers")]
    headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SourceRaw {
    url: String,
    #[serde(rename = "isM3U8", default)]
    is_m3u8: Option<bool>,
    quality: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl SourceRaw {
    fn into_source(self) -> StreamSource {
        StreamSource {
            url: self.url,
            is_m3u8: self.is_m3u8.unwrap_or(false),
            quality: non_empty(self.quality),
            kind: non_empty(self.kind),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubtitleRaw {
    url: String,
    lang: Option<String>,
}
