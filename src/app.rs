//! App state and core application logic
//!
//! The two screens that sit on top of the playback core:
//! - [`Catalog`]: home listing (trending + popular) with a featured pick
//! - [`TitleView`]: one title's details, season selection and play dispatch

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::api::{ConsumetClient, ConsumetError, StreamResolver, TrendingKind};
use crate::models::{CatalogItem, Episode, MediaInfo};
use crate::playback::{PlaybackSession, PlaybackState, PlayerBoundary};

/// How many of the top trending titles can be featured
const FEATURED_POOL: usize = 5;

// =============================================================================
// Catalog
// =============================================================================

/// Home screen failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Neither listing produced anything; the user retries manually
    #[error("Unable to load content. The streaming server may be busy or unreachable.")]
    Unavailable,
}

/// Home screen content
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub trending: Vec<CatalogItem>,
    pub popular: Vec<CatalogItem>,
    pub featured: Option<CatalogItem>,
}

impl Catalog {
    /// Fetch trending and popular side by side
    pub async fn load(client: &ConsumetClient) -> Result<Self, CatalogError> {
        let (trending, popular) =
            tokio::join!(client.trending(TrendingKind::All), client.popular());
        Self::from_lists(trending, popular, time_seed())
    }

    /// Assemble the home screen. Both lists empty is a whole-screen error.
    pub fn from_lists(
        trending: Vec<CatalogItem>,
        popular: Vec<CatalogItem>,
        seed: usize,
    ) -> Result<Self, CatalogError> {
        if trending.is_empty() && popular.is_empty() {
            tracing::warn!("Both catalog listings came back empty");
            return Err(CatalogError::Unavailable);
        }

        let featured = pick_featured(&trending, seed);
        Ok(Self {
            trending,
            popular,
            featured,
        })
    }
}

/// One of the first few trending titles
fn pick_featured(trending: &[CatalogItem], seed: usize) -> Option<CatalogItem> {
    let pool = trending.len().min(FEATURED_POOL);
    if pool == 0 {
        return None;
    }
    trending.get(seed % pool).cloned()
}

fn time_seed() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as usize)
        .unwrap_or(0)
}

// =============================================================================
// Title View
// =============================================================================

/// Detail view failures, each carrying the message the user sees
#[derive(Debug, Error)]
pub enum TitleError {
    #[error("Failed to load media details.")]
    InfoUnavailable(#[source] ConsumetError),

    #[error("No episodes available to play.")]
    NoEpisodes,
}

/// Details of one title plus the playback session it owns
pub struct TitleView<P: PlayerBoundary> {
    item: CatalogItem,
    info: MediaInfo,
    selected_season: u32,
    session: PlaybackSession<P>,
}

impl<P: PlayerBoundary> TitleView<P> {
    /// Load details for a catalog item. Failure blocks the view; reopening
    /// is the retry.
    pub async fn open(
        client: &ConsumetClient,
        item: CatalogItem,
        session: PlaybackSession<P>,
    ) -> Result<Self, TitleError> {
        match client.info(&item.id, item.media_type).await {
            Ok(info) => Ok(Self::from_info(item, info, session)),
            Err(e) => {
                tracing::error!(id = %item.id, error = %e, "Failed to load info");
                Err(TitleError::InfoUnavailable(e))
            }
        }
    }

    pub fn from_info(item: CatalogItem, info: MediaInfo, mut session: PlaybackSession<P>) -> Self {
        let selected_season = info.seasons().first().copied().unwrap_or(1);
        session.set_poster(info.image.clone().or_else(|| item.image.clone()));
        Self {
            item,
            info,
            selected_season,
            session,
        }
    }

    pub fn item(&self) -> &CatalogItem {
        &self.item
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    pub fn selected_season(&self) -> u32 {
        self.selected_season
    }

    /// Switch the episode list to another season. False if it has none.
    pub fn select_season(&mut self, season: u32) -> bool {
        if self.info.seasons().contains(&season) {
            self.selected_season = season;
            true
        } else {
            false
        }
    }

    /// Episodes of the selected season, in order
    pub fn episodes(&self) -> Vec<&Episode> {
        self.info.episodes_in_season(self.selected_season)
    }

    /// Episode id a Play action resolves to
    pub fn episode_to_play(&self, episode_id: Option<&str>) -> Result<String, TitleError> {
        match episode_id {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => self
                .info
                .first_episode()
                .map(|e| e.id.clone())
                .ok_or(TitleError::NoEpisodes),
        }
    }

    /// Play an episode, or the first one when none is given
    pub async fn play<R: StreamResolver>(
        &mut self,
        resolver: &R,
        episode_id: Option<&str>,
    ) -> Result<&PlaybackState, TitleError> {
        let episode_id = self.episode_to_play(episode_id)?;
        let media_id = self.info.id.clone();
        Ok(self.session.play(resolver, &episode_id, &media_id).await)
    }

    /// Episode the session is working on
    pub fn now_playing(&self) -> Option<&Episode> {
        let episode_id = match self.session.state() {
            PlaybackState::Resolving { episode_id, .. }
            | PlaybackState::ExhaustedFailure { episode_id, .. } => episode_id.as_str(),
            PlaybackState::Ready(a)
            | PlaybackState::Playing(a)
            | PlaybackState::RecoveringSource(a) => a.episode_id(),
            PlaybackState::Idle | PlaybackState::Closed => return None,
        };
        self.info.episode(episode_id)
    }

    pub fn session(&self) -> &PlaybackSession<P> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlaybackSession<P> {
        &mut self.session
    }

    /// Leave the player overlay, back to the episode list
    pub fn close_player(&mut self) {
        self.session.close();
    }
}
