//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the appropriate backend services.
//! Each handler takes CLI args, the loaded config and Output, returns ExitCode.

use serde::Serialize;
use std::collections::BTreeMap;

use reelstream::api::StreamResolver;
use reelstream::app::{Catalog, TitleError, TitleView};
use reelstream::config::{Config, PlayerChoice};
use reelstream::models::{CatalogItem, MediaInfo, MediaType, StreamSource, SubtitleTrack};
use reelstream::playback::session::DEFAULT_MAX_RETRIES;
use reelstream::playback::{
    filter_headers, FailureReason, LocalPlayer, PlaybackSession, PlaybackState, PlayerBoundary,
    PlayerConfig, PlayerError, PlayerType, RecoveryPolicy,
};

use crate::cli::{
    ExitCode, HomeCmd, InfoCmd, Output, PlayCmd, PopularCmd, SearchCmd, SourcesCmd, TrendingCmd,
};

// =============================================================================
// Catalog Commands
// =============================================================================

/// Home listing as printed in JSON mode
#[derive(Debug, Serialize)]
struct HomeOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    featured: Option<CatalogItem>,
    trending: Vec<CatalogItem>,
    popular: Vec<CatalogItem>,
}

pub async fn home_cmd(cmd: HomeCmd, config: &Config, output: &Output) -> ExitCode {
    let client = config.client();
    output.info("Loading home...");

    let mut catalog = match Catalog::load(&client).await {
        Ok(catalog) => catalog,
        Err(e) => {
            return output.error(
                format!("{} Run `reelstream home` again to retry.", e),
                ExitCode::NetworkError,
            )
        }
    };
    catalog.trending.truncate(cmd.limit);
    catalog.popular.truncate(cmd.limit);

    let mut lines = Vec::new();
    if let Some(featured) = &catalog.featured {
        lines.push(format!("Featured: {}", featured));
    }
    for (heading, items) in [("Trending", &catalog.trending), ("Popular", &catalog.popular)] {
        if items.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(heading.to_string());
        lines.extend(items.iter().map(|item| format!("{:>10}  {}", item.id, item)));
    }

    let data = HomeOutput {
        featured: catalog.featured,
        trending: catalog.trending,
        popular: catalog.popular,
    };
    if let Err(e) = output.print_lines(&data, &lines) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

pub async fn trending_cmd(cmd: TrendingCmd, config: &Config, output: &Output) -> ExitCode {
    let client = config.client();
    output.info("Fetching trending...");

    let mut results = client.trending(cmd.kind.into()).await;
    if results.is_empty() {
        return output.error("No trending titles available", ExitCode::NetworkError);
    }
    results.truncate(cmd.limit);
    print_items(&results, output)
}

pub async fn popular_cmd(cmd: PopularCmd, config: &Config, output: &Output) -> ExitCode {
    let client = config.client();
    output.info("Fetching popular...");

    let mut results = client.popular().await;
    if results.is_empty() {
        return output.error("No popular titles available", ExitCode::NetworkError);
    }
    results.truncate(cmd.limit);
    print_items(&results, output)
}

pub async fn search_cmd(cmd: SearchCmd, config: &Config, output: &Output) -> ExitCode {
    if cmd.query.trim().is_empty() {
        return output.error("Search query is empty", ExitCode::InvalidArgs);
    }

    let client = config.client();
    output.info(format!("Searching for: {}", cmd.query));

    let mut results = client.search(&cmd.query).await;

    // Filter by media type if specified
    if let Some(filter) = cmd.media_type {
        let wanted = MediaType::from(filter);
        results.retain(|r| r.media_type == wanted);
    }

    results.truncate(cmd.limit);
    if results.is_empty() {
        output.info("No results found matching your search.");
    }
    print_items(&results, output)
}

fn print_items(items: &[CatalogItem], output: &Output) -> ExitCode {
    let lines: Vec<String> = items
        .iter()
        .map(|item| format!("{:>10}  {}", item.id, item))
        .collect();

    if let Err(e) = output.print_lines(items, &lines) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Info Command
// =============================================================================

pub async fn info_cmd(cmd: InfoCmd, config: &Config, output: &Output) -> ExitCode {
    let client = config.client();
    output.info(format!("Getting info for: {}", cmd.id));

    let mut info = match client.info(&cmd.id, cmd.media_type.into()).await {
        Ok(info) => info,
        Err(e) => {
            return output.error(
                format!("{} ({})", TitleError::InfoUnavailable(e), cmd.id),
                ExitCode::NotFound,
            )
        }
    };

    if let Some(season) = cmd.season {
        if !info.seasons().contains(&season) {
            return output.error(
                format!("Season {} not found", season),
                ExitCode::InvalidArgs,
            );
        }
        info.episodes.retain(|e| e.season == season);
    }

    if let Err(e) = output.print_lines(&info, &info_lines(&info)) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

fn info_lines(info: &MediaInfo) -> Vec<String> {
    let mut lines = vec![info.to_string()];
    if let Some(description) = &info.description {
        lines.push(description.clone());
    }
    if !info.genres.is_empty() {
        lines.push(format!("Genres: {}", info.genres.join(", ")));
    }

    if info.shows_episode_list() {
        for season in info.seasons() {
            lines.push(String::new());
            lines.push(format!("Season {}", season));
            for episode in info.episodes_in_season(season) {
                lines.push(format!("  {:>10}  {}", episode.id, episode));
            }
        }
    }
    lines
}

// =============================================================================
// Sources Command
// =============================================================================

/// Resolved streams as the player would see them
#[derive(Debug, Serialize)]
struct SourcesOutput {
    episode_id: String,
    media_id: String,
    sources: Vec<StreamSource>,
    subtitles: Vec<SubtitleTrack>,
    headers: BTreeMap<String, String>,
    /// Headers left after the player deny-list
    player_headers: BTreeMap<String, String>,
}

pub async fn sources_cmd(cmd: SourcesCmd, config: &Config, output: &Output) -> ExitCode {
    let client = config.client();
    let item = placeholder_item(&cmd.id, cmd.media_type.into());

    let view = match TitleView::open(&client, item, PlaybackSession::new(NoPlayer)).await {
        Ok(view) => view,
        Err(e) => return output.error(e.to_string(), ExitCode::NotFound),
    };

    let episode_id = match view.episode_to_play(cmd.episode.as_deref()) {
        Ok(id) => id,
        Err(e) => return output.error(e.to_string(), ExitCode::NoStreams),
    };
    let media_id = view.info().id.clone();

    output.info(format!("Resolving streams for episode {}", episode_id));
    let bundle = client.resolve_stream(&episode_id, &media_id).await;
    if !bundle.is_playable() {
        return output.error(FailureReason::NoSources.to_string(), ExitCode::NoStreams);
    }

    let lines: Vec<String> = bundle
        .sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{:>3}  {}", i, s))
        .chain(bundle.subtitles.iter().map(|s| format!("  sub  {} {}", s.lang, s.url)))
        .collect();

    let data = SourcesOutput {
        episode_id,
        media_id,
        player_headers: filter_headers(&bundle.headers),
        sources: bundle.sources,
        subtitles: bundle.subtitles,
        headers: bundle.headers,
    };

    if let Err(e) = output.print_lines(&data, &lines) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

/// Player stand-in for commands that only inspect a title
struct NoPlayer;

impl PlayerBoundary for NoPlayer {
    fn bind(&mut self, _config: &PlayerConfig) -> Result<(), PlayerError> {
        Err(PlayerError::Rejected("no player attached".to_string()))
    }

    fn release(&mut self) {}
}

// =============================================================================
// Play Command
// =============================================================================

/// Final playback outcome
#[derive(Debug, Serialize)]
struct PlayOutput {
    episode_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

pub async fn play_cmd(cmd: PlayCmd, config: &Config, output: &Output) -> ExitCode {
    let client = config.client();

    let choice = cmd.player.map(PlayerChoice::from).unwrap_or(config.player);
    let player = LocalPlayer::new(PlayerType::from(choice));
    if !player.is_available().await {
        return output.error(
            format!(
                "Player '{}' not found. Install it first.",
                player.player_type().command()
            ),
            ExitCode::Error,
        );
    }

    let policy = match (cmd.retry, cmd.max_retries) {
        (_, Some(max_retries)) => RecoveryPolicy::RetryInPlace { max_retries },
        (true, None) => match config.recovery_policy() {
            policy @ RecoveryPolicy::RetryInPlace { .. } => policy,
            RecoveryPolicy::AdvanceImmediately => RecoveryPolicy::RetryInPlace {
                max_retries: DEFAULT_MAX_RETRIES,
            },
        },
        (false, None) => config.recovery_policy(),
    };
    let session = PlaybackSession::new(player).with_policy(policy);

    output.info(format!("Loading {}...", cmd.id));
    let item = placeholder_item(&cmd.id, cmd.media_type.into());
    let mut view = match TitleView::open(&client, item, session).await {
        Ok(view) => view,
        Err(e) => return output.error(e.to_string(), ExitCode::NotFound),
    };

    if let Err(e) = view.play(&client, cmd.episode.as_deref()).await {
        return output.error(e.to_string(), ExitCode::NoStreams);
    }

    run_playback(&mut view, output).await
}

/// Feed player exits back into the session until it settles
async fn run_playback(view: &mut TitleView<LocalPlayer>, output: &Output) -> ExitCode {
    let mut announced: Option<String> = None;

    loop {
        let episode_id = match view.session().state() {
            PlaybackState::Playing(attempt) => {
                let url = attempt.current_source().url.clone();
                if announced.as_deref() != Some(url.as_str()) {
                    let label = view
                        .now_playing()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| attempt.episode_id().to_string());
                    output.info(format!(
                        "Playing {} [source {}/{}]",
                        label,
                        attempt.index() + 1,
                        attempt.bundle().sources.len()
                    ));
                    announced = Some(url);
                }
                attempt.episode_id().to_string()
            }
            PlaybackState::ExhaustedFailure { reason, .. } => {
                let code = match reason {
                    FailureReason::NoSources => ExitCode::NoStreams,
                    FailureReason::SourcesExhausted => ExitCode::PlaybackFailed,
                };
                return output.error(reason.to_string(), code);
            }
            other => {
                tracing::error!(state = ?other.kind(), "Playback loop in unexpected state");
                return output.error("Playback ended unexpectedly", ExitCode::Error);
            }
        };

        let signal = tokio::select! {
            signal = view.session_mut().player_mut().wait() => signal,
            _ = tokio::signal::ctrl_c() => None,
        };

        match signal {
            Some(signal) => {
                output.info(format!("Source failed ({:?}), recovering...", signal));
                view.session_mut().report_player_error(signal);
            }
            None => {
                let source = view.session().current_source().map(|s| s.url.clone());
                view.close_player();
                let result = PlayOutput {
                    episode_id,
                    status: "closed",
                    source,
                };
                if output.json {
                    if let Err(e) = output.print(&result) {
                        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                    }
                }
                return ExitCode::Success;
            }
        }
    }
}

/// Catalog entry for a title known only by id
fn placeholder_item(id: &str, media_type: MediaType) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        title: String::new(),
        image: None,
        media_type,
        release_date: None,
        rating: None,
    }
}
