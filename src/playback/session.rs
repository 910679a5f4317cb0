//! Playback session controller
//!
//! Owns one "trying to play this episode" lifecycle: waits for stream
//! resolution, binds the best source to the player, and fails over down the
//! ranked source list whenever the player reports an error.
//!
//! ```text
//! Idle ──request_play──▶ Resolving ──empty bundle──▶ ExhaustedFailure
//!                            │
//!                        sources ≥ 1
//!                            ▼
//!                          Ready ──bind #0──▶ Playing ◀──bind #i+1──┐
//!                                               │                  │
//!                                          player error            │
//!                                               ▼                  │
//!                                        RecoveringSource ─────────┘
//!                                               │ no candidates left
//!                                               ▼
//!                                        ExhaustedFailure
//! ```
//!
//! `close()` moves any state to `Closed`. A new `request_play()` from any
//! state starts a fresh attempt; results for older attempts are dropped.

use std::fmt;
use thiserror::Error;

use crate::api::StreamResolver;
use crate::models::{StreamBundle, StreamSource};
use crate::playback::player::{ErrorClass, PlayerBoundary, PlayerConfig, PlayerSignal};

/// Default cap on in-place re-binds for network failures
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Token tying an async resolution result to the attempt that asked for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What to do when the active source fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    /// Every failure moves on to the next source
    #[default]
    AdvanceImmediately,
    /// Re-bind the same source after fatal network errors, up to
    /// `max_retries` times, before moving on. Other failures advance.
    RetryInPlace { max_retries: u32 },
}

/// Terminal failure shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("No stream sources found.")]
    NoSources,
    #[error("Unable to play video. Please try again later or select a different episode.")]
    SourcesExhausted,
}

/// Live attempt on a non-empty bundle.
///
/// `index` always points into `bundle.sources`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackAttempt {
    id: AttemptId,
    episode_id: String,
    bundle: StreamBundle,
    index: usize,
    retries: u32,
}

impl PlaybackAttempt {
    fn new(id: AttemptId, episode_id: String, bundle: StreamBundle) -> Option<Self> {
        if !bundle.is_playable() {
            return None;
        }
        Some(Self {
            id,
            episode_id,
            bundle,
            index: 0,
            retries: 0,
        })
    }

    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn episode_id(&self) -> &str {
        &self.episode_id
    }

    pub fn bundle(&self) -> &StreamBundle {
        &self.bundle
    }

    /// Index of the source currently handed to the player
    pub fn index(&self) -> usize {
        self.index
    }

    /// In-place retries spent on the current source
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn current_source(&self) -> &StreamSource {
        &self.bundle.sources[self.index]
    }

    /// Sources not yet tried
    pub fn remaining(&self) -> usize {
        self.bundle.sources.len() - self.index - 1
    }

    /// Move to the next candidate. False when none is left.
    fn advance(&mut self) -> bool {
        if self.index + 1 < self.bundle.sources.len() {
            self.index += 1;
            self.retries = 0;
            true
        } else {
            false
        }
    }
}

/// Controller state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Resolving {
        attempt: AttemptId,
        episode_id: String,
    },
    Ready(PlaybackAttempt),
    Playing(PlaybackAttempt),
    RecoveringSource(PlaybackAttempt),
    ExhaustedFailure {
        episode_id: String,
        reason: FailureReason,
    },
    Closed,
}

/// Payload-free view of [`PlaybackState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Idle,
    Resolving,
    Ready,
    Playing,
    RecoveringSource,
    ExhaustedFailure,
    Closed,
}

impl PlaybackState {
    pub fn kind(&self) -> StateKind {
        match self {
            PlaybackState::Idle => StateKind::Idle,
            PlaybackState::Resolving { .. } => StateKind::Resolving,
            PlaybackState::Ready(_) => StateKind::Ready,
            PlaybackState::Playing(_) => StateKind::Playing,
            PlaybackState::RecoveringSource(_) => StateKind::RecoveringSource,
            PlaybackState::ExhaustedFailure { .. } => StateKind::ExhaustedFailure,
            PlaybackState::Closed => StateKind::Closed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackState::ExhaustedFailure { .. } | PlaybackState::Closed
        )
    }
}

/// Drives one player through resolution and source failover
pub struct PlaybackSession<P: PlayerBoundary> {
    player: P,
    policy: RecoveryPolicy,
    poster: Option<String>,
    state: PlaybackState,
    next_attempt: u64,
    /// States entered since the current attempt started
    history: Vec<StateKind>,
}

impl<P: PlayerBoundary> PlaybackSession<P> {
    pub fn new(player: P) -> Self {
        Self {
            player,
            policy: RecoveryPolicy::default(),
            poster: None,
            state: PlaybackState::Idle,
            next_attempt: 0,
            history: vec![StateKind::Idle],
        }
    }

    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Poster image handed to the player with every source
    pub fn set_poster(&mut self, poster: Option<String>) {
        self.poster = poster;
    }

    pub fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn kind(&self) -> StateKind {
        self.state.kind()
    }

    pub fn history(&self) -> &[StateKind] {
        &self.history
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Attempt in flight, if a source is bound or about to be
    pub fn attempt(&self) -> Option<&PlaybackAttempt> {
        match &self.state {
            PlaybackState::Ready(a)
            | PlaybackState::Playing(a)
            | PlaybackState::RecoveringSource(a) => Some(a),
            _ => None,
        }
    }

    pub fn current_source(&self) -> Option<&StreamSource> {
        self.attempt().map(PlaybackAttempt::current_source)
    }

    /// User-facing message for a terminal failure
    pub fn error_message(&self) -> Option<String> {
        match &self.state {
            PlaybackState::ExhaustedFailure { reason, .. } => Some(reason.to_string()),
            _ => None,
        }
    }

    /// Start a fresh attempt for an episode, superseding whatever runs now.
    ///
    /// The caller resolves streams and feeds them back through
    /// [`apply_resolution`](Self::apply_resolution) with the returned id.
    pub fn request_play(&mut self, episode_id: impl Into<String>) -> AttemptId {
        let episode_id = episode_id.into();
        self.player.release();

        self.next_attempt += 1;
        let attempt = AttemptId(self.next_attempt);
        tracing::info!(%attempt, episode_id = %episode_id, "Play requested");

        self.history.clear();
        self.enter(PlaybackState::Resolving {
            attempt,
            episode_id,
        });
        attempt
    }

    /// Apply a resolution result. Returns false when the result belongs to
    /// a superseded or closed attempt and was dropped.
    pub fn apply_resolution(&mut self, attempt: AttemptId, bundle: StreamBundle) -> bool {
        let episode_id = match &self.state {
            PlaybackState::Resolving {
                attempt: current,
                episode_id,
            } if *current == attempt => episode_id.clone(),
            _ => {
                tracing::debug!(%attempt, "Dropping stale resolution");
                return false;
            }
        };

        match PlaybackAttempt::new(attempt, episode_id.clone(), bundle) {
            Some(live) => {
                tracing::info!(
                    %attempt,
                    sources = live.bundle.sources.len(),
                    subtitles = live.bundle.subtitles.len(),
                    "Streams resolved"
                );
                self.enter(PlaybackState::Ready(live.clone()));
                self.bind(live);
            }
            None => {
                tracing::warn!(%attempt, episode_id = %episode_id, "Nothing to play");
                self.enter(PlaybackState::ExhaustedFailure {
                    episode_id,
                    reason: FailureReason::NoSources,
                });
            }
        }
        true
    }

    /// Resolve and start an episode in one go
    pub async fn play<R: StreamResolver>(
        &mut self,
        resolver: &R,
        episode_id: &str,
        media_id: &str,
    ) -> &PlaybackState {
        let attempt = self.request_play(episode_id);
        let bundle = resolver.resolve_stream(episode_id, media_id).await;
        self.apply_resolution(attempt, bundle);
        &self.state
    }

    /// Handle a failure reported by the player. Ignored unless playing.
    pub fn report_player_error(&mut self, signal: PlayerSignal) {
        if !matches!(self.state, PlaybackState::Playing(_)) {
            tracing::debug!(state = ?self.kind(), ?signal, "Ignoring player error");
            return;
        }

        if let PlaybackState::Playing(live) = self.take_state() {
            tracing::warn!(
                attempt = %live.id,
                index = live.index,
                url = %live.current_source().url,
                ?signal,
                "Source failed"
            );
            if let Some(next) = self.recover(live, signal) {
                self.bind(next);
            }
        }
    }

    /// Tear down the player and end the session. Repeated calls do nothing.
    pub fn close(&mut self) {
        if self.state == PlaybackState::Closed {
            return;
        }
        self.player.release();
        tracing::info!(state = ?self.kind(), "Playback closed");
        self.enter(PlaybackState::Closed);
    }

    fn take_state(&mut self) -> PlaybackState {
        std::mem::take(&mut self.state)
    }

    fn enter(&mut self, state: PlaybackState) {
        tracing::debug!(from = ?self.kind(), to = ?state.kind(), "Transition");
        self.history.push(state.kind());
        self.state = state;
    }

    /// Bind the attempt's current source, failing over on bind errors
    fn bind(&mut self, mut live: PlaybackAttempt) {
        loop {
            let config = PlayerConfig::from_source(
                live.current_source(),
                &live.bundle,
                self.poster.as_deref(),
            );

            match self.player.bind(&config) {
                Ok(()) => {
                    tracing::info!(
                        attempt = %live.id,
                        index = live.index,
                        remaining = live.remaining(),
                        url = %config.url,
                        "Source bound"
                    );
                    self.enter(PlaybackState::Playing(live));
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = %live.id,
                        index = live.index,
                        error = %e,
                        "Bind failed"
                    );
                    match self.recover(live, PlayerSignal::Fatal(ErrorClass::Other)) {
                        Some(next) => live = next,
                        None => return,
                    }
                }
            }
        }
    }

    /// Decide what follows a failed source: same source again, the next
    /// one, or terminal failure (returns `None`).
    fn recover(
        &mut self,
        mut live: PlaybackAttempt,
        signal: PlayerSignal,
    ) -> Option<PlaybackAttempt> {
        // At most one live player: the failed one is gone before any re-bind
        self.player.release();
        self.enter(PlaybackState::RecoveringSource(live.clone()));

        if let RecoveryPolicy::RetryInPlace { max_retries } = self.policy {
            if signal.is_network() && live.retries < max_retries {
                live.retries += 1;
                tracing::info!(
                    attempt = %live.id,
                    retry = live.retries,
                    max_retries,
                    "Retrying source in place"
                );
                return Some(live);
            }
        }

        if live.advance() {
            tracing::info!(attempt = %live.id, index = live.index, "Failing over to next source");
            return Some(live);
        }

        tracing::error!(
            attempt = %live.id,
            tried = live.bundle.sources.len(),
            "All sources failed"
        );
        self.enter(PlaybackState::ExhaustedFailure {
            episode_id: live.episode_id,
            reason: FailureReason::SourcesExhausted,
        });
        None
    }
}
