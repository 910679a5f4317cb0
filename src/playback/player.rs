//! Player configuration boundary
//!
//! Everything the playback controller hands to a video player: the media
//! URL, its container format, subtitle tracks and the request headers that
//! survive the deny-list. [`LocalPlayer`] drives VLC or mpv as a child
//! process; tests plug in their own [`PlayerBoundary`].

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;

use crate::models::{StreamBundle, StreamSource};

/// Header names players must never forward. Compared case-insensitively.
pub const FORBIDDEN_HEADERS: &[&str] = &[
    "referer",
    "user-agent",
    "host",
    "date",
    "connection",
    "content-length",
    "origin",
];

/// Drop every header on the deny-list, keeping the rest untouched
pub fn filter_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| {
            let lower = name.to_ascii_lowercase();
            !FORBIDDEN_HEADERS.contains(&lower.as_str())
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Container format hint for the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    /// HLS manifest
    Hls,
    /// Let the player sniff it
    #[default]
    Auto,
}

impl StreamFormat {
    /// Guess the format from a URL
    pub fn detect(url: &str) -> Self {
        if url.contains(".m3u8") || url.contains("playlist") {
            StreamFormat::Hls
        } else {
            StreamFormat::Auto
        }
    }

    /// Format for a resolved source; the upstream HLS flag wins over the URL
    pub fn for_source(source: &StreamSource) -> Self {
        if source.is_m3u8 {
            StreamFormat::Hls
        } else {
            Self::detect(&source.url)
        }
    }
}

/// Subtitle track as the player shows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleOption {
    pub url: String,
    pub label: String,
}

/// Everything needed to bind one source to a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub url: String,
    pub format: StreamFormat,
    pub poster: Option<String>,
    /// First entry is selected by default
    pub subtitles: Vec<SubtitleOption>,
    /// Already filtered through [`filter_headers`]
    pub headers: BTreeMap<String, String>,
}

impl PlayerConfig {
    /// Build the player input for one source of a bundle
    pub fn from_source(source: &StreamSource, bundle: &StreamBundle, poster: Option<&str>) -> Self {
        Self {
            url: source.url.clone(),
            format: StreamFormat::for_source(source),
            poster: poster.map(str::to_string),
            subtitles: bundle
                .subtitles
                .iter()
                .map(|s| SubtitleOption {
                    url: s.url.clone(),
                    label: s.lang.clone(),
                })
                .collect(),
            headers: filter_headers(&bundle.headers),
        }
    }

    /// Subtitle track shown when playback starts
    pub fn default_subtitle(&self) -> Option<&SubtitleOption> {
        self.subtitles.first()
    }
}

/// Rough class of a player failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Network,
    Media,
    Other,
}

/// Failure signal coming up from the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSignal {
    /// The player gave up on the stream
    Fatal(ErrorClass),
    /// Generic playback error
    Error,
}

impl PlayerSignal {
    pub fn is_network(&self) -> bool {
        matches!(self, PlayerSignal::Fatal(ErrorClass::Network))
    }
}

/// Errors from binding a player
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start player: {0}")]
    StartFailed(#[from] std::io::Error),
    #[error("Player rejected stream: {0}")]
    Rejected(String),
}

/// A surface that can play exactly one source at a time.
///
/// `release` must tolerate being called with nothing bound.
pub trait PlayerBoundary {
    fn bind(&mut self, config: &PlayerConfig) -> Result<(), PlayerError>;
    fn release(&mut self);
}

// =============================================================================
// Local Player (VLC / mpv)
// =============================================================================

/// Supported local players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerType {
    /// VLC media player (default)
    #[default]
    Vlc,
    /// mpv media player
    Mpv,
}

impl PlayerType {
    /// Get the command name for this player
    pub fn command(&self) -> &'static str {
        match self {
            PlayerType::Vlc => {
                // On macOS, VLC is an app bundle
                #[cfg(target_os = "macos")]
                if std::path::Path::new("/Applications/VLC.app").exists() {
                    return "/Applications/VLC.app/Contents/MacOS/VLC";
                }
                "vlc"
            }
            PlayerType::Mpv => "mpv",
        }
    }

    /// Get a display name for this player
    pub fn display_name(&self) -> &'static str {
        match self {
            PlayerType::Vlc => "VLC",
            PlayerType::Mpv => "mpv",
        }
    }

    /// Command-line arguments for one config
    pub fn args(&self, config: &PlayerConfig) -> Vec<String> {
        let mut args = vec![config.url.clone()];
        match self {
            PlayerType::Vlc => {
                if let Some(sub) = config.default_subtitle() {
                    args.push(format!("--input-slave={}", sub.url));
                }
                args.push("--no-video-title-show".to_string());
                args.push("--play-and-exit".to_string());
            }
            PlayerType::Mpv => {
                for sub in &config.subtitles {
                    args.push(format!("--sub-file={}", sub.url));
                }
                if !config.headers.is_empty() {
                    let fields: Vec<String> = config
                        .headers
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k, v.replace(',', "\\,")))
                        .collect();
                    args.push(format!("--http-header-fields={}", fields.join(",")));
                }
                args.push("--force-window=immediate".to_string());
            }
        }
        args
    }
}

impl std::fmt::Display for PlayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Stderr fragments (lowercase) that mean the stream could not be fetched
const NETWORK_MARKERS: &[&str] = &[
    "http error",
    "403 forbidden",
    "404 not found",
    "connection refused",
    "connection reset",
    "timed out",
    "could not resolve",
    "cannot resolve",
    "name or service not known",
    "network is unreachable",
    "tls:",
    "failed to open",
    "unable to open the mrl",
    "your input can't be opened",
];

/// Stderr fragments (lowercase) that mean the stream arrived but is unplayable
const MEDIA_MARKERS: &[&str] = &[
    "failed to recognize file format",
    "no video or audio streams",
    "invalid data found",
    "could not find codec",
    "no suitable decoder",
    "demux error",
];

/// How long a killed player gets to be reaped before `release` gives up on it
const REAP_TIMEOUT: Duration = Duration::from_secs(2);
const REAP_POLL: Duration = Duration::from_millis(10);

/// How long `wait` keeps reading stderr after the process exits
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Classify one line of player stderr. Network markers win over media ones.
pub fn classify_stderr_line(line: &str) -> Option<ErrorClass> {
    let lower = line.to_ascii_lowercase();
    if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        Some(ErrorClass::Network)
    } else if MEDIA_MARKERS.iter().any(|m| lower.contains(m)) {
        Some(ErrorClass::Media)
    } else {
        None
    }
}

/// Map a player exit onto the failure signal.
///
/// A classified stderr line is a failure even on a clean exit: VLC with
/// `--play-and-exit` returns 0 when it cannot open the stream.
pub fn exit_signal(success: bool, classified: Option<ErrorClass>) -> Option<PlayerSignal> {
    match (classified, success) {
        (Some(class), _) => Some(PlayerSignal::Fatal(class)),
        (None, true) => None,
        (None, false) => Some(PlayerSignal::Error),
    }
}

/// Read stderr to the end, keeping the first classified line
async fn scan_stderr(stderr: ChildStderr) -> Option<ErrorClass> {
    let mut lines = BufReader::new(stderr).lines();
    let mut class = None;
    while let Ok(Some(line)) = lines.next_line().await {
        if class.is_none() {
            class = classify_stderr_line(&line);
            if let Some(found) = class {
                tracing::debug!(class = ?found, line = %line, "Player reported failure");
            }
        }
    }
    class
}

/// Kill a child and wait until it is reaped. False if it outlived the timeout.
fn terminate(mut child: Child) -> bool {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Player already gone");
    }

    let deadline = Instant::now() + REAP_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) if Instant::now() < deadline => std::thread::sleep(REAP_POLL),
            Ok(None) => {
                tracing::warn!("Player did not exit after kill");
                return false;
            }
            Err(e) => {
                tracing::debug!(error = %e, "Could not reap player");
                return false;
            }
        }
    }
}

/// A spawned player and the task watching its stderr
struct Running {
    child: Child,
    stderr_scan: Option<JoinHandle<Option<ErrorClass>>>,
}

/// Plays sources in an external VLC or mpv process
pub struct LocalPlayer {
    player_type: PlayerType,
    running: Option<Running>,
}

impl LocalPlayer {
    /// Create a new local player with the specified type
    pub fn new(player_type: PlayerType) -> Self {
        Self {
            player_type,
            running: None,
        }
    }

    /// Get the player type
    pub fn player_type(&self) -> PlayerType {
        self.player_type
    }

    /// Whether a process is currently bound
    pub fn is_bound(&self) -> bool {
        self.running.is_some()
    }

    /// Check if the player is available on the system
    pub async fn is_available(&self) -> bool {
        let cmd = self.player_type.command();

        // Full path (macOS app bundle)
        if cmd.starts_with('/') {
            return std::path::Path::new(cmd).exists();
        }

        Command::new("which")
            .arg(cmd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Wait for the bound process to exit.
    ///
    /// Returns a signal when it failed, classified from its stderr where
    /// possible. `None` when the user closed it normally or nothing is bound.
    pub async fn wait(&mut self) -> Option<PlayerSignal> {
        let running = self.running.as_mut()?;
        let status = running.child.wait().await;

        let classified = match running.stderr_scan.take() {
            Some(scan) => match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, scan).await {
                Ok(Ok(class)) => class,
                _ => None,
            },
            None => None,
        };
        self.running = None;

        match status {
            Ok(status) => {
                tracing::debug!(?status, ?classified, "Player exited");
                exit_signal(status.success(), classified)
            }
            Err(e) => {
                tracing::error!(error = %e, "Lost track of player process");
                Some(PlayerSignal::Fatal(classified.unwrap_or(ErrorClass::Other)))
            }
        }
    }
}

impl PlayerBoundary for LocalPlayer {
    fn bind(&mut self, config: &PlayerConfig) -> Result<(), PlayerError> {
        if self.player_type == PlayerType::Vlc && !config.headers.is_empty() {
            tracing::warn!(
                count = config.headers.len(),
                "VLC cannot attach request headers, dropping them"
            );
        }

        let mut cmd = Command::new(self.player_type.command());
        cmd.args(self.player_type.args(config));
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlayerError::NotFound(self.player_type.command().to_string())
            } else {
                PlayerError::StartFailed(e)
            }
        })?;

        let stderr_scan = child.stderr.take().map(|stderr| tokio::spawn(scan_stderr(stderr)));

        tracing::info!(player = %self.player_type, url = %config.url, "Player started");
        self.running = Some(Running { child, stderr_scan });
        Ok(())
    }

    /// Kill the bound process and reap it before returning
    fn release(&mut self) {
        if let Some(running) = self.running.take() {
            if let Some(scan) = running.stderr_scan {
                scan.abort();
            }
            terminate(running.child);
        }
    }
}

impl Drop for LocalPlayer {
    fn drop(&mut self) {
        self.release();
    }
}
