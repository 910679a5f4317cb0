//! CLI - Command Line Interface for ReelStream
//!
//! Every catalog and playback action is scriptable. All output is
//! JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Browse and search
//! reelstream home
//! reelstream trending --type tv
//! reelstream search "the batman" --json
//!
//! # Inspect a title and its streams
//! reelstream info 1396 -t tv --season 2
//! reelstream sources 1396 -t tv -e 62085
//!
//! # Play with source failover
//! reelstream play 414906 --player mpv --retry
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use reelstream::api::TrendingKind;
use reelstream::config::PlayerChoice;
use reelstream::models::MediaType;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error or empty catalog
    NetworkError = 3,
    /// Title details unavailable
    NotFound = 4,
    /// No stream sources available
    NoStreams = 5,
    /// Every source failed to play
    PlaybackFailed = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// ReelStream - browse, search and play streaming titles
#[derive(Parser, Debug)]
#[command(
    name = "reelstream",
    version,
    about = "Browse, search and play streaming titles with source failover",
    after_help = "EXAMPLES:\n\
                  reelstream trending                  Trending titles\n\
                  reelstream search \"blade runner\"     Search for content\n\
                  reelstream info 1396 -t tv           Title details and episodes\n\
                  reelstream play 1396 -t tv -e 62085  Play an episode"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Verbose logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Home listing: featured title, trending and popular
    #[command(visible_alias = "h")]
    Home(HomeCmd),

    /// Get trending content
    #[command(visible_alias = "tr")]
    Trending(TrendingCmd),

    /// Get popular movies
    #[command(visible_alias = "pop")]
    Popular(PopularCmd),

    /// Search for movies and TV shows
    #[command(visible_alias = "s")]
    Search(SearchCmd),

    /// Get details and episodes for a title
    #[command(visible_alias = "i")]
    Info(InfoCmd),

    /// Resolve stream sources for an episode
    #[command(visible_alias = "src")]
    Sources(SourcesCmd),

    /// Play an episode locally with source failover
    #[command(visible_alias = "p")]
    Play(PlayCmd),
}

/// Media type selector
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaTypeArg {
    #[default]
    Movie,
    Tv,
}

impl From<MediaTypeArg> for MediaType {
    fn from(arg: MediaTypeArg) -> Self {
        match arg {
            MediaTypeArg::Movie => MediaType::Movie,
            MediaTypeArg::Tv => MediaType::Tv,
        }
    }
}

// =============================================================================
// Catalog Commands
// =============================================================================

/// Show the home listing
#[derive(Args, Debug)]
pub struct HomeCmd {
    /// Maximum number of titles per row
    #[arg(long, short = 'l', default_value = "10")]
    pub limit: usize,
}

/// Get trending movies and TV shows
#[derive(Args, Debug)]
pub struct TrendingCmd {
    /// Which slice of the trending feed
    #[arg(long = "type", short = 't', value_enum, default_value = "all")]
    pub kind: TrendingArg,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

/// Trending feed selector
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendingArg {
    #[default]
    All,
    Movie,
    Tv,
}

impl From<TrendingArg> for TrendingKind {
    fn from(arg: TrendingArg) -> Self {
        match arg {
            TrendingArg::All => TrendingKind::All,
            TrendingArg::Movie => TrendingKind::Movie,
            TrendingArg::Tv => TrendingKind::Tv,
        }
    }
}

/// Get popular movies
#[derive(Args, Debug)]
pub struct PopularCmd {
    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

/// Search for movies and TV shows by query
#[derive(Args, Debug)]
pub struct SearchCmd {
    /// Search query (title, keywords)
    #[arg(required = true)]
    pub query: String,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,

    /// Filter by media type
    #[arg(long, short = 't', value_enum)]
    pub media_type: Option<MediaTypeArg>,
}

// =============================================================================
// Title Commands
// =============================================================================

/// Get detailed information about a title
#[derive(Args, Debug)]
pub struct InfoCmd {
    /// Catalog id (from trending/popular/search output)
    #[arg(required = true)]
    pub id: String,

    /// Media type to try first (the other one is tried on failure)
    #[arg(long, short = 't', value_enum, default_value = "movie")]
    pub media_type: MediaTypeArg,

    /// Only list episodes of this season
    #[arg(long, short = 's')]
    pub season: Option<u32>,
}

/// Resolve stream sources for an episode
#[derive(Args, Debug)]
pub struct SourcesCmd {
    /// Catalog id of the title
    #[arg(required = true)]
    pub id: String,

    /// Media type to try first
    #[arg(long, short = 't', value_enum, default_value = "movie")]
    pub media_type: MediaTypeArg,

    /// Episode id (default: first episode)
    #[arg(long, short = 'e')]
    pub episode: Option<String>,
}

/// Play an episode in a local player
#[derive(Args, Debug)]
pub struct PlayCmd {
    /// Catalog id of the title
    #[arg(required = true)]
    pub id: String,

    /// Media type to try first
    #[arg(long, short = 't', value_enum, default_value = "movie")]
    pub media_type: MediaTypeArg,

    /// Episode id (default: first episode)
    #[arg(long, short = 'e')]
    pub episode: Option<String>,

    /// Player to use (overrides config)
    #[arg(long, short = 'p', value_enum)]
    pub player: Option<PlayerArg>,

    /// Retry network failures in place before moving to the next source
    #[arg(long)]
    pub retry: bool,

    /// In-place retry cap (implies --retry)
    #[arg(long)]
    pub max_retries: Option<u32>,
}

/// Local player selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerArg {
    Vlc,
    Mpv,
}

impl From<PlayerArg> for PlayerChoice {
    fn from(arg: PlayerArg) -> Self {
        match arg {
            PlayerArg::Vlc => PlayerChoice::Vlc,
            PlayerArg::Mpv => PlayerChoice::Mpv,
        }
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print human-readable lines, or the data as JSON in JSON mode
    pub fn print_lines<T: Serialize>(&self, data: T, lines: &[String]) -> anyhow::Result<()> {
        if self.json {
            return self.print(data);
        }
        for line in lines {
            println!("{}", line);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
