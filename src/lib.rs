//! ReelStream - streaming catalog client with source failover
//!
//! Lists trending and popular titles, searches, loads title details and
//! plays an episode by walking its ranked stream sources until one works.
//!
//! # Modules
//!
//! - `models` - Catalog items, title details, stream sources and bundles
//! - `api` - Consumet client and response normalization
//! - `playback` - Player boundary and the playback session state machine
//! - `app` - Catalog home screen and title detail view
//! - `config` - Config file and environment overrides

pub mod models;
pub mod api;
pub mod playback;
pub mod app;
pub mod config;

// Re-export commonly used types
pub use models::{
    CatalogItem, Episode, MediaInfo, MediaType, StreamBundle, StreamSource, SubtitleTrack,
};

pub use api::{ConsumetClient, ConsumetError, StreamResolver};
pub use app::{Catalog, TitleView};
pub use playback::{PlaybackSession, PlaybackState, PlayerBoundary, RecoveryPolicy};
