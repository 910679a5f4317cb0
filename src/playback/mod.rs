//! Playback core
//!
//! - Player: configuration boundary and the VLC/mpv implementation
//! - Session: resolution + source failover state machine

pub mod player;
pub mod session;

pub use player::{
    classify_stderr_line, exit_signal, filter_headers, ErrorClass, LocalPlayer, PlayerBoundary,
    PlayerConfig, PlayerError, PlayerSignal, PlayerType, StreamFormat,
};
pub use session::{
    AttemptId, FailureReason, PlaybackAttempt, PlaybackSession, PlaybackState, RecoveryPolicy,
    StateKind,
};
