//! Playback Session Tests
//!
//! Drives the session state machine through a recording player: source
//! ordering, failover, stale results, teardown and recovery policies.

mod common;

use common::{bundle, bundle_with_extras, PlayerEvent, RecordingPlayer, TableResolver};
use reelstream::models::StreamBundle;
use reelstream::playback::{
    classify_stderr_line, exit_signal, ErrorClass, FailureReason, PlaybackSession, PlaybackState,
    PlayerSignal, RecoveryPolicy, StateKind, StreamFormat,
};

fn session() -> PlaybackSession<RecordingPlayer> {
    PlaybackSession::new(RecordingPlayer::new())
}

fn bound_url(session: &PlaybackSession<RecordingPlayer>) -> Option<&str> {
    session.current_source().map(|s| s.url.as_str())
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[tokio::test]
async fn test_empty_bundle_fails_without_binding() {
    let resolver = TableResolver::with("ep1", StreamBundle::empty());
    let mut session = session();

    let state = session.play(&resolver, "ep1", "m1").await;
    assert!(matches!(
        state,
        PlaybackState::ExhaustedFailure {
            reason: FailureReason::NoSources,
            ..
        }
    ));

    assert_eq!(
        session.history(),
        &[StateKind::Resolving, StateKind::ExhaustedFailure]
    );
    assert_eq!(session.error_message().as_deref(), Some("No stream sources found."));
    assert!(session.player().binds().is_empty());
    assert_eq!(
        resolver.calls.borrow().as_slice(),
        &[("ep1".to_string(), "m1".to_string())]
    );
}

#[test]
fn test_play_binds_first_source() {
    let resolver = TableResolver::with("ep1", bundle(&["s0", "s1"]));
    let mut session = session();

    tokio_test::block_on(session.play(&resolver, "ep1", "m1"));

    assert_eq!(session.kind(), StateKind::Playing);
    assert_eq!(bound_url(&session), Some("s0"));
    assert_eq!(session.attempt().map(|a| a.episode_id()), Some("ep1"));
    assert_eq!(
        session.history(),
        &[StateKind::Resolving, StateKind::Ready, StateKind::Playing]
    );
}

// =============================================================================
// Failover Tests
// =============================================================================

#[tokio::test]
async fn test_two_sources_fail_over_then_exhaust() {
    let resolver = TableResolver::with("ep1", bundle(&["s0", "s1"]));
    let mut session = session();

    session.play(&resolver, "ep1", "m1").await;
    assert_eq!(bound_url(&session), Some("s0"));

    session.report_player_error(PlayerSignal::Error);
    assert_eq!(session.kind(), StateKind::Playing);
    assert_eq!(bound_url(&session), Some("s1"));

    session.report_player_error(PlayerSignal::Error);
    assert_eq!(session.kind(), StateKind::ExhaustedFailure);
    assert_eq!(
        session.error_message().as_deref(),
        Some("Unable to play video. Please try again later or select a different episode.")
    );

    // Failover never goes back to the network
    assert_eq!(resolver.calls.borrow().len(), 1);
    assert_eq!(
        session.history(),
        &[
            StateKind::Resolving,
            StateKind::Ready,
            StateKind::Playing,
            StateKind::RecoveringSource,
            StateKind::Playing,
            StateKind::RecoveringSource,
            StateKind::ExhaustedFailure,
        ]
    );
}

#[test]
fn test_sources_tried_in_order() {
    for n in 1..=5 {
        let urls: Vec<String> = (0..n).map(|i| format!("s{}", i)).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();

        let mut session = session();
        let attempt = session.request_play("ep");
        assert!(session.apply_resolution(attempt, bundle(&refs)));

        for i in 0..n {
            assert_eq!(session.kind(), StateKind::Playing, "n={} i={}", n, i);
            assert_eq!(session.attempt().map(|a| a.index()), Some(i));
            session.report_player_error(PlayerSignal::Fatal(ErrorClass::Media));
        }

        assert_eq!(session.kind(), StateKind::ExhaustedFailure);
        assert_eq!(session.player().binds(), urls);
    }
}

#[test]
fn test_release_precedes_every_bind() {
    let mut session = session();
    let attempt = session.request_play("ep");
    session.apply_resolution(attempt, bundle(&["s0", "s1", "s2"]));
    session.report_player_error(PlayerSignal::Error);
    session.report_player_error(PlayerSignal::Error);

    let events = &session.player().events;
    for (i, event) in events.iter().enumerate() {
        if let PlayerEvent::Bind(url) = event {
            assert!(i > 0, "bind of {} with nothing released first", url);
            assert_eq!(events[i - 1], PlayerEvent::Release, "bind of {}", url);
        }
    }
    assert_eq!(session.player().max_live_instances, 1);
}

#[test]
fn test_bind_failure_advances() {
    let mut session = PlaybackSession::new(RecordingPlayer::rejecting(&["s0"]));
    let attempt = session.request_play("ep");
    session.apply_resolution(attempt, bundle(&["s0", "s1"]));

    assert_eq!(session.kind(), StateKind::Playing);
    assert_eq!(bound_url(&session), Some("s1"));
    assert_eq!(session.player().binds(), vec!["s1"]);
    assert_eq!(session.player().configs.len(), 2);
    assert!(session.history().contains(&StateKind::RecoveringSource));
}

#[test]
fn test_all_binds_failing_exhausts() {
    let mut session = PlaybackSession::new(RecordingPlayer::rejecting(&["s0", "s1"]))
        .with_policy(RecoveryPolicy::RetryInPlace { max_retries: 3 });
    let attempt = session.request_play("ep");
    session.apply_resolution(attempt, bundle(&["s0", "s1"]));

    // Bind failures are not network errors, so they are never retried
    assert_eq!(session.player().configs.len(), 2);
    assert!(matches!(
        session.state(),
        PlaybackState::ExhaustedFailure {
            reason: FailureReason::SourcesExhausted,
            ..
        }
    ));
}

// =============================================================================
// Stale Result Tests
// =============================================================================

#[test]
fn test_superseded_resolution_is_dropped() {
    let mut session = session();

    let first = session.request_play("A");
    let second = session.request_play("B");
    assert_ne!(first, second);

    assert!(!session.apply_resolution(first, bundle(&["a0"])));
    assert!(matches!(
        session.state(),
        PlaybackState::Resolving { episode_id, .. } if episode_id == "B"
    ));
    assert!(session.player().binds().is_empty());

    assert!(session.apply_resolution(second, bundle(&["b0"])));
    assert_eq!(bound_url(&session), Some("b0"));
    assert_eq!(session.attempt().map(|a| a.episode_id()), Some("B"));
}

#[test]
fn test_resolution_after_close_is_dropped() {
    let mut session = session();
    let attempt = session.request_play("ep");
    session.close();

    assert!(!session.apply_resolution(attempt, bundle(&["s0"])));
    assert_eq!(session.kind(), StateKind::Closed);
    assert!(session.player().binds().is_empty());
}

// =============================================================================
// Teardown Tests
// =============================================================================

#[test]
fn test_close_is_idempotent() {
    let mut session = session();
    let attempt = session.request_play("ep");
    session.apply_resolution(attempt, bundle(&["s0"]));

    session.close();
    let releases = session.player().releases();
    assert_eq!(session.kind(), StateKind::Closed);
    assert!(session.player().bound().is_none());

    session.close();
    assert_eq!(session.player().releases(), releases);
    assert_eq!(session.kind(), StateKind::Closed);
}

#[test]
fn test_errors_ignored_outside_playing() {
    let mut session = session();

    session.report_player_error(PlayerSignal::Error);
    assert_eq!(session.kind(), StateKind::Idle);

    let attempt = session.request_play("ep");
    session.report_player_error(PlayerSignal::Fatal(ErrorClass::Network));
    assert_eq!(session.history(), &[StateKind::Resolving]);

    session.apply_resolution(attempt, StreamBundle::empty());
    let history = session.history().to_vec();
    session.report_player_error(PlayerSignal::Error);
    assert_eq!(session.history(), history.as_slice());

    session.close();
    session.report_player_error(PlayerSignal::Error);
    assert_eq!(session.kind(), StateKind::Closed);
    assert!(session.player().binds().is_empty());
}

#[tokio::test]
async fn test_play_again_after_terminal_states() {
    let mut resolver = TableResolver::with("ep1", bundle(&["s0"]));
    resolver.bundles.insert("ep2".to_string(), bundle(&["t0", "t1"]));
    let mut session = session();

    session.play(&resolver, "ep1", "m1").await;
    session.report_player_error(PlayerSignal::Error);
    assert_eq!(session.kind(), StateKind::ExhaustedFailure);

    session.play(&resolver, "ep2", "m1").await;
    assert_eq!(session.kind(), StateKind::Playing);
    assert_eq!(bound_url(&session), Some("t0"));
    assert_eq!(session.history()[0], StateKind::Resolving);

    session.close();
    session.play(&resolver, "ep1", "m1").await;
    assert_eq!(bound_url(&session), Some("s0"));
    assert_eq!(resolver.calls.borrow().len(), 3);
}

// =============================================================================
// Recovery Policy Tests
// =============================================================================

#[test]
fn test_retry_in_place_caps_network_errors() {
    let mut session = session().with_policy(RecoveryPolicy::RetryInPlace { max_retries: 3 });
    let attempt = session.request_play("ep");
    session.apply_resolution(attempt, bundle(&["s0", "s1"]));

    for retry in 1..=3 {
        session.report_player_error(PlayerSignal::Fatal(ErrorClass::Network));
        assert_eq!(bound_url(&session), Some("s0"));
        assert_eq!(session.attempt().map(|a| a.retries()), Some(retry));
    }

    // Cap reached: the fourth network error moves on with a fresh budget
    session.report_player_error(PlayerSignal::Fatal(ErrorClass::Network));
    assert_eq!(bound_url(&session), Some("s1"));
    assert_eq!(session.attempt().map(|a| a.retries()), Some(0));

    // Media errors advance right away
    session.report_player_error(PlayerSignal::Fatal(ErrorClass::Media));
    assert_eq!(session.kind(), StateKind::ExhaustedFailure);
    assert_eq!(session.player().binds(), vec!["s0", "s0", "s0", "s0", "s1"]);
}

/// Signal a local player would report for an exit with this stderr
fn player_exit(success: bool, stderr: &[&str]) -> PlayerSignal {
    let classified = stderr.iter().find_map(|line| classify_stderr_line(line));
    exit_signal(success, classified).expect("exit should be a failure")
}

#[test]
fn test_player_http_failure_retries_in_place() {
    let mut session = session().with_policy(RecoveryPolicy::RetryInPlace { max_retries: 3 });
    let attempt = session.request_play("ep");
    session.apply_resolution(attempt, bundle(&["s0", "s1"]));

    // mpv exits 2 after the CDN refuses the manifest
    let signal = player_exit(false, &["[ffmpeg] https: HTTP error 403 Forbidden"]);
    assert_eq!(signal, PlayerSignal::Fatal(ErrorClass::Network));

    session.report_player_error(signal);
    assert_eq!(bound_url(&session), Some("s0"));
    assert_eq!(session.attempt().map(|a| a.retries()), Some(1));

    // An unclassified crash still moves on
    session.report_player_error(player_exit(false, &["Segmentation fault"]));
    assert_eq!(bound_url(&session), Some("s1"));
    assert_eq!(session.attempt().map(|a| a.retries()), Some(0));
}

#[test]
fn test_vlc_clean_exit_after_open_failure_fails_over() {
    let mut session = session();
    let attempt = session.request_play("ep");
    session.apply_resolution(attempt, bundle(&["s0", "s1"]));

    // VLC with --play-and-exit returns 0 even when the MRL cannot be opened
    let signal = player_exit(
        true,
        &["[0000] main input error: VLC is unable to open the MRL 'https://cdn/s0'."],
    );
    session.report_player_error(signal);

    assert_eq!(session.kind(), StateKind::Playing);
    assert_eq!(bound_url(&session), Some("s1"));
}

#[test]
fn test_advance_policy_ignores_error_class() {
    let mut session = session();
    assert_eq!(session.policy(), RecoveryPolicy::AdvanceImmediately);

    let attempt = session.request_play("ep");
    session.apply_resolution(attempt, bundle(&["s0", "s1"]));
    session.report_player_error(PlayerSignal::Fatal(ErrorClass::Network));

    assert_eq!(bound_url(&session), Some("s1"));
}

// =============================================================================
// Player Input Tests
// =============================================================================

#[test]
fn test_player_receives_filtered_headers_and_extras() {
    let mut session = session();
    session.set_poster(Some("https://img/poster.jpg".to_string()));

    let attempt = session.request_play("ep");
    session.apply_resolution(
        attempt,
        bundle_with_extras(
            &["https://cdn/a.m3u8"],
            &[("Referer", "x"), ("User-Agent", "y"), ("X-Api-Key", "k")],
        ),
    );

    let config = &session.player().configs[0];
    assert_eq!(config.headers.len(), 1);
    assert_eq!(config.headers.get("X-Api-Key").map(String::as_str), Some("k"));
    assert_eq!(config.format, StreamFormat::Hls);
    assert_eq!(config.poster.as_deref(), Some("https://img/poster.jpg"));
    assert_eq!(
        config.default_subtitle().map(|s| s.label.as_str()),
        Some("English")
    );

    // The attempt keeps the unfiltered headers for diagnostics
    assert_eq!(session.attempt().map(|a| a.bundle().headers.len()), Some(3));
}
