//! End-to-End Flow Tests
//!
//! Home -> Title -> Play -> Failover against a mock Consumet deployment,
//! with a recording player standing in for the video surface.

mod common;

use mockito::{Matcher, Mock, Server, ServerGuard};
use reelstream::api::ConsumetClient;
use reelstream::app::{Catalog, CatalogError, TitleError, TitleView};
use reelstream::models::{CatalogItem, MediaType};
use reelstream::playback::{PlaybackSession, PlayerSignal, StateKind};

use common::RecordingPlayer;

const SHOW_INFO: &str = r#"{
    "id": "1396",
    "title": "Breaking Bad",
    "type": "TV Series",
    "image": "https://img/bb.jpg",
    "seasons": [
        {"season": 2, "episodes": [
            {"id": "s2e1", "title": "Seven Thirty-Seven", "episode_number": 1}
        ]},
        {"season": 1, "episodes": [
            {"id": "s1e2", "title": "Cat's in the Bag", "episode_number": 2},
            {"id": "s1e1", "title": "Pilot", "episode_number": 1}
        ]}
    ]
}"#;

const TWO_SOURCES: &str = r#"{
    "headers": {"Referer": "https://origin.example", "X-Api-Key": "k"},
    "sources": [
        {"url": "https://cdn/a.m3u8", "isM3U8": true, "quality": "1080p"},
        {"url": "https://cdn/b.m3u8", "isM3U8": true, "quality": "720p"}
    ],
    "subtitles": [{"url": "https://subs/en.vtt", "lang": "English"}]
}"#;

fn item(id: &str, media_type: MediaType) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        title: String::new(),
        image: None,
        media_type,
        release_date: None,
        rating: None,
    }
}

async fn mock_info(
    server: &mut ServerGuard,
    id: &str,
    kind: &str,
    status: usize,
    body: &str,
) -> Mock {
    server
        .mock("GET", format!("/meta/tmdb/info/{}", id).as_str())
        .match_query(Matcher::UrlEncoded("type".into(), kind.into()))
        .with_status(status)
        .with_body(body)
        .create_async()
        .await
}

async fn mock_watch(
    server: &mut ServerGuard,
    episode_id: &str,
    media_id: &str,
    body: &str,
) -> Mock {
    server
        .mock("GET", format!("/meta/tmdb/watch/{}", episode_id).as_str())
        .match_query(Matcher::UrlEncoded("id".into(), media_id.into()))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await
}

// =============================================================================
// Home Screen
// =============================================================================

#[tokio::test]
async fn test_catalog_load_both_empty_is_unavailable() {
    let mut server = Server::new_async().await;

    let _trending = server
        .mock("GET", "/meta/tmdb/trending")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;
    let _popular = server
        .mock("GET", "/meta/tmdb/popular")
        .with_status(200)
        .with_body(r#"{"results": []}"#)
        .create_async()
        .await;

    let client = ConsumetClient::with_base_url(server.url());
    let err = Catalog::load(&client).await.unwrap_err();

    assert_eq!(err, CatalogError::Unavailable);
    assert!(err.to_string().starts_with("Unable to load content."));
}

#[tokio::test]
async fn test_catalog_load_features_trending_title() {
    let mut server = Server::new_async().await;

    let _trending = server
        .mock("GET", "/meta/tmdb/trending")
        .match_query(Matcher::UrlEncoded("type".into(), "all".into()))
        .with_status(200)
        .with_body(r#"{"results": [{"id": 1, "title": "Only"}]}"#)
        .create_async()
        .await;
    let _popular = server
        .mock("GET", "/meta/tmdb/popular")
        .with_status(500)
        .create_async()
        .await;

    let client = ConsumetClient::with_base_url(server.url());
    let catalog = Catalog::load(&client).await.unwrap();

    assert!(catalog.popular.is_empty());
    assert_eq!(catalog.featured.map(|f| f.id), Some("1".to_string()));
}

// =============================================================================
// Title -> Play
// =============================================================================

#[tokio::test]
async fn test_show_flow_with_failover() {
    let mut server = Server::new_async().await;
    let _info = mock_info(&mut server, "1396", "tv", 200, SHOW_INFO).await;
    let _watch = mock_watch(&mut server, "s1e1", "1396", TWO_SOURCES).await;

    let client = ConsumetClient::with_base_url(server.url());
    let session = PlaybackSession::new(RecordingPlayer::new());
    let mut view = TitleView::open(&client, item("1396", MediaType::Tv), session)
        .await
        .unwrap();

    // Lowest season first, episodes ordered by number
    assert_eq!(view.selected_season(), 1);
    let ids: Vec<&str> = view.episodes().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["s1e1", "s1e2"]);
    assert!(!view.select_season(9));
    assert!(view.select_season(2));
    assert!(view.select_season(1));

    view.play(&client, Some("s1e1")).await.unwrap();
    assert_eq!(view.session().kind(), StateKind::Playing);
    assert_eq!(view.now_playing().map(|e| e.title.as_str()), Some("Pilot"));

    let player = view.session().player();
    assert_eq!(player.bound(), Some("https://cdn/a.m3u8"));
    assert_eq!(player.configs[0].poster.as_deref(), Some("https://img/bb.jpg"));
    assert!(player.configs[0].headers.contains_key("X-Api-Key"));
    assert!(!player.configs[0].headers.contains_key("Referer"));

    view.session_mut().report_player_error(PlayerSignal::Error);
    assert_eq!(
        view.session().player().bound(),
        Some("https://cdn/b.m3u8")
    );

    view.session_mut().report_player_error(PlayerSignal::Error);
    assert_eq!(view.session().kind(), StateKind::ExhaustedFailure);
    assert_eq!(
        view.session().error_message().as_deref(),
        Some("Unable to play video. Please try again later or select a different episode.")
    );

    view.close_player();
    assert_eq!(view.session().kind(), StateKind::Closed);
    assert!(view.now_playing().is_none());
}

#[tokio::test]
async fn test_movie_plays_synthesized_episode() {
    let mut server = Server::new_async().await;
    let _info = mock_info(
        &mut server,
        "414906",
        "movie",
        200,
        r#"{"id": 414906, "title": "The Batman", "type": "Movie"}"#,
    )
    .await;
    let _watch = mock_watch(&mut server, "414906", "414906", TWO_SOURCES).await;

    let client = ConsumetClient::with_base_url(server.url());
    let session = PlaybackSession::new(RecordingPlayer::new());
    let mut view = TitleView::open(&client, item("414906", MediaType::Movie), session)
        .await
        .unwrap();

    assert_eq!(view.episode_to_play(None).unwrap(), "414906");
    view.play(&client, None).await.unwrap();

    assert_eq!(
        view.session().player().bound(),
        Some("https://cdn/a.m3u8")
    );
}

#[tokio::test]
async fn test_empty_sources_end_in_no_sources_message() {
    let mut server = Server::new_async().await;
    let episodes = r#"{"episodes": [{"id": "ep1", "number": 1}]}"#;
    let _info = mock_info(&mut server, "m1", "tv", 200, episodes).await;
    let _watch = mock_watch(&mut server, "ep1", "m1", r#"{"sources": [], "subtitles": []}"#).await;

    let client = ConsumetClient::with_base_url(server.url());
    let session = PlaybackSession::new(RecordingPlayer::new());
    let mut view = TitleView::open(&client, item("m1", MediaType::Tv), session)
        .await
        .unwrap();

    view.play(&client, Some("ep1")).await.unwrap();

    assert_eq!(
        view.session().history(),
        &[StateKind::Resolving, StateKind::ExhaustedFailure]
    );
    assert_eq!(
        view.session().error_message().as_deref(),
        Some("No stream sources found.")
    );
    assert!(view.session().player().binds().is_empty());
}

#[tokio::test]
async fn test_open_fails_when_both_types_fail() {
    let mut server = Server::new_async().await;
    let _movie = mock_info(&mut server, "42", "movie", 500, "").await;
    let _tv = mock_info(&mut server, "42", "tv", 500, "").await;

    let client = ConsumetClient::with_base_url(server.url());
    let session = PlaybackSession::new(RecordingPlayer::new());
    let result = TitleView::open(&client, item("42", MediaType::Movie), session).await;

    let err = match result {
        Ok(_) => panic!("expected open to fail"),
        Err(e) => e,
    };
    assert!(matches!(err, TitleError::InfoUnavailable(_)));
    assert_eq!(err.to_string(), "Failed to load media details.");
}

#[tokio::test]
async fn test_show_without_episodes_cannot_play() {
    let mut server = Server::new_async().await;
    let announced = r#"{"title": "Announced", "type": "TV Series"}"#;
    let _info = mock_info(&mut server, "7", "tv", 200, announced).await;

    let client = ConsumetClient::with_base_url(server.url());
    let session = PlaybackSession::new(RecordingPlayer::new());
    let mut view = TitleView::open(&client, item("7", MediaType::Tv), session)
        .await
        .unwrap();

    assert!(view.episodes().is_empty());
    assert!(matches!(
        view.play(&client, None).await,
        Err(TitleError::NoEpisodes)
    ));
    assert_eq!(view.session().kind(), StateKind::Idle);
}
