//! Shared test doubles for the player boundary and stream resolution

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use reelstream::api::StreamResolver;
use reelstream::models::{StreamBundle, StreamSource, SubtitleTrack};
use reelstream::playback::{PlayerBoundary, PlayerConfig, PlayerError};

/// What the controller did to the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Bind(String),
    Release,
}

/// Player that records every call and can refuse chosen URLs
#[derive(Debug, Default)]
pub struct RecordingPlayer {
    pub events: Vec<PlayerEvent>,
    pub configs: Vec<PlayerConfig>,
    pub reject: HashSet<String>,
    bound: Option<String>,
    live_instances: usize,
    pub max_live_instances: usize,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to bind these URLs
    pub fn rejecting(urls: &[&str]) -> Self {
        Self {
            reject: urls.iter().map(|u| u.to_string()).collect(),
            ..Self::default()
        }
    }

    /// URLs bound so far, in order
    pub fn binds(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PlayerEvent::Bind(url) => Some(url.clone()),
                PlayerEvent::Release => None,
            })
            .collect()
    }

    pub fn releases(&self) -> usize {
        self.events
            .iter()
            .filter(|e| **e == PlayerEvent::Release)
            .count()
    }

    pub fn bound(&self) -> Option<&str> {
        self.bound.as_deref()
    }
}

impl PlayerBoundary for RecordingPlayer {
    fn bind(&mut self, config: &PlayerConfig) -> Result<(), PlayerError> {
        self.configs.push(config.clone());
        if self.reject.contains(&config.url) {
            return Err(PlayerError::Rejected(config.url.clone()));
        }
        self.events.push(PlayerEvent::Bind(config.url.clone()));
        self.bound = Some(config.url.clone());
        self.live_instances += 1;
        self.max_live_instances = self.max_live_instances.max(self.live_instances);
        Ok(())
    }

    fn release(&mut self) {
        self.events.push(PlayerEvent::Release);
        if self.bound.take().is_some() {
            self.live_instances -= 1;
        }
    }
}

/// Resolver answering from a fixed table and counting calls
#[derive(Debug, Default)]
pub struct TableResolver {
    pub bundles: HashMap<String, StreamBundle>,
    pub calls: RefCell<Vec<(String, String)>>,
}

impl TableResolver {
    pub fn with(episode_id: &str, bundle: StreamBundle) -> Self {
        let mut resolver = Self::default();
        resolver.bundles.insert(episode_id.to_string(), bundle);
        resolver
    }
}

impl StreamResolver for TableResolver {
    async fn resolve_stream(&self, episode_id: &str, media_id: &str) -> StreamBundle {
        self.calls
            .borrow_mut()
            .push((episode_id.to_string(), media_id.to_string()));
        self.bundles.get(episode_id).cloned().unwrap_or_default()
    }
}

pub fn source(url: &str) -> StreamSource {
    StreamSource {
        url: url.to_string(),
        is_m3u8: url.ends_with(".m3u8"),
        quality: None,
        kind: None,
    }
}

pub fn bundle(urls: &[&str]) -> StreamBundle {
    StreamBundle {
        sources: urls.iter().map(|u| source(u)).collect(),
        subtitles: vec![],
        headers: BTreeMap::new(),
    }
}

pub fn bundle_with_extras(urls: &[&str], headers: &[(&str, &str)]) -> StreamBundle {
    StreamBundle {
        sources: urls.iter().map(|u| source(u)).collect(),
        subtitles: vec![SubtitleTrack {
            url: "https://subs/en.vtt".to_string(),
            lang: "English".to_string(),
        }],
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}
