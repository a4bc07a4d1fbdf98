pub mod helix;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::models::{MediaItem, RemoteUser};

pub use helix::HelixClient;

/// Lazily paged item listing; later pages are only fetched if the caller keeps pulling.
pub type ItemStream<'a> = Box<dyn Iterator<Item = Result<MediaItem>> + 'a>;

pub trait Catalog {
    fn resolve_users(&self, logins: &[String]) -> Result<Vec<RemoteUser>>;
    fn is_live(&self, user_id: &str) -> Result<bool>;
    /// Newest first.
    fn videos(&self, user_id: &str) -> ItemStream<'_>;
    /// Most viewed first.
    fn clips(&self, broadcaster_id: &str, start: DateTime<Utc>, end: DateTime<Utc>)
    -> ItemStream<'_>;
    fn game_name(&self, game_id: &str) -> Result<Option<String>>;
    /// Chapter markers for a video. Best-effort: empty on any failure.
    fn moments(&self, video_id: &str) -> Vec<serde_json::Value>;
}

/// Picks the remote user for `login`, ignoring case.
pub fn match_user<'a>(users: &'a [RemoteUser], login: &str) -> Option<&'a RemoteUser> {
    users.iter().find(|u| u.login.eq_ignore_ascii_case(login))
}

/// Game id to name, filled on first lookup and kept for the rest of the run.
#[derive(Debug, Default)]
pub struct GameNames {
    names: HashMap<String, String>,
}

impl GameNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty string for unlisted or unknown games.
    pub fn lookup(&mut self, catalog: &dyn Catalog, game_id: &str) -> String {
        if game_id.is_empty() {
            return String::new();
        }
        if let Some(name) = self.names.get(game_id) {
            return name.clone();
        }
        match catalog.game_name(game_id) {
            Ok(Some(name)) => {
                self.names.insert(game_id.to_string(), name.clone());
                name
            }
            Ok(None) => String::new(),
            Err(e) => {
                log::warn!("game lookup for {} failed: {}", game_id, e);
                String::new()
            }
        }
    }
}
