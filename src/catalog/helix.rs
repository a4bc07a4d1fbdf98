use std::collections::VecDeque;
use std::marker::PhantomData;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Catalog, ItemStream};
use crate::errors::{ArchiveError, Result};
use crate::models::{MediaItem, MediaKind, MutedSegment, RemoteUser};

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const HELIX_URL: &str = "https://api.twitch.tv/helix";
const GQL_URL: &str = "https://gql.twitch.tv/gql";
/// Public client id used by the Twitch web player for GQL.
const GQL_CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";
const PAGE_SIZE: &str = "100";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct HelixVideo {
    id: String,
    user_id: String,
    user_name: String,
    title: String,
    created_at: String,
    url: String,
    view_count: u64,
    #[serde(rename = "type")]
    kind: String,
    duration: String,
    #[serde(default)]
    muted_segments: Option<Vec<MutedSegment>>,
}

impl From<HelixVideo> for MediaItem {
    fn from(v: HelixVideo) -> Self {
        MediaItem {
            id: v.id,
            kind: MediaKind::parse(&v.kind),
            title: v.title,
            created_at: v.created_at,
            url: v.url,
            view_count: v.view_count,
            duration: v.duration,
            user_id: v.user_id,
            user_name: v.user_name,
            muted_segments: v.muted_segments.unwrap_or_default(),
            video_id: None,
            vod_offset: None,
            creator_id: None,
            creator_name: None,
            game_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HelixClip {
    id: String,
    url: String,
    broadcaster_id: String,
    broadcaster_name: String,
    creator_id: String,
    creator_name: String,
    #[serde(default)]
    video_id: String,
    #[serde(default)]
    game_id: String,
    title: String,
    view_count: u64,
    created_at: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    vod_offset: Option<i64>,
}

impl From<HelixClip> for MediaItem {
    fn from(c: HelixClip) -> Self {
        MediaItem {
            id: c.id,
            kind: MediaKind::Clip,
            title: c.title,
            created_at: c.created_at,
            url: c.url,
            view_count: c.view_count,
            duration: c.duration.to_string(),
            user_id: c.broadcaster_id,
            user_name: c.broadcaster_name,
            muted_segments: Vec::new(),
            video_id: Some(c.video_id).filter(|id| !id.is_empty()),
            vod_offset: c.vod_offset,
            creator_id: Some(c.creator_id),
            creator_name: Some(c.creator_name),
            game_id: Some(c.game_id).filter(|id| !id.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HelixGame {
    id: String,
    name: String,
}

/// Twitch Helix client authenticated with an app access token.
pub struct HelixClient {
    http: Client,
    client_id: String,
    token: String,
}

impl HelixClient {
    pub fn connect(client_id: &str, client_secret: &str) -> Result<Self> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let token = authenticate(&http, client_id, client_secret)?;
        Ok(Self {
            http,
            client_id: client_id.to_string(),
            token,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}/{}", HELIX_URL, path))
            .header("Client-Id", &self.client_id)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
    }

    fn fetch<T: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> Result<Page<T>> {
        let response = self.get(path).query(query).send()?;
        Ok(check_status(path, response)?.json()?)
    }

    fn paged<T>(&self, path: &'static str, query: Vec<(String, String)>) -> ItemStream<'_>
    where
        T: DeserializeOwned + Into<MediaItem> + 'static,
    {
        Box::new(Paged::<T> {
            client: self,
            path,
            query,
            cursor: None,
            buffer: VecDeque::new(),
            done: false,
            _marker: PhantomData,
        })
    }

    fn gql_moments(&self, video_id: &str) -> Result<Vec<serde_json::Value>> {
        let query = format!(
            "query {{ video(id: \"{}\") {{ moments(momentRequestType: VIDEO_CHAPTER_MARKERS) {{ edges {{ node {{ id durationMilliseconds positionMilliseconds type description details {{ ... on GameChangeMomentDetails {{ game {{ id displayName }} }} }} }} }} }} }} }}",
            video_id
        );
        let response = self
            .http
            .post(GQL_URL)
            .header("Client-Id", GQL_CLIENT_ID)
            .json(&serde_json::json!({ "query": query }))
            .send()?;
        let body: serde_json::Value = check_status("gql", response)?.json()?;
        Ok(moment_nodes(&body))
    }
}

fn authenticate(http: &Client, client_id: &str, client_secret: &str) -> Result<String> {
    let response = http
        .post(TOKEN_URL)
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
        ])
        .send()?;
    let token: TokenResponse = check_status("oauth2/token", response)?.json()?;
    if token.access_token.is_empty() {
        return Err(ArchiveError::Api("empty access token".to_string()));
    }
    Ok(token.access_token)
}

fn check_status(what: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ArchiveError::Api(format!("{} returned {}: {}", what, status, body)))
}

fn moment_nodes(body: &serde_json::Value) -> Vec<serde_json::Value> {
    body.pointer("/data/video/moments/edges")
        .and_then(|edges| edges.as_array())
        .map(|edges| {
            edges
                .iter()
                .filter_map(|edge| edge.get("node").cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

struct Paged<'a, T> {
    client: &'a HelixClient,
    path: &'static str,
    query: Vec<(String, String)>,
    cursor: Option<String>,
    buffer: VecDeque<MediaItem>,
    done: bool,
    _marker: PhantomData<T>,
}

impl<T> Iterator for Paged<'_, T>
where
    T: DeserializeOwned + Into<MediaItem>,
{
    type Item = Result<MediaItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.buffer.pop_front() {
            return Some(Ok(item));
        }
        if self.done {
            return None;
        }
        let mut query = self.query.clone();
        if let Some(cursor) = &self.cursor {
            query.push(("after".to_string(), cursor.clone()));
        }
        match self.client.fetch::<T>(self.path, &query) {
            Ok(page) => {
                let empty = page.data.is_empty();
                self.buffer.extend(page.data.into_iter().map(Into::into));
                self.cursor = page.pagination.cursor.filter(|c| !c.is_empty());
                self.done = empty || self.cursor.is_none();
                self.buffer.pop_front().map(Ok)
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Catalog for HelixClient {
    fn resolve_users(&self, logins: &[String]) -> Result<Vec<RemoteUser>> {
        let mut users = Vec::new();
        // Helix accepts at most 100 logins per request.
        for chunk in logins.chunks(100) {
            let query: Vec<(String, String)> = chunk
                .iter()
                .map(|login| ("login".to_string(), login.to_lowercase()))
                .collect();
            let page: Page<RemoteUser> = self.fetch("users", &query)?;
            users.extend(page.data);
        }
        Ok(users)
    }

    fn is_live(&self, user_id: &str) -> Result<bool> {
        let query = [("user_id".to_string(), user_id.to_string())];
        let page: Page<serde_json::Value> = self.fetch("streams", &query)?;
        Ok(!page.data.is_empty())
    }

    fn videos(&self, user_id: &str) -> ItemStream<'_> {
        self.paged::<HelixVideo>(
            "videos",
            vec![
                ("user_id".to_string(), user_id.to_string()),
                ("first".to_string(), PAGE_SIZE.to_string()),
            ],
        )
    }

    fn clips(&self, broadcaster_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> ItemStream<'_> {
        self.paged::<HelixClip>(
            "clips",
            vec![
                ("broadcaster_id".to_string(), broadcaster_id.to_string()),
                ("first".to_string(), PAGE_SIZE.to_string()),
                ("started_at".to_string(), rfc3339(start)),
                ("ended_at".to_string(), rfc3339(end)),
            ],
        )
    }

    fn game_name(&self, game_id: &str) -> Result<Option<String>> {
        let query = [("id".to_string(), game_id.to_string())];
        let page: Page<HelixGame> = self.fetch("games", &query)?;
        Ok(page
            .data
            .into_iter()
            .find(|g| g.id == game_id)
            .map(|g| g.name))
    }

    fn moments(&self, video_id: &str) -> Vec<serde_json::Value> {
        if video_id.is_empty() || !video_id.chars().all(|c| c.is_ascii_digit()) {
            return Vec::new();
        }
        match self.gql_moments(video_id) {
            Ok(moments) => moments,
            Err(e) => {
                log::debug!("moments lookup for {} failed: {}", video_id, e);
                Vec::new()
            }
        }
    }
}
