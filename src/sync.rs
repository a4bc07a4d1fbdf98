//! Drives a whole archival run: channels, then items, then actions.
//!
//! Item-level errors are logged with the channel and item and do not stop the
//! run. Configuration and user-resolution errors are fatal and surface before
//! any item is touched.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::archive::ArchiveStore;
use crate::cancel::CancelToken;
use crate::catalog::{Catalog, ItemStream, match_user};
use crate::errors::{ArchiveError, Result};
use crate::executor::{ActionOutcome, Executor};
use crate::models::{Channel, ChannelPolicy, RemoteUser};
use crate::planner::{self, Action, ChannelPlan, PlannedItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Videos,
    Clips,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Videos => "videos",
            SyncMode::Clips => "clips",
        }
    }
}

pub struct SyncRequest<'r> {
    pub mode: SyncMode,
    pub channels: &'r [Channel],
    /// Creation-time window for clip queries; required in clip mode.
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub channels: usize,
    /// Remote items examined, including ones rejected by caps or floors.
    pub checked: usize,
    /// Videos or clips newly downloaded this run.
    pub downloaded: usize,
    pub failed: usize,
    pub cancelled: bool,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checked {} items across {} channels, downloaded {}, {} failed in {:.1} min",
            self.checked,
            self.channels,
            self.downloaded,
            self.failed,
            self.elapsed.as_secs_f64() / 60.0
        )?;
        if self.cancelled {
            write!(f, " (stopped early)")?;
        }
        Ok(())
    }
}

fn resolve_users(req: &SyncRequest, catalog: &dyn Catalog) -> Result<Vec<RemoteUser>> {
    let logins: Vec<String> = req.channels.iter().map(|c| c.login.clone()).collect();
    catalog.resolve_users(&logins)
}

fn listing<'c>(req: &SyncRequest, catalog: &'c dyn Catalog, user: &RemoteUser) -> Result<ItemStream<'c>> {
    match req.mode {
        SyncMode::Videos => Ok(catalog.videos(&user.id)),
        SyncMode::Clips => {
            let (start, end) = req
                .window
                .ok_or_else(|| ArchiveError::Config("clip sync needs a query window".to_string()))?;
            Ok(catalog.clips(&user.id, start, end))
        }
    }
}

/// Lists and plans one channel. A listing error ends the walk early; it is
/// returned alongside whatever was planned before it.
fn plan_remote(
    req: &SyncRequest,
    catalog: &dyn Catalog,
    user: &RemoteUser,
    policy: &ChannelPolicy,
    cancel: &CancelToken,
) -> Result<(ChannelPlan, Option<ArchiveError>)> {
    let is_live = match req.mode {
        SyncMode::Videos => catalog.is_live(&user.id)?,
        SyncMode::Clips => false,
    };
    let mut list_error = None;
    let items = listing(req, catalog, user)?.map_while(|result| match result {
        Ok(item) => Some(item),
        Err(e) => {
            list_error = Some(e);
            None
        }
    });
    let plan = planner::plan_channel(items, policy, is_live, cancel);
    Ok((plan, list_error))
}

struct SyncRun<'r, 'a> {
    catalog: &'r dyn Catalog,
    archive: &'r dyn ArchiveStore,
    executor: &'r mut Executor<'a>,
    cancel: &'r CancelToken,
    summary: RunSummary,
}

impl SyncRun<'_, '_> {
    fn channel(&mut self, req: &SyncRequest, channel: &Channel, user: &RemoteUser) -> Result<()> {
        let login = user.login.as_str();
        let (plan, list_error) = plan_remote(req, self.catalog, user, &channel.policy, self.cancel)?;
        if let Some(e) = list_error {
            log::warn!("[{}] listing stopped early: {}", login, e);
            self.summary.failed += 1;
        }
        if let Some(id) = &plan.live_skipped {
            log::info!("[{}] live now, skipping in-progress video {}", login, id);
        }
        if let Some(id) = &plan.below_floor {
            log::debug!("[{}] {} is below the view floor, done with channel", login, id);
        }
        log::info!(
            "[{}] checked {}, working on {} (archive {}, highlight {}, upload {}, clip {})",
            login,
            plan.checked,
            plan.items.len(),
            plan.admitted.archive,
            plan.admitted.highlight,
            plan.admitted.upload,
            plan.admitted.clip
        );
        self.summary.checked += plan.checked;

        for planned in &plan.items {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.item(login, planned, &channel.policy) {
                log::error!(
                    "[{}] {} {} failed: {}",
                    login,
                    planned.item.kind.as_str(),
                    planned.item.id,
                    e
                );
                self.summary.failed += 1;
            }
        }
        Ok(())
    }

    fn item(&mut self, login: &str, planned: &PlannedItem, policy: &ChannelPolicy) -> Result<()> {
        let item = &planned.item;
        let started = Instant::now();
        for &step in &planned.steps {
            if self.cancel.is_cancelled() {
                break;
            }
            let status = self.archive.status(login, item)?;
            let Some(action) = planner::gate(step, &status, policy) else {
                continue;
            };
            log::info!("[{}] {} {}: {}", login, item.kind.as_str(), item.id, action.as_str());
            let action_started = Instant::now();
            let outcome = match self.executor.execute(login, item, action, started) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!(
                        "[{}] {} {}: {} failed: {}",
                        login,
                        item.kind.as_str(),
                        item.id,
                        action.as_str(),
                        e
                    );
                    self.summary.failed += 1;
                    continue;
                }
            };
            match outcome {
                ActionOutcome::Saved => {
                    log::info!(
                        "[{}] {}: {} done in {:.0}s",
                        login,
                        item.id,
                        action.as_str(),
                        action_started.elapsed().as_secs_f64()
                    );
                    if action == Action::DownloadVideo {
                        self.summary.downloaded += 1;
                    }
                }
                ActionOutcome::Unchanged => {
                    log::debug!("[{}] {}: nothing new for {}", login, item.id, action.as_str());
                }
                ActionOutcome::MarkedUnavailable => {
                    log::warn!("[{}] {}: chat not available, will not retry", login, item.id);
                }
                ActionOutcome::Failed(reason) => {
                    log::warn!("[{}] {}: {} failed: {}", login, item.id, action.as_str(), reason);
                    self.summary.failed += 1;
                }
                ActionOutcome::Skipped(reason) => {
                    log::warn!("[{}] {}: {} skipped: {}", login, item.id, action.as_str(), reason);
                }
            }
        }
        Ok(())
    }
}

/// Runs every configured channel and returns the run's counters.
pub fn run(
    req: &SyncRequest,
    catalog: &dyn Catalog,
    archive: &dyn ArchiveStore,
    executor: &mut Executor<'_>,
    cancel: &CancelToken,
) -> Result<RunSummary> {
    let started = Instant::now();
    let users = resolve_users(req, catalog)?;
    let mut run = SyncRun {
        catalog,
        archive,
        executor,
        cancel,
        summary: RunSummary::default(),
    };

    for channel in req.channels {
        if cancel.is_cancelled() {
            break;
        }
        let Some(user) = match_user(&users, &channel.login) else {
            log::warn!("[{}] no such user, skipping", channel.login);
            continue;
        };
        run.summary.channels += 1;
        if let Err(e) = run.channel(req, channel, user) {
            log::error!("[{}] channel failed: {}", user.login, e);
            run.summary.failed += 1;
        }
    }

    let mut summary = run.summary;
    summary.cancelled = cancel.is_cancelled();
    summary.elapsed = started.elapsed();
    log::info!("{} sync finished: {}", req.mode.as_str(), summary);
    Ok(summary)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedWork {
    pub id: String,
    pub kind: &'static str,
    pub title: String,
    pub actions: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelPreview {
    pub channel: String,
    pub checked: usize,
    pub live_skipped: Option<String>,
    pub items: Vec<PlannedWork>,
}

/// Computes what a run would do right now without touching the archive.
/// Steps that depend on earlier ones are shown as if those succeed.
pub fn preview(
    req: &SyncRequest,
    catalog: &dyn Catalog,
    archive: &dyn ArchiveStore,
    cancel: &CancelToken,
) -> Result<Vec<ChannelPreview>> {
    let users = resolve_users(req, catalog)?;
    let mut previews = Vec::new();

    for channel in req.channels {
        if cancel.is_cancelled() {
            break;
        }
        let Some(user) = match_user(&users, &channel.login) else {
            log::warn!("[{}] no such user, skipping", channel.login);
            continue;
        };
        let (plan, list_error) = plan_remote(req, catalog, user, &channel.policy, cancel)?;
        if let Some(e) = list_error {
            log::warn!("[{}] listing stopped early: {}", user.login, e);
        }

        let mut items = Vec::new();
        for planned in &plan.items {
            let mut status = archive.status(&user.login, &planned.item)?;
            let mut actions = Vec::new();
            for &step in &planned.steps {
                if let Some(action) = planner::gate(step, &status, &channel.policy) {
                    planner::assume_done(&mut status, action);
                    actions.push(action.as_str());
                }
            }
            if !actions.is_empty() {
                items.push(PlannedWork {
                    id: planned.item.id.clone(),
                    kind: planned.item.kind.as_str(),
                    title: planned.item.title.clone(),
                    actions,
                });
            }
        }
        previews.push(ChannelPreview {
            channel: user.login.clone(),
            checked: plan.checked,
            live_skipped: plan.live_skipped,
            items,
        });
    }
    Ok(previews)
}
