//! Decides which remote items to look at and which artifacts each still needs.
//!
//! Planning happens in two stages. [`plan_channel`] walks the remote list once,
//! applying the live-stream skip, per-type caps and the view-count floor, and
//! gives every admitted item a fixed ordered list of candidate steps.
//! [`gate`] is then evaluated against fresh archive status right before each
//! step runs, so a step can depend on what earlier steps of the same item
//! produced.

use crate::archive::{Artifact, ArtifactStatus, InfoState};
use crate::cancel::CancelToken;
use crate::models::{ChannelPolicy, MediaItem, MediaKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    WriteInfo,
    RefreshMoments,
    DownloadVideo,
    DownloadChat,
    Transcribe,
    RenderChat,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::WriteInfo => "write info",
            Action::RefreshMoments => "refresh moments",
            Action::DownloadVideo => "download video",
            Action::DownloadChat => "download chat",
            Action::Transcribe => "transcribe",
            Action::RenderChat => "render chat",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub archive: usize,
    pub highlight: usize,
    pub upload: usize,
    pub clip: usize,
}

impl BucketCounts {
    fn slot(&mut self, kind: MediaKind) -> Option<&mut usize> {
        match kind {
            MediaKind::Archive => Some(&mut self.archive),
            MediaKind::Highlight => Some(&mut self.highlight),
            MediaKind::Upload => Some(&mut self.upload),
            MediaKind::Clip => Some(&mut self.clip),
            MediaKind::Other => None,
        }
    }

    pub fn total(&self) -> usize {
        self.archive + self.highlight + self.upload + self.clip
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedItem {
    pub item: MediaItem,
    pub steps: Vec<Artifact>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelPlan {
    pub items: Vec<PlannedItem>,
    /// Every item pulled from the remote list, admitted or not.
    pub checked: usize,
    pub admitted: BucketCounts,
    pub live_skipped: Option<String>,
    /// Item whose view count ended the walk.
    pub below_floor: Option<String>,
    pub cancelled: bool,
}

/// Candidate steps for one item, in dependency order.
pub fn candidate_steps(policy: &ChannelPolicy) -> Vec<Artifact> {
    let mut steps = vec![Artifact::Info, Artifact::Video, Artifact::Chat];
    if policy.transcribe {
        steps.push(Artifact::Captions);
    }
    if policy.render_chat {
        steps.push(Artifact::Render);
    }
    steps
}

fn bucket_rank(kind: MediaKind) -> u8 {
    match kind {
        MediaKind::Archive => 0,
        MediaKind::Highlight => 1,
        MediaKind::Upload => 2,
        MediaKind::Clip => 3,
        MediaKind::Other => 4,
    }
}

/// Selects the items of one channel to work on.
///
/// `items` must be in the platform's order: newest first for videos, most
/// viewed first for clips. The view-count floor relies on that order and
/// stops at the first item below it without looking further.
pub fn plan_channel<I>(items: I, policy: &ChannelPolicy, is_live: bool, cancel: &CancelToken) -> ChannelPlan
where
    I: IntoIterator<Item = MediaItem>,
{
    let mut plan = ChannelPlan::default();
    let mut first = true;

    for item in items {
        if cancel.is_cancelled() {
            plan.cancelled = true;
            break;
        }
        plan.checked += 1;

        // The newest video of a live channel is the recording in progress.
        if first && is_live {
            first = false;
            plan.live_skipped = Some(item.id.clone());
            continue;
        }
        first = false;

        if let Some(floor) = policy.min_views
            && item.view_count < floor
        {
            plan.below_floor = Some(item.id.clone());
            break;
        }

        let Some(count) = plan.admitted.slot(item.kind) else {
            continue;
        };
        if let Some(max) = policy.max_items
            && *count >= max
        {
            continue;
        }
        *count += 1;
        plan.items.push(PlannedItem {
            steps: candidate_steps(policy),
            item,
        });
    }

    plan.items.sort_by_key(|p| bucket_rank(p.item.kind));
    plan
}

/// The action a step needs given what is already on disk, if any.
pub fn gate(step: Artifact, status: &ArtifactStatus, policy: &ChannelPolicy) -> Option<Action> {
    match step {
        Artifact::Info => match status.info {
            InfoState::Missing => Some(Action::WriteInfo),
            InfoState::NeedsMoments => Some(Action::RefreshMoments),
            InfoState::Complete => None,
        },
        Artifact::Video => (!status.video).then_some(Action::DownloadVideo),
        Artifact::Chat => (!status.chat_settled()).then_some(Action::DownloadChat),
        Artifact::Captions => {
            (policy.transcribe && status.video && !status.captions).then_some(Action::Transcribe)
        }
        Artifact::Render => {
            (policy.render_chat && status.chat && !status.render).then_some(Action::RenderChat)
        }
    }
}

/// Status as it would look if `action` succeeds; used for dry runs.
pub fn assume_done(status: &mut ArtifactStatus, action: Action) {
    match action {
        Action::WriteInfo | Action::RefreshMoments => status.info = InfoState::Complete,
        Action::DownloadVideo => status.video = true,
        Action::DownloadChat => status.chat = true,
        Action::Transcribe => status.captions = true,
        Action::RenderChat => status.render = true,
    }
}
