use crate::models::{MediaItem, MediaKind};

pub fn video(id: &str, kind: MediaKind, views: u64) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        kind,
        title: "a video".to_string(),
        created_at: "2024-03-05T10:15:00Z".to_string(),
        url: format!("https://www.twitch.tv/videos/{}", id),
        view_count: views,
        duration: "1h2m3s".to_string(),
        user_id: "42".to_string(),
        user_name: "SomeStreamer".to_string(),
        muted_segments: Vec::new(),
        video_id: None,
        vod_offset: None,
        creator_id: None,
        creator_name: None,
        game_id: None,
    }
}

pub fn clip(id: &str, views: u64) -> MediaItem {
    MediaItem {
        title: "a clip".to_string(),
        url: format!("https://clips.twitch.tv/{}", id),
        duration: "30".to_string(),
        video_id: Some("2001".to_string()),
        vod_offset: Some(120),
        creator_id: Some("7".to_string()),
        creator_name: Some("clipper".to_string()),
        game_id: Some("509658".to_string()),
        ..video(id, MediaKind::Clip, views)
    }
}
