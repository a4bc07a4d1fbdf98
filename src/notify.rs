use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::PushoverSettings;
use crate::errors::{ArchiveError, Result};

const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

/// Fire-and-forget message sink. Implementations never fail the caller.
pub trait Notifier {
    fn notify(&self, message: &str);
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, message: &str) {
        log::debug!("notification (no sink configured): {}", message);
    }
}

pub struct PushoverNotifier {
    http: Client,
    settings: PushoverSettings,
}

impl PushoverNotifier {
    pub fn new(settings: PushoverSettings) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self { http, settings })
    }

    fn send(&self, message: &str) -> Result<()> {
        let response = self
            .http
            .post(PUSHOVER_URL)
            .form(&[
                ("token", self.settings.token.as_str()),
                ("user", self.settings.user.as_str()),
                ("message", message),
            ])
            .send()?;
        if !response.status().is_success() {
            return Err(ArchiveError::Api(format!("pushover returned {}", response.status())));
        }
        Ok(())
    }
}

impl Notifier for PushoverNotifier {
    fn notify(&self, message: &str) {
        if let Err(e) = self.send(message) {
            log::warn!("notification not delivered: {}", e);
        }
    }
}

/// Text sent when a video's captions are ready.
pub fn ready_message(user_name: &str, video_id: &str, prepare_time: Duration) -> String {
    format!(
        "{} vod {} ready to edit ({} min to prepare)",
        user_name,
        video_id,
        prepare_time.as_secs() / 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_message() {
        assert_eq!(
            ready_message("Streamer", "2001", Duration::from_secs(185)),
            "Streamer vod 2001 ready to edit (3 min to prepare)"
        );
    }

    #[test]
    fn test_noop_notifier_does_not_panic() {
        NoopNotifier.notify("hello");
    }
}
