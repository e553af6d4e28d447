//! Data carried through a collection run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A video as returned by a channel listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub id: String,
    pub title: String,
    /// Whole minutes, rounded up when the remainder exceeds 30 seconds.
    pub duration_minutes: u32,
    pub published_at: DateTime<Utc>,
}

/// A transcript that passed the keyword filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub channel_id: String,
    pub video_id: String,
    pub title: String,
    pub text: String,
}

impl TranscriptRecord {
    pub fn new(channel_id: &str, video: &VideoMeta, text: String) -> Self {
        Self {
            channel_id: channel_id.to_owned(),
            video_id: video.id.clone(),
            title: video.title.clone(),
            text,
        }
    }
}
