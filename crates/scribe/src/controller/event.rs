use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use super::RunState;
use crate::egress::ErrorAction;

/// Progress notification emitted by the worker, in loop order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CollectionEvent {
    RunStarted {
        channels: usize,
        identities: usize,
    },
    ChannelStarted {
        channel_id: String,
        /// 1-based position in the input list
        position: usize,
        total: usize,
    },
    UsingIdentity {
        identity: String,
    },
    IdentityRotated {
        identity: String,
    },
    ChannelListed {
        channel_id: String,
        videos: usize,
    },
    ChannelFailed {
        channel_id: String,
        error: String,
        /// The upstream signalled throttling rather than a plain failure.
        rate_limited: bool,
        action: ErrorAction,
    },
    VideoStarted {
        video_id: String,
        title: String,
        /// 1-based position in the channel listing
        index: usize,
        total: usize,
    },
    TranscriptUnavailable {
        video_id: String,
    },
    RecordAdded {
        video_id: String,
        keyword: Option<String>,
    },
    TranscriptFiltered {
        video_id: String,
    },
    TranscriptFailed {
        video_id: String,
        error: String,
        rate_limited: bool,
        action: ErrorAction,
    },
    Paused {
        consecutive_errors: u32,
    },
    Resumed,
    IdentitiesReloaded {
        count: usize,
    },
    NoMatches,
    Persisted {
        count: usize,
        destination: PathBuf,
    },
    Finished {
        state: RunState,
        records: usize,
    },
}

impl CollectionEvent {
    /// Mirror the event into the tracing log.
    pub(crate) fn log(&self) {
        match self {
            Self::RunStarted {
                channels,
                identities,
            } => info!(channels, identities, "Starting collection"),
            Self::ChannelStarted {
                channel_id,
                position,
                total,
            } => info!(%channel_id, position, total, "Processing channel"),
            Self::UsingIdentity { identity } => info!(%identity, "Using egress identity"),
            Self::IdentityRotated { identity } => info!(%identity, "Rotated to next identity"),
            Self::ChannelListed { channel_id, videos } => {
                info!(%channel_id, videos, "Listed channel videos")
            }
            Self::ChannelFailed {
                channel_id,
                error,
                rate_limited,
                action,
            } => warn!(
                %channel_id,
                %error,
                rate_limited,
                action = action.as_str(),
                "Channel listing failed"
            ),
            Self::VideoStarted {
                video_id,
                title,
                index,
                total,
            } => info!(%video_id, index, total, "{title}"),
            Self::TranscriptUnavailable { video_id } => {
                warn!(%video_id, "Transcript unavailable")
            }
            Self::RecordAdded { video_id, keyword } => match keyword {
                Some(keyword) => info!(%video_id, %keyword, "Keyword found"),
                None => info!(%video_id, "Transcript collected"),
            },
            Self::TranscriptFiltered { video_id } => info!(%video_id, "Keyword not present"),
            Self::TranscriptFailed {
                video_id,
                error,
                rate_limited,
                action,
            } => warn!(
                %video_id,
                %error,
                rate_limited,
                action = action.as_str(),
                "Transcript fetch failed"
            ),
            Self::Paused { consecutive_errors } => error!(
                consecutive_errors,
                "PAUSED: repeated failures, replace identities and resume"
            ),
            Self::Resumed => info!("Collection resumed"),
            Self::IdentitiesReloaded { count } => info!(count, "Egress identities reloaded"),
            Self::NoMatches => warn!("No transcripts collected"),
            Self::Persisted { count, destination } => {
                info!(count, destination = %destination.display(), "Saved transcripts")
            }
            Self::Finished { state, records } => {
                info!(state = state.as_str(), records, "Collection finished")
            }
        }
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub channels_listed: usize,
    pub channels_failed: usize,
    pub videos_seen: usize,
    pub transcripts_fetched: usize,
    pub transcripts_unavailable: usize,
    pub transcript_errors: usize,
    pub records: usize,
}

/// Outcome of a run whose results were persisted (or that found nothing).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// `Completed` or `Cancelled`.
    pub state: RunState,
    pub records_written: usize,
    pub destination: PathBuf,
    pub stats: RunStats,
}
