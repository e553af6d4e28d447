//! Scribe engine: collects video transcripts channel by channel while rotating
//! egress identities and pacing requests to stay under upstream rate limits.
//!
//! The moving parts:
//! - [`EgressPool`] picks the proxy for each request, rotating by volume and
//!   on every failure, and pauses after repeated failures.
//! - [`PacingPolicy`] draws randomized inter-request delays.
//! - [`CollectionController`] runs the channel/video loop against a
//!   [`RemoteSource`] and hands the results to a [`ResultSink`].

pub mod config;
pub mod controller;
pub mod egress;
pub mod error;
pub mod pacing;
pub mod record;
pub mod sink;
pub mod source;

pub use config::{KeywordFilter, OutputFormat, RunConfig, parse_channel_list};
pub use controller::{
    CollectionController, CollectionEvent, ControlHandle, LoopTiming, RunReport, RunState,
    RunStats,
};
pub use egress::{EgressIdentity, EgressPool, ErrorAction, load_identity_file};
pub use error::{Error, RemoteError, Result};
pub use pacing::PacingPolicy;
pub use record::{TranscriptRecord, VideoMeta};
pub use sink::{JsonFileSink, ResultSink, TextFileSink, sink_for};
pub use source::{RemoteSource, YoutubeSource};
