//! The collection state machine.
//!
//! One worker walks the configured channels in input order and, within each
//! channel, the listed videos in the order the source returned them. Before
//! every network operation it passes a checkpoint where cancellation, queued
//! identity reloads and the operator pause are handled.
//!
//! Failures never abort the run: a failed listing abandons its channel, a
//! failed transcript fetch skips its video, and both are reported to the
//! [`EgressPool`], which rotates and eventually pauses.

mod event;
mod handle;

use std::{mem, sync::Arc, time::Duration};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

pub use event::{CollectionEvent, RunReport, RunStats};
pub use handle::{ControlHandle, RunState};

use crate::{
    config::RunConfig,
    egress::EgressPool,
    error::{Error, Result},
    pacing::{PacingPolicy, uniform_delay},
    record::{TranscriptRecord, VideoMeta},
    sink::ResultSink,
    source::RemoteSource,
};

/// Fixed waits of the collection loop, independent of [`PacingPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopTiming {
    /// Backoff after a failed transcript fetch.
    pub error_backoff_min: Duration,
    pub error_backoff_max: Duration,
    /// Pause between two channels.
    pub channel_delay_min: Duration,
    pub channel_delay_max: Duration,
    /// Re-check period while paused for the operator.
    pub pause_poll: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            error_backoff_min: Duration::from_secs(2),
            error_backoff_max: Duration::from_secs(5),
            channel_delay_min: Duration::from_secs(5),
            channel_delay_max: Duration::from_secs(15),
            pause_poll: Duration::from_secs(1),
        }
    }
}

/// Drives one collection run. Consumed by [`CollectionController::run`];
/// grab a [`ControlHandle`] first to cancel, resume or reload identities.
pub struct CollectionController {
    source: Arc<dyn RemoteSource>,
    sink: Arc<dyn ResultSink>,
    pacing: PacingPolicy,
    timing: LoopTiming,
    handle: ControlHandle,
    events: Option<UnboundedSender<CollectionEvent>>,
}

impl CollectionController {
    pub fn new(source: Arc<dyn RemoteSource>, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            source,
            sink,
            pacing: PacingPolicy::default(),
            timing: LoopTiming::default(),
            handle: ControlHandle::new(),
            events: None,
        }
    }

    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_timing(mut self, timing: LoopTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<CollectionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    /// Execute the run to completion or cancellation and persist the results.
    ///
    /// Configuration errors are returned before any network activity. A
    /// persistence failure returns [`Error::Persist`] carrying the records.
    pub async fn run(self, config: RunConfig) -> Result<RunReport> {
        if let Err(e) = config.validate() {
            self.handle.set_state(RunState::Failed);
            return Err(e);
        }

        let mut pool = EgressPool::with_gate(config.rotation_interval, self.handle.gate());
        pool.load(config.identities.clone());

        let mut run = Run {
            ctl: &self,
            config: &config,
            pool,
            records: Vec::new(),
            stats: RunStats::default(),
        };

        self.handle.set_state(RunState::Running);
        run.emit(CollectionEvent::RunStarted {
            channels: config.channels.len(),
            identities: run.pool.len(),
        });

        let state = run.collect().await;
        run.finish(state).await
    }
}

struct Run<'a> {
    ctl: &'a CollectionController,
    config: &'a RunConfig,
    pool: EgressPool,
    records: Vec<TranscriptRecord>,
    stats: RunStats,
}

impl Run<'_> {
    fn emit(&self, event: CollectionEvent) {
        event.log();
        if let Some(events) = &self.ctl.events {
            // A dropped receiver only means nobody is watching.
            let _ = events.send(event);
        }
    }

    async fn collect(&mut self) -> RunState {
        let config = self.config;
        let total = config.channels.len();
        for (idx, channel_id) in config.channels.iter().enumerate() {
            if !self.checkpoint().await {
                return RunState::Cancelled;
            }

            self.emit(CollectionEvent::ChannelStarted {
                channel_id: channel_id.clone(),
                position: idx + 1,
                total,
            });
            if !self.collect_channel(channel_id).await {
                return RunState::Cancelled;
            }

            if idx + 1 < total {
                let delay = uniform_delay(
                    self.ctl.timing.channel_delay_min,
                    self.ctl.timing.channel_delay_max,
                );
                self.sleep("channel", delay).await;
            }
        }
        RunState::Completed
    }

    /// Returns `false` if the run was cancelled along the way.
    async fn collect_channel(&mut self, channel_id: &str) -> bool {
        let egress = self.pool.current().cloned();
        if let Some(identity) = &egress {
            self.emit(CollectionEvent::UsingIdentity {
                identity: identity.redacted(),
            });
        }

        let listing = self
            .ctl
            .source
            .list_videos(
                channel_id,
                self.config.max_videos_per_channel,
                self.config.min_duration_minutes,
                egress.as_ref(),
            )
            .await;

        let mut videos = match listing {
            Ok(videos) => {
                self.report_success();
                self.stats.channels_listed += 1;
                videos
            }
            Err(e) => {
                self.stats.channels_failed += 1;
                let action = self.pool.report_error();
                debug!(failed_on = e.target(), ?e, "Listing error detail");
                self.emit(CollectionEvent::ChannelFailed {
                    channel_id: channel_id.to_owned(),
                    error: e.to_string(),
                    rate_limited: e.is_rate_limited(),
                    action,
                });
                return true;
            }
        };
        videos.truncate(self.config.max_videos_per_channel);
        self.emit(CollectionEvent::ChannelListed {
            channel_id: channel_id.to_owned(),
            videos: videos.len(),
        });

        let total = videos.len();
        for (idx, video) in videos.iter().enumerate() {
            if !self.checkpoint().await {
                return false;
            }
            self.emit(CollectionEvent::VideoStarted {
                video_id: video.id.clone(),
                title: video.title.clone(),
                index: idx + 1,
                total,
            });
            self.stats.videos_seen += 1;

            let egress = self.pool.current().cloned();
            match self
                .ctl
                .source
                .fetch_transcript(&video.id, egress.as_ref())
                .await
            {
                Ok(None) => {
                    self.stats.transcripts_unavailable += 1;
                    self.emit(CollectionEvent::TranscriptUnavailable {
                        video_id: video.id.clone(),
                    });
                }
                Ok(Some(text)) => {
                    self.stats.transcripts_fetched += 1;
                    self.accept(channel_id, video, text);
                    self.report_success();

                    if idx + 1 < total {
                        let delay = self
                            .ctl
                            .pacing
                            .next_delay(self.config.delay_min, self.config.delay_max);
                        self.sleep("pacing", delay).await;
                    }
                }
                Err(e) => {
                    self.stats.transcript_errors += 1;
                    let action = self.pool.report_error();
                    debug!(failed_on = e.target(), ?e, "Transcript error detail");
                    self.emit(CollectionEvent::TranscriptFailed {
                        video_id: video.id.clone(),
                        error: e.to_string(),
                        rate_limited: e.is_rate_limited(),
                        action,
                    });
                    let backoff = uniform_delay(
                        self.ctl.timing.error_backoff_min,
                        self.ctl.timing.error_backoff_max,
                    );
                    self.sleep("error backoff", backoff).await;
                }
            }
        }
        true
    }

    fn accept(&mut self, channel_id: &str, video: &VideoMeta, text: String) {
        let config = self.config;
        let keyword = config.keyword.as_ref();
        if keyword.is_some_and(|filter| !filter.matches(&text)) {
            self.emit(CollectionEvent::TranscriptFiltered {
                video_id: video.id.clone(),
            });
            return;
        }

        self.records
            .push(TranscriptRecord::new(channel_id, video, text));
        self.stats.records += 1;
        self.emit(CollectionEvent::RecordAdded {
            video_id: video.id.clone(),
            keyword: keyword.map(|filter| filter.keyword().to_owned()),
        });
    }

    fn report_success(&mut self) {
        if self.pool.report_success() {
            if let Some(identity) = self.pool.current() {
                self.emit(CollectionEvent::IdentityRotated {
                    identity: identity.redacted(),
                });
            }
        }
    }

    fn apply_pending_reload(&mut self) {
        if let Some(identities) = self.ctl.handle.take_reload() {
            let count = identities.len();
            self.ctl.source.identities_reloaded(&identities);
            self.pool.load(identities);
            self.emit(CollectionEvent::IdentitiesReloaded { count });
        }
    }

    /// Gate in front of every network operation.
    ///
    /// Applies queued reloads, blocks while the operator gate is closed and
    /// returns `false` once cancellation has been requested.
    async fn checkpoint(&mut self) -> bool {
        let token = self.ctl.handle.token().clone();
        if token.is_cancelled() {
            return false;
        }
        self.apply_pending_reload();

        if self.pool.is_paused() {
            self.ctl.handle.set_state(RunState::PausedForOperator);
            self.emit(CollectionEvent::Paused {
                consecutive_errors: self.pool.consecutive_errors(),
            });

            let gate = Arc::clone(self.pool.gate());
            while self.pool.is_paused() && !token.is_cancelled() {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = gate.released() => {}
                    _ = tokio::time::sleep(self.ctl.timing.pause_poll) => {}
                }
                self.apply_pending_reload();
            }

            if token.is_cancelled() {
                return false;
            }
            self.ctl.handle.set_state(RunState::Running);
            self.emit(CollectionEvent::Resumed);
        }

        if self.pool.observe_release() {
            debug!("Operator release observed, failure streak cleared");
        }
        !token.is_cancelled()
    }

    /// Suspend the worker; cut short by cancellation.
    async fn sleep(&self, reason: &'static str, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        debug!(reason, delay_ms = delay.as_millis() as u64, "Sleeping");
        let token = self.ctl.handle.token();
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    async fn finish(mut self, state: RunState) -> Result<RunReport> {
        let destination = self.config.destination.clone();
        let records = mem::take(&mut self.records);
        let count = records.len();

        if records.is_empty() {
            self.emit(CollectionEvent::NoMatches);
            return Ok(self.complete(state, 0, destination));
        }

        info!(count, state = state.as_str(), "Persisting collected transcripts");
        match self.ctl.sink.write(&records, &destination).await {
            Ok(written) => {
                self.emit(CollectionEvent::Persisted {
                    count: written,
                    destination: destination.clone(),
                });
                Ok(self.complete(state, written, destination))
            }
            Err(source) => {
                self.ctl.handle.set_state(RunState::Failed);
                self.emit(CollectionEvent::Finished {
                    state: RunState::Failed,
                    records: count,
                });
                Err(Error::Persist {
                    destination,
                    source,
                    records,
                })
            }
        }
    }

    fn complete(
        self,
        state: RunState,
        records_written: usize,
        destination: std::path::PathBuf,
    ) -> RunReport {
        self.ctl.handle.set_state(state);
        self.emit(CollectionEvent::Finished {
            state,
            records: self.stats.records,
        });
        RunReport {
            state,
            records_written,
            destination,
            stats: self.stats,
        }
    }
}
