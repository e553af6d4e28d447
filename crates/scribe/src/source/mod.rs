//! Remote operations the collector depends on.

mod http;
pub mod youtube;

use async_trait::async_trait;

use crate::{egress::EgressIdentity, error::RemoteError, record::VideoMeta};

pub use http::{ClientPool, DEFAULT_USER_AGENT, install_rustls_provider};
pub use youtube::YoutubeSource;

/// Listing and transcript retrieval, each routed through an optional egress
/// identity (`None` means a direct connection).
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Videos of a channel, newest first, keeping only those at least
    /// `min_duration_minutes` long. Returns at most `max_results` entries.
    async fn list_videos(
        &self,
        channel_id: &str,
        max_results: usize,
        min_duration_minutes: u32,
        egress: Option<&EgressIdentity>,
    ) -> Result<Vec<VideoMeta>, RemoteError>;

    /// Full transcript text of a video.
    ///
    /// `Ok(None)` means the video legitimately has no transcript; that is not
    /// a failure.
    async fn fetch_transcript(
        &self,
        video_id: &str,
        egress: Option<&EgressIdentity>,
    ) -> Result<Option<String>, RemoteError>;

    /// The operator replaced the identity list. Sources holding per-identity
    /// state may drop whatever belongs to identities no longer listed.
    fn identities_reloaded(&self, _identities: &[EgressIdentity]) {}
}
