//! YouTube source.
//!
//! Listing uses the Data API v3:
//! 1. `channels?part=contentDetails` resolves the uploads playlist
//! 2. `playlistItems?part=contentDetails` pages through video ids, newest first
//! 3. `videos?part=contentDetails,snippet` supplies title, duration and date
//!
//! Transcripts come from the caption tracks advertised on the watch page,
//! downloaded in `json3` form.

use std::{sync::LazyLock, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use super::{ClientPool, RemoteSource};
use crate::{
    egress::EgressIdentity,
    error::{Error, RemoteError, Result},
    record::VideoMeta,
};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const WATCH_URL: &str = "https://www.youtube.com/watch";

/// Data API page size limit.
const PAGE_SIZE: usize = 50;

/// Transcript language preference, most preferred first.
pub const DEFAULT_LANGUAGES: [&str; 5] = ["en", "ru", "es", "fr", "de"];

const CAPTION_TRACKS_MARKER: &str = "\"captionTracks\":";

/// Markers of the interstitial served to clients suspected of being bots.
const BOT_CHECK_MARKERS: [&str; 3] = [
    "g-recaptcha",
    "confirm you\u{2019}re not a bot",
    "unusual traffic from your computer",
];

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").unwrap()
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    content_details: ChannelDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    content_details: VideoDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    duration: String,
}

/// Caption track entry from the watch page player response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    /// `"asr"` for auto-generated tracks
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    fn is_language(&self, language: &str) -> bool {
        self.language_code == language
            || self
                .language_code
                .strip_prefix(language)
                .is_some_and(|rest| rest.starts_with('-'))
    }
}

#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
struct TimedTextEvent {
    #[serde(default)]
    segs: Vec<TimedTextSegment>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSegment {
    #[serde(default)]
    utf8: String,
}

/// YouTube-backed [`RemoteSource`].
#[derive(Debug)]
pub struct YoutubeSource {
    api_key: String,
    languages: Vec<String>,
    clients: ClientPool,
}

impl YoutubeSource {
    /// Create a source authenticated with a Data API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into().trim().to_owned();
        if api_key.is_empty() {
            return Err(Error::config("YouTube API key is empty"));
        }
        Ok(Self {
            api_key,
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            clients: ClientPool::default(),
        })
    }

    /// Read the API key from a file, trimming surrounding whitespace.
    pub fn from_key_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let key = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read API key from {}: {e}", path.display()))
        })?;
        Self::new(key)
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        if !languages.is_empty() {
            self.languages = languages;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.clients = ClientPool::new(timeout);
        self
    }

    async fn api_get<T: DeserializeOwned>(
        &self,
        client: &Client,
        target: &str,
        operation: &'static str,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> std::result::Result<T, RemoteError> {
        let response = client
            .get(format!("{API_BASE}/{endpoint}"))
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            // The request URL carries the API key.
            .map_err(|e| RemoteError::network(target, e.without_url()))?;

        let response = check_status(response, target, operation)?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::invalid_response(target, e.without_url().to_string()))
    }

    async fn uploads_playlist(
        &self,
        client: &Client,
        channel_id: &str,
    ) -> std::result::Result<String, RemoteError> {
        let channels: ListResponse<ChannelItem> = self
            .api_get(
                client,
                channel_id,
                "channel lookup",
                "channels",
                &[("part", "contentDetails"), ("id", channel_id)],
            )
            .await?;

        channels
            .items
            .into_iter()
            .next()
            .map(|item| item.content_details.related_playlists.uploads)
            .ok_or_else(|| RemoteError::not_found(channel_id))
    }

    async fn fetch_timed_text(
        &self,
        client: &Client,
        video_id: &str,
        track: &CaptionTrack,
    ) -> std::result::Result<String, RemoteError> {
        let response = client
            .get(&track.base_url)
            .query(&[("fmt", "json3")])
            .send()
            .await
            .map_err(|e| RemoteError::network(video_id, e))?;
        let response = check_status(response, video_id, "caption download")?;
        let timed_text: TimedText = response
            .json()
            .await
            .map_err(|e| RemoteError::invalid_response(video_id, e.to_string()))?;
        Ok(join_segments(&timed_text))
    }
}

#[async_trait]
impl RemoteSource for YoutubeSource {
    async fn list_videos(
        &self,
        channel_id: &str,
        max_results: usize,
        min_duration_minutes: u32,
        egress: Option<&EgressIdentity>,
    ) -> std::result::Result<Vec<VideoMeta>, RemoteError> {
        let client = self.clients.client_for(egress)?;
        let uploads = self.uploads_playlist(&client, channel_id).await?;
        debug!(channel_id, uploads = %uploads, "Resolved uploads playlist");

        let mut videos = Vec::new();
        let mut page_token: Option<String> = None;

        while videos.len() < max_results {
            let page_size = PAGE_SIZE.min(max_results - videos.len()).to_string();
            let mut params = vec![
                ("part", "contentDetails"),
                ("playlistId", uploads.as_str()),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let page: ListResponse<PlaylistItem> = self
                .api_get(&client, channel_id, "playlist listing", "playlistItems", &params)
                .await?;

            let ids: Vec<String> = page
                .items
                .into_iter()
                .map(|item| item.content_details.video_id)
                .collect();
            if ids.is_empty() {
                break;
            }

            let joined = ids.join(",");
            let details: ListResponse<VideoItem> = self
                .api_get(
                    &client,
                    channel_id,
                    "video details",
                    "videos",
                    &[("part", "contentDetails,snippet"), ("id", joined.as_str())],
                )
                .await?;

            // The videos endpoint does not promise to keep the requested order.
            let mut details = details.items;
            details.sort_by_key(|item| ids.iter().position(|id| *id == item.id));

            videos.extend(details.into_iter().filter_map(|item| {
                let duration_minutes = parse_duration_minutes(&item.content_details.duration);
                (duration_minutes >= min_duration_minutes).then(|| VideoMeta {
                    id: item.id,
                    title: item.snippet.title,
                    duration_minutes,
                    published_at: item.snippet.published_at,
                })
            }));

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        videos.truncate(max_results);
        Ok(videos)
    }

    async fn fetch_transcript(
        &self,
        video_id: &str,
        egress: Option<&EgressIdentity>,
    ) -> std::result::Result<Option<String>, RemoteError> {
        let client = self.clients.client_for(egress)?;
        let response = client
            .get(WATCH_URL)
            .query(&[("v", video_id), ("hl", "en")])
            .send()
            .await
            .map_err(|e| RemoteError::network(video_id, e))?;

        if response.url().path().starts_with("/sorry") {
            return Err(RemoteError::blocked(video_id, "redirected to rate-limit page"));
        }
        let response = check_status(response, video_id, "watch page")?;
        let html = response
            .text()
            .await
            .map_err(|e| RemoteError::network(video_id, e))?;

        if is_bot_check(&html) {
            return Err(RemoteError::blocked(video_id, "bot check served"));
        }

        let tracks = match extract_caption_tracks(&html)
            .map_err(|reason| RemoteError::invalid_response(video_id, reason))?
        {
            Some(tracks) => tracks,
            None => {
                debug!(video_id, "No caption tracks advertised");
                return Ok(None);
            }
        };
        let Some(track) = select_track(&tracks, &self.languages) else {
            debug!(video_id, available = tracks.len(), "No caption track in a preferred language");
            return Ok(None);
        };

        debug!(video_id, language = %track.language_code, generated = track.is_generated(), "Downloading captions");
        let text = self.fetch_timed_text(&client, video_id, track).await?;
        Ok((!text.is_empty()).then_some(text))
    }

    fn identities_reloaded(&self, identities: &[EgressIdentity]) {
        self.clients.retain(identities);
    }
}

fn check_status(
    response: Response,
    target: &str,
    operation: &'static str,
) -> std::result::Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => {
            RemoteError::blocked(target, format!("HTTP 429 during {operation}"))
        }
        StatusCode::NOT_FOUND => RemoteError::not_found(target),
        _ => RemoteError::http_status(target, status, operation),
    })
}

/// Convert an ISO-8601 duration (`PT1H2M40S`) to whole minutes.
///
/// Seconds above 30 round up to the next minute. Unparseable input yields 0.
pub fn parse_duration_minutes(duration: &str) -> u32 {
    let Some(caps) = DURATION_REGEX.captures(duration) else {
        return 0;
    };
    let field = |idx: usize| -> u32 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let (days, hours, minutes, seconds) = (field(1), field(2), field(3), field(4));

    days.saturating_mul(24 * 60)
        .saturating_add(hours.saturating_mul(60))
        .saturating_add(minutes)
        .saturating_add(u32::from(seconds > 30))
}

fn is_bot_check(html: &str) -> bool {
    BOT_CHECK_MARKERS.iter().any(|marker| html.contains(marker))
}

/// Pull the caption track list out of the watch page's embedded JSON.
///
/// `Ok(None)` when the page advertises no captions at all.
fn extract_caption_tracks(html: &str) -> std::result::Result<Option<Vec<CaptionTrack>>, String> {
    let Some(start) = html.find(CAPTION_TRACKS_MARKER) else {
        return Ok(None);
    };
    let rest = &html[start + CAPTION_TRACKS_MARKER.len()..];
    match serde_json::Deserializer::from_str(rest)
        .into_iter::<Vec<CaptionTrack>>()
        .next()
    {
        Some(Ok(tracks)) if tracks.is_empty() => Ok(None),
        Some(Ok(tracks)) => Ok(Some(tracks)),
        Some(Err(e)) => Err(format!("malformed caption track list: {e}")),
        None => Err("truncated caption track list".to_owned()),
    }
}

/// First track matching the language preference; manual captions win over
/// auto-generated ones within a language.
fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    languages.iter().find_map(|language| {
        let mut candidates = tracks.iter().filter(|t| t.is_language(language));
        let first = candidates.clone().find(|t| !t.is_generated());
        first.or_else(|| candidates.next())
    })
}

fn join_segments(timed_text: &TimedText) -> String {
    timed_text
        .events
        .iter()
        .map(|event| {
            event
                .segs
                .iter()
                .map(|seg| seg.utf8.as_str())
                .collect::<String>()
                .replace('\n', " ")
        })
        .map(|line| line.trim().to_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("PT15M", 15)]
    #[case("PT1H2M", 62)]
    #[case("PT10M31S", 11)]
    #[case("PT10M30S", 10)]
    #[case("PT45S", 1)]
    #[case("PT20S", 0)]
    #[case("P1DT1H", 1500)]
    #[case("P0D", 0)]
    #[case("garbage", 0)]
    #[case("", 0)]
    fn duration_parsing(#[case] input: &str, #[case] expected: u32) {
        assert_eq!(parse_duration_minutes(input), expected);
    }

    fn track(language: &str, generated: bool) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://example.invalid/{language}"),
            language_code: language.to_owned(),
            kind: generated.then(|| "asr".to_owned()),
        }
    }

    fn languages() -> Vec<String> {
        DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn prefers_language_order_then_manual_tracks() {
        let tracks = vec![track("de", false), track("en", true), track("en", false)];
        let chosen = select_track(&tracks, &languages()).unwrap();
        assert_eq!(chosen.language_code, "en");
        assert!(!chosen.is_generated());

        let tracks = vec![track("fr", false), track("ru", true)];
        let chosen = select_track(&tracks, &languages()).unwrap();
        assert_eq!(chosen.language_code, "ru");
    }

    #[test]
    fn regional_variants_match_base_language() {
        let tracks = vec![track("en-GB", false)];
        assert!(select_track(&tracks, &languages()).is_some());
        let tracks = vec![track("eng", false)];
        assert!(select_track(&tracks, &languages()).is_none());
    }

    #[test]
    fn no_preferred_language_yields_none() {
        let tracks = vec![track("ja", false), track("ko", true)];
        assert!(select_track(&tracks, &languages()).is_none());
    }

    #[test]
    fn extracts_caption_tracks_from_watch_page() {
        let html = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=abc&lang=en","name":{"simpleText":"English"},"languageCode":"en","kind":"asr","isTranslatable":true}],"audioTracks":[]}}};</script>"#;
        let tracks = extract_caption_tracks(html).unwrap().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].language_code, "en");
        assert!(tracks[0].is_generated());
        assert_eq!(
            tracks[0].base_url,
            "https://www.youtube.com/api/timedtext?v=abc&lang=en"
        );
    }

    #[test]
    fn page_without_captions_has_no_tracks() {
        let html = r#"<script>var ytInitialPlayerResponse = {"playabilityStatus":{"status":"OK"}};</script>"#;
        assert!(extract_caption_tracks(html).unwrap().is_none());
        assert!(
            extract_caption_tracks(r#"{"captionTracks":[]}"#)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn malformed_track_list_is_an_error() {
        assert!(extract_caption_tracks(r#"{"captionTracks":[{"baseUrl":1}]}"#).is_err());
    }

    #[test]
    fn joins_timed_text_segments() {
        let json = r#"{"events":[
            {"tStartMs":0,"segs":[{"utf8":"hello "},{"utf8":"world"}]},
            {"tStartMs":10},
            {"tStartMs":20,"segs":[{"utf8":"\n"}]},
            {"tStartMs":30,"segs":[{"utf8":"second\nline"}]}
        ]}"#;
        let timed_text: TimedText = serde_json::from_str(json).unwrap();
        assert_eq!(join_segments(&timed_text), "hello world second line");
    }

    #[test]
    fn detects_bot_check_page() {
        assert!(is_bot_check(r#"<div class="g-recaptcha" data-sitekey="x"></div>"#));
        assert!(is_bot_check("Sign in to confirm you\u{2019}re not a bot"));
        assert!(!is_bot_check("<html>regular watch page</html>"));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(YoutubeSource::new("  \n").unwrap_err().is_config());
        assert!(YoutubeSource::new("AIza-key").is_ok());
    }

    #[test]
    fn key_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.txt");
        std::fs::write(&path, "  AIza-key\n").unwrap();
        let source = YoutubeSource::from_key_file(&path).unwrap();
        assert_eq!(source.api_key, "AIza-key");

        let missing = YoutubeSource::from_key_file(dir.path().join("nope.txt"));
        assert!(missing.unwrap_err().is_config());
    }
}
