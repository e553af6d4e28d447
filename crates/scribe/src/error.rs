use std::path::PathBuf;

use reqwest::StatusCode;

use crate::record::TranscriptRecord;

/// A single listing or transcript attempt failed.
///
/// Always recovered by the controller: the offending operation is skipped and
/// the outcome is reported to the egress pool. Never fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP request for `{target}` failed: {source}")]
    Network {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for `{target}` failed with HTTP {status} during {operation}")]
    HttpStatus {
        target: String,
        status: StatusCode,
        operation: &'static str,
    },

    #[error("unexpected response for `{target}`: {reason}")]
    InvalidResponse { target: String, reason: String },

    #[error("`{target}` not found")]
    NotFound { target: String },

    #[error("upstream refused `{target}`: {reason}")]
    Blocked { target: String, reason: String },

    #[error("proxy error for `{target}`: {reason}")]
    Proxy { target: String, reason: String },
}

impl RemoteError {
    pub fn network(target: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            target: target.into(),
            source,
        }
    }

    pub fn http_status(
        target: impl Into<String>,
        status: StatusCode,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            target: target.into(),
            status,
            operation,
        }
    }

    pub fn invalid_response(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    pub fn blocked(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Blocked {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn proxy(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Proxy {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Channel or video id the failed operation was working on.
    pub fn target(&self) -> &str {
        match self {
            Self::Network { target, .. }
            | Self::HttpStatus { target, .. }
            | Self::InvalidResponse { target, .. }
            | Self::NotFound { target }
            | Self::Blocked { target, .. }
            | Self::Proxy { target, .. } => target,
        }
    }

    /// Whether the upstream is signalling throttling of the current identity.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Blocked { .. } => true,
            Self::HttpStatus { status, .. } => *status == StatusCode::TOO_MANY_REQUESTS,
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or missing configuration. Raised before any network activity.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Final persistence failed. The records are handed back so the caller
    /// can retry the write.
    #[error("failed to write {} records to {}: {source}", records.len(), destination.display())]
    Persist {
        destination: PathBuf,
        #[source]
        source: std::io::Error,
        records: Vec<TranscriptRecord>,
    },
}

impl Error {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Records that were collected but could not be persisted, if any.
    pub fn into_unwritten_records(self) -> Option<Vec<TranscriptRecord>> {
        match self {
            Self::Persist { records, .. } => Some(records),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_reported_for_every_variant() {
        assert_eq!(RemoteError::not_found("UC123").target(), "UC123");
        assert_eq!(RemoteError::blocked("vid", "captcha").target(), "vid");
        assert_eq!(
            RemoteError::http_status("vid", StatusCode::FORBIDDEN, "transcript").target(),
            "vid"
        );
    }

    #[test]
    fn rate_limit_detection() {
        assert!(RemoteError::blocked("vid", "captcha").is_rate_limited());
        assert!(
            RemoteError::http_status("vid", StatusCode::TOO_MANY_REQUESTS, "listing")
                .is_rate_limited()
        );
        assert!(!RemoteError::not_found("UC1").is_rate_limited());
    }

    #[test]
    fn persist_error_hands_back_records() {
        let records = vec![TranscriptRecord {
            channel_id: "UC1".into(),
            video_id: "v1".into(),
            title: "t".into(),
            text: "hello".into(),
        }];
        let err = Error::Persist {
            destination: PathBuf::from("/nope/out.txt"),
            source: std::io::Error::other("disk full"),
            records: records.clone(),
        };
        assert!(err.to_string().contains("1 records"));
        assert_eq!(err.into_unwritten_records(), Some(records));
    }
}
