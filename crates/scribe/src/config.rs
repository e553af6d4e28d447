use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    egress::EgressIdentity,
    error::{Error, Result},
};

pub const DEFAULT_OUTPUT_FILE: &str = "transcripts_output.txt";

/// Layout of the results file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Banner-separated plain text
    #[default]
    Text,
    /// Pretty-printed JSON array
    Json,
}

/// Case-insensitive substring filter over transcript text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFilter {
    keyword: String,
    folded: String,
}

impl KeywordFilter {
    /// Build a filter; a blank keyword means "no filter".
    pub fn new(keyword: &str) -> Option<Self> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return None;
        }
        Some(Self {
            keyword: keyword.to_owned(),
            folded: keyword.to_lowercase(),
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.folded)
    }
}

/// Snapshot of everything one collection run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub channels: Vec<String>,
    pub max_videos_per_channel: usize,
    /// Inclusive lower bound, in minutes.
    pub min_duration_minutes: u32,
    pub keyword: Option<KeywordFilter>,
    /// Successful requests per identity before a forced rotation.
    pub rotation_interval: u32,
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub identities: Vec<EgressIdentity>,
    pub destination: PathBuf,
    pub output_format: OutputFormat,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            max_videos_per_channel: 100,
            min_duration_minutes: 10,
            keyword: None,
            rotation_interval: 10,
            delay_min: Duration::from_secs(3),
            delay_max: Duration::from_secs(10),
            identities: Vec::new(),
            destination: PathBuf::from(DEFAULT_OUTPUT_FILE),
            output_format: OutputFormat::Text,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(Error::config("no channel ids given"));
        }
        if self.channels.iter().any(|c| c.trim().is_empty()) {
            return Err(Error::config("channel ids must not be blank"));
        }
        if self.max_videos_per_channel == 0 {
            return Err(Error::config("max videos per channel must be at least 1"));
        }
        if self.rotation_interval == 0 {
            return Err(Error::config("rotation interval must be at least 1"));
        }
        if self.delay_max < self.delay_min {
            return Err(Error::config(format!(
                "delay max ({}s) is below delay min ({}s)",
                self.delay_max.as_secs_f64(),
                self.delay_min.as_secs_f64()
            )));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(Error::config("output destination is empty"));
        }
        Ok(())
    }
}

/// Split a comma-separated channel list, dropping blanks.
pub fn parse_channel_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RunConfig {
        RunConfig {
            channels: vec!["UC1".into()],
            ..RunConfig::default()
        }
    }

    #[test]
    fn default_with_channel_is_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_invalid_configs() {
        let cases = [
            RunConfig::default(),
            RunConfig {
                rotation_interval: 0,
                ..valid()
            },
            RunConfig {
                max_videos_per_channel: 0,
                ..valid()
            },
            RunConfig {
                delay_min: Duration::from_secs(5),
                delay_max: Duration::from_secs(4),
                ..valid()
            },
            RunConfig {
                destination: PathBuf::new(),
                ..valid()
            },
            RunConfig {
                channels: vec!["UC1".into(), " ".into()],
                ..valid()
            },
        ];
        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(err.is_config(), "{err}");
        }
    }

    #[test]
    fn zero_delays_are_allowed() {
        let config = RunConfig {
            delay_min: Duration::ZERO,
            delay_max: Duration::ZERO,
            ..valid()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn channel_list_parsing() {
        assert_eq!(
            parse_channel_list(" UC1, ,UC2,,  UC3 "),
            vec!["UC1", "UC2", "UC3"]
        );
        assert!(parse_channel_list(" , ").is_empty());
    }

    #[test]
    fn keyword_filter_is_case_insensitive() {
        let filter = KeywordFilter::new("  META ").unwrap();
        assert_eq!(filter.keyword(), "META");
        assert!(filter.matches("the metaverse is here"));
        assert!(filter.matches("Meta announced"));
        assert!(!filter.matches("nothing relevant"));
    }

    #[test]
    fn blank_keyword_means_no_filter() {
        assert!(KeywordFilter::new("").is_none());
        assert!(KeywordFilter::new("   ").is_none());
    }
}
