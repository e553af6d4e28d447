use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use scribe_engine::{
    EgressIdentity, KeywordFilter, OutputFormat, RunConfig, parse_channel_list,
    source::youtube::DEFAULT_LANGUAGES,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cli::CollectArgs,
    error::{AppError, Result},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub channels: Vec<String>,
    pub api_key_file: Option<PathBuf>,
    pub proxy_file: Option<PathBuf>,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub max_videos: usize,
    /// Minutes, inclusive
    pub min_duration: u32,
    pub keyword: Option<String>,
    pub rotation_interval: u32,
    /// Seconds
    pub delay_min: u64,
    /// Seconds
    pub delay_max: u64,
    /// Per-request timeout in seconds
    pub request_timeout: u64,
    /// Transcript language preference
    pub languages: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            channels: Vec::new(),
            api_key_file: None,
            proxy_file: None,
            output: run.destination,
            format: run.output_format,
            max_videos: run.max_videos_per_channel,
            min_duration: run.min_duration_minutes,
            keyword: None,
            rotation_interval: run.rotation_interval,
            delay_min: run.delay_min.as_secs(),
            delay_max: run.delay_max.as_secs(),
            request_timeout: 30,
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scribe").join("config.toml"))
    }

    fn resolve(path: Option<&Path>) -> Option<PathBuf> {
        path.map(Path::to_path_buf).or_else(Self::default_path)
    }

    /// Load the configuration; a missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = Self::resolve(path) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = Self::resolve(path).ok_or_else(|| {
            AppError::InvalidInput("no configuration directory available".to_owned())
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.show()?)?;
        Ok(path)
    }

    pub fn reset(path: Option<&Path>) -> Result<PathBuf> {
        Self::default().save(path)
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Overlay command-line flags.
    pub fn apply(mut self, args: &CollectArgs) -> Self {
        if let Some(channels) = &args.channels {
            self.channels = parse_channel_list(channels);
        }
        if let Some(path) = &args.api_key_file {
            self.api_key_file = Some(path.clone());
        }
        if let Some(path) = &args.proxy_file {
            self.proxy_file = Some(path.clone());
        }
        if let Some(output) = &args.output {
            self.output = output.clone();
        }
        if let Some(format) = args.format {
            self.format = format;
        }
        if let Some(max_videos) = args.max_videos {
            self.max_videos = max_videos;
        }
        if let Some(min_duration) = args.min_duration {
            self.min_duration = min_duration;
        }
        if let Some(keyword) = &args.keyword {
            self.keyword = Some(keyword.clone());
        }
        if let Some(interval) = args.rotation_interval {
            self.rotation_interval = interval;
        }
        if let Some(delay_min) = args.delay_min {
            self.delay_min = delay_min;
        }
        if let Some(delay_max) = args.delay_max {
            self.delay_max = delay_max;
        }
        if let Some(timeout) = args.timeout {
            self.request_timeout = timeout;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn run_config(&self, identities: Vec<EgressIdentity>) -> RunConfig {
        RunConfig {
            channels: self
                .channels
                .iter()
                .map(|c| c.trim().to_owned())
                .filter(|c| !c.is_empty())
                .collect(),
            max_videos_per_channel: self.max_videos,
            min_duration_minutes: self.min_duration,
            keyword: self.keyword.as_deref().and_then(KeywordFilter::new),
            rotation_interval: self.rotation_interval,
            delay_min: Duration::from_secs(self.delay_min),
            delay_max: Duration::from_secs(self.delay_max),
            identities,
            destination: self.output.clone(),
            output_format: self.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.max_videos, 100);
        assert_eq!(config.min_duration, 10);
        assert_eq!(config.rotation_interval, 10);
        assert_eq!((config.delay_min, config.delay_max), (3, 10));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let config = AppConfig {
            channels: vec!["UC1".into()],
            keyword: Some("rust".into()),
            format: OutputFormat::Json,
            ..AppConfig::default()
        };
        config.save(Some(&path)).unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "channels = [\"UC9\"]\ndelay_max = 20\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.channels, vec!["UC9"]);
        assert_eq!(config.delay_max, 20);
        assert_eq!(config.delay_min, 3);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_videos = \"many\"").unwrap();
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(AppError::ConfigParse(_))
        ));
    }

    #[test]
    fn flags_override_file_values() {
        let args = CollectArgs {
            channels: Some("A, B".into()),
            keyword: Some("meta".into()),
            delay_max: Some(30),
            ..CollectArgs::default()
        };
        let config = AppConfig::default().apply(&args);
        assert_eq!(config.channels, vec!["A", "B"]);
        assert_eq!(config.delay_max, 30);

        let run = config.run_config(Vec::new());
        assert_eq!(run.keyword.unwrap().keyword(), "meta");
        assert_eq!(run.delay_max, Duration::from_secs(30));
        assert!(run.identities.is_empty());
    }

    #[test]
    fn blank_keyword_disables_filter() {
        let config = AppConfig {
            keyword: Some("  ".into()),
            ..AppConfig::default()
        };
        assert!(config.run_config(Vec::new()).keyword.is_none());
    }
}
