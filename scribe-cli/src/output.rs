use std::path::{Path, PathBuf};

#[cfg(feature = "colored-output")]
use colored::*;
use scribe_engine::{CollectionEvent, RunReport, RunState};
use tokio::sync::mpsc::UnboundedReceiver;

pub struct OutputManager {
    colored: bool,
    json_events: bool,
    proxy_file: Option<PathBuf>,
}

impl OutputManager {
    pub fn new(colored: bool, json_events: bool, proxy_file: Option<PathBuf>) -> Self {
        Self {
            colored,
            json_events,
            proxy_file,
        }
    }

    /// Drain the worker's event stream until the worker drops its sender.
    pub async fn follow(self, mut events: UnboundedReceiver<CollectionEvent>) {
        while let Some(event) = events.recv().await {
            if let Some(line) = self.render_event(&event) {
                println!("{line}");
            }
        }
    }

    /// Console text for one event. Routine progress already goes to the log.
    pub fn render_event(&self, event: &CollectionEvent) -> Option<String> {
        if self.json_events {
            return serde_json::to_string(event).ok();
        }
        match event {
            CollectionEvent::Paused { consecutive_errors } => {
                Some(self.pause_banner(*consecutive_errors))
            }
            CollectionEvent::Resumed => Some(self.colorize("Resumed.", &Color::Green, true)),
            CollectionEvent::IdentitiesReloaded { count } => Some(format!(
                "{} {count} proxies loaded",
                self.colorize("Reloaded:", &Color::Cyan, true)
            )),
            _ => None,
        }
    }

    pub fn pause_banner(&self, consecutive_errors: u32) -> String {
        let rule = "!".repeat(60);
        let source = match &self.proxy_file {
            Some(path) => format!("Update {} and type `reload`.", path.display()),
            None => "No proxy file configured; requests go out directly.".to_owned(),
        };
        format!(
            "{rule}\n{}\n  {consecutive_errors} consecutive request failures.\n  {source}\n  Type `resume` to continue, or `stop` to save and exit.\n{rule}",
            self.colorize("COLLECTION PAUSED", &Color::Red, true),
        )
    }

    pub fn summary(&self, report: &RunReport) -> String {
        let stats = &report.stats;
        let heading = match report.state {
            RunState::Cancelled => self.colorize("Collection stopped", &Color::Yellow, true),
            _ => self.colorize("Collection complete", &Color::Green, true),
        };

        let mut output = format!("{heading}\n");
        let rows = [
            ("Channels listed", stats.channels_listed.to_string()),
            ("Channels failed", stats.channels_failed.to_string()),
            ("Videos inspected", stats.videos_seen.to_string()),
            ("Transcripts fetched", stats.transcripts_fetched.to_string()),
            (
                "Without transcript",
                stats.transcripts_unavailable.to_string(),
            ),
            ("Fetch errors", stats.transcript_errors.to_string()),
            ("Records saved", report.records_written.to_string()),
        ];
        for (label, value) in rows {
            output.push_str(&format!(
                "  {}: {}\n",
                self.colorize(label, &Color::Yellow, false),
                value
            ));
        }
        if report.records_written > 0 {
            output.push_str(&format!(
                "  {}: {}\n",
                self.colorize("Output", &Color::Yellow, false),
                self.colorize(&report.destination.display().to_string(), &Color::Cyan, false)
            ));
        }
        output
    }

    pub fn recovered(&self, path: &Path, count: usize) -> String {
        format!(
            "{} {count} records written to {}",
            self.colorize("Recovered:", &Color::Yellow, true),
            path.display()
        )
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Red => text.red(),
                    Color::Cyan => text.cyan(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (color, bold, self.colored);
            text.to_string()
        }
    }
}

enum Color {
    Green,
    Yellow,
    Red,
    Cyan,
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_engine::RunStats;

    fn plain() -> OutputManager {
        OutputManager::new(false, false, Some(PathBuf::from("proxies.txt")))
    }

    #[test]
    fn pause_banner_names_the_proxy_file() {
        let banner = plain().pause_banner(3);
        assert!(banner.contains("COLLECTION PAUSED"));
        assert!(banner.contains("3 consecutive"));
        assert!(banner.contains("proxies.txt"));
    }

    #[test]
    fn routine_events_stay_quiet() {
        let event = CollectionEvent::TranscriptUnavailable {
            video_id: "v1".into(),
        };
        assert_eq!(plain().render_event(&event), None);
        assert!(plain().render_event(&CollectionEvent::Resumed).is_some());
    }

    #[test]
    fn json_events_render_every_event() {
        let manager = OutputManager::new(false, true, None);
        let line = manager
            .render_event(&CollectionEvent::RecordAdded {
                video_id: "v1".into(),
                keyword: Some("rust".into()),
            })
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "record_added");
        assert_eq!(value["video_id"], "v1");
    }

    #[test]
    fn summary_reports_counts() {
        let report = RunReport {
            state: RunState::Cancelled,
            records_written: 2,
            destination: PathBuf::from("out.txt"),
            stats: RunStats {
                videos_seen: 5,
                records: 2,
                ..RunStats::default()
            },
        };
        let summary = plain().summary(&report);
        assert!(summary.starts_with("Collection stopped"));
        assert!(summary.contains("Videos inspected: 5"));
        assert!(summary.contains("Output: out.txt"));
    }
}
