//! Persistence of collected records.

use std::{fmt::Write as _, path::Path};

use async_trait::async_trait;
use tracing::info;

use crate::{config::OutputFormat, record::TranscriptRecord};

const BANNER_WIDTH: usize = 80;

/// Writes a run's records to a destination and reports how many were written.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn write(&self, records: &[TranscriptRecord], destination: &Path)
    -> std::io::Result<usize>;
}

/// Plain text, one banner-delimited block per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextFileSink;

/// A pretty-printed JSON array of records.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFileSink;

/// Sink matching an [`OutputFormat`].
pub fn sink_for(format: OutputFormat) -> Box<dyn ResultSink> {
    match format {
        OutputFormat::Text => Box::new(TextFileSink),
        OutputFormat::Json => Box::new(JsonFileSink),
    }
}

pub fn render_text(records: &[TranscriptRecord]) -> String {
    let banner = "=".repeat(BANNER_WIDTH);
    let mut out = String::new();
    for record in records {
        let _ = write!(
            out,
            "{banner}\nChannel: {}\nVideo ID: {}\nTitle: {}\n{banner}\n\n{}\n\n\n",
            record.channel_id, record.video_id, record.title, record.text
        );
    }
    out
}

async fn write_file(destination: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(destination, contents).await
}

#[async_trait]
impl ResultSink for TextFileSink {
    async fn write(
        &self,
        records: &[TranscriptRecord],
        destination: &Path,
    ) -> std::io::Result<usize> {
        write_file(destination, render_text(records).as_bytes()).await?;
        info!(count = records.len(), path = %destination.display(), "Wrote transcripts");
        Ok(records.len())
    }
}

#[async_trait]
impl ResultSink for JsonFileSink {
    async fn write(
        &self,
        records: &[TranscriptRecord],
        destination: &Path,
    ) -> std::io::Result<usize> {
        let json = serde_json::to_vec_pretty(records)?;
        write_file(destination, &json).await?;
        info!(count = records.len(), path = %destination.display(), "Wrote transcripts");
        Ok(records.len())
    }
}
