/// Channel transcripts exported to JSON, used as a history source.
///
/// A transcript path is either a directory of `*.json` files (one channel
/// each, processed in file name order) or a single file holding one
/// transcript or an array of them.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::source::HistorySource;
use super::types::ChannelInfo;
use crate::counter::ChatMessage;

fn default_readable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Transcript {
    /// Channel name shown in notices
    pub channel: String,
    /// Platform channel id; the name is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Whether the exporting account could read the history
    #[serde(default = "default_readable")]
    pub readable: bool,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Transcript {
    fn channel_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.channel)
    }
}

/// Key handed out as `ChannelInfo::id`.
///
/// Prefixed with the transcript's position, since several exports may share
/// a channel name (or even an id) and each must be read exactly once.
fn channel_key(index: usize, transcript: &Transcript) -> String {
    format!("{}:{}", index, transcript.channel_id())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    Many(Vec<Transcript>),
    One(Transcript),
}

pub struct TranscriptSource {
    transcripts: Vec<Transcript>,
}

impl TranscriptSource {
    pub fn new(transcripts: Vec<Transcript>) -> Self {
        Self { transcripts }
    }

    /// A source with no channels.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Read transcripts from a directory or a single file.
    pub fn open(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to access transcripts: {}", path.display()))?;

        let transcripts = if metadata.is_dir() {
            let mut files = Vec::new();
            for entry in fs::read_dir(path)
                .with_context(|| format!("Failed to read directory: {}", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.extension().is_some_and(|ext| ext == "json") {
                    files.push(entry_path);
                }
            }
            files.sort();

            let mut transcripts = Vec::new();
            for file in &files {
                transcripts.extend(read_transcript_file(file)?);
            }
            transcripts
        } else {
            read_transcript_file(path)?
        };

        tracing::info!(
            path = %path.display(),
            channels = transcripts.len(),
            "Transcripts loaded"
        );
        Ok(Self::new(transcripts))
    }
}

fn read_transcript_file(path: &Path) -> Result<Vec<Transcript>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;
    let parsed: TranscriptFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse transcript JSON from: {}", path.display()))?;
    Ok(match parsed {
        TranscriptFile::Many(many) => many,
        TranscriptFile::One(one) => vec![one],
    })
}

#[async_trait]
impl HistorySource for TranscriptSource {
    async fn channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(self
            .transcripts
            .iter()
            .enumerate()
            .map(|(index, t)| ChannelInfo {
                id: channel_key(index, t),
                name: t.channel.clone(),
                can_read_history: t.readable,
            })
            .collect())
    }

    async fn history(&self, channel: &ChannelInfo, limit: usize) -> Result<Vec<ChatMessage>> {
        let transcript = self
            .transcripts
            .iter()
            .enumerate()
            .find(|(index, t)| channel_key(*index, t) == channel.id)
            .map(|(_, t)| t)
            .ok_or_else(|| anyhow!("Unknown channel: {}", channel.id))?;

        let mut messages = transcript.messages.clone();
        messages.sort_by_key(|m| m.timestamp);
        messages.truncate(limit);
        Ok(messages)
    }
}
