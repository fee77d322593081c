/// Where historical messages come from.
use anyhow::Result;
use async_trait::async_trait;

use super::types::ChannelInfo;
use crate::counter::ChatMessage;

/// A guild's channels and their message history.
///
/// Implemented by the host bridge for a live platform, and by
/// [`TranscriptSource`](super::transcript::TranscriptSource) for exported
/// transcripts.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Text channels in processing order.
    async fn channels(&self) -> Result<Vec<ChannelInfo>>;

    /// At most `limit` messages of `channel`, oldest first.
    async fn history(&self, channel: &ChannelInfo, limit: usize) -> Result<Vec<ChatMessage>>;
}
