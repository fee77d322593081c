/// Data structures for the backfill module.
use crate::window::DateWindow;

/// Messages fetched per channel when the caller gives no limit.
pub const DEFAULT_LIMIT: usize = 100;

/// A channel offered by a history source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    /// Whether this bot may read the channel's message history
    pub can_read_history: bool,
}

/// What a backfill should import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackfillRequest {
    /// Oldest messages fetched per channel
    pub limit: usize,
    /// Only count messages sent inside this window
    pub window: Option<DateWindow>,
}

impl Default for BackfillRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: None,
        }
    }
}

/// Counts from folding one channel's history into the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelTally {
    pub fetched: usize,
    pub counted: usize,
    pub bots: usize,
    pub outside_window: usize,
}

/// Result for one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// Folded in and saved
    Imported {
        channel: ChannelInfo,
        tally: ChannelTally,
    },
    /// History not readable, nothing done
    Skipped { channel: ChannelInfo },
}

/// Per-channel results in processing order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl BackfillReport {
    pub fn counted(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                ChannelOutcome::Imported { tally, .. } => tally.counted,
                ChannelOutcome::Skipped { .. } => 0,
            })
            .sum()
    }

    pub fn imported_channels(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ChannelOutcome::Imported { .. }))
            .count()
    }

    pub fn skipped_channels(&self) -> impl Iterator<Item = &ChannelInfo> {
        self.outcomes.iter().filter_map(|o| match o {
            ChannelOutcome::Skipped { channel } => Some(channel),
            ChannelOutcome::Imported { .. } => None,
        })
    }
}
