/// Historical message import.
///
/// Walks each channel's oldest messages and folds them into the store with
/// the same counting rule as live messages.
///
/// # Architecture
///
/// - **types**: requests, per-channel tallies and the report
/// - **source**: the `HistorySource` trait a host implements
/// - **transcript**: a history source backed by exported JSON transcripts
/// - **progress**: progress reporting UI
///
/// Each channel is fetched outside the store lock, then folded and saved
/// under it. A failure stops the run; channels saved before it stay saved.
use chrono_tz::Tz;

use crate::context::StatsContext;
use crate::counter::{self, ChatMessage};
use crate::error::BackfillError;
use crate::store::Store;
use crate::window::DateWindow;

pub mod types;
pub use types::{
    BackfillReport, BackfillRequest, ChannelInfo, ChannelOutcome, ChannelTally, DEFAULT_LIMIT,
};

pub mod source;
pub use source::HistorySource;

pub mod transcript;
pub use transcript::{Transcript, TranscriptSource};

pub mod progress;
use progress::{format_completed_channel, BackfillProgress};

/// Fold one channel's messages into `store`.
///
/// Bot messages and messages outside `window` are skipped. Each remaining
/// message is counted on its own local day, not the day of the import.
pub fn fold_messages(
    store: &mut Store,
    messages: &[ChatMessage],
    window: Option<&DateWindow>,
    tz: Tz,
) -> ChannelTally {
    let mut tally = ChannelTally {
        fetched: messages.len(),
        ..ChannelTally::default()
    };

    for message in messages {
        if let Some(window) = window {
            if !window.contains_instant(message.timestamp, tz) {
                tally.outside_window += 1;
                continue;
            }
        }
        if counter::observe(store, message, tz) {
            tally.counted += 1;
        } else {
            tally.bots += 1;
        }
    }

    tally
}

/// Import history from every channel `source` offers.
///
/// Unreadable channels are skipped with a notice. Any other failure aborts
/// the remaining channels and comes back as a [`BackfillError`] carrying
/// what was already committed.
pub async fn run<S>(
    ctx: &StatsContext,
    source: &S,
    request: &BackfillRequest,
) -> Result<BackfillReport, BackfillError>
where
    S: HistorySource + ?Sized,
{
    let mut report = BackfillReport::default();

    let channels = match source.channels().await {
        Ok(channels) => channels,
        Err(cause) => return Err(BackfillError { report, cause }),
    };

    tracing::info!(
        channels = channels.len(),
        limit = request.limit,
        window = ?request.window.map(|w| w.label()),
        "Starting message collection"
    );

    let progress = BackfillProgress::new(channels.len());
    let tz = ctx.timezone();

    for channel in channels {
        if !channel.can_read_history {
            tracing::info!(channel = %channel.name, "No permission to read history, skipping");
            progress.println(&format!("  - {} (history not readable)", channel.name));
            report.outcomes.push(ChannelOutcome::Skipped { channel });
            progress.inc();
            continue;
        }

        let spinner = progress.channel_spinner(&channel.name);
        let fetched = source.history(&channel, request.limit).await;
        if let Some(ref sp) = spinner {
            sp.finish_and_clear();
        }

        let messages = match fetched {
            Ok(messages) => messages,
            Err(cause) => {
                progress.finish();
                tracing::error!(channel = %channel.name, error = %cause, "Failed to fetch history");
                return Err(BackfillError {
                    report,
                    cause: cause.context(format!("Failed to read history of {}", channel.name)),
                });
            }
        };

        let window = request.window;
        let folded = ctx
            .mutate(|store| fold_messages(store, &messages, window.as_ref(), tz))
            .await;

        let tally = match folded {
            Ok(tally) => tally,
            Err(cause) => {
                progress.finish();
                tracing::error!(channel = %channel.name, error = %cause, "Failed to save store");
                return Err(BackfillError { report, cause });
            }
        };

        tracing::info!(
            channel = %channel.name,
            fetched = tally.fetched,
            counted = tally.counted,
            bots = tally.bots,
            outside_window = tally.outside_window,
            "Channel collected"
        );
        progress.println(&format!("  ✓ {}", format_completed_channel(&channel.name, &tally)));
        report.outcomes.push(ChannelOutcome::Imported { channel, tally });
        progress.inc();
    }

    progress.finish();
    tracing::info!(
        counted = report.counted(),
        channels = report.imported_channels(),
        "Message collection complete"
    );
    Ok(report)
}
