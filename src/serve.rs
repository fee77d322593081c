/// Host bridge: JSON-line events in, JSON-line replies out.
///
/// The chat platform connection lives in the host process, which forwards
/// each observed message and each command as one JSON object per line.
/// Messages are counted in arrival order; commands run as their own tasks
/// so a long collection does not hold up live counting.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::backfill::HistorySource;
use crate::commands::{self, Caller, Command};
use crate::context::StatsContext;
use crate::counter::ChatMessage;
use crate::render;

/// Capacity of the reply queue feeding the writer task.
const REPLY_QUEUE_SIZE: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    Message(LiveMessage),
    Command(CommandEvent),
}

/// A message observed as it was sent.
///
/// The host may leave out `timestamp`; the arrival time is used then.
#[derive(Debug, Deserialize)]
pub struct LiveMessage {
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LiveMessage {
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            author_id: self.author_id,
            author_name: self.author_name,
            bot: self.bot,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandEvent {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub caller: Caller,
    /// Opaque token echoed back so the host can route the reply
    #[serde(default)]
    pub reply_to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub text: String,
}

/// Process events from `input` until EOF, writing replies to `output`.
///
/// Returns the writer once every pending command has replied.
pub async fn run<R, W, S>(
    ctx: Arc<StatsContext>,
    source: Arc<S>,
    input: R,
    output: W,
) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: HistorySource + 'static,
{
    let (reply_tx, reply_rx) = mpsc::channel::<Reply>(REPLY_QUEUE_SIZE);
    let writer = tokio::spawn(write_replies(reply_rx, output));
    let mut tasks = JoinSet::new();

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read event")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed event");
                continue;
            }
        };

        match event {
            HostEvent::Message(live) => {
                let message = live.into_message();
                if let Err(e) = ctx.record_message(&message).await {
                    tracing::error!(error = %e, author = %message.author_id, "Failed to persist message count");
                }
            }
            HostEvent::Command(command) => {
                let ctx = Arc::clone(&ctx);
                let source = Arc::clone(&source);
                let reply_tx = reply_tx.clone();
                tasks.spawn(async move {
                    tracing::info!(
                        command = %command.name,
                        user = %command.caller.user_id,
                        "Handling command"
                    );
                    if command.caller.is_admin {
                        if let Ok(Command::Collect { request }) =
                            Command::parse(&command.name, &command.args)
                        {
                            let _ = reply_tx
                                .send(Reply {
                                    reply_to: command.reply_to.clone(),
                                    text: render::backfill_started(&request),
                                })
                                .await;
                        }
                    }
                    let text = commands::handle(
                        &ctx,
                        source.as_ref(),
                        &command.caller,
                        &command.name,
                        &command.args,
                    )
                    .await;
                    let _ = reply_tx
                        .send(Reply {
                            reply_to: command.reply_to,
                            text,
                        })
                        .await;
                });
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Command task failed");
        }
    }
    drop(reply_tx);

    writer.await.context("Reply writer task failed")?
}

async fn write_replies<W>(mut rx: mpsc::Receiver<Reply>, mut output: W) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = rx.recv().await {
        let mut line = serde_json::to_vec(&reply).context("Failed to encode reply")?;
        line.push(b'\n');
        output
            .write_all(&line)
            .await
            .context("Failed to write reply")?;
        output.flush().await.context("Failed to flush reply")?;
    }
    Ok(output)
}

/// Serve stdin/stdout until EOF or Ctrl-C, then flush the store.
pub async fn run_stdio<S>(ctx: Arc<StatsContext>, source: Arc<S>) -> Result<()>
where
    S: HistorySource + 'static,
{
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();

    tracing::info!("Serving events on stdin");
    tokio::select! {
        result = run(Arc::clone(&ctx), source, input, output) => {
            result?;
            tracing::info!("Input closed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    ctx.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backfill::TranscriptSource;
    use crate::store::Store;

    #[test]
    fn test_parse_events() {
        let msg: HostEvent = serde_json::from_str(
            r#"{"type": "message", "author_id": "1", "author_name": "a", "timestamp": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(msg, HostEvent::Message(m) if m.author_id == "1"));

        let untimed: HostEvent =
            serde_json::from_str(r#"{"type": "message", "author_id": "2", "author_name": "b"}"#)
                .unwrap();
        let HostEvent::Message(untimed) = untimed else {
            panic!("expected message");
        };
        let message = untimed.into_message();
        assert!(Utc::now() - message.timestamp < chrono::Duration::seconds(60));

        let cmd: HostEvent = serde_json::from_str(
            r#"{"type": "command", "name": "stats", "caller": {"user_id": "1", "display_name": "a"}}"#,
        )
        .unwrap();
        let HostEvent::Command(cmd) = cmd else {
            panic!("expected command");
        };
        assert!(cmd.args.is_empty());
        assert!(!cmd.caller.is_admin);
        assert!(cmd.reply_to.is_none());
    }

    #[tokio::test]
    async fn test_messages_then_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        let ctx = Arc::new(StatsContext::init(&path, chrono_tz::UTC));
        let source = Arc::new(TranscriptSource::empty());

        let input = concat!(
            r#"{"type": "message", "author_id": "1", "author_name": "a", "timestamp": "2024-01-01T10:00:00Z"}"#,
            "\n",
            "this is not json\n",
            "\n",
            r#"{"type": "message", "author_id": "9", "author_name": "bot", "bot": true}"#,
            "\n",
            r#"{"type": "message", "author_id": "1", "author_name": "a", "timestamp": "2024-01-01T11:00:00Z"}"#,
            "\n",
        );

        let output = run(Arc::clone(&ctx), source, input.as_bytes(), Vec::new())
            .await
            .unwrap();
        assert!(output.is_empty());
        assert_eq!(Store::load(&path).get("1").unwrap().total(), 2);
        assert!(Store::load(&path).get("9").is_none());
    }
}
