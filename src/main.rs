use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use msgtally::backfill::{HistorySource, TranscriptSource};
use msgtally::commands::{self, Caller, Command};
use msgtally::config::Config;
use msgtally::context::StatsContext;
use msgtally::counter::ChatMessage;
use msgtally::timefmt::day_key;
use msgtally::{logging, render, serve};

#[derive(Parser)]
#[command(name = "msgtally")]
#[command(about = "Per-user daily message counter for chat servers", long_about = None)]
struct Cli {
    /// Data directory for the store and logs (default: $MSGTALLY_DATA_DIR or .msgtally)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Store file (default: $MSGTALLY_STORE or <data dir>/user_data.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// IANA time zone for day bucketing (default: $MSGTALLY_TIMEZONE or Asia/Seoul)
    #[arg(long, global = true)]
    timezone: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the host bridge: JSON-line events on stdin, replies on stdout
    Serve {
        /// Transcripts answering collect commands (directory or JSON file)
        #[arg(long)]
        transcripts: Option<PathBuf>,
    },
    /// Count a single message
    Record {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        name: String,
        /// Message was written by a bot (it will be ignored)
        #[arg(long)]
        bot: bool,
        /// Message time, RFC 3339 (default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// One user's count: [user] [YYYY-MM-DD]
    Stats(QueryArgs),
    /// One user's count over a range: [user] START END
    RangeStats(QueryArgs),
    /// Leaderboard: [DATE] or [START END]
    GlobalStats(QueryArgs),
    /// Import history from transcripts: [limit]
    Collect(CollectArgs),
    /// Import history sent within a window: START END [limit]
    CollectPeriod(CollectArgs),
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Commands::Serve { .. } => "serve",
            Commands::Record { .. } => "record",
            Commands::Stats(_) => "stats",
            Commands::RangeStats(_) => "range-stats",
            Commands::GlobalStats(_) => "global-stats",
            Commands::Collect(_) => "collect",
            Commands::CollectPeriod(_) => "collect-period",
        }
    }
}

#[derive(Args)]
struct QueryArgs {
    /// Command arguments
    args: Vec<String>,

    /// User id the query runs as (the default subject of user queries)
    #[arg(long = "as", default_value = "operator")]
    caller: String,
}

#[derive(Args)]
struct CollectArgs {
    /// Transcript directory or JSON file
    #[arg(long)]
    transcripts: PathBuf,

    /// Command arguments
    args: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::resolve(cli.data_dir, cli.store, cli.timezone)?;
    logging::init_logging(&config.data_dir, cli.command.label())
        .context("Failed to initialize logging")?;

    tokio::runtime::Runtime::new()
        .context("Failed to create Tokio runtime")?
        .block_on(run(cli.command, config))
}

async fn run(command: Commands, config: Config) -> Result<()> {
    let label = command.label();
    let ctx = Arc::new(StatsContext::init(&config.store_path, config.timezone));

    match command {
        Commands::Serve { transcripts } => {
            let source = match transcripts {
                Some(path) => TranscriptSource::open(&path)?,
                None => {
                    tracing::warn!("No transcripts configured, collect commands will find no channels");
                    TranscriptSource::empty()
                }
            };
            serve::run_stdio(ctx, Arc::new(source)).await
        }
        Commands::Record {
            user_id,
            name,
            bot,
            at,
        } => {
            let message = ChatMessage {
                author_id: user_id,
                author_name: name,
                bot,
                timestamp: at.unwrap_or_else(Utc::now),
            };
            if ctx.record_message(&message).await? {
                eprintln!(
                    "✓ Counted message from {} on {}",
                    message.author_name,
                    day_key(message.timestamp, config.timezone)
                );
            } else {
                eprintln!("Ignored bot message from {}", message.author_name);
            }
            ctx.shutdown().await
        }
        Commands::Stats(q) | Commands::RangeStats(q) | Commands::GlobalStats(q) => {
            one_shot(&ctx, &TranscriptSource::empty(), label, &q.args, &q.caller).await
        }
        Commands::Collect(c) | Commands::CollectPeriod(c) => {
            let source = TranscriptSource::open(&c.transcripts)?;
            one_shot(&ctx, &source, label, &c.args, "operator").await
        }
    }
}

/// Run one chat command as the local operator and print its reply.
async fn one_shot<S>(
    ctx: &StatsContext,
    source: &S,
    name: &str,
    args: &[String],
    caller_id: &str,
) -> Result<()>
where
    S: HistorySource,
{
    // Whoever can run the binary can already edit the store
    let caller = Caller {
        user_id: caller_id.to_string(),
        display_name: caller_id.to_string(),
        is_admin: true,
    };

    let command = Command::parse(name, args).map_err(|e| anyhow!(render::error(&e)))?;
    if let Command::Collect { ref request } = command {
        eprintln!("📥 {}", render::backfill_started(request));
    }

    let result = commands::execute(ctx, source, &caller, command).await;
    ctx.shutdown().await?;

    match result {
        Ok(reply) => {
            println!("{}", reply);
            Ok(())
        }
        Err(e) => Err(anyhow!(render::error(&e))),
    }
}
