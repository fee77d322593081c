/// Chat command parsing and execution.
///
/// The host strips the command prefix and resolves the caller; this module
/// turns a command name plus positional arguments into a typed request,
/// enforces admin-only commands and renders the reply text.
use serde::{Deserialize, Serialize};

use crate::aggregate;
use crate::backfill::{self, BackfillRequest, HistorySource, DEFAULT_LIMIT};
use crate::context::StatsContext;
use crate::error::{CommandError, ValidationError};
use crate::render;
use crate::timefmt::parse_date;
use crate::window::{parse_day, DateWindow, DayScope};

/// Who issued a command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Caller {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// One user's count for a day or all time
    Stats { user: Option<String>, scope: DayScope },
    /// One user's count over a window
    RangeStats {
        user: Option<String>,
        window: DateWindow,
    },
    /// Leaderboard for all time, a day or a window
    GlobalStats { scope: DayScope },
    /// Import history, optionally bounded by a window
    Collect { request: BackfillRequest },
}

impl Command {
    /// Parse a command by name (English or Korean alias).
    pub fn parse(name: &str, args: &[String]) -> Result<Self, CommandError> {
        let args: Vec<&str> = args.iter().map(|a| a.trim()).filter(|a| !a.is_empty()).collect();
        let name = name.trim().trim_start_matches('!');

        let command = match name {
            "stats" | "통계" => parse_stats(&args)?,
            "range-stats" | "기간통계" => parse_range_stats(&args)?,
            "global-stats" | "전체통계" => Self::GlobalStats {
                scope: DayScope::from_args(&args)?,
            },
            "collect" | "수집" => {
                let limit = match args.as_slice() {
                    [] => DEFAULT_LIMIT,
                    [limit] => parse_limit(limit)?,
                    [_, extra, ..] => {
                        return Err(ValidationError::UnexpectedArgument(extra.to_string()).into())
                    }
                };
                Self::Collect {
                    request: BackfillRequest {
                        limit,
                        window: None,
                    },
                }
            }
            "collect-period" | "수집기간" => {
                let (window, limit) = match args.as_slice() {
                    [] | [_] => {
                        return Err(ValidationError::MissingArgument("start and end dates").into())
                    }
                    [start, end] => (DateWindow::parse(start, end)?, DEFAULT_LIMIT),
                    [start, end, limit] => (DateWindow::parse(start, end)?, parse_limit(limit)?),
                    [_, _, _, extra, ..] => {
                        return Err(ValidationError::UnexpectedArgument(extra.to_string()).into())
                    }
                };
                Self::Collect {
                    request: BackfillRequest {
                        limit,
                        window: Some(window),
                    },
                }
            }
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stats { .. } => "stats",
            Self::RangeStats { .. } => "range-stats",
            Self::GlobalStats { .. } => "global-stats",
            Self::Collect { request } if request.window.is_some() => "collect-period",
            Self::Collect { .. } => "collect",
        }
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, Self::GlobalStats { .. } | Self::Collect { .. })
    }
}

fn parse_stats(args: &[&str]) -> Result<Command, ValidationError> {
    let (user, date) = match args {
        [] => (None, None),
        [only] if is_date_like(only) => (None, Some(*only)),
        [only] => (Some(*only), None),
        [user, date] => (Some(*user), Some(*date)),
        [_, _, extra, ..] => return Err(ValidationError::UnexpectedArgument(extra.to_string())),
    };
    let scope = match date {
        Some(date) => DayScope::Day(parse_day(date)?),
        None => DayScope::AllTime,
    };
    Ok(Command::Stats {
        user: user.map(user_id_from_arg),
        scope,
    })
}

fn parse_range_stats(args: &[&str]) -> Result<Command, ValidationError> {
    let (user, start, end) = match args {
        [] | [_] => return Err(ValidationError::MissingArgument("start and end dates")),
        [start, end] => (None, start, end),
        [user, start, end] => (Some(*user), start, end),
        [_, _, _, extra, ..] => return Err(ValidationError::UnexpectedArgument(extra.to_string())),
    };
    Ok(Command::RangeStats {
        user: user.map(user_id_from_arg),
        window: DateWindow::parse(start, end)?,
    })
}

/// Whether a lone argument was meant as a date rather than a user.
///
/// Anything that parses as a date, or starts with a digit and contains a
/// dash (a mistyped date), counts.
fn is_date_like(arg: &str) -> bool {
    parse_date(arg).is_some()
        || (arg.starts_with(|c: char| c.is_ascii_digit()) && arg.contains('-'))
}

/// Accepts a plain id or a `<@id>` / `<@!id>` mention.
fn user_id_from_arg(arg: &str) -> String {
    arg.strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'))
        .map(|id| id.trim_start_matches('!'))
        .unwrap_or(arg)
        .to_string()
}

fn parse_limit(arg: &str) -> Result<usize, ValidationError> {
    match arg.parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(ValidationError::InvalidLimit(arg.to_string())),
    }
}

/// Run a parsed command for `caller` and return the reply text.
pub async fn execute<S>(
    ctx: &StatsContext,
    source: &S,
    caller: &Caller,
    command: Command,
) -> Result<String, CommandError>
where
    S: HistorySource + ?Sized,
{
    if command.requires_admin() && !caller.is_admin {
        tracing::info!(user = %caller.user_id, command = command.name(), "Denied admin command");
        return Err(CommandError::Denied(command.name()));
    }

    match command {
        Command::Stats { user, scope } => Ok(user_reply(ctx, caller, user, scope).await),
        Command::RangeStats { user, window } => {
            Ok(user_reply(ctx, caller, user, DayScope::Range(window)).await)
        }
        Command::GlobalStats { scope } => {
            let rows = ctx.read(|store| aggregate::leaderboard(store, &scope)).await;
            Ok(render::leaderboard(&scope, &rows))
        }
        Command::Collect { request } => {
            let report = backfill::run(ctx, source, &request).await?;
            Ok(render::backfill_report(&report))
        }
    }
}

async fn user_reply(
    ctx: &StatsContext,
    caller: &Caller,
    user: Option<String>,
    scope: DayScope,
) -> String {
    let user_id = user.unwrap_or_else(|| caller.user_id.clone());
    let found = ctx
        .read(|store| aggregate::user_count(store, &user_id, &scope))
        .await;

    match found {
        Some(count) => render::user_count(&count.display_name, &scope, Some(count.count)),
        None => {
            let name = if user_id == caller.user_id {
                caller.display_name.as_str()
            } else {
                user_id.as_str()
            };
            render::no_history(name)
        }
    }
}

/// Parse, run and render a command; failures become reply text too.
pub async fn handle<S>(
    ctx: &StatsContext,
    source: &S,
    caller: &Caller,
    name: &str,
    args: &[String],
) -> String
where
    S: HistorySource + ?Sized,
{
    let result = match Command::parse(name, args) {
        Ok(command) => execute(ctx, source, caller, command).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(reply) => reply,
        Err(e) => {
            tracing::info!(command = name, error = %e, "Command failed");
            render::error(&e)
        }
    }
}
