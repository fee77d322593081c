/// Reply text for chat commands.
use unicode_width::UnicodeWidthStr;

use crate::aggregate::UserCount;
use crate::backfill::{BackfillReport, BackfillRequest};
use crate::error::CommandError;
use crate::window::DayScope;

/// Pads `s` with spaces to `width` terminal columns.
pub fn pad_display(s: &str, width: usize) -> String {
    let pad = width.saturating_sub(s.width());
    format!("{}{}", s, " ".repeat(pad))
}

/// Format a number with thousands separators (e.g. 12,345).
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped_rev = String::new();
    for (count, ch) in digits.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            grouped_rev.push(',');
        }
        grouped_rev.push(ch);
    }
    grouped_rev.chars().rev().collect()
}

fn messages(n: u64) -> String {
    if n == 1 {
        "1 message".to_string()
    } else {
        format!("{} messages", format_number(n))
    }
}

pub fn no_history(name: &str) -> String {
    format!("{} has no message history yet.", name)
}

/// One user's count. `count` is `None` when the user has no record.
pub fn user_count(name: &str, scope: &DayScope, count: Option<u64>) -> String {
    let Some(count) = count else {
        return no_history(name);
    };
    match scope {
        DayScope::AllTime => format!("{} has sent {} in total.", name, messages(count)),
        DayScope::Day(_) => format!("{} sent {} on {}.", name, messages(count), scope.label()),
        DayScope::Range(window) => format!(
            "{} sent {} from {}.",
            name,
            messages(count),
            window.label()
        ),
    }
}

/// Guild leaderboard, or an explicit "no data" line when `rows` is empty.
pub fn leaderboard(scope: &DayScope, rows: &[UserCount]) -> String {
    let mut output = format!("Message statistics ({}):\n", scope.label());
    if rows.is_empty() {
        output.push_str("No data.");
        return output;
    }

    let name_width = rows
        .iter()
        .map(|r| r.display_name.width())
        .max()
        .unwrap_or(0);
    for (rank, row) in rows.iter().enumerate() {
        output.push_str(&format!(
            "{:>2}. {}  {}\n",
            rank + 1,
            pad_display(&row.display_name, name_width),
            messages(row.count)
        ));
    }
    output.truncate(output.trim_end().len());
    output
}

/// Notice sent when a collection starts.
pub fn backfill_started(request: &BackfillRequest) -> String {
    match request.window {
        Some(window) => format!(
            "Collecting up to {} messages per channel sent from {}...",
            request.limit,
            window.label()
        ),
        None => format!(
            "Collecting up to {} messages per channel...",
            request.limit
        ),
    }
}

/// Summary of a finished (or aborted) collection.
pub fn backfill_report(report: &BackfillReport) -> String {
    let mut lines: Vec<String> = report
        .skipped_channels()
        .map(|c| format!("Cannot read message history of #{}, skipped.", c.name))
        .collect();
    lines.push(format!(
        "Collection complete: counted {} across {} channel(s).",
        messages(report.counted() as u64),
        report.imported_channels()
    ));
    lines.join("\n")
}

/// User-facing text for a failed command.
pub fn error(err: &CommandError) -> String {
    match err {
        CommandError::Invalid(e) => format!("Invalid input: {}.", e),
        CommandError::Denied(_) | CommandError::Unknown(_) => format!("{}.", err),
        CommandError::Backfill(e) => {
            let mut text = String::new();
            for channel in e.report.skipped_channels() {
                text.push_str(&format!(
                    "Cannot read message history of #{}, skipped.\n",
                    channel.name
                ));
            }
            text.push_str(&format!(
                "An error occurred while collecting messages: {:#}\n{} channel(s) were saved before the error.",
                e.cause,
                e.report.imported_channels()
            ));
            text
        }
        CommandError::Internal(e) => format!("Something went wrong: {:#}", e),
    }
}
