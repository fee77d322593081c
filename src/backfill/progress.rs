/// Progress reporting UI for backfill operations.
///
/// Animated bars on a TTY, plain lines on stderr otherwise.
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::types::ChannelTally;
use crate::render::pad_display;

/// Display width reserved for channel names.
const CHANNEL_NAME_WIDTH: usize = 24;

/// Shortens `s` to `max_width` display columns with an ellipsis in the middle.
///
/// Widths are terminal columns, so CJK names take two columns per character.
fn truncate_middle(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return pad_display(s, max_width);
    }
    if max_width <= 1 {
        return pad_display(&take_width(s.chars(), max_width), max_width);
    }

    let available = max_width - 1;
    let start = take_width(s.chars(), available.div_ceil(2));
    let end: String = take_width(s.chars().rev(), available / 2)
        .chars()
        .rev()
        .collect();
    pad_display(&format!("{}…{}", start, end), max_width)
}

fn take_width(chars: impl Iterator<Item = char>, budget: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in chars {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// Formats a finished channel on a single line.
///
/// Example: `general                     100 fetched, 97 counted (3 from bots)`
pub fn format_completed_channel(channel_name: &str, tally: &ChannelTally) -> String {
    let mut line = format!(
        "{} {:>5} fetched, {} counted",
        truncate_middle(channel_name, CHANNEL_NAME_WIDTH),
        tally.fetched,
        tally.counted
    );
    let mut notes = Vec::new();
    if tally.bots > 0 {
        notes.push(format!("{} from bots", tally.bots));
    }
    if tally.outside_window > 0 {
        notes.push(format!("{} outside window", tally.outside_window));
    }
    if !notes.is_empty() {
        line.push_str(&format!(" ({})", notes.join(", ")));
    }
    line
}

/// Progress for a whole backfill: one overall bar, one spinner per channel.
#[derive(Clone)]
pub struct BackfillProgress {
    multi: Option<MultiProgress>,
    overall: Option<ProgressBar>,
    is_tty: bool,
}

impl BackfillProgress {
    pub fn new(total_channels: usize) -> Self {
        let is_tty = std::io::stderr().is_terminal();

        if is_tty {
            let mp = MultiProgress::new();
            let overall = mp.add(ProgressBar::new(total_channels as u64));
            if let Ok(style) =
                ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos}/{len} channels ({percent}%)")
            {
                overall.set_style(style.progress_chars("█▓░"));
            }
            BackfillProgress {
                multi: Some(mp),
                overall: Some(overall),
                is_tty: true,
            }
        } else {
            BackfillProgress {
                multi: None,
                overall: None,
                is_tty: false,
            }
        }
    }

    /// Spinner shown while a channel's history is fetched. `None` off a TTY.
    pub fn channel_spinner(&self, channel_name: &str) -> Option<ProgressBar> {
        let mp = self.multi.as_ref()?;
        let pb = match self.overall {
            Some(ref overall) => mp.insert_before(overall, ProgressBar::new_spinner()),
            None => mp.add(ProgressBar::new_spinner()),
        };
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.set_message(truncate_middle(channel_name, CHANNEL_NAME_WIDTH));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    }

    pub fn inc(&self) {
        if let Some(ref overall) = self.overall {
            overall.inc(1);
        }
    }

    pub fn finish(&self) {
        if let Some(ref overall) = self.overall {
            overall.finish_and_clear();
        }
    }

    /// Print a line above the bars, or to stderr when there are none.
    pub fn println(&self, msg: &str) {
        if let Some(ref mp) = self.multi {
            let _ = mp.println(msg);
        } else {
            eprintln!("{}", msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_creation() {
        let progress = BackfillProgress::new(3);
        assert_eq!(progress.is_tty, std::io::stderr().is_terminal());
        assert_eq!(progress.channel_spinner("general").is_some(), progress.is_tty);
    }

    #[test]
    fn test_truncate_middle_short() {
        let out = truncate_middle("general", 24);
        assert!(out.starts_with("general"));
        assert_eq!(out.width(), 24);
    }

    #[test]
    fn test_truncate_middle_wide_chars() {
        let out = truncate_middle("아주아주긴채널이름입니다정말로요", 12);
        assert!(out.contains('…'));
        assert_eq!(out.width(), 12);
    }

    #[test]
    fn test_format_completed_channel() {
        let tally = ChannelTally {
            fetched: 100,
            counted: 90,
            bots: 4,
            outside_window: 6,
        };
        let out = format_completed_channel("general", &tally);
        assert!(out.starts_with("general"));
        assert!(out.contains("100 fetched, 90 counted"));
        assert!(out.contains("(4 from bots, 6 outside window)"));

        let plain = format_completed_channel("general", &ChannelTally::default());
        assert!(!plain.contains('('));
    }
}
