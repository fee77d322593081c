/// Per-message counting shared by the live path and backfill.
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::store::Store;
use crate::timefmt::day_key;

/// A chat message as delivered by the host, live or from history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub author_id: String,
    pub author_name: String,
    /// Authored by an automated account
    #[serde(default)]
    pub bot: bool,
    /// When the message was sent; decides the day it counts on
    pub timestamp: DateTime<Utc>,
}

/// Add one message for `user_id` on `date`.
///
/// Creates the record on first sight and always overwrites the display name
/// with the latest one. The caller persists the store.
pub fn increment(store: &mut Store, user_id: &str, display_name: &str, date: &str) {
    let record = store.record_mut(user_id, display_name);
    record.display_name = display_name.to_string();
    *record.daily_counts.entry(date.to_string()).or_insert(0) += 1;
}

/// Count `message` on its local day in `tz`, unless a bot wrote it.
///
/// Returns whether the message was counted.
pub fn observe(store: &mut Store, message: &ChatMessage, tz: Tz) -> bool {
    if message.bot {
        return false;
    }
    let date = day_key(message.timestamp, tz);
    increment(store, &message.author_id, &message.author_name, &date);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(author: &str, name: &str, ts: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            author_id: author.to_string(),
            author_name: name.to_string(),
            bot: false,
            timestamp: ts,
        }
    }

    #[test]
    fn test_increment_creates_and_accumulates() {
        let mut store = Store::new();
        increment(&mut store, "U1", "one", "2024-01-01");
        increment(&mut store, "U1", "one", "2024-01-02");
        increment(&mut store, "U1", "one", "2024-01-01");

        let record = store.get("U1").unwrap();
        assert_eq!(record.daily_counts["2024-01-01"], 2);
        assert_eq!(record.daily_counts["2024-01-02"], 1);
        assert_eq!(record.total(), 3);
    }

    #[test]
    fn test_total_matches_increment_count() {
        let mut store = Store::new();
        let dates = ["2024-01-01", "2024-03-09", "2024-01-01", "2023-12-31", "2024-03-09"];
        for (i, date) in dates.iter().cycle().take(37).enumerate() {
            let user = if i % 3 == 0 { "A" } else { "B" };
            increment(&mut store, user, user, date);
        }
        assert_eq!(store.get("A").unwrap().total(), 13);
        assert_eq!(store.get("B").unwrap().total(), 24);
    }

    #[test]
    fn test_display_name_follows_latest_message() {
        let mut store = Store::new();
        increment(&mut store, "U1", "old name", "2024-01-01");
        increment(&mut store, "U1", "new name", "2024-01-01");
        assert_eq!(store.get("U1").unwrap().display_name, "new name");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_observe_skips_bots() {
        let mut store = Store::new();
        let mut msg = message("B1", "helper", Utc::now());
        msg.bot = true;
        assert!(!observe(&mut store, &msg, chrono_tz::Asia::Seoul));
        assert!(store.is_empty());
    }

    #[test]
    fn test_observe_buckets_by_zone() {
        let mut store = Store::new();
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 15, 30, 0).unwrap();
        assert!(observe(&mut store, &message("U1", "one", ts), chrono_tz::Asia::Seoul));
        let record = store.get("U1").unwrap();
        assert_eq!(record.daily_counts.get("2024-01-02"), Some(&1));
        assert!(record.daily_counts.get("2024-01-01").is_none());
    }

    #[test]
    fn test_message_requires_timestamp() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"author_id": "1", "author_name": "a", "timestamp": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(!msg.bot);

        let missing = serde_json::from_str::<ChatMessage>(r#"{"author_id": "1", "author_name": "a"}"#);
        assert!(missing.is_err());
    }
}
