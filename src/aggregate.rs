/// Read-only queries over a loaded store.
///
/// Per-user counts for a day, a range or all time, and the guild-wide
/// leaderboard. Scopes arrive already validated, see [`DayScope::from_args`].
use crate::store::{Store, UserRecord};
use crate::window::DayScope;

/// One user's count for a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCount {
    pub user_id: String,
    pub display_name: String,
    pub count: u64,
}

/// Sum of a record's counts inside `scope`.
///
/// Stored keys that do not parse as dates are skipped for dated scopes.
pub fn count_in_scope(record: &UserRecord, scope: &DayScope) -> u64 {
    match scope {
        DayScope::AllTime => record.total(),
        _ => record
            .daily_counts
            .iter()
            .filter(|(key, _)| scope.matches_key(key))
            .map(|(_, count)| *count)
            .sum(),
    }
}

/// Count for one user, or `None` when the user has no record at all.
pub fn user_count(store: &Store, user_id: &str, scope: &DayScope) -> Option<UserCount> {
    store.get(user_id).map(|record| UserCount {
        user_id: user_id.to_string(),
        display_name: record.display_name.clone(),
        count: count_in_scope(record, scope),
    })
}

/// Every user with a nonzero count in `scope`, highest first.
///
/// The sort is stable, so ties keep store order.
pub fn leaderboard(store: &Store, scope: &DayScope) -> Vec<UserCount> {
    let mut rows: Vec<UserCount> = store
        .users()
        .map(|(user_id, record)| UserCount {
            user_id: user_id.to_string(),
            display_name: record.display_name.clone(),
            count: count_in_scope(record, scope),
        })
        .filter(|row| row.count > 0)
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}
