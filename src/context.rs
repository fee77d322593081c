/// Process-wide counting state.
///
/// Owns the only in-memory copy of the store. Every mutation takes the same
/// async mutex, mutates and writes the file before releasing it, so a live
/// message and a backfill never overwrite each other's increments.
use anyhow::Result;
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::counter::{self, ChatMessage};
use crate::store::Store;

struct State {
    store: Store,
    /// Set when the last save failed; cleared by the next successful one.
    dirty: bool,
}

pub struct StatsContext {
    path: PathBuf,
    tz: Tz,
    state: Mutex<State>,
}

impl StatsContext {
    /// Load the store at `path` and take ownership of it.
    pub fn init(path: &Path, tz: Tz) -> Self {
        let store = Store::load(path);
        tracing::info!(
            path = %path.display(),
            users = store.len(),
            timezone = %tz,
            "Store loaded"
        );
        Self {
            path: path.to_path_buf(),
            tz,
            state: Mutex::new(State {
                store,
                dirty: false,
            }),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Count a live message and persist.
    ///
    /// Bot messages are ignored without touching the file. Returns whether the
    /// message was counted.
    pub async fn record_message(&self, message: &ChatMessage) -> Result<bool> {
        if message.bot {
            return Ok(false);
        }
        let tz = self.tz;
        self.mutate(|store| counter::observe(store, message, tz))
            .await
    }

    /// Apply `f` to the store and save it, all under the write lock.
    ///
    /// On a failed save the in-memory change is kept and flushed later.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut Store) -> R) -> Result<R> {
        let mut state = self.state.lock().await;
        let out = f(&mut state.store);
        match state.store.save(&self.path) {
            Ok(()) => {
                state.dirty = false;
                Ok(out)
            }
            Err(e) => {
                state.dirty = true;
                Err(e)
            }
        }
    }

    /// Run a read-only query against the current store.
    pub async fn read<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        let state = self.state.lock().await;
        f(&state.store)
    }

    /// Flush anything a failed save left behind.
    pub async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.dirty {
            state.store.save(&self.path)?;
            state.dirty = false;
            tracing::info!(path = %self.path.display(), "Flushed pending changes on shutdown");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn message(author: &str, hour: u32) -> ChatMessage {
        ChatMessage {
            author_id: author.to_string(),
            author_name: format!("name-{}", author),
            bot: false,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_record_message_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        let ctx = StatsContext::init(&path, chrono_tz::UTC);

        assert!(ctx.record_message(&message("U1", 3)).await.unwrap());
        let on_disk = Store::load(&path);
        assert_eq!(on_disk.get("U1").unwrap().daily_counts["2024-01-01"], 1);
    }

    #[tokio::test]
    async fn test_bot_message_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        let ctx = StatsContext::init(&path, chrono_tz::UTC);

        let mut msg = message("B1", 3);
        msg.bot = true;
        assert!(!ctx.record_message(&msg).await.unwrap());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_init_picks_up_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        {
            let ctx = StatsContext::init(&path, chrono_tz::UTC);
            ctx.record_message(&message("U1", 3)).await.unwrap();
            ctx.shutdown().await.unwrap();
        }
        let ctx = StatsContext::init(&path, chrono_tz::UTC);
        assert_eq!(ctx.read(|s| s.len()).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        let ctx = Arc::new(StatsContext::init(&path, chrono_tz::UTC));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let ctx = Arc::clone(&ctx);
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    ctx.record_message(&message(&format!("U{}", worker % 2), 5))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let on_disk = Store::load(&path);
        assert_eq!(on_disk.get("U0").unwrap().total(), 100);
        assert_eq!(on_disk.get("U1").unwrap().total(), 100);
    }

    #[tokio::test]
    async fn test_failed_save_is_flushed_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        // Parent is a regular file, so the first save fails
        let path = blocker.join("user_data.json");
        let ctx = StatsContext::init(&path, chrono_tz::UTC);

        assert!(ctx.record_message(&message("U1", 3)).await.is_err());
        assert_eq!(ctx.read(|s| s.get("U1").map(|r| r.total())).await, Some(1));

        std::fs::remove_file(&blocker).unwrap();
        ctx.shutdown().await.unwrap();
        assert_eq!(Store::load(&path).get("U1").unwrap().total(), 1);
    }
}
