/// Message count store
///
/// A single JSON file mapping user id to that user's display name and
/// per-day message counts. The file is rewritten in full on every save.
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One user's counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserRecord {
    /// Last observed display name
    #[serde(rename = "name", default)]
    pub display_name: String,
    /// Day key (`YYYY-MM-DD` in the configured zone) to message count
    #[serde(rename = "messages", default)]
    pub daily_counts: IndexMap<String, u64>,
}

impl UserRecord {
    pub fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            daily_counts: IndexMap::new(),
        }
    }

    pub fn total(&self) -> u64 {
        self.daily_counts.values().sum()
    }
}

/// All users' records, keyed by platform user id.
///
/// Iteration follows file order, then first-seen order for new users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Store {
    users: IndexMap<String, UserRecord>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from `path`.
    ///
    /// A missing or unparsable file yields an empty store. Corruption is logged
    /// but never returned as an error.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No store file yet, starting empty");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read store file, starting empty");
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Store file is corrupt, starting empty");
                Self::default()
            }
        }
    }

    /// Serialize the whole store and replace the file at `path`.
    ///
    /// Writes a sibling temp file first and renames it over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)
            .context("Failed to serialize store")?;
        buf.push(b'\n');

        let tmp_path = temp_path_for(path);
        fs::write(&tmp_path, &buf)
            .with_context(|| format!("Failed to write store file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace store file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), users = self.users.len(), "Store saved");
        Ok(())
    }

    pub fn get(&self, user_id: &str) -> Option<&UserRecord> {
        self.users.get(user_id)
    }

    /// Record for `user_id`, created with `display_name` if absent.
    pub fn record_mut(&mut self, user_id: &str, display_name: &str) -> &mut UserRecord {
        self.users
            .entry(user_id.to_string())
            .or_insert_with(|| UserRecord::new(display_name))
    }

    pub fn users(&self) -> impl Iterator<Item = (&str, &UserRecord)> {
        self.users.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "store".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use jsonschema::{Draft, JSONSchema};

    fn sample_store() -> Store {
        let mut store = Store::new();
        let record = store.record_mut("1001", "민수");
        record.daily_counts.insert("2024-01-01".to_string(), 2);
        record.daily_counts.insert("2024-01-02".to_string(), 1);
        store.record_mut("1002", "alice");
        store
    }

    fn load_schema() -> Result<serde_json::Value> {
        let schema_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("store_schema.json");
        let content = fs::read_to_string(&schema_path)
            .with_context(|| format!("Failed to read schema file: {}", schema_path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn validate(schema_json: &serde_json::Value, instance: &serde_json::Value) -> Result<()> {
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema_json)
            .map_err(|e| anyhow!("Failed to compile JSON schema: {}", e))?;
        let messages: Vec<String> = match schema.validate(instance) {
            Ok(()) => return Ok(()),
            Err(errors) => errors
                .map(|e| format!("  - {}: {}", e.instance_path, e))
                .collect(),
        };
        Err(anyhow!("Store validation failed:\n{}", messages.join("\n")))
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(&dir.path().join("user_data.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        fs::write(&path, "{ \"1001\": { \"name\": ").unwrap();
        assert!(Store::load(&path).is_empty());

        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(Store::load(&path).is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/user_data.json");
        let store = sample_store();

        store.save(&path).unwrap();
        assert_eq!(Store::load(&path), store);
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_save_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        sample_store().save(&path).unwrap();

        let mut smaller = Store::new();
        smaller.record_mut("42", "bob");
        smaller.save(&path).unwrap();

        let reloaded = Store::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get("1001").is_none());
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        sample_store().save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Non-ASCII names are written verbatim with four-space indentation
        assert!(content.contains("\"name\": \"민수\""));
        assert!(content.contains("\n    \"1001\": {"));

        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["1001"]["messages"]["2024-01-01"], 2);
        assert_eq!(json["1002"]["messages"], serde_json::json!({}));
    }

    #[test]
    fn test_saved_file_matches_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        sample_store().save(&path).unwrap();

        let schema = load_schema().unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let result = validate(&schema, &saved);
        assert!(result.is_ok(), "Saved store failed validation: {:?}", result.err());
    }

    #[test]
    fn test_schema_rejects_negative_counts() {
        let schema = load_schema().unwrap();
        let invalid = serde_json::json!({
            "1001": { "name": "a", "messages": { "2024-01-01": -1 } }
        });
        assert!(validate(&schema, &invalid).is_err());
    }

    #[test]
    fn test_record_without_messages_field_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        fs::write(&path, r#"{ "7": { "name": "legacy" } }"#).unwrap();

        let store = Store::load(&path);
        let record = store.get("7").unwrap();
        assert_eq!(record.display_name, "legacy");
        assert_eq!(record.total(), 0);
    }
}
