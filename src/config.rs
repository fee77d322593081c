/// Runtime configuration: where the store lives and which zone buckets days.
///
/// Each setting comes from the command line, then the environment, then a
/// default.
use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;

/// Zone used to turn timestamps into calendar days.
pub const DEFAULT_TIMEZONE: &str = "Asia/Seoul";

/// File name of the store inside the data directory.
pub const STORE_FILE_NAME: &str = "user_data.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub store_path: PathBuf,
    pub timezone: Tz,
}

impl Config {
    /// Resolve configuration from explicit overrides, falling back to
    /// `MSGTALLY_DATA_DIR`, `MSGTALLY_STORE` and `MSGTALLY_TIMEZONE`.
    pub fn resolve(
        data_dir: Option<PathBuf>,
        store_path: Option<PathBuf>,
        timezone: Option<String>,
    ) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_root);
        let store_path = store_path
            .or_else(|| env::var_os("MSGTALLY_STORE").map(PathBuf::from))
            .unwrap_or_else(|| data_dir.join(STORE_FILE_NAME));
        let timezone = timezone
            .or_else(|| env::var("MSGTALLY_TIMEZONE").ok())
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

        Ok(Self {
            data_dir,
            store_path,
            timezone: parse_timezone(&timezone)?,
        })
    }
}

pub fn resolve_data_root() -> PathBuf {
    if let Some(dir) = env::var_os("MSGTALLY_DATA_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from(".msgtally")
}

/// Parse an IANA zone name such as `Asia/Seoul`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow!("Unknown time zone '{}': {}", name, e))
}
