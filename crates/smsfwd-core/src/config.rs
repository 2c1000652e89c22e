use std::{env, path::PathBuf, time::Duration};

use crate::{errors::Error, Result};

/// Process configuration for the forwarder daemon.
///
/// Everything comes from `SMSFWD_*` environment variables with workable
/// defaults; only a missing `$HOME` (needed for the default paths) is fatal.
#[derive(Clone, Debug)]
pub struct Config {
    /// User settings file read by the config store.
    pub config_path: PathBuf,
    /// Optional HTML template for the email body.
    pub template_path: PathBuf,
    /// Unix socket a foreground consumer may listen on.
    pub socket_path: PathBuf,
    /// Directory holding queued delivery jobs.
    pub spool_dir: PathBuf,

    /// Override for the email API endpoint. `None` means the built-in one.
    pub api_url: Option<String>,
    pub http_timeout: Duration,

    /// Delivery attempts per job before it is given up on.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = match env_path("SMSFWD_CONFIG_PATH") {
            Some(p) => p,
            None => default_under_home(".config/smsfwd/config.json")?,
        };
        let template_path = match env_path("SMSFWD_TEMPLATE_PATH") {
            Some(p) => p,
            None => default_under_home(".config/smsfwd/email-template.json")?,
        };
        let socket_path =
            env_path("SMSFWD_SOCKET_PATH").unwrap_or_else(|| PathBuf::from("/tmp/smsfwd.sock"));
        let spool_dir = match env_path("SMSFWD_SPOOL_DIR") {
            Some(p) => p,
            None => default_under_home(".local/state/smsfwd/spool")?,
        };

        let api_url = env_str("SMSFWD_API_URL").and_then(non_empty);
        let http_timeout =
            Duration::from_millis(env_u64("SMSFWD_HTTP_TIMEOUT_MS").unwrap_or(10_000));

        let max_attempts = env_u32("SMSFWD_MAX_ATTEMPTS").unwrap_or(12).max(1);
        let backoff_base =
            Duration::from_millis(env_u64("SMSFWD_BACKOFF_BASE_MS").unwrap_or(30_000));
        let backoff_cap =
            Duration::from_millis(env_u64("SMSFWD_BACKOFF_CAP_MS").unwrap_or(3_600_000));

        Ok(Self {
            config_path,
            template_path,
            socket_path,
            spool_dir,
            api_url,
            http_timeout,
            max_attempts,
            backoff_base,
            backoff_cap,
        })
    }
}

fn default_under_home(rel: &str) -> Result<PathBuf> {
    home_dir()
        .map(|home| home.join(rel))
        .ok_or_else(|| Error::Config("HOME is not set".to_string()))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}
