//! Reads the user's forwarding settings from the shared JSON settings file.
//!
//! The file is owned by the settings UI; this side only ever reads it, fresh
//! on every call, so edits apply to the next decision without a restart.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use smsfwd_core::domain::ForwardingConfig;
use smsfwd_core::ports::ConfigStore;
use smsfwd_core::{Error, Result};

/// Placeholder the settings UI writes before the user fills a field in.
const NOT_SET: &str = "NOT_SET";

/// Raw file shape. Key names follow the settings file, not Rust convention.
#[derive(Debug, Default, Deserialize)]
struct StoredConfig {
    #[serde(default)]
    service_enabled: bool,
    #[serde(default, rename = "targetEmail")]
    target_email: Option<String>,
    #[serde(default, rename = "smtpEmail")]
    smtp_email: Option<String>,
    #[serde(default, rename = "smtpPassword")]
    smtp_password: Option<String>,
}

impl StoredConfig {
    fn into_config(self) -> ForwardingConfig {
        ForwardingConfig {
            enabled: self.service_enabled,
            sender_credential: clean(self.smtp_password),
            sender_address: clean(self.smtp_email),
            target_address: clean(self.target_email),
        }
    }
}

/// Placeholder and blank values mean "not configured yet".
fn clean(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == NOT_SET {
        return None;
    }
    Some(trimmed.to_string())
}

pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<ForwardingConfig> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Nothing saved yet reads as forwarding off.
                debug!(path = %self.path.display(), "no settings file, forwarding disabled");
                return Ok(ForwardingConfig::disabled());
            }
            Err(e) => return Err(e.into()),
        };
        let stored: StoredConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("settings file {}: {e}", self.path.display())))?;
        Ok(stored.into_config())
    }
}
