use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use tracing::warn;

pub const DEV_ADMIN_TOKEN: &str = "devadmin";
pub const DEV_NONCE_SECRET: &str = "devsecret";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub admin_token: String,
    pub nonce_secret: String,
    pub nonce_ttl_seconds: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/bingo.db".into(),
            admin_token: DEV_ADMIN_TOKEN.into(),
            nonce_secret: DEV_NONCE_SECRET.into(),
            nonce_ttl_seconds: 24 * 60 * 60,
        }
    }
}

impl Settings {
    /// Applies keys from a flat TOML file. A missing or unreadable file
    /// leaves the settings untouched.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let Ok(raw) = fs::read_to_string(path) else {
            return self;
        };
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => self.apply(|key| match file_cfg.get(key)? {
                toml::Value::String(v) => Some(v.clone()),
                other => Some(other.to_string()),
            }),
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring malformed settings file");
            }
        }
        self
    }

    /// Applies environment overrides. `lookup` is `std::env::var` in production.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = |keys: &[&str]| keys.iter().rev().find_map(|key| lookup(key));
        let overrides: HashMap<&str, String> = [
            ("bind_addr", env(&["SERVER_BIND", "APP__BIND_ADDR"])),
            ("database_url", env(&["DATABASE_URL", "APP__DATABASE_URL"])),
            ("admin_token", env(&["APP__ADMIN_TOKEN"])),
            ("nonce_secret", env(&["APP__NONCE_SECRET"])),
            ("nonce_ttl_seconds", env(&["APP__NONCE_TTL_SECONDS"])),
        ]
        .into_iter()
        .filter_map(|(key, value)| Some((key, value?)))
        .collect();
        self.apply(|key| overrides.get(key).cloned());
        self
    }

    fn apply(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("bind_addr") {
            self.server_bind = v;
        }
        if let Some(v) = get("database_url") {
            self.database_url = v;
        }
        if let Some(v) = get("admin_token") {
            self.admin_token = v;
        }
        if let Some(v) = get("nonce_secret") {
            self.nonce_secret = v;
        }
        if let Some(v) = get("nonce_ttl_seconds") {
            match v.trim().parse::<i64>() {
                Ok(parsed) if parsed > 0 => self.nonce_ttl_seconds = parsed,
                _ => warn!(value = %v, "ignoring invalid nonce_ttl_seconds"),
            }
        }
    }

    pub fn uses_dev_secrets(&self) -> bool {
        self.admin_token == DEV_ADMIN_TOKEN || self.nonce_secret == DEV_NONCE_SECRET
    }
}

pub fn load_settings() -> Settings {
    Settings::default()
        .with_file("server.toml")
        .with_env(|key| std::env::var(key).ok())
}

/// Brings user-supplied database locations into a form `sqlx` accepts.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        if has_drive_prefix(path) {
            return format!("sqlite:{}", path.replace('\\', "/"));
        }
        return raw_database_url.to_string();
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url)
        .replace('\\', "/");
    if has_drive_prefix(&path) {
        format!("sqlite:{path}")
    } else {
        format!("sqlite://{path}")
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
