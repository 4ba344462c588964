use std::time::Duration;

use anyhow::{Context, Result, anyhow};

const DEFAULT_ADMIN_PASSWORD: &str = "change-me-admin";

#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: Option<String>,
    pub kv_namespace: String,
    pub kv_connect_timeout: Duration,
    pub log_level: String,
    pub admin: AdminSeed,
    pub leaderboard_limit: usize,
}

/// Identity of the account created on first start.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for AdminSeed {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            email: "admin@forum.local".to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let redis_url = get_optional("REDIS_URL");
        let kv_namespace = get_optional("KV_NAMESPACE").unwrap_or_else(|| "forum".to_string());
        let kv_connect_timeout =
            Duration::from_millis(parse_u64_env("KV_CONNECT_TIMEOUT_MS", 500)?);
        let log_level = std::env::var("LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        let defaults = AdminSeed::default();
        let admin = AdminSeed {
            username: get_optional("FORUM_ADMIN_USERNAME").unwrap_or(defaults.username),
            email: get_optional("FORUM_ADMIN_EMAIL")
                .unwrap_or(defaults.email)
                .to_lowercase(),
            password: get_optional("FORUM_ADMIN_PASSWORD").unwrap_or(defaults.password),
        };
        if admin.password.chars().count() < 8 {
            return Err(anyhow!("FORUM_ADMIN_PASSWORD must be at least 8 characters"));
        }

        let leaderboard_limit = parse_usize_env("FORUM_LEADERBOARD_LIMIT", 10)?;

        Ok(Self {
            redis_url,
            kv_namespace,
            kv_connect_timeout,
            log_level,
            admin,
            leaderboard_limit,
        })
    }

    /// In-memory settings for tests and embedded use.
    pub fn in_memory() -> Self {
        Self {
            redis_url: None,
            kv_namespace: "forum".to_string(),
            kv_connect_timeout: Duration::from_millis(500),
            log_level: "info".to_string(),
            admin: AdminSeed::default(),
            leaderboard_limit: 10,
        }
    }

    pub fn uses_default_admin_password(&self) -> bool {
        self.admin.password == DEFAULT_ADMIN_PASSWORD
    }
}

fn get_optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_usize_env(key: &str, default: usize) -> Result<usize> {
    let value = std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<usize>()
        .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?;

    if value == 0 {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(value)
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64> {
    let value = std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<u64>()
        .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?;

    if value == 0 {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::Settings;

    #[test]
    fn in_memory_settings_have_no_remote_backend() {
        let settings = Settings::in_memory();
        assert!(settings.redis_url.is_none());
        assert!(settings.uses_default_admin_password());
        assert_eq!(settings.admin.email, "admin@forum.local");
    }
}
