use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Where scheduling data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local store, used for development and tests.
    Memory,
    /// Supabase PostgREST tables.
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "local" => Ok(StorageBackend::Memory),
            "supabase" | "postgres" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub server_port: u16,
    pub booking_timeout_ms: u64,
    pub notification_poll_interval_secs: u64,
    pub notification_page_size: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: parse_or("STORAGE_BACKEND", StorageBackend::Memory),
            server_port: parse_or("PORT", 3000),
            booking_timeout_ms: parse_or("BOOKING_TIMEOUT_MS", 5_000),
            notification_poll_interval_secs: parse_or("NOTIFICATION_POLL_INTERVAL_SECS", 30),
            notification_page_size: parse_or("NOTIFICATION_PAGE_SIZE", 50),
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Supabase storage selected but Supabase is not fully configured");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn booking_timeout(&self) -> Duration {
        Duration::from_millis(self.booking_timeout_ms)
    }

    pub fn notification_poll_interval(&self) -> Duration {
        Duration::from_secs(self.notification_poll_interval_secs.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            storage_backend: StorageBackend::Memory,
            server_port: 3000,
            booking_timeout_ms: 5_000,
            notification_poll_interval_secs: 30,
            notification_page_size: 50,
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!(" Supabase ".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert!("redis".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_config_is_not_configured() {
        let config = AppConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.booking_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.notification_poll_interval(), Duration::from_secs(30));
    }
}
