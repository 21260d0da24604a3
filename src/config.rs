// Application configuration loaded from environment variables

use std::time::Duration;

/// Runtime configuration for the API process and the activation scheduler
///
/// Every knob has a default so a bare environment still boots; the grace
/// window and minimum lead time are policy parameters, not hardcoded laws.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string (required)
    pub database_url: String,
    /// Bind host, defaults to 0.0.0.0
    pub host: String,
    /// Bind port, defaults to 8080
    pub port: String,
    /// Interval between activation passes (default 60s)
    pub poll_interval: Duration,
    /// Maximum number of due rides handled per pass (default 50)
    pub batch_size: i64,
    /// Minutes past the scheduled time before an unmatched ride expires (default 15)
    pub grace_minutes: i64,
    /// Minimum minutes between booking time and scheduled departure (default 30)
    pub min_lead_minutes: i64,
}

impl AppConfig {
    /// Load configuration from the environment
    ///
    /// # Panics
    /// Panics if DATABASE_URL is unset; everything else falls back to defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set in environment"),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT").unwrap_or_else(|_| "8080".to_string()),
            poll_interval: Duration::from_secs(env_or("ACTIVATION_POLL_SECONDS", 60)),
            batch_size: env_or("ACTIVATION_BATCH_SIZE", 50) as i64,
            grace_minutes: env_or("ACTIVATION_GRACE_MINUTES", 15) as i64,
            min_lead_minutes: env_or("MIN_LEAD_MINUTES", 30) as i64,
        }
    }
}

fn env_or(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_to_default() {
        assert_eq!(env_or("RIDEHAIL_TEST_UNSET_KEY", 42), 42);
    }

    #[test]
    fn test_env_or_ignores_garbage() {
        std::env::set_var("RIDEHAIL_TEST_GARBAGE_KEY", "not-a-number");
        assert_eq!(env_or("RIDEHAIL_TEST_GARBAGE_KEY", 7), 7);
        std::env::remove_var("RIDEHAIL_TEST_GARBAGE_KEY");
    }
}
