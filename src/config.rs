//! Application configuration loaded from environment variables.
//!
//! Calendar anchors (season start, weekly reset) belong to the game's
//! release schedule and change every season, so they live here rather than
//! in the stats code.

use chrono::{DateTime, Utc, Weekday};
use std::env;
use std::str::FromStr;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Bungie API ---
    /// Value of the `X-API-Key` header
    pub bungie_api_key: String,
    /// Base URL of the Bungie.net platform API
    pub bungie_base_url: String,
    /// Token bucket capacity
    pub rate_max_tokens: u32,
    /// Token bucket refill rate (tokens per second)
    pub rate_per_second: u32,

    // --- Server ---
    /// Server port
    pub port: u16,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,

    // --- Cache ---
    /// Directory of the on-device cache
    pub cache_path: String,
    /// How long operations wait for the cache to finish opening
    pub cache_open_timeout_ms: u64,

    // --- Activity history ---
    /// Activities requested per page (clamped to the API maximum)
    pub activity_page_size: u32,
    /// Upper bound of the page range for a full backfill
    pub backfill_max_pages: u32,
    /// Pages fired concurrently per backfill batch
    pub backfill_batch_size: u32,

    // --- Stats calendar ---
    pub all_time_start: DateTime<Utc>,
    pub season_start: DateTime<Utc>,
    pub weekly_reset_day: Weekday,
    pub weekly_reset_hour: u32,
    pub weekly_reset_utc_offset_hours: i32,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            bungie_api_key: "test_api_key".to_string(),
            bungie_base_url: "http://127.0.0.1:9/Platform".to_string(),
            rate_max_tokens: 20,
            rate_per_second: 20,
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            cache_path: "data/cache".to_string(),
            cache_open_timeout_ms: 3000,
            activity_page_size: 250,
            backfill_max_pages: 100,
            backfill_batch_size: 5,
            all_time_start: default_all_time_start(),
            season_start: default_season_start(),
            weekly_reset_day: Weekday::Tue,
            weekly_reset_hour: 17,
            weekly_reset_utc_offset_hours: 0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        let weekly_reset_hour = parse_or("WEEKLY_RESET_HOUR", defaults.weekly_reset_hour)?;
        if weekly_reset_hour > 23 {
            return Err(ConfigError::Invalid(
                "WEEKLY_RESET_HOUR",
                format!("{} is not an hour of the day", weekly_reset_hour),
            ));
        }

        let weekly_reset_day = match env::var("WEEKLY_RESET_DAY") {
            Ok(raw) => Weekday::from_str(raw.trim())
                .map_err(|_| ConfigError::Invalid("WEEKLY_RESET_DAY", raw.clone()))?,
            Err(_) => defaults.weekly_reset_day,
        };

        Ok(Self {
            bungie_api_key: env::var("BUNGIE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("BUNGIE_API_KEY"))?,
            bungie_base_url: env::var("BUNGIE_BASE_URL")
                .unwrap_or_else(|_| "https://www.bungie.net/Platform".to_string()),
            rate_max_tokens: parse_or("RATE_MAX_TOKENS", defaults.rate_max_tokens)?,
            rate_per_second: parse_or("RATE_PER_SECOND", defaults.rate_per_second)?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            cache_path: env::var("CACHE_PATH").unwrap_or(defaults.cache_path),
            cache_open_timeout_ms: parse_or(
                "CACHE_OPEN_TIMEOUT_MS",
                defaults.cache_open_timeout_ms,
            )?,
            activity_page_size: parse_or("ACTIVITY_PAGE_SIZE", defaults.activity_page_size)?,
            backfill_max_pages: parse_or("BACKFILL_MAX_PAGES", defaults.backfill_max_pages)?,
            backfill_batch_size: parse_or("BACKFILL_BATCH_SIZE", defaults.backfill_batch_size)?
                .max(1),
            all_time_start: parse_date_or("ALL_TIME_START", defaults.all_time_start)?,
            season_start: parse_date_or("SEASON_START", defaults.season_start)?,
            weekly_reset_day,
            weekly_reset_hour,
            weekly_reset_utc_offset_hours: parse_or(
                "WEEKLY_RESET_UTC_OFFSET_HOURS",
                defaults.weekly_reset_utc_offset_hours,
            )?,
        })
    }
}

/// Predates the launch of the activity history API.
fn default_all_time_start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_420_070_400, 0).unwrap_or_default() // 2015-01-01T00:00:00Z
}

fn default_season_start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_752_598_800, 0).unwrap_or_default() // 2025-07-15T17:00:00Z
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw.clone())),
        Err(_) => Ok(default),
    }
}

fn parse_date_or(
    name: &'static str,
    default: DateTime<Utc>,
) -> Result<DateTime<Utc>, ConfigError> {
    match env::var(name) {
        Ok(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ConfigError::Invalid(name, raw.clone())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
