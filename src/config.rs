//! Application configuration loaded from environment variables.
//!
//! Values are read once at startup; a `.env` file is honored for local
//! development.

use chrono::{FixedOffset, Offset, Utc, Weekday};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// Largest UTC offset accepted from callers or configuration (14 hours).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local store (local development and tests).
    Memory,
    /// Google Cloud Firestore.
    Firestore,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "firestore" => Ok(StorageBackend::Firestore),
            other => Err(ConfigError::Invalid("STORAGE_BACKEND", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// JWT signing key for caller identity tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Persistence backend
    pub storage_backend: StorageBackend,
    /// GCP project ID (Firestore backend only)
    pub gcp_project_id: String,
    /// Path to the static activity catalog
    pub catalog_path: String,
    /// Caller time zone used when a request does not declare one
    pub default_utc_offset_minutes: i32,
    /// First day of the weekly aggregation window
    pub week_start: Weekday,
    /// Weekly goal (kg CO2e) for profiles without a personal goal
    pub default_weekly_goal: Decimal,
    /// How often the challenge expiry sweep runs
    pub expiry_sweep_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let default_utc_offset_minutes: i32 = parse_var("DEFAULT_UTC_OFFSET_MINUTES", 0)?;
        if default_utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::Invalid(
                "DEFAULT_UTC_OFFSET_MINUTES",
                default_utc_offset_minutes.to_string(),
            ));
        }

        let week_start = match env::var("WEEK_START") {
            Ok(raw) => raw
                .trim()
                .parse::<Weekday>()
                .map_err(|_| ConfigError::Invalid("WEEK_START", raw))?,
            Err(_) => Weekday::Mon,
        };

        let default_weekly_goal = match env::var("DEFAULT_WEEKLY_GOAL_KG") {
            Ok(raw) => Decimal::from_str(raw.trim())
                .ok()
                .filter(|goal| goal.is_sign_positive() && !goal.is_zero())
                .ok_or(ConfigError::Invalid("DEFAULT_WEEKLY_GOAL_KG", raw))?,
            Err(_) => Decimal::from(50),
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            catalog_path: env::var("CATALOG_PATH")
                .unwrap_or_else(|_| "data/catalog.json".to_string()),
            default_utc_offset_minutes,
            week_start,
            default_weekly_goal,
            expiry_sweep_interval_secs: parse_var("EXPIRY_SWEEP_INTERVAL_SECS", 300)?,
        })
    }

    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            storage_backend: StorageBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            catalog_path: "data/catalog.json".to_string(),
            default_utc_offset_minutes: 0,
            week_start: Weekday::Mon,
            default_weekly_goal: Decimal::from(50),
            expiry_sweep_interval_secs: 300,
        }
    }

    /// Time zone used when a request does not declare one.
    pub fn default_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.default_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
