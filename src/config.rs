//! Configuration types for rp-digest
//!
//! All configuration is assembled once at process start ([`Config::from_env`])
//! and passed down explicitly; no module reads ambient globals. A `.env` file
//! is honored when present (loaded by the binary before `from_env` runs).

use crate::error::{Error, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::time::Duration;

/// Default ReportPortal instance queried when `REPORTPORTAL_URL` is not set
pub const DEFAULT_PORTAL_URL: &str = "https://reportportal.a2nta.ru";

/// Default Telegram Bot API host
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

/// Main configuration for the digest bot
///
/// Fields are organized into logical sub-configs:
/// - [`portal`](PortalConfig) — reporting-service endpoint and credentials
/// - [`telegram`](TelegramConfig) — chat delivery endpoint and target
/// - [`report`](ReportConfig) — launch selection and schedule settings
/// - [`retry`](RetryConfig) — backoff behavior for transient failures
#[derive(Clone, Debug)]
pub struct Config {
    /// Reporting-service endpoint and credentials
    pub portal: PortalConfig,

    /// Chat delivery endpoint and target
    pub telegram: TelegramConfig,

    /// Launch selection and schedule settings
    pub report: ReportConfig,

    /// Backoff behavior for transient failures
    pub retry: RetryConfig,
}

impl Config {
    /// Build the configuration from environment variables
    ///
    /// Required: `REPORTPORTAL_USERNAME`, `REPORTPORTAL_PASSWORD`,
    /// `TELEGRAM_TOKEN`, `TELEGRAM_CHAT_ID`. Absence of any of them is a
    /// fatal startup condition reported with the offending key.
    pub fn from_env() -> Result<Self> {
        let portal = PortalConfig {
            base_url: env_or("REPORTPORTAL_URL", DEFAULT_PORTAL_URL),
            username: require_env("REPORTPORTAL_USERNAME")?,
            password: require_env("REPORTPORTAL_PASSWORD")?,
        };

        let chat_id_raw = require_env("TELEGRAM_CHAT_ID")?;
        let chat_id = chat_id_raw.parse::<i64>().map_err(|_| Error::Config {
            message: format!("TELEGRAM_CHAT_ID is not a valid chat identifier: {chat_id_raw:?}"),
            key: Some("TELEGRAM_CHAT_ID".to_string()),
        })?;

        let telegram = TelegramConfig {
            api_base: env_or("TELEGRAM_API_URL", DEFAULT_TELEGRAM_API),
            token: require_env("TELEGRAM_TOKEN")?,
            chat_id,
        };

        Ok(Self {
            portal,
            telegram,
            report: ReportConfig::default(),
            retry: RetryConfig::default(),
        })
    }
}

/// ReportPortal endpoint and credentials
#[derive(Clone, Debug)]
pub struct PortalConfig {
    /// Base URL of the ReportPortal instance (no trailing slash)
    pub base_url: String,

    /// Username exchanged for a bearer token
    pub username: String,

    /// Password exchanged for a bearer token
    pub password: String,
}

/// Telegram Bot API endpoint and delivery target
#[derive(Clone, Debug)]
pub struct TelegramConfig {
    /// Bot API host (overridable for tests)
    pub api_base: String,

    /// Bot token issued by BotFather
    pub token: String,

    /// Chat that receives the scheduled digest
    pub chat_id: i64,
}

/// Launch selection and schedule settings
#[derive(Clone, Debug)]
pub struct ReportConfig {
    /// ReportPortal project holding the nightly regression launches
    pub primary_project: String,

    /// ReportPortal project holding the cross-platform launches
    pub secondary_project: String,

    /// Version prefixes tracked for the primary suite, newest first.
    /// At most one launch is reported per prefix.
    pub tracked_prefixes: Vec<String>,

    /// Lookback window for the primary suite launch query
    pub primary_lookback: Duration,

    /// Lookback window for the cross-platform suite launch query
    pub secondary_lookback: Duration,

    /// Local time of day at which the daily digest is sent
    pub report_time: NaiveTime,

    /// Timezone the report time is interpreted in
    pub timezone: Tz,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            primary_project: "superadmin_personal".to_string(),
            secondary_project: "crossplatform_personal".to_string(),
            tracked_prefixes: vec!["3.30".to_string(), "3.29".to_string()],
            primary_lookback: Duration::from_secs(24 * 60 * 60),
            secondary_lookback: Duration::from_secs(36 * 60 * 60),
            // 09:00 Moscow, matching the team's stand-up
            report_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            timezone: chrono_tz::Europe::Moscow,
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum total attempts, including the first call (default: 3)
    pub max_attempts: u32,

    /// Delay before the first retry (default: 2 seconds)
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false — the bot is the only
    /// client, there is no herd to scatter)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::missing_env(key)),
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
