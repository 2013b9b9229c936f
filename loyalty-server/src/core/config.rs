use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::auth::JwtConfig;
use crate::core::{Result, ServerError};
use crate::loyalty::OverflowPolicy;
use crate::utils::time::parse_timezone;

/// Bounded exponential backoff for transient store failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, including the first
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Notes |
/// |----------|---------|-------|
/// | WORK_DIR | ./data | Database and logs live here |
/// | DATABASE_PATH | {WORK_DIR}/loyalty.db | |
/// | HTTP_PORT | 3000 | |
/// | ENVIRONMENT | development | development, staging, production |
/// | LOG_LEVEL | info | overridden by RUST_LOG |
/// | LOG_JSON | false | |
/// | LOG_DIR | unset | enables daily rolling files |
/// | BUSINESS_TIMEZONE | America/Chicago | monthly stats boundaries |
/// | PUNCH_OVERFLOW_POLICY | cap | cap or rollover |
/// | STORE_RETRY_ATTEMPTS | 3 | |
/// | STORE_RETRY_DELAY_MS | 50 | first backoff, doubled per retry |
/// | MAX_CONCURRENT_REQUESTS | 256 | in-flight HTTP requests, at least 1 |
/// | JWT_SECRET | random in development | required (32+ chars) elsewhere |
/// | JWT_ISSUER / JWT_AUDIENCE | identity-provider / loyalty-admin | |
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub database_path: String,
    pub http_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
    pub business_timezone: Tz,
    pub overflow_policy: OverflowPolicy,
    pub store_retry: RetryPolicy,
    /// In-flight request cap for the HTTP surface
    pub max_concurrent_requests: usize,
    pub jwt: JwtConfig,
}

impl Config {
    /// Load configuration from the environment
    ///
    /// Unset numeric values fall back to defaults; unknown zone or policy
    /// names and a missing production secret are errors.
    pub fn from_env() -> Result<Self> {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into());
        let database_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| {
            PathBuf::from(&work_dir)
                .join("loyalty.db")
                .to_string_lossy()
                .into_owned()
        });
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let business_timezone = parse_timezone(
            &std::env::var("BUSINESS_TIMEZONE").unwrap_or_else(|_| "America/Chicago".into()),
        )
        .map_err(|e| ServerError::Config(format!("BUSINESS_TIMEZONE: {}", e.message)))?;
        let overflow_policy = match std::env::var("PUNCH_OVERFLOW_POLICY") {
            Ok(v) => v
                .parse::<OverflowPolicy>()
                .map_err(|e| ServerError::Config(format!("PUNCH_OVERFLOW_POLICY: {e}")))?,
            Err(_) => OverflowPolicy::default(),
        };

        let defaults = RetryPolicy::default();
        let store_retry = RetryPolicy {
            attempts: env_parse("STORE_RETRY_ATTEMPTS", defaults.attempts).max(1),
            initial_delay: Duration::from_millis(env_parse(
                "STORE_RETRY_DELAY_MS",
                defaults.initial_delay.as_millis() as u64,
            )),
            max_delay: defaults.max_delay,
        };

        let jwt = JwtConfig::from_env(environment == "development")
            .map_err(|e| ServerError::Config(e.to_string()))?;

        Ok(Self {
            work_dir,
            database_path,
            http_port: env_parse("HTTP_PORT", 3000),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_parse("LOG_JSON", false),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty()),
            environment,
            business_timezone,
            overflow_policy,
            store_retry,
            max_concurrent_requests: concurrency_limit(
                std::env::var("MAX_CONCURRENT_REQUESTS").ok(),
            ),
            jwt,
        })
    }

    /// Fixed configuration for tests (in-memory database, known secret)
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            work_dir: ".".into(),
            database_path: ":memory:".into(),
            http_port: 0,
            environment: "test".into(),
            log_level: "debug".into(),
            log_json: false,
            log_dir: None,
            business_timezone: chrono_tz::America::Chicago,
            overflow_policy: OverflowPolicy::Cap,
            store_retry: RetryPolicy {
                attempts: 3,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
            max_concurrent_requests: 64,
            jwt: JwtConfig::with_secret(jwt_secret),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

/// Default in-flight request cap
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 256;

/// Unset or unparsable values use the default; zero is raised to one
fn concurrency_limit(raw: Option<String>) -> usize {
    raw.and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS)
        .max(1)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
