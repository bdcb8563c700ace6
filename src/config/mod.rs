mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use crate::model::MutationKind;
use defaults::*;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// One year
const MAX_COOLDOWN_HOURS: i64 = 24 * 365;

static USERNAME_RE: OnceLock<Regex> = OnceLock::new();

fn username_re() -> &'static Regex {
    USERNAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]{1,64}$").expect("valid regex"))
}

/// Strip a leading `@` and surrounding whitespace from a handle.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_string()
}

pub fn validate_username(raw: &str) -> Result<String, ConfigError> {
    let name = normalize_username(raw);
    if username_re().is_match(&name) {
        Ok(name)
    } else {
        Err(ConfigError::InvalidUsername(raw.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            username: String::new(),
            endpoint: default_endpoint(),
            session_env: default_session_env(),
            page_size: default_page_size(),
            request_timeout_sec: default_request_timeout_sec(),
            low_water_mark: default_low_water_mark(),
            tick_ms: default_tick_ms(),
            cooldown_hours: default_cooldown_hours(),
            state_dir: default_state_dir(),
            retry: RetryConfig::default(),
            unfollow: RateLimitConfig::unfollow(),
            follow: FollowConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: Config = serde_yaml::from_str(&content)?;
        config.username = normalize_username(&config.username);
        Ok(config)
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_username(&self.username)?;

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if self.page_size == 0 {
            return Err(ConfigError::EmptyPage);
        }

        check_bounds("request_timeout_sec", self.request_timeout_sec as i64, 1, 600)?;
        check_bounds("tick_ms", self.tick_ms as i64, 1, 1000)?;
        check_bounds("cooldown_hours", self.cooldown_hours, 0, MAX_COOLDOWN_HOURS)?;

        check_range("unfollow", &self.unfollow)?;
        check_range("follow", &self.follow.rate_limit())?;

        Ok(())
    }

    pub fn rate_limit(&self, kind: MutationKind) -> RateLimitConfig {
        match kind {
            MutationKind::Unfollow => self.unfollow.clone(),
            MutationKind::Follow => self.follow.rate_limit(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    /// Starter config written by `followctl init`
    pub fn template(username: &str) -> String {
        format!(
            "# followctl configuration\n\
             version: 1\n\
             username: {username}\n\
             # Session cookie is read from this environment variable\n\
             session_env: {session_env}\n\
             endpoint: {endpoint}\n\
             page_size: {page_size}\n\
             request_timeout_sec: {timeout}\n\
             low_water_mark: {low_water}\n\
             cooldown_hours: {cooldown}\n\
             \n\
             retry:\n\
             \x20 max_attempts: {attempts}\n\
             \x20 backoff_ms: {backoff}\n\
             \n\
             unfollow:\n\
             \x20 min_delay_ms: {min}\n\
             \x20 max_delay_ms: {unfollow_max}\n\
             \n\
             follow:\n\
             \x20 min_delay_ms: {min}\n\
             \x20 max_delay_ms: {follow_max}\n\
             \x20 members_only: true\n",
            username = username,
            session_env = default_session_env(),
            endpoint = default_endpoint(),
            page_size = default_page_size(),
            timeout = default_request_timeout_sec(),
            low_water = default_low_water_mark(),
            cooldown = default_cooldown_hours(),
            attempts = default_max_attempts(),
            backoff = default_backoff_ms(),
            min = default_min_delay_ms(),
            unfollow_max = default_unfollow_max_delay_ms(),
            follow_max = default_follow_max_delay_ms(),
        )
    }
}

fn check_bounds(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn check_range(kind: &'static str, range: &RateLimitConfig) -> Result<(), ConfigError> {
    if range.min_delay_ms == 0 || range.min_delay_ms > range.max_delay_ms {
        return Err(ConfigError::InvalidDelayRange {
            kind,
            min_ms: range.min_delay_ms,
            max_ms: range.max_delay_ms,
        });
    }
    Ok(())
}
