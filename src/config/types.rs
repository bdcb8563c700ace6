use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Account whose following list is unfollowed
    pub username: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the session cookie
    #[serde(default = "default_session_env")]
    pub session_env: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,

    /// Fetch the next page once this many entities remain
    #[serde(default = "default_low_water_mark")]
    pub low_water_mark: usize,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: i64,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default = "RateLimitConfig::unfollow")]
    pub unfollow: RateLimitConfig,

    #[serde(default)]
    pub follow: FollowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RateLimitConfig {
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_unfollow_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RateLimitConfig {
    pub fn unfollow() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_unfollow_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct FollowConfig {
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_follow_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Only follow accounts with a paid membership
    #[serde(default = "default_true")]
    pub members_only: bool,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_follow_max_delay_ms(),
            members_only: default_true(),
        }
    }
}

impl FollowConfig {
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            min_delay_ms: self.min_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }
}
