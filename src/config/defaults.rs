use std::path::PathBuf;

pub fn default_version() -> u32 {
    1
}

pub fn default_endpoint() -> String {
    "https://medium.com/_/graphql".to_string()
}

pub fn default_session_env() -> String {
    "FOLLOWCTL_SESSION".to_string()
}

pub fn default_page_size() -> usize {
    25
}

pub fn default_request_timeout_sec() -> u64 {
    30
}

pub fn default_low_water_mark() -> usize {
    3
}

pub fn default_tick_ms() -> u64 {
    100
}

pub fn default_cooldown_hours() -> i64 {
    24
}

pub fn default_state_dir() -> PathBuf {
    PathBuf::from(".followctl")
}

pub fn default_max_attempts() -> u32 {
    3
}

pub fn default_backoff_ms() -> u64 {
    2000
}

pub fn default_min_delay_ms() -> u64 {
    1000
}

pub fn default_unfollow_max_delay_ms() -> u64 {
    10_000
}

pub fn default_follow_max_delay_ms() -> u64 {
    3000
}

pub fn default_true() -> bool {
    true
}
