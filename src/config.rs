use chrono::Duration;

/// Process configuration for the core. Built once at startup and passed
/// down explicitly; nothing in the crate reads ambient global state.
#[derive(Clone, Debug)]
pub struct Config {
    /// Secret key the token codec signs with.
    pub secret_key: String,
    /// Maximum accepted age of a remember-me token.
    pub token_max_age: Duration,
    /// Page size for the aggregated feed.
    pub feed_page_size: usize,
    /// Page size for a single user's profile timeline.
    pub profile_page_size: usize,
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            secret_key: std::env::var("RIPPLE_SECRET_KEY")
                .unwrap_or_else(|_| "insecure-dev-key".to_string()),
            // 365 days unless overridden
            token_max_age: Duration::hours(env_i64("RIPPLE_TOKEN_MAX_AGE_HOURS", 24 * 365)),
            feed_page_size: env_usize("RIPPLE_FEED_PAGE_SIZE", 25),
            profile_page_size: env_usize("RIPPLE_PROFILE_PAGE_SIZE", 10),
        }
    }

    pub fn new(secret_key: impl Into<String>, token_max_age: Duration) -> Self {
        Config {
            secret_key: secret_key.into(),
            token_max_age,
            feed_page_size: 25,
            profile_page_size: 10,
        }
    }
}
