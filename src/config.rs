use crate::error::{AppError, Result};

pub const ESPN_SCOREBOARD_URL: &str =
    "https://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard";

/// Game name used as the storage key for frozen scores (GAME_NAME).
pub const DEFAULT_GAME_NAME: &str = "Super Bowl";

/// Poll cadence in seconds. The cadence itself is the retry mechanism for
/// transient feed failures — no backoff.
pub const POLL_INTERVAL_SECS: u64 = 120;

/// Request timeout for one score feed fetch. Expiry is a transient failure.
pub const FEED_TIMEOUT_SECS: u64 = 10;

/// Claim grids are 10×10: row = NFC score digit, column = AFC score digit.
pub const GRID_SIZE: u8 = 10;

/// Touching squares are paid this fraction of the primary payout.
/// Fixed alongside the orthogonal 4-neighborhood; both would move to Config
/// if per-pool touch rules ever materialize.
pub const TOUCH_PAYOUT_RATIO: f64 = 0.10;

/// Capacity of the poller control channel.
pub const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct Config {
    pub feed_url: String,
    /// Storage key for the tracked contest; also matched (case-insensitive,
    /// substring) against scoreboard event names.
    pub game_name: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            feed_url: std::env::var("FEED_URL")
                .unwrap_or_else(|_| ESPN_SCOREBOARD_URL.to_string()),
            game_name: std::env::var("GAME_NAME")
                .unwrap_or_else(|_| DEFAULT_GAME_NAME.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "squares.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| POLL_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .map_err(|_| {
                    AppError::Config("POLL_INTERVAL_SECS must be a positive integer".to_string())
                })?,
        })
    }
}
