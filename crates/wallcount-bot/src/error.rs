//! Error types for the bot service.

/// Errors raised outside the core library: configuration and page fetching.
#[derive(thiserror::Error, Debug)]
pub enum BotError {
    #[error("Missing configuration: {0} (set the flag or the environment variable)")]
    MissingSetting(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidSetting(String),

    #[error("Failed to fetch {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Wall(#[from] wallcount::WallError),
}

pub type BotResult<T> = Result<T, BotError>;
