use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Detection API error: {0}")]
    Client(#[from] ppe_monitor_client::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    #[error("No dashboard endpoint answered")]
    StatsUnavailable,

    #[error("Alarm error: {0}")]
    Alarm(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Tracing error: {0}")]
    Tracing(String),

    #[error("Metrics server error: {0}")]
    Metrics(String),
}
