use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub mod command;
pub mod log;
pub mod machine;

pub use machine::{AlarmCommand, AlarmEvent, AlarmMachine, AlarmState};

/// Output of the looping siren.
#[async_trait]
pub trait AlarmSink: Send + Sync {
    /// Start playing from the beginning. Resolves once playback is confirmed.
    async fn play(&self) -> Result<()>;
    /// Pause and rewind, so the next play starts from the top.
    async fn stop(&self) -> Result<()>;
    /// Free the output for good.
    async fn release(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct Config {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Hold back automatic playback until the operator's first console input.
    #[serde(default)]
    pub require_unlock: bool,
    #[serde(with = "humantime_serde", default = "default_stop_delay")]
    pub stop_delay: Duration,
    #[serde(with = "humantime_serde", default = "default_retry_delay")]
    pub retry_delay: Duration,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            require_unlock: false,
            stop_delay: default_stop_delay(),
            retry_delay: default_retry_delay(),
            output: OutputConfig::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_stop_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub enum OutputConfig {
    #[default]
    Log,
    Command(command::Config),
}

pub fn alarm_sink(config: &Config) -> Arc<dyn AlarmSink> {
    match &config.output {
        OutputConfig::Log => Arc::new(log::LogSink::default()),
        OutputConfig::Command(command) => Arc::new(command::CommandSink::new(command.clone())),
    }
}
