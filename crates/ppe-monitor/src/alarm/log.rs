use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{Result, alarm::AlarmSink};

/// Headless sink: the siren is a log line.
#[derive(Debug, Default)]
pub struct LogSink {
    playing: AtomicBool,
}

#[async_trait]
impl AlarmSink for LogSink {
    async fn play(&self) -> Result<()> {
        if !self.playing.swap(true, Ordering::SeqCst) {
            warn!("ALARM: siren on");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.playing.swap(false, Ordering::SeqCst) {
            info!("ALARM: siren off");
        }
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.stop().await
    }
}
