use std::{path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    process::{Child, Command},
    sync::Mutex,
    time::timeout,
};
use tracing::{debug, info};

use crate::{Error, Result, alarm::AlarmSink};

/// A player that exits this quickly after spawning never started playing.
const STARTUP_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct Config {
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the sound file; must make the player loop.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    pub sound: PathBuf,
}

fn default_program() -> String {
    "mpv".to_string()
}

fn default_args() -> Vec<String> {
    ["--no-video", "--really-quiet", "--loop-file=inf", "--volume=80"]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
}

/// Plays the siren by running an external player process. Stopping kills the
/// process, so the next play starts from the beginning of the file.
pub struct CommandSink {
    config: Config,
    child: Mutex<Option<Child>>,
}

impl CommandSink {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            child: Mutex::new(None),
        }
    }

    async fn kill(child: &mut Child) {
        if let Err(err) = child.kill().await {
            debug!(err = ?err, "Alarm player already gone");
        }
    }
}

#[async_trait]
impl AlarmSink for CommandSink {
    #[tracing::instrument(skip(self))]
    async fn play(&self) -> Result<()> {
        let mut guard = self.child.lock().await;
        if let Some(mut previous) = guard.take() {
            Self::kill(&mut previous).await;
        }

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(&self.config.sound)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Alarm(format!(
                    "Failed to spawn alarm player '{}': {e}",
                    self.config.program
                ))
            })?;

        match timeout(STARTUP_GRACE, child.wait()).await {
            Ok(Ok(status)) => Err(Error::Alarm(format!(
                "Alarm player exited immediately: {status}"
            ))),
            Ok(Err(err)) => Err(Error::Alarm(format!("Failed to watch alarm player: {err}"))),
            Err(_) => {
                info!(pid = child.id(), "Alarm player started");
                *guard = Some(child);
                Ok(())
            }
        }
    }

    async fn stop(&self) -> Result<()> {
        if let Some(mut child) = self.child.lock().await.take() {
            Self::kill(&mut child).await;
            debug!("Alarm player stopped");
        }
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config =
            serde_json::from_value(serde_json::json!({ "sound": "/opt/ppe/siren.mp3" }))
                .expect("valid config");
        assert_eq!(config.program, "mpv");
        assert!(config.args.iter().any(|arg| arg == "--loop-file=inf"));
    }

    #[tokio::test]
    async fn test_missing_player_fails_playback() {
        let sink = CommandSink::new(Config {
            program: "/nonexistent/ppe-monitor-player".to_string(),
            args: vec![],
            sound: PathBuf::from("siren.mp3"),
        });

        assert!(matches!(sink.play().await, Err(Error::Alarm(_))));
        tokio_test::assert_ok!(sink.stop().await);
        tokio_test::assert_ok!(sink.release().await);
    }
}
