use std::sync::Arc;

use futures_util::StreamExt;
use metered::{ErrorCount, HitCount, ResponseTime, metered};
use ppe_monitor_client::{ChunkStream, models::CameraId};
use tokio::{
    task::JoinSet,
    time::{Instant, sleep, timeout},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{Error, Result, config::StreamConfig, context::Context};

/// Runs one [`StreamWatcher`] per displayed camera and replaces the whole set
/// whenever the selection changes.
pub struct StreamSupervisor {
    context: Arc<Context>,
    config: StreamConfig,
}

impl StreamSupervisor {
    pub fn new(context: Arc<Context>, config: StreamConfig) -> Self {
        Self { context, config }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Starting Stream Supervisor");

        let mut selection = self.context.selection.subscribe();

        loop {
            let single = self.context.is_single_view();
            let cameras = self.context.display_cameras();
            info!(cameras = ?cameras, single, "Watching camera streams");

            // dropping the set aborts the previous watchers
            let mut watchers = JoinSet::new();
            for camera_id in cameras {
                let watcher = StreamWatcher::new(
                    self.context.clone(),
                    self.config.clone(),
                    camera_id,
                    single,
                );
                watchers.spawn(async move { (camera_id, watcher.run().await) });
            }

            loop {
                tokio::select! {
                    res = selection.changed() => {
                        res.map_err(|_| Error::ChannelClosed("selection"))?;
                        break;
                    }
                    Some(joined) = watchers.join_next() => match joined {
                        Ok((camera_id, res)) => warn!(camera_id, res = ?res, "Stream watcher stopped"),
                        Err(err) => warn!(err = ?err, "Stream watcher task failed"),
                    },
                }
            }
        }
    }
}

/// Stand-in for the on-screen image element of one camera: keeps the
/// annotated stream open and reports load and error events to stream health.
///
/// A connection counts as loaded once it has kept delivering data for a full
/// stall timeout, so connecting and then stalling is a failed load. A failed
/// request, a stream error, the end of the stream, or no data within the stall
/// timeout is an error. Every reconnect picks up the current reload key.
pub struct StreamWatcher {
    context: Arc<Context>,
    config: StreamConfig,
    camera_id: CameraId,
    single: bool,
    metrics: Arc<StreamWatcherMetrics>,
}

#[metered(registry = StreamWatcherMetrics, visibility = pub)]
impl StreamWatcher {
    pub fn new(
        context: Arc<Context>,
        config: StreamConfig,
        camera_id: CameraId,
        single: bool,
    ) -> Self {
        let metrics = context.metrics.stream_watcher.clone();
        Self {
            context,
            config,
            camera_id,
            single,
            metrics,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let camera_id = self.camera_id;
        let health = &self.context.stream_health;

        loop {
            let reload_key = health.reload_key(camera_id);
            let url = self
                .context
                .client
                .stream_url(camera_id, self.single, reload_key)?;
            debug!(camera_id, url = %url, "Connecting to stream");

            let reason = self.watch(url).await;

            debug!(camera_id, reason = %reason, "Stream error");
            if health.record_error(camera_id).is_none() {
                sleep(self.config.retry_delay).await;
            }
        }
    }

    /// Only returns on failure, with the reason.
    async fn watch(&self, url: Url) -> String {
        let mut stream = match self.open_stream(url).await {
            Ok(stream) => stream,
            Err(err) => return err.to_string(),
        };

        let opened = Instant::now();
        let mut loaded = false;
        loop {
            match timeout(self.config.stall_timeout, stream.next()).await {
                Err(_) => return "stalled".to_string(),
                Ok(None) => return "stream ended".to_string(),
                Ok(Some(Err(err))) => return err.to_string(),
                Ok(Some(Ok(_))) if !loaded && opened.elapsed() >= self.config.stall_timeout => {
                    loaded = true;
                    debug!(camera_id = self.camera_id, "Stream loaded");
                    self.context.stream_health.record_load(self.camera_id);
                }
                Ok(Some(Ok(_))) => {}
            }
        }
    }

    #[measure([HitCount, ErrorCount, ResponseTime])]
    async fn open_stream(&self, url: Url) -> Result<ChunkStream> {
        Ok(self.context.client.open_stream(url).await?)
    }
}
