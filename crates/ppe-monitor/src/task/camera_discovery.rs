use std::{collections::HashSet, sync::Arc, time::Duration};

use metered::{ErrorCount, HitCount, ResponseTime, metered};
use ppe_monitor_client::models::{Camera, CameraId};
use tokio::{task::JoinSet, time::interval};
use tracing::{debug, info, warn};

use crate::{Result, context::Context};

/// Keeps the camera list fresh and fetches the static info of every camera
/// the first time it shows up.
pub struct CameraDiscovery {
    context: Arc<Context>,
    refresh_interval: Duration,
    requested_info: HashSet<CameraId>,
    info_requests: JoinSet<()>,
    metrics: Arc<CameraDiscoveryMetrics>,
}

#[metered(registry = CameraDiscoveryMetrics, visibility = pub)]
impl CameraDiscovery {
    pub fn new(context: Arc<Context>, refresh_interval: Duration) -> Self {
        let metrics = context.metrics.camera_discovery.clone();
        Self {
            context,
            refresh_interval,
            requested_info: HashSet::new(),
            info_requests: JoinSet::new(),
            metrics,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(interval = ?self.refresh_interval, "Starting Camera Discovery");

        let mut interval = interval(self.refresh_interval);

        loop {
            interval.tick().await;

            while let Some(res) = self.info_requests.try_join_next() {
                if let Err(err) = res {
                    warn!(err = ?err, "Camera info request task failed");
                }
            }

            match self.refresh_cameras().await {
                Ok(cameras) => self.publish(cameras),
                Err(err) => {
                    if self.context.is_api_connected() {
                        warn!(err = ?err, "Lost connection to camera API");
                    } else {
                        debug!(err = ?err, "Camera API still unreachable");
                    }
                    self.context.set_api_connected(false);
                }
            }
        }
    }

    #[measure([HitCount, ErrorCount, ResponseTime])]
    async fn refresh_cameras(&self) -> Result<Vec<Camera>> {
        Ok(self.context.client.get_cameras().await?)
    }

    fn publish(&mut self, cameras: Vec<Camera>) {
        if !self.context.is_api_connected() {
            info!(cameras = cameras.len(), "Connected to camera API");
        }
        self.context.set_api_connected(true);

        for camera in &cameras {
            if self.requested_info.insert(camera.id) {
                self.request_info(camera.id);
            }
        }

        self.context.cameras.send_if_modified(|current| {
            if *current == cameras {
                return false;
            }
            debug!(cameras = ?cameras, "Camera list changed");
            *current = cameras;
            true
        });
    }

    /// One attempt per camera id; a failure is logged and never retried.
    fn request_info(&mut self, camera_id: CameraId) {
        let context = self.context.clone();

        self.info_requests.spawn(async move {
            match context.client.get_camera_info(camera_id).await {
                Ok(info) => {
                    debug!(camera_id, resolution = %info.resolution, "Fetched camera info");
                    context
                        .camera_info
                        .write()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(camera_id, info);
                }
                Err(err) => warn!(camera_id, err = ?err, "Failed to fetch camera info"),
            }
        });
    }
}
