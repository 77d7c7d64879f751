use std::{collections::BTreeSet, sync::Arc, time::Duration};

use metered::{ErrorCount, HitCount, ResponseTime, metered};
use ppe_monitor_client::models::{CameraId, DetectionData};
use tokio::{
    task::{JoinError, JoinSet},
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, trace, warn};

use crate::{Result, context::Context};

type Response = (CameraId, u64, Result<DetectionData>);

pub struct DetectionFetcher {
    context: Arc<Context>,
    metrics: Arc<DetectionPollerMetrics>,
}

#[metered(registry = DetectionPollerMetrics, visibility = pub)]
impl DetectionFetcher {
    #[measure([HitCount, ErrorCount, ResponseTime])]
    pub async fn fetch_detections(&self, camera_id: CameraId) -> Result<DetectionData> {
        Ok(self.context.client.get_detections(camera_id).await?)
    }
}

/// Polls the detection payload of every known camera on a fixed interval.
///
/// Ticks never wait for the previous tick's requests. Each tick is numbered
/// and the store drops any response older than the newest one it applied for
/// the same camera. Requests still in flight are aborted with the poller.
pub struct DetectionPoller {
    context: Arc<Context>,
    poll_interval: Duration,
    fetcher: Arc<DetectionFetcher>,
    in_flight: JoinSet<Response>,
    sequence: u64,
}

impl DetectionPoller {
    pub fn new(context: Arc<Context>, poll_interval: Duration) -> Self {
        let fetcher = Arc::new(DetectionFetcher {
            context: context.clone(),
            metrics: context.metrics.detection_poller.clone(),
        });

        Self {
            context,
            poll_interval,
            fetcher,
            in_flight: JoinSet::new(),
            sequence: 0,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(interval = ?self.poll_interval, "Starting Detection Poller");

        let mut interval = interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                Some(joined) = self.in_flight.join_next() => self.apply(joined),
            }
        }
    }

    /// Cameras from the camera list plus whatever is on screen, so the
    /// displayed cameras are polled even before the first list arrives.
    fn poll_targets(&self) -> BTreeSet<CameraId> {
        let mut targets: BTreeSet<CameraId> =
            self.context.cameras.borrow().iter().map(|c| c.id).collect();
        targets.extend(self.context.display_cameras());
        targets
    }

    fn tick(&mut self) {
        self.sequence += 1;
        let sequence = self.sequence;

        for camera_id in self.poll_targets() {
            let fetcher = self.fetcher.clone();
            self.in_flight.spawn(async move {
                let result = fetcher.fetch_detections(camera_id).await;
                (camera_id, sequence, result)
            });
        }

        trace!(sequence, in_flight = self.in_flight.len(), "Detection poll tick");
    }

    fn apply(&self, joined: std::result::Result<Response, JoinError>) {
        match joined {
            Ok((camera_id, sequence, Ok(data))) => {
                let applied = self
                    .context
                    .detections
                    .send_if_modified(|store| store.apply(camera_id, sequence, data));
                if !applied {
                    debug!(camera_id, sequence, "Discarded stale detection response");
                }
            }
            Ok((camera_id, sequence, Err(err))) => {
                warn!(camera_id, sequence, err = ?err, "Failed to fetch detections");
            }
            Err(err) => warn!(err = ?err, "Detection request task failed"),
        }
    }
}
