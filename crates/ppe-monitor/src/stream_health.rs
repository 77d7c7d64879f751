use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use ppe_monitor_client::models::CameraId;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const DEFAULT_ERROR_THRESHOLD: u32 = 5;

pub type ReloadKeys = BTreeMap<CameraId, u64>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StreamCounter {
    consecutive_errors: u32,
    last_load_ok: bool,
}

/// Tracks consecutive stream failures per camera and decides when a stream
/// must be recreated.
///
/// Error counters live behind a plain mutex and never notify anyone; only
/// crossing the threshold touches the reload keys, which are a watch channel.
/// The stream watcher picks a new key up on its next connect.
pub struct StreamHealth {
    threshold: u32,
    counters: Mutex<HashMap<CameraId, StreamCounter>>,
    reload_keys: watch::Sender<ReloadKeys>,
}

impl StreamHealth {
    pub fn new(threshold: u32) -> Self {
        let (reload_keys, _) = watch::channel(ReloadKeys::new());
        Self {
            threshold: threshold.max(1),
            counters: Mutex::new(HashMap::new()),
            reload_keys,
        }
    }

    pub fn record_load(&self, camera_id: CameraId) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let counter = counters.entry(camera_id).or_default();
        if counter.consecutive_errors > 0 {
            debug!(
                camera_id,
                errors = counter.consecutive_errors,
                "Stream recovered"
            );
        }
        counter.consecutive_errors = 0;
        counter.last_load_ok = true;
    }

    /// Returns the new reload key when this error crossed the threshold.
    pub fn record_error(&self, camera_id: CameraId) -> Option<u64> {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let counter = counters.entry(camera_id).or_default();
        counter.consecutive_errors += 1;

        warn!(
            camera_id,
            errors = counter.consecutive_errors,
            threshold = self.threshold,
            "Stream error"
        );

        if counter.consecutive_errors < self.threshold {
            return None;
        }

        counter.consecutive_errors = 0;
        counter.last_load_ok = false;
        drop(counters);

        let mut new_key = 0;
        self.reload_keys.send_modify(|keys| {
            let key = keys.entry(camera_id).or_default();
            *key += 1;
            new_key = *key;
        });

        info!(camera_id, reload_key = new_key, "Reloading stream");
        Some(new_key)
    }

    pub fn reload_key(&self, camera_id: CameraId) -> u64 {
        self.reload_keys
            .borrow()
            .get(&camera_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn reload_keys(&self) -> ReloadKeys {
        self.reload_keys.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReloadKeys> {
        self.reload_keys.subscribe()
    }

    pub fn consecutive_errors(&self, camera_id: CameraId) -> u32 {
        self.counter(camera_id).consecutive_errors
    }

    pub fn last_load_ok(&self, camera_id: CameraId) -> bool {
        self.counter(camera_id).last_load_ok
    }

    fn counter(&self, camera_id: CameraId) -> StreamCounter {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&camera_id)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for StreamHealth {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_THRESHOLD)
    }
}
