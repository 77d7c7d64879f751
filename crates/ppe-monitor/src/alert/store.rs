use std::collections::HashMap;

use ppe_monitor_client::models::{CameraId, DetectionData};

/// Latest detection snapshot per camera.
///
/// Every poll tick carries a sequence number; a response is only applied if
/// no newer tick has already been applied for the same camera, so a slow
/// response can never overwrite fresher data.
#[derive(Debug, Clone, Default)]
pub struct DetectionStore {
    snapshots: HashMap<CameraId, DetectionData>,
    sequences: HashMap<CameraId, u64>,
}

impl DetectionStore {
    /// Returns `false` when the response is stale and was discarded.
    pub fn apply(&mut self, camera_id: CameraId, sequence: u64, data: DetectionData) -> bool {
        if let Some(&applied) = self.sequences.get(&camera_id) {
            if sequence < applied {
                return false;
            }
        }

        self.sequences.insert(camera_id, sequence);
        self.snapshots.insert(camera_id, data);
        true
    }

    pub fn get(&self, camera_id: CameraId) -> Option<&DetectionData> {
        self.snapshots.get(&camera_id)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
