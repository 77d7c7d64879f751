use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ppe_monitor_client::models::{Camera, CameraId, CameraInfo};
use serde::Serialize;
use tracing::warn;

use crate::{
    alarm::AlarmState, alert::AlertState, context::Context, fleet::FleetReport,
    selection::CameraSelection, task::StatsSnapshot,
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamHealthReport {
    pub consecutive_errors: u32,
    pub last_load_ok: bool,
    pub reload_key: u64,
}

/// Everything a presentation layer needs to draw the monitoring view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    #[serde(flatten)]
    pub alert: AlertState,
    pub alert_worthy: bool,
    pub selection: CameraSelection,
    pub display_cameras: Vec<CameraId>,
    /// Current stream URL of every displayed camera, reload key included.
    pub streams: BTreeMap<CameraId, String>,
    pub stream_health: BTreeMap<CameraId, StreamHealthReport>,
    pub cameras: Vec<Camera>,
    pub camera_info: BTreeMap<CameraId, CameraInfo>,
    pub fleet: FleetReport,
    pub alarm: AlarmState,
    pub audio_enabled: bool,
    pub error: Option<String>,
    pub stats: Option<StatsSnapshot>,
    pub updated_at: DateTime<Utc>,
}

impl StatusReport {
    pub fn collect(context: &Context) -> Self {
        let alert = context.alert.borrow().clone();
        let selection = *context.selection.borrow();
        let display_cameras = context.display_cameras();
        let single = context.is_single_view();
        let health = &context.stream_health;

        let mut streams = BTreeMap::new();
        let mut stream_health = BTreeMap::new();
        for &camera_id in &display_cameras {
            let reload_key = health.reload_key(camera_id);
            match context.client.stream_url(camera_id, single, reload_key) {
                Ok(url) => {
                    streams.insert(camera_id, url.to_string());
                }
                Err(err) => warn!(camera_id, err = ?err, "Failed to build stream URL"),
            }
            stream_health.insert(
                camera_id,
                StreamHealthReport {
                    consecutive_errors: health.consecutive_errors(camera_id),
                    last_load_ok: health.last_load_ok(camera_id),
                    reload_key,
                },
            );
        }

        let cameras = context.cameras.borrow().clone();
        let fleet = FleetReport::summarize(&cameras, context.is_api_connected());

        let camera_info = context
            .camera_info
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, info)| (*id, info.clone()))
            .collect();

        let stats = context
            .stats
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        Self {
            alert_worthy: alert.is_alert_worthy(),
            alert,
            selection,
            display_cameras,
            streams,
            stream_health,
            cameras,
            camera_info,
            fleet,
            alarm: *context.alarm_state.borrow(),
            audio_enabled: *context.audio_enabled.borrow(),
            error: context.connection_error(),
            stats,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, context::tests::test_context};

    #[test]
    fn test_initial_report() {
        let context = test_context(&Config::default());
        let value = serde_json::to_value(StatusReport::collect(&context)).expect("serializable");

        assert_eq!(value["hasNG"], false);
        assert_eq!(value["safetyViolations"], serde_json::json!([]));
        assert_eq!(value["violationTypes"]["glove"], false);
        assert_eq!(value["alertWorthy"], false);
        assert_eq!(value["selection"], "0");
        assert_eq!(value["displayCameras"], serde_json::json!([0]));
        assert_eq!(
            value["streams"]["0"],
            "http://127.0.0.1:1/api/camera/0/stream/detected?single=true&v=0"
        );
        assert_eq!(value["fleet"]["cameras"], "disconnected");
        assert_eq!(value["alarm"], "silent");
        assert_eq!(value["audioEnabled"], true);
        assert!(value["error"].is_null());
        assert!(value["stats"].is_null());
        assert!(value["updatedAt"].is_string());
    }

    #[test]
    fn test_report_follows_reload_and_selection() {
        let context = test_context(&Config::default());
        context.selection.send_replace(CameraSelection::Single(1));
        for _ in 0..5 {
            context.stream_health.record_error(1);
        }
        context.set_api_connected(false);

        let report = StatusReport::collect(&context);
        assert_eq!(report.display_cameras, vec![1]);
        assert_eq!(
            report.streams.get(&1).map(String::as_str),
            Some("http://127.0.0.1:1/api/camera/1/stream/detected?single=true&v=1")
        );
        assert_eq!(report.stream_health[&1].reload_key, 1);
        assert_eq!(report.error.as_deref(), Some("Cannot connect to camera API"));
    }
}
