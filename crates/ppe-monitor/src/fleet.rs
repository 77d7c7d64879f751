use ppe_monitor_client::models::Camera;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraFleetStatus {
    Disconnected,
    NoCameras,
    Online,
    Partial,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkStatus {
    Stable,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverallStatus {
    Ok,
    Warning,
    Error,
}

/// Connectivity summary of the camera fleet as of the last camera-list poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FleetReport {
    pub cameras: CameraFleetStatus,
    pub network: NetworkStatus,
    pub overall: OverallStatus,
}

impl FleetReport {
    /// `connected` is whether the last camera-list request succeeded. A failed
    /// poll keeps the previous list, so `cameras` may be stale then.
    pub fn summarize(cameras: &[Camera], connected: bool) -> Self {
        if !connected {
            return Self {
                cameras: CameraFleetStatus::Disconnected,
                network: NetworkStatus::Disconnected,
                overall: OverallStatus::Error,
            };
        }

        let all_active = !cameras.is_empty() && cameras.iter().all(Camera::is_active);
        let any_active = cameras.iter().any(Camera::is_active);

        let (camera_status, overall) = if cameras.is_empty() {
            (CameraFleetStatus::NoCameras, OverallStatus::Error)
        } else if all_active {
            (CameraFleetStatus::Online, OverallStatus::Ok)
        } else if any_active {
            (CameraFleetStatus::Partial, OverallStatus::Warning)
        } else {
            (CameraFleetStatus::Offline, OverallStatus::Error)
        };

        Self {
            cameras: camera_status,
            network: NetworkStatus::Stable,
            overall,
        }
    }
}
