use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};

pub type CameraId = u32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Camera {
    pub id: CameraId,
    #[serde(default)]
    pub url: String,
    pub status: CameraStatus,
    pub detections: Option<u32>,
}

impl Camera {
    pub fn is_active(&self) -> bool {
        self.status == CameraStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    Active,
    Inactive,
    #[serde(untagged)]
    Unknown(String),
}

impl Display for CameraStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraStatus::Active => write!(f, "active"),
            CameraStatus::Inactive => write!(f, "inactive"),
            CameraStatus::Unknown(status) => write!(f, "{status}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CamerasRawResponse {
    #[serde(default)]
    pub cameras: Vec<Camera>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraInfo {
    pub id: CameraId,
    #[serde(default)]
    pub url: String,
    pub status: CameraStatus,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub detections: u32,
}

/// One flagged region of a frame as reported by the detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Detection {
    #[serde(rename = "class", default)]
    pub class_name: String,
    #[serde(default)]
    pub classified_as: Option<String>,
    #[serde(alias = "confidence", default)]
    pub detection_conf: f64,
    #[serde(default)]
    pub classification_conf: Option<f64>,
    #[serde(default)]
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub is_ng: Option<bool>,
}

impl Detection {
    /// The label used for matching: the classifier override when it carries a
    /// value, the detector class otherwise. Trimmed and lower-cased.
    pub fn effective_label(&self) -> String {
        let label = match self.classified_as.as_deref() {
            Some(classified) if !classified.is_empty() => classified,
            _ => self.class_name.as_str(),
        };
        label.trim().to_lowercase()
    }

    pub fn is_flagged_ng(&self) -> bool {
        self.is_ng == Some(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DetectionData {
    pub camera_id: CameraId,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub ng_count: Option<u32>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub today_detections: u64,
    #[serde(default)]
    pub yesterday_detections: u64,
    #[serde(rename = "totalNG", default)]
    pub total_ng: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleViolationCount {
    pub rule: String,
    #[serde(default)]
    pub count: u64,
}

/// One slice of the OK/NG pie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PpeStatusSlice {
    pub name: String,
    #[serde(default)]
    pub value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Violation counts of one month. Sites report either a single `count` or
/// one column per PPE kind, so every numeric column is kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlySummary {
    pub month: String,
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

/// `{ success, data }` envelope of the dashboard series endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DashboardSeriesRawResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_label_prefers_classified_as() {
        let detection = Detection {
            class_name: "X".to_string(),
            classified_as: Some("Y".to_string()),
            ..Default::default()
        };
        assert_eq!(detection.effective_label(), "y");

        let detection = Detection {
            class_name: "X".to_string(),
            classified_as: None,
            ..Default::default()
        };
        assert_eq!(detection.effective_label(), "x");
    }

    #[test]
    fn test_effective_label_trims_and_folds_case() {
        let detection = Detection {
            class_name: "  Non-Safety-Glove \n".to_string(),
            ..Default::default()
        };
        assert_eq!(detection.effective_label(), "non-safety-glove");

        let detection = Detection {
            class_name: "NG".to_string(),
            classified_as: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(detection.effective_label(), "ng");
    }

    #[test]
    fn test_deserialize_detection_payload() {
        let data = r#"{
            "camera_id": 1,
            "count": 2,
            "ng_count": 1,
            "detections": [
                {
                    "class": "person",
                    "classified_as": "non-safety-glove",
                    "detection_conf": 0.91,
                    "classification_conf": 0.77,
                    "bbox": [10, 20, 110, 220],
                    "is_ng": true
                },
                {
                    "class": "NG",
                    "confidence": 0.95,
                    "bbox": [1.5, 2.5, 3.5, 4.5]
                }
            ]
        }"#;

        let payload: DetectionData = serde_json::from_str(data).expect("valid payload");
        assert_eq!(payload.camera_id, 1);
        assert_eq!(payload.detections.len(), 2);
        assert!(payload.detections[0].is_flagged_ng());
        assert_eq!(payload.detections[1].detection_conf, 0.95);
        assert_eq!(payload.detections[1].classified_as, None);
        assert_eq!(payload.detections[1].is_ng, None);
    }

    #[test]
    fn test_deserialize_monthly_summary_columns() {
        let data = r#"{"success": true, "data": [
            {"month": "Jan", "count": 4},
            {"month": "Feb", "gloves": 2, "glasses": 0, "shirt": 1}
        ]}"#;

        let raw: DashboardSeriesRawResponse<MonthlySummary> =
            serde_json::from_str(data).expect("valid payload");
        assert!(raw.success);
        assert_eq!(raw.data[0].counts, BTreeMap::from([("count".to_string(), 4)]));
        assert_eq!(raw.data[1].month, "Feb");
        assert_eq!(raw.data[1].counts.get("gloves"), Some(&2));
        assert_eq!(raw.data[1].counts.len(), 3);
    }

    #[test]
    fn test_deserialize_ppe_status() {
        let data = r#"{"success": false}"#;
        let raw: DashboardSeriesRawResponse<PpeStatusSlice> =
            serde_json::from_str(data).expect("valid payload");
        assert!(!raw.success);
        assert!(raw.data.is_empty());

        let data = r##"{"success": true, "data": [
            {"name": "OK", "value": 40, "color": "#10B981"},
            {"name": "NG", "value": 3}
        ]}"##;
        let raw: DashboardSeriesRawResponse<PpeStatusSlice> =
            serde_json::from_str(data).expect("valid payload");
        assert_eq!(raw.data[0].color.as_deref(), Some("#10B981"));
        assert_eq!(raw.data[1].value, 3);
        assert_eq!(raw.data[1].color, None);
    }

    #[test]
    fn test_deserialize_camera_status() {
        let data = r#"{"cameras": [
            {"id": 0, "url": "rtsp://a", "status": "active", "detections": 3},
            {"id": 1, "url": "rtsp://b", "status": "inactive"},
            {"id": 2, "url": "rtsp://c", "status": "rebooting"}
        ]}"#;

        let raw: CamerasRawResponse = serde_json::from_str(data).expect("valid payload");
        assert!(raw.cameras[0].is_active());
        assert_eq!(raw.cameras[1].status, CameraStatus::Inactive);
        assert_eq!(
            raw.cameras[2].status,
            CameraStatus::Unknown("rebooting".to_string())
        );
    }
}
