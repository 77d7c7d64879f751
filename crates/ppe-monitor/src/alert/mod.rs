use std::collections::{BTreeMap, BTreeSet};

use ppe_monitor_client::models::CameraId;
use serde::Serialize;

pub mod catalog;
pub mod store;

pub use catalog::{ViolationCatalog, ViolationRule};
pub use store::DetectionStore;

/// Label the detector uses for a generic non-compliance.
pub const NG_LABEL: &str = "ng";

/// Aggregate alert state of the displayed cameras.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct AlertState {
    #[serde(rename = "hasNG")]
    pub has_ng: bool,
    #[serde(rename = "safetyViolations")]
    pub violation_reasons: BTreeSet<String>,
    #[serde(rename = "violationTypes")]
    pub violation_kinds: BTreeMap<String, bool>,
}

impl AlertState {
    /// No NG and every kind of the catalog present and `false`.
    pub fn clear(catalog: &ViolationCatalog) -> Self {
        Self {
            has_ng: false,
            violation_reasons: BTreeSet::new(),
            violation_kinds: catalog.kinds().map(|kind| (kind.to_string(), false)).collect(),
        }
    }

    /// Gates both the banner and the audio alarm.
    pub fn is_alert_worthy(&self) -> bool {
        self.has_ng || !self.violation_reasons.is_empty()
    }
}

/// Recomputes the alert state from scratch for `display_cameras`. Cameras that
/// have not been polled yet contribute nothing.
pub fn evaluate(
    catalog: &ViolationCatalog,
    store: &DetectionStore,
    display_cameras: &[CameraId],
) -> AlertState {
    let mut state = AlertState::clear(catalog);

    for camera_id in display_cameras {
        let Some(snapshot) = store.get(*camera_id) else {
            continue;
        };

        for detection in &snapshot.detections {
            if detection.is_flagged_ng() {
                state.has_ng = true;
            }

            let label = detection.effective_label();
            if label == NG_LABEL {
                state.has_ng = true;
            }

            if let Some(rule) = catalog.match_label(&label) {
                state.has_ng = true;
                state.violation_reasons.insert(rule.reason.clone());
                state.violation_kinds.insert(rule.kind.clone(), true);
            }
        }
    }

    state
}

/// Text rendition of the status panel, used for the alert log lines.
pub fn render_banner(state: &AlertState) -> String {
    let mut lines = vec![format!(
        "status: {}",
        if state.is_alert_worthy() { "NG" } else { "OK" }
    )];

    lines.push("warning:".to_string());
    if state.is_alert_worthy() {
        if state.has_ng {
            lines.push("  NG DETECTED".to_string());
        }
        lines.extend(state.violation_reasons.iter().map(|r| format!("  {r}")));
    } else {
        lines.push("  ---".to_string());
    }

    let kinds = state
        .violation_kinds
        .iter()
        .map(|(kind, missing)| format!("{kind}={}", if *missing { "MISSING" } else { "ok" }))
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(format!("ppe: {kinds}"));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use ppe_monitor_client::models::{Detection, DetectionData};

    use super::*;
    use crate::alert::catalog::{Config, Preset};

    fn detection(class_name: &str) -> Detection {
        Detection {
            class_name: class_name.to_string(),
            detection_conf: 0.9,
            bbox: vec![0.0, 0.0, 10.0, 10.0],
            ..Default::default()
        }
    }

    fn store_with(snapshots: Vec<(CameraId, Vec<Detection>)>) -> DetectionStore {
        let mut store = DetectionStore::default();
        for (camera_id, detections) in snapshots {
            store.apply(
                camera_id,
                1,
                DetectionData {
                    camera_id,
                    count: detections.len() as u32,
                    ng_count: None,
                    detections,
                },
            );
        }
        store
    }

    #[test]
    fn test_compliant_detections_raise_nothing() {
        let catalog = ViolationCatalog::default();
        let store = store_with(vec![(
            0,
            vec![detection("person"), detection("safety-glove"), detection("ok")],
        )]);

        let state = evaluate(&catalog, &store, &[0]);
        assert!(!state.has_ng);
        assert!(state.violation_reasons.is_empty());
        assert!(!state.is_alert_worthy());
        assert_eq!(state, AlertState::clear(&catalog));
    }

    #[test]
    fn test_is_ng_flag_wins_over_label() {
        let catalog = ViolationCatalog::default();
        let mut flagged = detection("person");
        flagged.is_ng = Some(true);
        let store = store_with(vec![(0, vec![flagged])]);

        let state = evaluate(&catalog, &store, &[0]);
        assert!(state.has_ng);
        assert!(state.violation_reasons.is_empty());

        let mut not_flagged = detection("person");
        not_flagged.is_ng = Some(false);
        let store = store_with(vec![(0, vec![not_flagged])]);
        assert!(!evaluate(&catalog, &store, &[0]).has_ng);
    }

    #[test]
    fn test_ng_label_sets_ng_without_reasons() {
        let catalog = ViolationCatalog::default();
        let mut ng = detection("NG");
        ng.detection_conf = 0.95;
        let store = store_with(vec![(0, vec![ng])]);

        let state = evaluate(&catalog, &store, &[0]);
        assert!(state.has_ng);
        assert!(state.violation_reasons.is_empty());
        assert!(state.is_alert_worthy());
    }

    #[test]
    fn test_classified_as_overrides_class() {
        let catalog = ViolationCatalog::default();
        let mut overridden = detection("NG");
        overridden.classified_as = Some("safety-glove".to_string());
        let store = store_with(vec![(0, vec![overridden])]);
        assert!(!evaluate(&catalog, &store, &[0]).has_ng);

        let mut overridden = detection("person");
        overridden.classified_as = Some(" NON-SAFETY-GLASSES ".to_string());
        let store = store_with(vec![(0, vec![overridden])]);
        let state = evaluate(&catalog, &store, &[0]);
        assert!(state.has_ng);
        assert_eq!(state.violation_kinds.get("glasses"), Some(&true));
    }

    #[test]
    fn test_glove_and_shoe_violations() {
        let catalog = ViolationCatalog::default();
        let store = store_with(vec![(
            0,
            vec![detection("non-safety-glove"), detection("non-safety-shoe")],
        )]);

        let state = evaluate(&catalog, &store, &[0]);
        assert!(state.has_ng);
        assert_eq!(
            state.violation_reasons,
            BTreeSet::from([
                "Missing Safety Gloves".to_string(),
                "Missing Safety Shoes".to_string()
            ])
        );
        assert_eq!(
            state.violation_kinds,
            BTreeMap::from([
                ("glove".to_string(), true),
                ("shoe".to_string(), true),
                ("glasses".to_string(), false),
                ("shirt".to_string(), false),
            ])
        );
    }

    #[test]
    fn test_reasons_are_deduplicated() {
        let catalog = ViolationCatalog::default();
        let store = store_with(vec![
            (
                0,
                vec![detection("non-safety-glove"), detection("Non-Safety-Glove")],
            ),
            (1, vec![detection("non-safety-glove")]),
        ]);

        let state = evaluate(&catalog, &store, &[0, 1]);
        assert_eq!(
            state.violation_reasons.iter().collect::<Vec<_>>(),
            vec!["Missing Safety Gloves"]
        );
    }

    #[test]
    fn test_only_displayed_cameras_contribute() {
        let catalog = ViolationCatalog::default();
        let store = store_with(vec![
            (0, vec![detection("non-safety-shirt")]),
            (1, vec![detection("person")]),
        ]);

        let state = evaluate(&catalog, &store, &[0]);
        assert!(state.is_alert_worthy());

        let state = evaluate(&catalog, &store, &[1]);
        assert_eq!(state, AlertState::clear(&catalog));

        // camera 2 was never polled
        let state = evaluate(&catalog, &store, &[2]);
        assert_eq!(state, AlertState::clear(&catalog));
    }

    #[test]
    fn test_warehouse_variant() {
        let catalog = ViolationCatalog::from_config(&Config {
            preset: Preset::Warehouse,
            rules: vec![],
        })
        .expect("valid preset");
        let store = store_with(vec![(
            0,
            vec![detection("non-safety-vest"), detection("non-safety-shoe")],
        )]);

        let state = evaluate(&catalog, &store, &[0]);
        assert_eq!(
            state.violation_reasons.iter().collect::<Vec<_>>(),
            vec!["Missing Safety Vest"]
        );
        assert_eq!(state.violation_kinds.get("vest"), Some(&true));
        assert_eq!(state.violation_kinds.get("shoes"), Some(&false));
    }

    #[test]
    fn test_render_banner() {
        let catalog = ViolationCatalog::default();
        let store = store_with(vec![(
            0,
            vec![detection("non-safety-glove"), detection("non-safety-shoes")],
        )]);

        insta::assert_snapshot!(render_banner(&evaluate(&catalog, &store, &[0])), @r"
        status: NG
        warning:
          NG DETECTED
          Missing Safety Gloves
          Missing Safety Shoes
        ppe: glasses=ok glove=MISSING shirt=ok shoe=MISSING
        ");

        insta::assert_snapshot!(render_banner(&AlertState::clear(&catalog)), @r"
        status: OK
        warning:
          ---
        ppe: glasses=ok glove=ok shirt=ok shoe=ok
        ");
    }

    #[test]
    fn test_status_json_shape() {
        let catalog = ViolationCatalog::default();
        let store = store_with(vec![(0, vec![detection("non-safety-glove")])]);
        let value = serde_json::to_value(evaluate(&catalog, &store, &[0])).expect("serializable");

        assert_eq!(
            value,
            serde_json::json!({
                "hasNG": true,
                "safetyViolations": ["Missing Safety Gloves"],
                "violationTypes": {"glasses": false, "glove": true, "shirt": false, "shoe": false}
            })
        );
    }
}
