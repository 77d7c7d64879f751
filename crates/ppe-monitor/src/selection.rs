use std::{fmt::Display, str::FromStr};

use ppe_monitor_client::models::CameraId;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ALL_CAMERAS: [CameraId; 2] = [0, 1];

/// Which cameras the kiosk is showing: one camera, or the fixed "all" pair.
/// The kiosk starts on camera 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSelection {
    Single(CameraId),
    All,
}

impl Default for CameraSelection {
    fn default() -> Self {
        CameraSelection::Single(0)
    }
}

impl CameraSelection {
    pub fn display_cameras(&self, all: &[CameraId]) -> Vec<CameraId> {
        match self {
            CameraSelection::Single(id) => vec![*id],
            CameraSelection::All => all.to_vec(),
        }
    }

    /// Single-camera views request the full size stream from the API.
    pub fn is_single_view(&self, all: &[CameraId]) -> bool {
        self.display_cameras(all).len() == 1
    }
}

impl Display for CameraSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraSelection::Single(id) => write!(f, "{id}"),
            CameraSelection::All => write!(f, "all"),
        }
    }
}

impl FromStr for CameraSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(CameraSelection::All);
        }

        s.parse::<CameraId>()
            .map(CameraSelection::Single)
            .map_err(|_| format!("Invalid camera selection '{s}': expected 'all' or a camera id"))
    }
}

impl Serialize for CameraSelection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CameraSelection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(s) => s.parse().map_err(serde::de::Error::custom),
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|n| CameraId::try_from(n).ok())
                .map(CameraSelection::Single)
                .ok_or_else(|| serde::de::Error::custom(format!("Invalid camera id {n}"))),
            other => Err(serde::de::Error::custom(format!(
                "Invalid camera selection {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_cameras() {
        assert_eq!(
            CameraSelection::All.display_cameras(&DEFAULT_ALL_CAMERAS),
            vec![0, 1]
        );
        assert_eq!(
            CameraSelection::Single(1).display_cameras(&DEFAULT_ALL_CAMERAS),
            vec![1]
        );
        assert!(CameraSelection::Single(0).is_single_view(&DEFAULT_ALL_CAMERAS));
        assert!(!CameraSelection::All.is_single_view(&DEFAULT_ALL_CAMERAS));
        assert!(CameraSelection::All.is_single_view(&[3]));
    }

    #[test]
    fn test_starts_on_first_camera() {
        assert_eq!(CameraSelection::default(), CameraSelection::Single(0));
        assert_eq!(
            CameraSelection::default().display_cameras(&DEFAULT_ALL_CAMERAS),
            vec![0]
        );
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!("all".parse(), Ok(CameraSelection::All));
        assert_eq!(" ALL ".parse(), Ok(CameraSelection::All));
        assert_eq!("1".parse(), Ok(CameraSelection::Single(1)));
        assert!("camera".parse::<CameraSelection>().is_err());
    }

    #[test]
    fn test_deserialize_selection() {
        let selection: CameraSelection = serde_json::from_str("\"all\"").expect("valid");
        assert_eq!(selection, CameraSelection::All);
        let selection: CameraSelection = serde_json::from_str("2").expect("valid");
        assert_eq!(selection, CameraSelection::Single(2));
        assert!(serde_json::from_str::<CameraSelection>("true").is_err());
    }
}
