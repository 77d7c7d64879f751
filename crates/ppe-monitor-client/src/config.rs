use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:8083/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub request_timeout: Duration,
    pub verify_ssl: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            verify_ssl: true,
        }
    }
}

/// Contents of the kiosk `config.json`. Single-site deployments carry the API
/// URL at the top level, multi-site ones map area names to their own entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RuntimeConfig {
    Site(SiteConfig),
    Areas(HashMap<String, SiteConfig>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    #[serde(rename = "API_URL")]
    pub api_url: String,
}

impl RuntimeConfig {
    pub fn api_url(&self, area: Option<&str>) -> Option<&str> {
        match (self, area) {
            (RuntimeConfig::Site(site), _) => Some(site.api_url.as_str()),
            (RuntimeConfig::Areas(areas), Some(area)) => {
                areas.get(area).map(|site| site.api_url.as_str())
            }
            (RuntimeConfig::Areas(areas), None) if areas.len() == 1 => {
                areas.values().next().map(|site| site.api_url.as_str())
            }
            (RuntimeConfig::Areas(_), None) => None,
        }
    }
}
