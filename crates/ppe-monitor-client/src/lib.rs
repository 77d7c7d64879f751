use futures_util::{StreamExt, stream::BoxStream};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    config::{ClientConfig, RuntimeConfig},
    error::{Error, Result},
    models::{
        Camera, CameraId, CameraInfo, CamerasRawResponse, DashboardSeriesRawResponse,
        DashboardStats, DetectionData, MonthlySummary, PpeStatusSlice, RuleViolationCount,
    },
};

pub mod config;
pub mod error;
pub mod models;

/// Byte stream of an open live stream. Items are chunk sizes.
pub type ChunkStream = BoxStream<'static, Result<usize>>;

pub struct DetectionClient {
    client: Client,
    base_url: Url,
    config: ClientConfig,
}

impl DetectionClient {
    pub fn new(base_url: &str, config: ClientConfig) -> Result<Self> {
        let client = build_http_client(&config)?;
        let base_url = normalize_base_url(Url::parse(base_url)?);

        info!(base_url = %base_url, "Created detection API client");

        Ok(DetectionClient {
            client,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "{what} request failed: {}",
                response.status()
            )));
        }

        let value: Value = response.json().await?;
        if let Some(message) = api_error(&value) {
            return Err(Error::Api(format!("{what} request rejected: {message}")));
        }

        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_cameras(&self) -> Result<Vec<Camera>> {
        let url = self.endpoint("cameras")?;
        let raw: CamerasRawResponse = self.get_json(url, "Camera list").await?;
        Ok(raw.cameras)
    }

    pub async fn get_camera_info(&self, camera_id: CameraId) -> Result<CameraInfo> {
        let url = self.endpoint(&format!("camera/{camera_id}"))?;
        self.get_json(url, "Camera info").await
    }

    pub async fn get_detections(&self, camera_id: CameraId) -> Result<DetectionData> {
        let url = self.endpoint(&format!("camera/{camera_id}/detections"))?;
        self.get_json(url, "Detections").await
    }

    pub async fn get_dashboard_stats(&self) -> Result<DashboardStats> {
        let url = self.endpoint("dashboard/stats")?;
        let stats: DashboardStats = self.get_json(url, "Dashboard stats").await?;
        if !stats.success {
            return Err(Error::Api("Dashboard stats unavailable".to_string()));
        }
        Ok(stats)
    }

    pub async fn get_ppe_status(&self) -> Result<Vec<PpeStatusSlice>> {
        self.get_dashboard_series("dashboard/ppe-status", "PPE status")
            .await
    }

    pub async fn get_rule_violations(&self) -> Result<Vec<RuleViolationCount>> {
        self.get_dashboard_series("dashboard/rule-violations", "Rule violations")
            .await
    }

    pub async fn get_monthly_summary(&self) -> Result<Vec<MonthlySummary>> {
        self.get_dashboard_series("dashboard/monthly-summary", "Monthly summary")
            .await
    }

    async fn get_dashboard_series<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &str,
    ) -> Result<Vec<T>> {
        let url = self.endpoint(path)?;
        let raw: DashboardSeriesRawResponse<T> = self.get_json(url, what).await?;
        if !raw.success {
            return Err(Error::Api(format!("{what} unavailable")));
        }
        Ok(raw.data)
    }

    /// Annotated live stream of a camera. `reload_key` is appended so a bumped
    /// key always produces a fresh request.
    pub fn stream_url(&self, camera_id: CameraId, single: bool, reload_key: u64) -> Result<Url> {
        let mut url = self.endpoint(&format!("camera/{camera_id}/stream/detected"))?;
        url.query_pairs_mut()
            .append_pair("single", &single.to_string())
            .append_pair("v", &reload_key.to_string());
        Ok(url)
    }

    pub async fn open_stream(&self, url: Url) -> Result<ChunkStream> {
        debug!(url = %url, "Opening live stream");
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Api(format!(
                "Stream request failed: {}",
                response.status()
            )));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.len()).map_err(Error::from))
            .boxed())
    }
}

/// Fetches the kiosk runtime configuration (`config.json`).
pub async fn fetch_runtime_config(config: &ClientConfig, url: &str) -> Result<RuntimeConfig> {
    let client = build_http_client(config)?;
    let url = Url::parse(url)?;

    let response = client
        .get(url)
        .header("Cache-Control", "no-store")
        .timeout(config.request_timeout)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(Error::RuntimeConfig(format!(
            "Failed to load runtime config: {}",
            response.status()
        )));
    }

    let value: Value = response.json().await?;
    Ok(serde_json::from_value(value)?)
}

fn build_http_client(config: &ClientConfig) -> Result<Client> {
    Ok(Client::builder()
        .danger_accept_invalid_certs(!config.verify_ssl)
        .connect_timeout(config.request_timeout)
        .build()?)
}

fn normalize_base_url(mut url: Url) -> Url {
    // joins are relative, so the base path must end in a slash
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

// The detection API answers unknown camera ids with `{"error": ...}` and a 200.
fn api_error(value: &Value) -> Option<&str> {
    value.get("error").and_then(Value::as_str)
}
