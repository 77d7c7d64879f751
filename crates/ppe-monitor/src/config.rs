use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::Path,
    time::Duration,
};

use clap::Parser;
use ppe_monitor_client::{
    config::{ClientConfig, DEFAULT_API_URL},
    fetch_runtime_config,
    models::CameraId,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    Error, Result, alarm,
    alert::{ViolationCatalog, catalog},
    selection::{CameraSelection, DEFAULT_ALL_CAMERAS},
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub violations: catalog::Config,
    #[serde(default)]
    pub alarm: alarm::Config,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
    pub tracing: Option<TracingConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ViolationCatalog::from_config(&self.violations)?;

        if self.monitor.all_cameras.is_empty() {
            return Err(Error::Config(
                "monitor.all-cameras must name at least one camera".to_string(),
            ));
        }

        for (name, interval) in [
            ("monitor.poll-interval", self.monitor.poll_interval),
            (
                "monitor.camera-refresh-interval",
                self.monitor.camera_refresh_interval,
            ),
            ("monitor.stats-interval", self.monitor.stats_interval),
            ("stream.stall-timeout", self.stream.stall_timeout),
        ] {
            if interval.is_zero() {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }

        if self.stream.error_threshold == 0 {
            return Err(Error::Config(
                "stream.error-threshold must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct ApiConfig {
    /// Wins over everything else when set.
    pub api_url: Option<String>,
    /// Location of the deployment's `config.json`.
    pub runtime_config_url: Option<String>,
    /// Area key for multi-area runtime configs.
    pub area: Option<String>,
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            runtime_config_url: None,
            area: None,
            fallback_url: default_fallback_url(),
            request_timeout: default_request_timeout(),
            verify_ssl: default_verify_ssl(),
        }
    }
}

impl ApiConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: self.request_timeout,
            verify_ssl: self.verify_ssl,
        }
    }

    /// Picks the API base URL: explicit setting, then the runtime config, then
    /// the fallback. The runtime config is fetched at most once, here.
    pub async fn resolve_api_url(&self) -> String {
        if let Some(api_url) = &self.api_url {
            return api_url.clone();
        }

        let Some(runtime_config_url) = &self.runtime_config_url else {
            return self.fallback_url.clone();
        };

        match fetch_runtime_config(&self.client_config(), runtime_config_url).await {
            Ok(runtime_config) => match runtime_config.api_url(self.area.as_deref()) {
                Some(api_url) => {
                    info!(api_url, area = ?self.area, "Resolved API URL from runtime config");
                    api_url.to_string()
                }
                None => {
                    warn!(
                        area = ?self.area,
                        fallback = self.fallback_url,
                        "Runtime config has no API URL for area, using fallback"
                    );
                    self.fallback_url.clone()
                }
            },
            Err(err) => {
                warn!(
                    err = ?err,
                    fallback = self.fallback_url,
                    "Failed to load runtime config, using fallback"
                );
                self.fallback_url.clone()
            }
        }
    }
}

fn default_fallback_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout() -> Duration {
    ppe_monitor_client::config::DEFAULT_REQUEST_TIMEOUT
}

fn default_verify_ssl() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct MonitorConfig {
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_camera_refresh_interval")]
    pub camera_refresh_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_stats_interval")]
    pub stats_interval: Duration,
    /// Cameras shown by the "all" view.
    #[serde(default = "default_all_cameras")]
    pub all_cameras: Vec<CameraId>,
    #[serde(default)]
    pub default_camera: CameraSelection,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            camera_refresh_interval: default_camera_refresh_interval(),
            stats_interval: default_stats_interval(),
            all_cameras: default_all_cameras(),
            default_camera: CameraSelection::default(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_camera_refresh_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_stats_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_all_cameras() -> Vec<CameraId> {
    DEFAULT_ALL_CAMERAS.to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct StreamConfig {
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    /// No data for this long counts as a stream error.
    #[serde(with = "humantime_serde", default = "default_stall_timeout")]
    pub stall_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_stream_retry_delay")]
    pub retry_delay: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            error_threshold: default_error_threshold(),
            stall_timeout: default_stall_timeout(),
            retry_delay: default_stream_retry_delay(),
        }
    }
}

fn default_error_threshold() -> u32 {
    crate::stream_health::DEFAULT_ERROR_THRESHOLD
}

fn default_stall_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_stream_retry_delay() -> Duration {
    Duration::from_secs(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct ServerConfig {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    #[serde(default = "default_server_address")]
    pub address: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            address: default_server_address(),
            port: default_server_port(),
        }
    }
}

fn default_server_enabled() -> bool {
    true
}

fn default_server_address() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    9464
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct LoggingConfig {
    pub loki: Option<LokiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct LokiConfig {
    pub url: String,
    pub username: Option<String>,
    #[serde(default, deserialize_with = "option_from_file_const_or_env")]
    pub password: Option<String>,
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct TracingConfig {
    pub tempo: Option<TempoConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct TempoConfig {
    pub url: String,
    pub port: u16,
}

#[derive(Parser, Debug)]
pub struct Args<T: serde::de::DeserializeOwned + Clone + Send + Sync + 'static> {
    #[arg(short, long, env, value_parser = toml_from_file::<T>)]
    pub config: Option<T>,
    /// Check the configuration and exit.
    #[arg(short, long, env, default_value = "false")]
    pub validate: bool,
    /// Camera view to start with: `all` or a camera id.
    #[arg(long, env = "PPE_CAMERA")]
    pub camera: Option<CameraSelection>,
}

impl<T: serde::de::DeserializeOwned + Clone + Send + Sync + 'static> Args<T> {
    pub fn get_config(&self) -> Result<T> {
        if let Some(config) = &self.config {
            Ok(config.clone())
        } else {
            let default_path = default_config_path();
            toml_from_file(&default_path)
        }
    }
}

pub fn default_config_path() -> String {
    if let Ok(home_dir) = std::env::var("HOME") {
        format!("{home_dir}/.ppe-monitor/config.toml")
    } else {
        "config.toml".to_string()
    }
}

pub fn toml_from_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let toml = std::fs::read_to_string(path)?;
    let config_json = toml::from_str(&toml)?;
    let config = serde_json::from_value(config_json)?;
    Ok(config)
}

/// `file:<path>` reads the value from a file, `env:<NAME>` from the
/// environment, anything else is taken literally.
pub fn from_file_const_or_env<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;

    if let Some(s) = s.strip_prefix("file:") {
        std::fs::read_to_string(s)
            .map(|contents| contents.trim_end().to_string())
            .map_err(serde::de::Error::custom)
    } else if let Some(s) = s.strip_prefix("env:") {
        std::env::var(s).map_err(|e| {
            serde::de::Error::custom(format!("Environment variable '{s}' not found: {e}"))
        })
    } else {
        Ok(s)
    }
}

fn option_from_file_const_or_env<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    from_file_const_or_env(deserializer).map(Some)
}

pub async fn check_and_create_config() -> Result<()> {
    let home_dir = std::env::var("HOME").map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "HOME environment variable not set",
        )
    })?;

    let config_dir = Path::new(&home_dir).join(".ppe-monitor");
    let config_path = config_dir.join("config.toml");

    if !config_path.exists() {
        info!("Configuration file not found. Setting up initial configuration...");

        fs::create_dir_all(&config_dir).map_err(|e| {
            std::io::Error::new(e.kind(), format!("Failed to create config directory: {e}"))
        })?;

        let config_content = render_config(&prompt_for_setup()?);
        fs::write(&config_path, config_content).map_err(|e| {
            std::io::Error::new(e.kind(), format!("Failed to write config file: {e}"))
        })?;

        info!("Configuration file created at: {}", config_path.display());
    }

    Ok(())
}

struct Setup {
    api_url: Option<String>,
    runtime_config_url: Option<String>,
    area: Option<String>,
    all_cameras: String,
    default_camera: String,
    preset: String,
    require_unlock: String,
    sound: Option<String>,
}

fn prompt_for_setup() -> Result<Setup> {
    println!("Welcome to PPE Monitor setup!");
    println!("Press Enter to use default values shown in brackets.\n");

    println!("How should the detection API be located?");
    println!("1. Fixed API URL");
    println!("2. Runtime config.json of the deployment");
    let source = prompt_with_default("API source", "1")?;

    let (api_url, runtime_config_url, area) = match source.trim() {
        "2" | "runtime" => {
            let url = prompt_with_default("Runtime config URL", "http://localhost/config.json")?;
            let area = prompt_with_default("Area (optional)", "")?;
            (None, Some(url), (!area.is_empty()).then_some(area))
        }
        _ => (
            Some(prompt_with_default("API URL", DEFAULT_API_URL)?),
            None,
            None,
        ),
    };

    let all_cameras = prompt_with_default("Cameras of the 'all' view (comma-separated)", "0,1")?;
    let default_camera = prompt_with_default("Start with camera ('all' or an id)", "0")?;

    println!("\nSelect the violation preset:");
    println!("1. Slitting process (gloves, shoes, glasses, shirt)");
    println!("2. Warehouse (helmet, shoes, vest)");
    let preset = match prompt_with_default("Preset", "1")?.trim() {
        "2" | "warehouse" => "warehouse".to_string(),
        _ => "slitting-process".to_string(),
    };

    let require_unlock = prompt_with_default(
        "Wait for operator input before the first alarm (true/false)",
        "false",
    )?;
    let sound = prompt_with_default("Alarm sound file (empty logs alarms only)", "")?;

    Ok(Setup {
        api_url,
        runtime_config_url,
        area,
        all_cameras,
        default_camera,
        preset,
        require_unlock,
        sound: (!sound.is_empty()).then_some(sound),
    })
}

fn render_config(setup: &Setup) -> String {
    let mut api_lines = Vec::new();
    if let Some(api_url) = &setup.api_url {
        api_lines.push(format!("api-url = \"{api_url}\""));
    }
    if let Some(url) = &setup.runtime_config_url {
        api_lines.push(format!("runtime-config-url = \"{url}\""));
    }
    if let Some(area) = &setup.area {
        api_lines.push(format!("area = \"{area}\""));
    }
    let api_lines = api_lines.join("\n");

    let all_cameras = setup
        .all_cameras
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let default_camera = setup.default_camera.trim();

    let alarm_output = match &setup.sound {
        Some(sound) => format!("\n[alarm.output.command]\nsound = \"{sound}\"\n"),
        None => String::new(),
    };

    format!(
        r#"[api]
{api_lines}

[monitor]
poll-interval = "500ms"
all-cameras = [{all_cameras}]
default-camera = "{default_camera}"

[violations]
preset = "{preset}"

[alarm]
require-unlock = {require_unlock}
stop-delay = "2s"
{alarm_output}
[stream]
error-threshold = 5

[server]
address = "127.0.0.1"
port = 9464
"#,
        preset = setup.preset,
        require_unlock = setup.require_unlock.trim().eq_ignore_ascii_case("true"),
    )
}

fn prompt_with_default(prompt: &str, default: &str) -> Result<String> {
    print!("{prompt} [{default}]: ");
    io::stdout()
        .flush()
        .map_err(|e| std::io::Error::new(e.kind(), format!("Failed to flush stdout: {e}")))?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .map_err(|e| std::io::Error::new(e.kind(), format!("Failed to read input: {e}")))?;

    let input = input.trim();
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input.to_string())
    }
}
