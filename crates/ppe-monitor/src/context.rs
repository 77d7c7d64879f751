use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use ppe_monitor_client::{
    DetectionClient,
    models::{Camera, CameraId, CameraInfo},
};
use tokio::sync::watch;

use crate::{
    Result,
    alarm::AlarmState,
    alert::{AlertState, DetectionStore, ViolationCatalog},
    config::Config,
    metrics::Metrics,
    selection::CameraSelection,
    stream_health::StreamHealth,
    task::StatsSnapshot,
};

pub const CONNECTION_ERROR: &str = "Cannot connect to camera API";

/// Shared state of the monitor.
///
/// Everything a task reacts to is a watch channel; everything that is only
/// read by the status report sits behind a plain lock.
pub struct Context {
    pub client: DetectionClient,
    pub catalog: ViolationCatalog,
    pub all_cameras: Vec<CameraId>,

    pub cameras: watch::Sender<Vec<Camera>>,
    pub detections: watch::Sender<DetectionStore>,
    pub selection: watch::Sender<CameraSelection>,
    pub alert: watch::Sender<AlertState>,
    pub audio_enabled: watch::Sender<bool>,
    /// Flips to `true` on the operator's first console input.
    pub audio_unlock: watch::Sender<bool>,
    pub alarm_state: watch::Sender<AlarmState>,

    pub stream_health: StreamHealth,
    pub camera_info: RwLock<HashMap<CameraId, CameraInfo>>,
    /// Whether the last camera-list request succeeded.
    api_connected: AtomicBool,
    connection_error: RwLock<Option<String>>,
    pub stats: RwLock<Option<StatsSnapshot>>,
    pub metrics: Arc<Metrics>,
}

impl Context {
    pub fn new(config: &Config, api_url: &str, selection: CameraSelection) -> Result<Self> {
        let client = DetectionClient::new(api_url, config.api.client_config())?;
        let catalog = ViolationCatalog::from_config(&config.violations)?;

        let (cameras, _) = watch::channel(Vec::new());
        let (detections, _) = watch::channel(DetectionStore::default());
        let (selection, _) = watch::channel(selection);
        let (alert, _) = watch::channel(AlertState::clear(&catalog));
        let (audio_enabled, _) = watch::channel(config.alarm.enabled);
        let (audio_unlock, _) = watch::channel(false);
        let (alarm_state, _) = watch::channel(AlarmState::Silent);

        Ok(Self {
            client,
            catalog,
            all_cameras: config.monitor.all_cameras.clone(),
            cameras,
            detections,
            selection,
            alert,
            audio_enabled,
            audio_unlock,
            alarm_state,
            stream_health: StreamHealth::new(config.stream.error_threshold),
            camera_info: RwLock::new(HashMap::new()),
            api_connected: AtomicBool::new(false),
            connection_error: RwLock::new(None),
            stats: RwLock::new(None),
            metrics: Arc::new(Metrics::default()),
        })
    }

    pub fn display_cameras(&self) -> Vec<CameraId> {
        self.selection.borrow().display_cameras(&self.all_cameras)
    }

    pub fn is_single_view(&self) -> bool {
        self.selection.borrow().is_single_view(&self.all_cameras)
    }

    pub fn set_api_connected(&self, connected: bool) {
        self.api_connected.store(connected, Ordering::SeqCst);
        self.set_connection_error((!connected).then_some(CONNECTION_ERROR));
    }

    pub fn is_api_connected(&self) -> bool {
        self.api_connected.load(Ordering::SeqCst)
    }

    fn set_connection_error(&self, error: Option<&str>) {
        let mut guard = self
            .connection_error
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *guard = error.map(str::to_string);
    }

    pub fn connection_error(&self) -> Option<String> {
        self.connection_error
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::convert::Infallible;

    use hyper::{
        Request, Response, StatusCode, body::Incoming, server::conn::http1, service::service_fn,
    };
    use hyper_util::rt::TokioIo;
    use tokio::net::TcpListener;

    use super::*;

    /// Serves JSON bodies by request path on a local port and returns the API
    /// base URL. Paths the closure does not know get a 404.
    pub(crate) async fn serve_api<F>(respond: F) -> String
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let respond = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let respond = respond.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let response = match respond(req.uri().path()) {
                            Some(body) => Response::new(body),
                            None => {
                                let mut response = Response::new("Not Found".to_string());
                                *response.status_mut() = StatusCode::NOT_FOUND;
                                response
                            }
                        };
                        async move { Ok::<_, Infallible>(response) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        format!("http://{addr}/api")
    }

    /// Context against an API nobody listens on.
    pub(crate) fn test_context(config: &Config) -> Context {
        api_context(config, "http://127.0.0.1:1/api")
    }

    pub(crate) fn api_context(config: &Config, api_url: &str) -> Context {
        Context::new(config, api_url, config.monitor.default_camera).expect("valid test context")
    }

    #[test]
    fn test_display_cameras_follow_selection() {
        let context = test_context(&Config::default());
        assert_eq!(context.display_cameras(), vec![0]);
        assert!(context.is_single_view());

        context.selection.send_replace(CameraSelection::All);
        assert_eq!(context.display_cameras(), vec![0, 1]);
        assert!(!context.is_single_view());

        context.selection.send_replace(CameraSelection::Single(1));
        assert_eq!(context.display_cameras(), vec![1]);
        assert!(context.is_single_view());
    }

    #[test]
    fn test_initial_alert_is_clear() {
        let context = test_context(&Config::default());
        let alert = context.alert.borrow();
        assert!(!alert.is_alert_worthy());
        assert_eq!(alert.violation_kinds.len(), 4);
    }
}
