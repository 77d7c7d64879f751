use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use hyper::{
    Request, Response, StatusCode,
    body::Incoming,
    header::{CONTENT_TYPE, HeaderValue},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{
    Error, Result,
    config::ServerConfig,
    context::Context,
    status::StatusReport,
    task::{
        CameraDiscoveryMetrics, DetectionPollerMetrics, StatsPollerMetrics, StreamWatcherMetrics,
    },
};

#[derive(Default, Serialize)]
pub struct Metrics {
    pub detection_poller: Arc<DetectionPollerMetrics>,
    pub camera_discovery: Arc<CameraDiscoveryMetrics>,
    pub stream_watcher: Arc<StreamWatcherMetrics>,
    pub stats_poller: Arc<StatsPollerMetrics>,
}

/// Serves `/status` and `/metrics` until the listener fails.
pub async fn start_server(context: Arc<Context>, config: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.address, config.port)
        .parse()
        .map_err(|e| Error::Metrics(format!("Invalid server address: {e}")))?;
    let listener = TcpListener::bind(addr).await?;

    info!("Status server listening on http://{addr}");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let context = context.clone();

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn(|req| handle_request(req, context.clone())))
                .await
            {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    context: Arc<Context>,
) -> std::result::Result<Response<String>, hyper::Error> {
    Ok(route(req.uri().path(), &context))
}

fn route(path: &str, context: &Context) -> Response<String> {
    match path {
        "/metrics" => {
            let prometheus_output =
                serde_prometheus::to_string(&*context.metrics, None, HashMap::new())
                    .unwrap_or_else(|e| format!("Error serializing metrics: {e}"));

            response(
                StatusCode::OK,
                "text/plain; version=0.0.4; charset=utf-8",
                prometheus_output,
            )
        }
        "/status" => match serde_json::to_string(&StatusReport::collect(context)) {
            Ok(body) => response(StatusCode::OK, "application/json", body),
            Err(e) => response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain; charset=utf-8",
                format!("Error serializing status: {e}"),
            ),
        },
        _ => response(
            StatusCode::NOT_FOUND,
            "text/plain; charset=utf-8",
            "Not Found".to_string(),
        ),
    }
}

fn response(status: StatusCode, content_type: &'static str, body: String) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
