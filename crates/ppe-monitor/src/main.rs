use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info, warn};

use ppe_monitor::{
    Result, alarm,
    config::{Args, Config, check_and_create_config},
    context::Context,
    metrics, opentelemetry, task,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args<Config> = Args::parse();

    // Only prompt for config setup if no config file was provided via --config
    if args.config.is_none() {
        check_and_create_config()
            .await
            .inspect_err(|err| error!(err = ?err, "Error checking for (or creating) config"))?;
    }

    let config = args
        .get_config()
        .inspect_err(|err| error!(err = ?err, "Error getting config"))?;
    config
        .validate()
        .inspect_err(|err| error!(err = ?err, "Invalid config"))?;

    if args.validate {
        println!("Configuration is valid");
        return Ok(());
    }

    let maybe_loki_task = opentelemetry::init(&config);
    debug!(config = ?config, "Parsed config successfully");

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let api_url = config.api.resolve_api_url().await;
    let selection = args.camera.unwrap_or(config.monitor.default_camera);
    let context = Arc::new(Context::new(&config, &api_url, selection)?);

    let sink = alarm::alarm_sink(&config.alarm);

    let mut camera_discovery =
        task::CameraDiscovery::new(context.clone(), config.monitor.camera_refresh_interval);
    let mut detection_poller =
        task::DetectionPoller::new(context.clone(), config.monitor.poll_interval);
    let mut alert_aggregator = task::AlertAggregator::new(context.clone());
    let mut alarm_driver =
        task::AlarmDriver::new(context.clone(), config.alarm.clone(), sink.clone());
    let mut stream_supervisor = task::StreamSupervisor::new(context.clone(), config.stream.clone());
    let mut stats_poller = task::StatsPoller::new(context.clone(), config.monitor.stats_interval);
    let mut console = task::Console::new(context.clone());

    tokio::select! {
        res = camera_discovery.run() => {
            warn!("Camera Discovery stopped: {:?}", res);
        }
        res = detection_poller.run() => {
            warn!("Detection Poller stopped: {:?}", res);
        }
        res = alert_aggregator.run() => {
            warn!("Alert Aggregator stopped: {:?}", res);
        }
        res = alarm_driver.run() => {
            warn!("Alarm Driver stopped: {:?}", res);
        }
        res = stream_supervisor.run() => {
            warn!("Stream Supervisor stopped: {:?}", res);
        }
        res = stats_poller.run() => {
            warn!("Stats Poller stopped: {:?}", res);
        }
        res = console.run() => {
            warn!("Operator Console stopped: {:?}", res);
        }
        res = async {
            if config.server.enabled {
                metrics::start_server(context.clone(), &config.server).await
            } else {
                std::future::pending().await
            }
        } => {
            warn!("Status server stopped: {:?}", res);
        }
        res = async {
            if let Some(loki_task) = maybe_loki_task {
                loki_task.await
            } else {
                std::future::pending().await // Never resolves
            }
        } => {
            warn!("Loki task stopped: {:?}", res);
        }
        res = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C: {:?}", res);
        }
    }

    if let Err(err) = sink.release().await {
        warn!(err = ?err, "Failed to release alarm output");
    }

    info!("Exiting...");
    Ok(())
}
