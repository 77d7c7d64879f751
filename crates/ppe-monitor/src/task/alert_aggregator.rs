use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    alert::{self, AlertState},
    context::Context,
};

/// Recomputes the alert state whenever the detection store or the camera
/// selection changes, and publishes it only when it differs.
pub struct AlertAggregator {
    context: Arc<Context>,
}

impl AlertAggregator {
    pub fn new(context: Arc<Context>) -> Self {
        Self { context }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Starting Alert Aggregator");

        let mut detections = self.context.detections.subscribe();
        let mut selection = self.context.selection.subscribe();

        loop {
            self.recompute();

            tokio::select! {
                res = detections.changed() => res.map_err(|_| Error::ChannelClosed("detections"))?,
                res = selection.changed() => {
                    res.map_err(|_| Error::ChannelClosed("selection"))?;
                    info!(
                        selection = %*selection.borrow(),
                        cameras = ?self.context.display_cameras(),
                        "Camera selection changed"
                    );
                }
            }
        }
    }

    fn recompute(&self) -> bool {
        let display_cameras = self.context.display_cameras();
        let state = alert::evaluate(
            &self.context.catalog,
            &self.context.detections.borrow(),
            &display_cameras,
        );

        let was_alert_worthy = self.context.alert.borrow().is_alert_worthy();
        let changed = self.context.alert.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state.clone();
            true
        });

        if changed {
            log_transition(&state, was_alert_worthy);
        }
        changed
    }
}

fn log_transition(state: &AlertState, was_alert_worthy: bool) {
    let banner = alert::render_banner(state);

    match (was_alert_worthy, state.is_alert_worthy()) {
        (false, true) => warn!(
            violations = ?state.violation_reasons,
            "NG detected\n{banner}"
        ),
        (true, false) => info!("Alert cleared\n{banner}"),
        _ => debug!(violations = ?state.violation_reasons, "Alert updated\n{banner}"),
    }
}
