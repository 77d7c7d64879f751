use std::{collections::VecDeque, pin::Pin, sync::Arc};

use tokio::time::{Sleep, sleep};
use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    alarm::{self, AlarmCommand, AlarmEvent, AlarmMachine, AlarmSink},
    context::Context,
};

type Timer = Option<Pin<Box<Sleep>>>;

/// Feeds alert, audio toggle and unlock changes into the alarm state machine
/// and carries out its commands against the sink.
pub struct AlarmDriver {
    context: Arc<Context>,
    config: alarm::Config,
    sink: Arc<dyn AlarmSink>,
    machine: AlarmMachine,
    retry_timer: Timer,
    stop_timer: Timer,
}

impl AlarmDriver {
    pub fn new(context: Arc<Context>, config: alarm::Config, sink: Arc<dyn AlarmSink>) -> Self {
        let machine = AlarmMachine::new(*context.audio_enabled.borrow(), config.require_unlock);
        Self {
            context,
            config,
            sink,
            machine,
            retry_timer: None,
            stop_timer: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(
            require_unlock = self.config.require_unlock,
            stop_delay = ?self.config.stop_delay,
            "Starting Alarm Driver"
        );

        let mut alert = self.context.alert.subscribe();
        let mut audio_enabled = self.context.audio_enabled.subscribe();
        let mut unlock = self.context.audio_unlock.subscribe();

        let enabled = *audio_enabled.borrow_and_update();
        self.dispatch(AlarmEvent::AudioEnabled(enabled)).await;
        if *unlock.borrow_and_update() {
            self.dispatch(AlarmEvent::Unlocked).await;
        }
        let alert_worthy = alert.borrow_and_update().is_alert_worthy();
        self.dispatch(AlarmEvent::AlertChanged(alert_worthy)).await;

        loop {
            let event = tokio::select! {
                res = alert.changed() => {
                    res.map_err(|_| Error::ChannelClosed("alert"))?;
                    AlarmEvent::AlertChanged(alert.borrow_and_update().is_alert_worthy())
                }
                res = audio_enabled.changed() => {
                    res.map_err(|_| Error::ChannelClosed("audio enabled"))?;
                    AlarmEvent::AudioEnabled(*audio_enabled.borrow_and_update())
                }
                res = unlock.wait_for(|unlocked| *unlocked), if !self.machine.is_unlocked() => {
                    res.map_err(|_| Error::ChannelClosed("audio unlock"))?;
                    AlarmEvent::Unlocked
                }
                _ = elapsed(&mut self.retry_timer) => {
                    self.retry_timer = None;
                    AlarmEvent::RetryElapsed
                }
                _ = elapsed(&mut self.stop_timer) => {
                    self.stop_timer = None;
                    AlarmEvent::StopElapsed
                }
            };

            self.dispatch(event).await;
        }
    }

    async fn dispatch(&mut self, event: AlarmEvent) {
        let mut events = VecDeque::from([event]);

        while let Some(event) = events.pop_front() {
            let before = self.machine.state();
            let commands = self.machine.handle(event);

            for command in commands {
                if let Some(follow_up) = self.execute(command).await {
                    events.push_back(follow_up);
                }
            }

            let after = self.machine.state();
            if after != before {
                debug!(event = ?event, from = ?before, to = ?after, "Alarm state changed");
                self.context.alarm_state.send_replace(after);
            }
        }
    }

    async fn execute(&mut self, command: AlarmCommand) -> Option<AlarmEvent> {
        match command {
            AlarmCommand::Play => match self.sink.play().await {
                Ok(()) => {
                    info!("Alarm playing");
                    Some(AlarmEvent::PlaybackStarted)
                }
                Err(err) => {
                    warn!(err = ?err, "Alarm playback failed");
                    Some(AlarmEvent::PlaybackFailed)
                }
            },
            AlarmCommand::Stop => {
                if let Err(err) = self.sink.stop().await {
                    warn!(err = ?err, "Failed to stop alarm");
                }
                info!("Alarm stopped");
                None
            }
            AlarmCommand::ScheduleRetry => {
                self.retry_timer = Some(Box::pin(sleep(self.config.retry_delay)));
                None
            }
            AlarmCommand::CancelRetry => {
                self.retry_timer = None;
                None
            }
            AlarmCommand::ScheduleStop => {
                self.stop_timer = Some(Box::pin(sleep(self.config.stop_delay)));
                None
            }
            AlarmCommand::CancelStop => {
                self.stop_timer = None;
                None
            }
        }
    }
}

/// Completes when the timer fires; never, when there is no timer.
async fn elapsed(timer: &mut Timer) {
    match timer {
        Some(timer) => timer.await,
        None => std::future::pending().await,
    }
}
