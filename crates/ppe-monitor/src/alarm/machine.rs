use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AlarmState {
    #[default]
    Silent,
    PlayRequested,
    Playing,
    StoppingDelayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    AlertChanged(bool),
    AudioEnabled(bool),
    Unlocked,
    PlaybackStarted,
    PlaybackFailed,
    RetryElapsed,
    StopElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCommand {
    Play,
    /// Pause and rewind.
    Stop,
    ScheduleRetry,
    CancelRetry,
    ScheduleStop,
    CancelStop,
}

/// Alarm lifecycle without any I/O or timers. The driver feeds events in and
/// executes the returned commands, including scheduling the timer events.
#[derive(Debug, Clone)]
pub struct AlarmMachine {
    state: AlarmState,
    alert: bool,
    enabled: bool,
    unlocked: bool,
    retried: bool,
    retry_pending: bool,
}

impl AlarmMachine {
    pub fn new(enabled: bool, require_unlock: bool) -> Self {
        Self {
            state: AlarmState::Silent,
            alert: false,
            enabled,
            unlocked: !require_unlock,
            retried: false,
            retry_pending: false,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    fn can_play(&self) -> bool {
        self.alert && self.enabled && self.unlocked
    }

    fn request_play(&mut self) -> Vec<AlarmCommand> {
        self.state = AlarmState::PlayRequested;
        self.retried = false;
        self.retry_pending = false;
        vec![AlarmCommand::Play]
    }

    fn silence(&mut self) {
        self.state = AlarmState::Silent;
        self.retry_pending = false;
    }

    pub fn handle(&mut self, event: AlarmEvent) -> Vec<AlarmCommand> {
        use AlarmCommand::*;
        use AlarmState::*;

        match event {
            AlarmEvent::AlertChanged(alert) => {
                if alert == self.alert {
                    return vec![];
                }
                self.alert = alert;

                match (self.state, alert) {
                    (Silent, true) if self.can_play() => self.request_play(),
                    (StoppingDelayed, true) => {
                        self.state = Playing;
                        vec![CancelStop]
                    }
                    (Playing, false) => {
                        self.state = StoppingDelayed;
                        vec![ScheduleStop]
                    }
                    (PlayRequested, false) if self.retry_pending => {
                        self.silence();
                        vec![CancelRetry]
                    }
                    _ => vec![],
                }
            }

            AlarmEvent::AudioEnabled(enabled) => {
                if enabled == self.enabled {
                    return vec![];
                }
                self.enabled = enabled;

                if enabled {
                    return match self.state {
                        Silent if self.can_play() => self.request_play(),
                        _ => vec![],
                    };
                }

                match self.state {
                    Silent => vec![],
                    Playing => {
                        self.silence();
                        vec![Stop]
                    }
                    StoppingDelayed => {
                        self.silence();
                        vec![CancelStop, Stop]
                    }
                    PlayRequested => {
                        let commands = if self.retry_pending {
                            vec![CancelRetry, Stop]
                        } else {
                            vec![Stop]
                        };
                        self.silence();
                        commands
                    }
                }
            }

            AlarmEvent::Unlocked => {
                if self.unlocked {
                    return vec![];
                }
                self.unlocked = true;

                match self.state {
                    Silent if self.can_play() => self.request_play(),
                    _ => vec![],
                }
            }

            AlarmEvent::PlaybackStarted => {
                if self.state != PlayRequested {
                    return vec![];
                }

                if !self.enabled {
                    self.silence();
                    vec![Stop]
                } else if !self.alert {
                    self.state = StoppingDelayed;
                    vec![ScheduleStop]
                } else {
                    self.state = Playing;
                    vec![]
                }
            }

            AlarmEvent::PlaybackFailed => {
                if self.state != PlayRequested {
                    return vec![];
                }

                if !self.retried && self.can_play() {
                    self.retried = true;
                    self.retry_pending = true;
                    vec![ScheduleRetry]
                } else {
                    self.silence();
                    vec![]
                }
            }

            AlarmEvent::RetryElapsed => {
                if self.state != PlayRequested || !self.retry_pending {
                    return vec![];
                }
                self.retry_pending = false;

                if self.can_play() {
                    vec![Play]
                } else {
                    self.silence();
                    vec![]
                }
            }

            AlarmEvent::StopElapsed => {
                if self.state != StoppingDelayed {
                    return vec![];
                }
                self.silence();
                vec![Stop]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> AlarmMachine {
        let mut machine = AlarmMachine::new(true, false);
        assert_eq!(
            machine.handle(AlarmEvent::AlertChanged(true)),
            vec![AlarmCommand::Play]
        );
        assert_eq!(machine.state(), AlarmState::PlayRequested);
        assert!(machine.handle(AlarmEvent::PlaybackStarted).is_empty());
        assert_eq!(machine.state(), AlarmState::Playing);
        machine
    }

    #[test]
    fn test_alert_starts_playback() {
        playing();
    }

    #[test]
    fn test_repeated_alert_does_not_replay() {
        let mut machine = playing();
        assert!(machine.handle(AlarmEvent::AlertChanged(true)).is_empty());
        assert_eq!(machine.state(), AlarmState::Playing);
    }

    #[test]
    fn test_clear_delays_stop() {
        let mut machine = playing();
        assert_eq!(
            machine.handle(AlarmEvent::AlertChanged(false)),
            vec![AlarmCommand::ScheduleStop]
        );
        assert_eq!(machine.state(), AlarmState::StoppingDelayed);

        assert_eq!(
            machine.handle(AlarmEvent::StopElapsed),
            vec![AlarmCommand::Stop]
        );
        assert_eq!(machine.state(), AlarmState::Silent);
    }

    #[test]
    fn test_alert_returning_cancels_pending_stop() {
        let mut machine = playing();
        machine.handle(AlarmEvent::AlertChanged(false));
        assert_eq!(
            machine.handle(AlarmEvent::AlertChanged(true)),
            vec![AlarmCommand::CancelStop]
        );
        assert_eq!(machine.state(), AlarmState::Playing);

        // a stale timer firing after the cancel is ignored
        assert!(machine.handle(AlarmEvent::StopElapsed).is_empty());
        assert_eq!(machine.state(), AlarmState::Playing);
    }

    #[test]
    fn test_disable_stops_immediately() {
        let mut machine = playing();
        assert_eq!(
            machine.handle(AlarmEvent::AudioEnabled(false)),
            vec![AlarmCommand::Stop]
        );
        assert_eq!(machine.state(), AlarmState::Silent);

        let mut machine = playing();
        machine.handle(AlarmEvent::AlertChanged(false));
        assert_eq!(
            machine.handle(AlarmEvent::AudioEnabled(false)),
            vec![AlarmCommand::CancelStop, AlarmCommand::Stop]
        );
        assert_eq!(machine.state(), AlarmState::Silent);
    }

    #[test]
    fn test_disabled_audio_never_plays() {
        let mut machine = AlarmMachine::new(false, false);
        assert!(machine.handle(AlarmEvent::AlertChanged(true)).is_empty());
        assert_eq!(machine.state(), AlarmState::Silent);

        assert_eq!(
            machine.handle(AlarmEvent::AudioEnabled(true)),
            vec![AlarmCommand::Play]
        );
    }

    #[test]
    fn test_single_retry_then_give_up() {
        let mut machine = AlarmMachine::new(true, false);
        machine.handle(AlarmEvent::AlertChanged(true));

        assert_eq!(
            machine.handle(AlarmEvent::PlaybackFailed),
            vec![AlarmCommand::ScheduleRetry]
        );
        assert_eq!(machine.state(), AlarmState::PlayRequested);
        assert_eq!(
            machine.handle(AlarmEvent::RetryElapsed),
            vec![AlarmCommand::Play]
        );

        assert!(machine.handle(AlarmEvent::PlaybackFailed).is_empty());
        assert_eq!(machine.state(), AlarmState::Silent);

        // stays silent while the alert holds
        assert!(machine.handle(AlarmEvent::AlertChanged(true)).is_empty());

        // the next alert transition tries again
        machine.handle(AlarmEvent::AlertChanged(false));
        assert_eq!(
            machine.handle(AlarmEvent::AlertChanged(true)),
            vec![AlarmCommand::Play]
        );
    }

    #[test]
    fn test_retry_succeeds() {
        let mut machine = AlarmMachine::new(true, false);
        machine.handle(AlarmEvent::AlertChanged(true));
        machine.handle(AlarmEvent::PlaybackFailed);
        machine.handle(AlarmEvent::RetryElapsed);
        machine.handle(AlarmEvent::PlaybackStarted);
        assert_eq!(machine.state(), AlarmState::Playing);
    }

    #[test]
    fn test_alert_clearing_cancels_retry() {
        let mut machine = AlarmMachine::new(true, false);
        machine.handle(AlarmEvent::AlertChanged(true));
        machine.handle(AlarmEvent::PlaybackFailed);

        assert_eq!(
            machine.handle(AlarmEvent::AlertChanged(false)),
            vec![AlarmCommand::CancelRetry]
        );
        assert_eq!(machine.state(), AlarmState::Silent);
        assert!(machine.handle(AlarmEvent::RetryElapsed).is_empty());
    }

    #[test]
    fn test_playback_started_after_alert_cleared() {
        let mut machine = AlarmMachine::new(true, false);
        machine.handle(AlarmEvent::AlertChanged(true));
        machine.handle(AlarmEvent::AlertChanged(false));
        assert_eq!(machine.state(), AlarmState::PlayRequested);

        assert_eq!(
            machine.handle(AlarmEvent::PlaybackStarted),
            vec![AlarmCommand::ScheduleStop]
        );
        assert_eq!(machine.state(), AlarmState::StoppingDelayed);
    }

    #[test]
    fn test_unlock_gates_automatic_playback_once() {
        let mut machine = AlarmMachine::new(true, true);
        assert!(!machine.is_unlocked());
        assert!(machine.handle(AlarmEvent::AlertChanged(true)).is_empty());
        assert_eq!(machine.state(), AlarmState::Silent);

        assert_eq!(
            machine.handle(AlarmEvent::Unlocked),
            vec![AlarmCommand::Play]
        );
        assert!(machine.is_unlocked());

        machine.handle(AlarmEvent::PlaybackFailed);
        machine.handle(AlarmEvent::RetryElapsed);
        machine.handle(AlarmEvent::PlaybackFailed);
        assert_eq!(machine.state(), AlarmState::Silent);

        // unlocking is one-shot
        assert!(machine.handle(AlarmEvent::Unlocked).is_empty());
    }
}
