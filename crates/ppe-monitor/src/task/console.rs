use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::{Result, alert, context::Context, selection::CameraSelection};

const HELP: &str = "\
commands:
  all            show the camera pair
  <id>           show a single camera
  mute | unmute  toggle the audio alarm
  status         print the current warning banner
  help           this text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Select(CameraSelection),
    Audio(bool),
    Status,
    Help,
    /// Empty line: counts as an operator gesture and nothing else.
    Nothing,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "" => Some(ConsoleCommand::Nothing),
            "mute" | "m" | "off" => Some(ConsoleCommand::Audio(false)),
            "unmute" | "u" | "on" => Some(ConsoleCommand::Audio(true)),
            "status" | "s" => Some(ConsoleCommand::Status),
            "help" | "h" | "?" => Some(ConsoleCommand::Help),
            _ => line.parse().ok().map(ConsoleCommand::Select),
        }
    }
}

/// Operator input on stdin. Any line, even an unknown one, is a user gesture
/// and unlocks the audio alarm.
pub struct Console {
    context: Arc<Context>,
}

impl Console {
    pub fn new(context: Arc<Context>) -> Self {
        Self { context }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Starting Operator Console (type 'help')");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            self.handle_line(&line);
        }

        // headless deployments have no stdin; keep running without a console
        info!("Console input closed");
        std::future::pending().await
    }

    fn handle_line(&self, line: &str) {
        let unlocked = self.context.audio_unlock.send_if_modified(|unlocked| {
            if *unlocked {
                return false;
            }
            *unlocked = true;
            true
        });
        if unlocked {
            debug!("Audio unlocked by operator input");
        }

        let Some(command) = ConsoleCommand::parse(line) else {
            warn!(input = line, "Unknown console command");
            println!("{HELP}");
            return;
        };

        match command {
            ConsoleCommand::Select(selection) => {
                self.context.selection.send_if_modified(|current| {
                    if *current == selection {
                        return false;
                    }
                    *current = selection;
                    true
                });
            }
            ConsoleCommand::Audio(enabled) => {
                info!(enabled, "Audio alarm toggled");
                self.context.audio_enabled.send_replace(enabled);
            }
            ConsoleCommand::Status => {
                println!("{}", alert::render_banner(&self.context.alert.borrow()));
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Nothing => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, context::tests::test_context};

    #[test]
    fn test_parse() {
        assert_eq!(
            ConsoleCommand::parse(" ALL "),
            Some(ConsoleCommand::Select(CameraSelection::All))
        );
        assert_eq!(
            ConsoleCommand::parse("1"),
            Some(ConsoleCommand::Select(CameraSelection::Single(1)))
        );
        assert_eq!(ConsoleCommand::parse("Mute"), Some(ConsoleCommand::Audio(false)));
        assert_eq!(ConsoleCommand::parse("unmute"), Some(ConsoleCommand::Audio(true)));
        assert_eq!(ConsoleCommand::parse(""), Some(ConsoleCommand::Nothing));
        assert_eq!(ConsoleCommand::parse("-1"), None);
        assert_eq!(ConsoleCommand::parse("camera two"), None);
    }

    #[test]
    fn test_any_input_unlocks_audio_once() {
        let context = Arc::new(test_context(&Config::default()));
        let console = Console::new(context.clone());
        let mut unlock = context.audio_unlock.subscribe();

        console.handle_line("whatever");
        assert!(unlock.has_changed().expect("sender alive"));
        assert!(*unlock.borrow_and_update());

        console.handle_line("");
        assert!(!unlock.has_changed().expect("sender alive"));
    }

    #[test]
    fn test_selection_and_audio_commands() {
        let context = Arc::new(test_context(&Config::default()));
        let console = Console::new(context.clone());

        console.handle_line("1");
        assert_eq!(*context.selection.borrow(), CameraSelection::Single(1));
        assert_eq!(context.display_cameras(), vec![1]);

        console.handle_line("mute");
        assert!(!*context.audio_enabled.borrow());

        console.handle_line("all");
        assert_eq!(context.display_cameras(), vec![0, 1]);
    }
}
