// ── Command dispatch ──
//
// Routes inbound `command` frames to the host's side-effect sink and
// produces the acknowledgement. An ack confirms delivery only: it goes
// out whether or not the handler succeeded, and for actions this client
// does not recognise.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use clawlink_api::OutboundMessage;
use clawlink_api::wire::{CommandFrame, WireDelivery};

use crate::error::CoreError;
use crate::model::DeliveryOptions;

/// Title used for `notify` commands that carry none.
pub const DEFAULT_COMMAND_TITLE: &str = "Claw";

// ── CommandAction ────────────────────────────────────────────────────

/// What a relay command asks the client to do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandAction {
    /// Find-my-phone: loud alert regardless of mute.
    Ping,
    /// A titled notification.
    Notify,
    /// Nudge to make sure the host keeps running.
    Wake,
    /// Rule-driven alert with delivery options.
    Alert,
    /// Anything newer than this client, kept verbatim.
    Unknown(String),
}

impl CommandAction {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "ping" => Self::Ping,
            "notify" => Self::Notify,
            "wake" => Self::Wake,
            "alert" => Self::Alert,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// The wire spelling.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Notify => "notify",
            Self::Wake => "wake",
            Self::Alert => "alert",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── RelayCommand ─────────────────────────────────────────────────────

/// A decoded command, as handed to the [`CommandHandler`].
#[derive(Debug, Clone, PartialEq)]
pub struct RelayCommand {
    pub action: CommandAction,
    pub message: String,
    pub command_id: Option<String>,
    /// The raw command object, including fields this client ignores.
    pub extras: Map<String, Value>,
}

impl From<CommandFrame> for RelayCommand {
    fn from(frame: CommandFrame) -> Self {
        Self {
            action: CommandAction::parse(&frame.action),
            message: frame.message,
            command_id: frame.command_id,
            extras: frame.extras,
        }
    }
}

impl RelayCommand {
    /// Notification title from the extras, or [`DEFAULT_COMMAND_TITLE`].
    pub fn title(&self) -> &str {
        self.extras
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_COMMAND_TITLE)
    }

    /// Delivery options attached to an `alert`, if any.
    pub fn delivery(&self) -> Option<DeliveryOptions> {
        let raw = self.extras.get("delivery")?;
        match serde_json::from_value::<WireDelivery>(raw.clone()) {
            Ok(delivery) => Some(delivery.into()),
            Err(e) => {
                debug!(error = %e, "ignoring malformed delivery options");
                None
            }
        }
    }
}

// ── CommandHandler ───────────────────────────────────────────────────

/// Side-effect sink for relay commands (sound, vibration, speech, ...).
///
/// Called on the connection task; implementations must return promptly
/// and hand long-running work off elsewhere. A panic is caught and
/// logged, and the command is still acknowledged.
pub trait CommandHandler: Send + Sync + 'static {
    fn on_command(&self, command: &RelayCommand) -> Result<(), CoreError>;
}

/// Handler that only logs. Used when the host installs nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHandler;

impl CommandHandler for TracingHandler {
    fn on_command(&self, command: &RelayCommand) -> Result<(), CoreError> {
        info!(
            action = %command.action,
            title = command.title(),
            message = %command.message,
            "relay command"
        );
        Ok(())
    }
}

// ── CommandDispatcher ────────────────────────────────────────────────

/// Invokes the handler and builds the acknowledgement.
#[derive(Clone)]
pub struct CommandDispatcher {
    handler: Arc<dyn CommandHandler>,
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher").finish_non_exhaustive()
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(Arc::new(TracingHandler))
    }
}

impl CommandDispatcher {
    pub fn new(handler: Arc<dyn CommandHandler>) -> Self {
        Self { handler }
    }

    /// Run the handler for `frame` and return the `ack` to send, if the
    /// frame carried a `commandId`.
    pub fn dispatch(&self, frame: CommandFrame) -> Option<OutboundMessage> {
        let command = RelayCommand::from(frame);
        let command_id = command.command_id.as_deref().unwrap_or_default();

        if !command.action.is_known() {
            warn!(action = %command.action, command_id, "unknown command action");
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.handler.on_command(&command))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(action = %command.action, command_id, error = %e, "command handler failed");
            }
            Err(_) => error!(action = %command.action, command_id, "command handler panicked"),
        }

        command.command_id.map(|command_id| {
            debug!(command_id = %command_id, "acknowledging command");
            OutboundMessage::Ack { command_id }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<RelayCommand>>,
        fail: bool,
    }

    impl CommandHandler for Recording {
        fn on_command(&self, command: &RelayCommand) -> Result<(), CoreError> {
            self.seen.lock().unwrap().push(command.clone());
            if self.fail {
                return Err(CoreError::CommandFailed {
                    action: command.action.to_string(),
                    message: "speaker busy".into(),
                });
            }
            Ok(())
        }
    }

    fn frame(action: &str, command_id: Option<&str>, extras: Value) -> CommandFrame {
        CommandFrame {
            action: action.into(),
            message: "hello".into(),
            command_id: command_id.map(Into::into),
            extras: extras.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn acks_known_actions() {
        let handler = Arc::new(Recording::default());
        let dispatcher = CommandDispatcher::new(handler.clone());

        let ack = dispatcher.dispatch(frame("ping", Some("c1"), json!({})));
        assert_eq!(
            ack,
            Some(OutboundMessage::Ack {
                command_id: "c1".into()
            })
        );
        assert_eq!(handler.seen.lock().unwrap()[0].action, CommandAction::Ping);
    }

    #[test]
    fn acks_unknown_actions_and_failed_handlers() {
        let handler = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let dispatcher = CommandDispatcher::new(handler.clone());

        let ack = dispatcher.dispatch(frame("levitate", Some("c2"), json!({})));
        assert_eq!(
            ack,
            Some(OutboundMessage::Ack {
                command_id: "c2".into()
            })
        );

        let seen = handler.seen.lock().unwrap();
        assert_eq!(seen[0].action, CommandAction::Unknown("levitate".into()));
        assert_eq!(seen[0].action.to_string(), "levitate");
    }

    struct Exploding;

    impl CommandHandler for Exploding {
        fn on_command(&self, _command: &RelayCommand) -> Result<(), CoreError> {
            panic!("speaker driver crashed");
        }
    }

    #[test]
    fn handler_panic_is_contained_and_acked() {
        let dispatcher = CommandDispatcher::new(Arc::new(Exploding));

        let ack = dispatcher.dispatch(frame("alert", Some("c4"), json!({})));
        assert_eq!(
            ack,
            Some(OutboundMessage::Ack {
                command_id: "c4".into()
            })
        );
        // Still usable afterwards.
        assert!(dispatcher.dispatch(frame("ping", Some("c5"), json!({}))).is_some());
    }

    #[test]
    fn no_ack_without_command_id() {
        let dispatcher = CommandDispatcher::default();
        assert_eq!(dispatcher.dispatch(frame("notify", None, json!({}))), None);
    }

    #[test]
    fn title_and_delivery_come_from_extras() {
        let command = RelayCommand::from(frame(
            "alert",
            Some("c3"),
            json!({
                "title": "Dinner",
                "delivery": { "tts": true, "bypassSilent": true }
            }),
        ));
        assert_eq!(command.title(), "Dinner");
        let delivery = command.delivery().unwrap();
        assert!(delivery.tts && delivery.bypass_silent);
        assert!(!delivery.vibration);

        let bare = RelayCommand::from(frame("notify", None, json!({})));
        assert_eq!(bare.title(), DEFAULT_COMMAND_TITLE);
        assert_eq!(bare.delivery(), None);
    }
}
