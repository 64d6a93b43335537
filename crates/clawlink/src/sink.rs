//! Terminal side-effect sink for relay commands.
//!
//! Alerts are printed and ring the terminal bell; `wake` nudges the
//! lifecycle keeper in `run` so the connection is (re)started.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use tokio::sync::Notify;

use clawlink_core::{CommandAction, CommandHandler, CoreError, RelayCommand};

const BELL: &str = "\x07";

pub struct TerminalSink<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
    bell: bool,
    wake: Arc<Notify>,
}

impl TerminalSink {
    pub fn stdout(bell: bool, wake: Arc<Notify>) -> Self {
        Self::new(io::stdout(), bell, wake)
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W, bell: bool, wake: Arc<Notify>) -> Self {
        Self {
            out: Mutex::new(out),
            bell,
            wake,
        }
    }

    fn alert(&self, headline: &str, command: &RelayCommand) -> Result<(), CoreError> {
        let mut line = format!("[{}] {headline}", Local::now().format("%H:%M:%S"));
        if !command.message.is_empty() {
            line.push_str(": ");
            line.push_str(&command.message);
        }
        if let Some(delivery) = command.delivery().filter(|d| d.bypass_silent) {
            line.push_str(if delivery.any() { " (priority)" } else { " (priority, silent)" });
        }
        if self.bell {
            line.push_str(BELL);
        }
        self.write_line(&line)
            .map_err(|e| CoreError::CommandFailed {
                action: command.action.to_string(),
                message: e.to_string(),
            })
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}")?;
        out.flush()
    }
}

impl<W: Write + Send + 'static> CommandHandler for TerminalSink<W> {
    fn on_command(&self, command: &RelayCommand) -> Result<(), CoreError> {
        match &command.action {
            CommandAction::Ping => self.alert("Find my device", command),
            CommandAction::Notify => self.alert(command.title(), command),
            CommandAction::Alert => self.alert(&format!("{} alert", command.title()), command),
            CommandAction::Wake => {
                self.wake.notify_one();
                Ok(())
            }
            CommandAction::Unknown(action) => Err(CoreError::CommandFailed {
                action: action.clone(),
                message: "not supported by this client".into(),
            }),
        }
    }
}
