//! Operator console: line commands on stdin plus Ctrl-C, both driving the
//! worker through its [`ControlHandle`].

use std::{io::BufRead, path::PathBuf, str::FromStr};

use scribe_engine::{ControlHandle, load_identity_file};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Resume,
    Reload,
    Stop,
    Status,
    Help,
}

impl FromStr for OperatorCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resume" | "r" | "" => Ok(Self::Resume),
            "reload" => Ok(Self::Reload),
            "stop" | "quit" | "q" => Ok(Self::Stop),
            "status" | "s" => Ok(Self::Status),
            "help" | "h" | "?" => Ok(Self::Help),
            other => Err(format!("unknown command `{other}`")),
        }
    }
}

const HELP: &str = "commands: resume (r, Enter) | reload | status | stop (q)";

pub struct OperatorConsole {
    handle: ControlHandle,
    proxy_file: Option<PathBuf>,
}

impl OperatorConsole {
    pub fn new(handle: ControlHandle, proxy_file: Option<PathBuf>) -> Self {
        Self { handle, proxy_file }
    }

    /// Read commands from stdin until the run ends.
    ///
    /// Stdin is read on a plain thread so a blocked read never holds up
    /// runtime shutdown.
    pub fn spawn(self) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::channel::<String>(8);
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut state = self.handle.subscribe();
            loop {
                tokio::select! {
                    line = rx.recv() => {
                        let Some(line) = line else { break };
                        match line.parse::<OperatorCommand>() {
                            Ok(command) => self.execute(command),
                            Err(e) => warn!("{e}; {HELP}"),
                        }
                    }
                    changed = state.changed() => {
                        if changed.is_err() || state.borrow().is_terminal() {
                            break;
                        }
                    }
                }
            }
        })
    }

    pub fn execute(&self, command: OperatorCommand) {
        match command {
            OperatorCommand::Resume => {
                if !self.handle.is_paused() {
                    info!("Not paused, clearing the failure streak");
                }
                self.handle.resume();
            }
            OperatorCommand::Reload => self.reload(),
            OperatorCommand::Stop => {
                info!("Stop requested, finishing after the current request");
                self.handle.cancel();
            }
            OperatorCommand::Status => info!(
                state = self.handle.state().as_str(),
                pending_reload = ?self.handle.pending_reload(),
                "Status"
            ),
            OperatorCommand::Help => info!("{HELP}"),
        }
    }

    fn reload(&self) {
        let Some(path) = &self.proxy_file else {
            warn!("No proxy file configured, nothing to reload");
            return;
        };
        match load_identity_file(path) {
            Ok(identities) => {
                info!(count = identities.len(), path = %path.display(), "Queued proxy reload");
                self.handle.reload_identities(identities);
            }
            Err(e) => error!(path = %path.display(), "Proxy reload failed: {e}"),
        }
    }
}

/// Cancel the run on the first Ctrl-C.
pub fn spawn_interrupt(handle: ControlHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, saving collected transcripts");
            handle.cancel();
        }
    })
}
