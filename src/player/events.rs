use std::path::PathBuf;

use tokio::sync::mpsc;

use super::command::PlayerCommand;
use super::ipc::IpcError;
use super::process::ExitKind;
use super::sync::PollSample;

/// Things that happen to a running session, reported from its background
/// tasks to the UI loop.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Connected,
    Sample(PollSample),
    ConnectionLost(IpcError),
    Exited(ExitKind),
    SubtitleFetched { index: usize, path: PathBuf },
    SubtitleFailed { index: usize, error: String },
    /// A command failed without taking the connection down with it.
    CommandFailed { command: PlayerCommand, error: IpcError },
}

/// A [`PlayerEvent`] tagged with the session that produced it, so events
/// from a session that was already torn down can be dropped.
#[derive(Debug, Clone)]
pub struct PlayerEnvelope {
    pub session: u64,
    pub event: PlayerEvent,
}

#[derive(Clone)]
pub struct EventSink {
    session: u64,
    tx: mpsc::Sender<PlayerEnvelope>,
}

impl EventSink {
    pub fn new(session: u64, tx: mpsc::Sender<PlayerEnvelope>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Returns false once the UI side is gone.
    pub async fn send(&self, event: PlayerEvent) -> bool {
        self.tx
            .send(PlayerEnvelope {
                session: self.session,
                event,
            })
            .await
            .is_ok()
    }
}
