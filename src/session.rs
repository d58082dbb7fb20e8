use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::{GatewayClient, GatewayError};
use crate::player::ipc::{self, IpcServer, connect_with_retry};
use crate::player::sync::spawn_poller;
use crate::player::{
    EventSink, ExitKind, IpcClient, IpcEndpoint, PlayerCommand, PlayerEnvelope, PlayerEvent,
    PlayerProcess, ProcessError,
};
use crate::subtitles;
use crate::wizard::SessionRequest;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("failed to create subtitle directory: {0}")]
    ScratchDir(#[source] std::io::Error),
}

impl SessionError {
    /// The configured or discovered player could not be launched at all.
    pub fn is_player_missing(&self) -> bool {
        matches!(
            self,
            SessionError::Process(
                ProcessError::Spawn(..) | ProcessError::EmptyCommand | ProcessError::InvalidCommand(..)
            )
        )
    }
}

/// How to launch the renderer and where session scratch files go.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub command: String,
    pub args: Vec<String>,
    pub scratch_root: PathBuf,
}

/// One running renderer plus everything attached to it: the IPC channel,
/// the poll loop, and a directory for downloaded subtitles.
pub struct PlaybackSession {
    id: u64,
    identifier: String,
    stream_url: String,
    gateway: GatewayClient,
    process: PlayerProcess,
    ipc: IpcClient,
    cancel: CancellationToken,
    subtitle_dir: Option<TempDir>,
    sink: EventSink,
}

impl PlaybackSession {
    /// Spawn the renderer for `request` and start connecting to it. Progress
    /// is reported on `events`, tagged with `id`.
    pub fn start(
        id: u64,
        request: &SessionRequest,
        gateway: GatewayClient,
        launch: &LaunchOptions,
        events: mpsc::Sender<PlayerEnvelope>,
    ) -> Result<Self, SessionError> {
        let stream_url = gateway.stream_url(&request.identifier, &request.selected_path)?;

        std::fs::create_dir_all(&launch.scratch_root).map_err(SessionError::ScratchDir)?;
        let subtitle_dir = tempfile::Builder::new()
            .prefix("subtitles")
            .tempdir_in(&launch.scratch_root)
            .map_err(SessionError::ScratchDir)?;

        let (endpoint, process) = PlayerProcess::start(
            &launch.command,
            &launch.args,
            &stream_url,
            &gateway.authorization_token(),
        )?;
        info!(session = id, path = %request.selected_path, "playback session started");

        let sink = EventSink::new(id, events);
        let cancel = CancellationToken::new();
        let (client, server) = ipc::channel();

        tokio::spawn(run_channel(
            endpoint,
            server,
            client.clone(),
            sink.clone(),
            cancel.clone(),
        ));
        tokio::spawn(watch_exit(process.exit_watcher(), sink.clone()));

        Ok(Self {
            id,
            identifier: request.identifier.clone(),
            stream_url,
            gateway,
            process,
            ipc: client,
            cancel,
            subtitle_dir: Some(subtitle_dir),
            sink,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn ipc_path(&self) -> &Path {
        self.process.socket_path()
    }

    pub fn subtitle_dir(&self) -> Option<&Path> {
        self.subtitle_dir.as_ref().map(TempDir::path)
    }

    pub fn exit_kind(&self) -> Option<ExitKind> {
        self.process.exit_kind()
    }

    /// Wait up to `grace` for the renderer to be reaped.
    pub async fn exit_within(&self, grace: Duration) -> Option<ExitKind> {
        let mut exited = self.process.exit_watcher();
        let waited = tokio::time::timeout(grace, exited.wait_for(Option::is_some)).await;
        match waited {
            Ok(Ok(kind)) => kind.clone(),
            _ => None,
        }
    }

    /// Queue a command. Commands go out in the order they are dispatched.
    pub fn dispatch(&self, command: PlayerCommand) {
        dispatch_command(&self.ipc, self.sink.clone(), command);
    }

    /// Download a bundle subtitle in the background; the result comes back
    /// as a [`PlayerEvent`].
    pub fn fetch_subtitle(&self, index: usize, remote_path: String) {
        let Some(dir) = self.subtitle_dir().map(Path::to_path_buf) else {
            return;
        };
        let gateway = self.gateway.clone();
        let identifier = self.identifier.clone();
        let sink = self.sink.clone();

        tokio::spawn(async move {
            let event =
                match subtitles::fetch_subtitle(&gateway, &identifier, &remote_path, &dir).await {
                    Ok(path) => PlayerEvent::SubtitleFetched { index, path },
                    Err(e) => {
                        warn!(path = %remote_path, error = %e, "subtitle download failed");
                        PlayerEvent::SubtitleFailed {
                            index,
                            error: e.to_string(),
                        }
                    }
                };
            sink.send(event).await;
        });
    }

    /// Kill the renderer, remove the IPC directory, then stop the
    /// background tasks and drop downloaded subtitles.
    pub async fn teardown(mut self) -> Result<(), SessionError> {
        info!(session = self.id, "tearing down playback session");

        let stopped = self.process.stop().await;
        self.cancel.cancel();

        if let Some(dir) = self.subtitle_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(path = %path.display(), error = %e, "failed to remove subtitle directory");
            }
        }

        stopped?;
        Ok(())
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A failure that leaves the channel usable comes back as
/// [`PlayerEvent::CommandFailed`]. Fatal ones are reported once by the
/// channel task as [`PlayerEvent::ConnectionLost`].
fn dispatch_command(ipc: &IpcClient, sink: EventSink, command: PlayerCommand) {
    let pending = ipc.submit(command.to_request());
    tokio::spawn(async move {
        match pending.wait().await {
            Ok(_) => {}
            Err(e) if e.is_fatal() => debug!(?command, error = %e, "player command dropped"),
            Err(e) => {
                warn!(?command, error = %e, "player command failed");
                sink.send(PlayerEvent::CommandFailed { command, error: e })
                    .await;
            }
        }
    });
}

async fn run_channel(
    endpoint: IpcEndpoint,
    server: IpcServer,
    client: IpcClient,
    sink: EventSink,
    cancel: CancellationToken,
) {
    let Some(stream) = connect_with_retry(&endpoint.socket_path, &cancel).await else {
        debug!(session = sink.session(), "session ended before the player was reachable");
        return;
    };

    sink.send(PlayerEvent::Connected).await;
    let _poller = spawn_poller(client, sink.clone(), cancel.clone());

    let result = tokio::select! {
        _ = cancel.cancelled() => return,
        result = server.serve(stream) => result,
    };

    match result {
        Ok(()) => debug!(session = sink.session(), "player channel closed"),
        Err(e) => {
            warn!(session = sink.session(), error = %e, "lost connection to player");
            sink.send(PlayerEvent::ConnectionLost(e)).await;
        }
    }
}

async fn watch_exit(mut exited: watch::Receiver<Option<ExitKind>>, sink: EventSink) {
    let kind = exited
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|kind| kind.clone());

    if let Some(kind) = kind {
        sink.send(PlayerEvent::Exited(kind)).await;
    }
}
