use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SOCKET_NAME: &str = "mpv.sock";

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("player command is empty")]
    EmptyCommand,

    #[error("invalid player command '{0}': {1}")]
    InvalidCommand(String, String),

    #[error("failed to create IPC directory: {0}")]
    ScratchDir(#[source] std::io::Error),

    #[error("failed to launch player '{0}': {1}. Is the player installed and in your PATH?")]
    Spawn(String, String),

    #[error("player did not exit within {0:?} of being killed")]
    Terminate(Duration),

    #[error("failed to remove IPC directory: {0}")]
    Cleanup(#[source] std::io::Error),
}

/// How a renderer process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitKind {
    /// We killed it.
    Stopped,
    /// It quit on its own with a success status.
    Exited,
    Crashed(String),
}

#[derive(Debug, Clone)]
pub struct IpcEndpoint {
    pub socket_path: PathBuf,
}

/// Arguments that put mpv under remote control: no on-screen controller,
/// no default key bindings, start paused, and listen on `socket`.
pub fn renderer_args(socket: &Path, auth_token: &str) -> Vec<String> {
    vec![
        "--keep-open=always".to_string(),
        "--no-osc".to_string(),
        "--no-input-default-bindings".to_string(),
        "--pause".to_string(),
        format!("--input-ipc-server={}", socket.display()),
        format!("--http-header-fields=Authorization: Basic {}", auth_token),
    ]
}

pub fn classify(status: std::io::Result<ExitStatus>, stop_requested: bool) -> ExitKind {
    if stop_requested {
        return ExitKind::Stopped;
    }

    match status {
        Ok(status) if status.success() => ExitKind::Exited,
        Ok(status) => ExitKind::Crashed(status.to_string()),
        Err(e) => ExitKind::Crashed(e.to_string()),
    }
}

/// A running renderer. The process handle itself lives in a supervisor
/// task; this side keeps the pid, the stop flag and the IPC scratch
/// directory, which is removed once the process is gone.
pub struct PlayerProcess {
    pid: Option<u32>,
    stop_requested: Arc<AtomicBool>,
    kill: CancellationToken,
    exited: watch::Receiver<Option<ExitKind>>,
    scratch: Option<TempDir>,
    socket_path: PathBuf,
}

impl PlayerProcess {
    /// Spawn `command_line` (split with shell rules) pointed at `stream_url`.
    pub fn start(
        command_line: &str,
        extra_args: &[String],
        stream_url: &str,
        auth_token: &str,
    ) -> Result<(IpcEndpoint, Self), ProcessError> {
        let mut words = shell_words::split(command_line)
            .map_err(|e| ProcessError::InvalidCommand(command_line.to_string(), e.to_string()))?;
        if words.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }
        let program = words.remove(0);

        let scratch = tempfile::Builder::new()
            .prefix("mpv-ipc")
            .tempdir()
            .map_err(ProcessError::ScratchDir)?;
        let socket_path = scratch.path().join(SOCKET_NAME);

        let mut cmd = Command::new(&program);
        cmd.args(&words)
            .args(renderer_args(&socket_path, auth_token))
            .args(extra_args)
            .arg(stream_url);

        // Suppress all output to not corrupt TUI
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        own_process_group(&mut cmd);

        let child = cmd
            .spawn()
            .map_err(|e| ProcessError::Spawn(command_line.to_string(), e.to_string()))?;
        let pid = child.id();
        info!(?pid, player = %program, socket = %socket_path.display(), "player started");

        let stop_requested = Arc::new(AtomicBool::new(false));
        let kill = CancellationToken::new();
        let (exit_tx, exited) = watch::channel(None);

        tokio::spawn(supervise(
            child,
            pid,
            stop_requested.clone(),
            kill.clone(),
            exit_tx,
        ));

        let endpoint = IpcEndpoint {
            socket_path: socket_path.clone(),
        };

        Ok((
            endpoint,
            Self {
                pid,
                stop_requested,
                kill,
                exited,
                scratch: Some(scratch),
                socket_path,
            },
        ))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// `None` while the process is still running.
    pub fn exit_kind(&self) -> Option<ExitKind> {
        self.exited.borrow().clone()
    }

    pub fn exit_watcher(&self) -> watch::Receiver<Option<ExitKind>> {
        self.exited.clone()
    }

    /// Kill the renderer (if it is still running) and remove the IPC
    /// directory. Safe to call more than once.
    pub async fn stop(&mut self) -> Result<(), ProcessError> {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.kill.cancel();

        let waited = tokio::time::timeout(
            STOP_TIMEOUT,
            self.exited.wait_for(|kind| kind.is_some()),
        )
        .await
        .map(|_| ());

        let removed = match self.scratch.take() {
            Some(scratch) => {
                let path = scratch.path().to_path_buf();
                match scratch.close() {
                    Ok(()) => {
                        debug!(path = %path.display(), "removed IPC directory");
                        Ok(())
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(ProcessError::Cleanup(e)),
                }
            }
            None => Ok(()),
        };

        if waited.is_err() {
            warn!(pid = ?self.pid, "player did not exit after kill");
            return Err(ProcessError::Terminate(STOP_TIMEOUT));
        }
        removed
    }
}

impl Drop for PlayerProcess {
    fn drop(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.kill.cancel();
    }
}

async fn supervise(
    mut child: Child,
    pid: Option<u32>,
    stop_requested: Arc<AtomicBool>,
    kill: CancellationToken,
    exit_tx: watch::Sender<Option<ExitKind>>,
) {
    let early = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill.cancelled() => None,
    };

    let status = match early {
        Some(status) => status,
        None => {
            terminate(&mut child, pid);
            child.wait().await
        }
    };

    let kind = classify(status, stop_requested.load(Ordering::SeqCst));
    info!(?pid, ?kind, "player exited");
    let _ = exit_tx.send(Some(kind));
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Kill the renderer's whole process group, so wrappers like
/// `flatpak run` take their children with them.
#[cfg(unix)]
fn terminate(child: &mut Child, pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };

    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => debug!(pid, "killed player process group"),
        Err(Errno::ESRCH) => debug!(pid, "player process group already gone"),
        Err(e) => {
            warn!(pid, error = %e, "killpg failed, killing player directly");
            if let Err(e) = child.start_kill() {
                debug!(pid, error = %e, "kill failed");
            }
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Err(e) = child.start_kill() {
        debug!(?pid, error = %e, "kill failed");
    }
}
