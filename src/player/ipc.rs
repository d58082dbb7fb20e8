use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::command::PlayerCommand;

pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IpcError {
    #[error("could not decode renderer response: {0}")]
    Decode(String),
    #[error("could not encode request: {0}")]
    Encode(String),
    #[error("renderer connection failed: {0}")]
    Transport(String),
    #[error("renderer closed the connection")]
    Closed,
    #[error("renderer channel is no longer running")]
    ChannelClosed,
}

impl IpcError {
    /// Fatal errors end the connection; everything else only fails the
    /// request it happened on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IpcError::Transport(_) | IpcError::Closed | IpcError::ChannelClosed
        )
    }
}

/// `{"command": [name, args...]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpcRequest {
    pub command: Vec<Value>,
}

impl IpcRequest {
    pub fn new(command: Vec<Value>) -> Self {
        Self { command }
    }

    pub fn name(&self) -> &str {
        self.command.first().and_then(Value::as_str).unwrap_or("")
    }

    pub fn encode_line(&self) -> Result<String, IpcError> {
        let mut line = serde_json::to_string(self).map_err(|e| IpcError::Encode(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }
}

/// `{"data": value}`; the renderer's other keys are ignored.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct IpcResponse {
    #[serde(default)]
    pub data: Value,
}

impl IpcResponse {
    pub fn as_f64(&self) -> Option<f64> {
        self.data.as_f64()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Unsolicited renderer event, never paired with a request.
    Event(String),
    Response(IpcResponse),
}

pub fn decode_line(line: &str) -> Result<Frame, IpcError> {
    let value: Value = serde_json::from_str(line).map_err(|e| IpcError::Decode(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(IpcError::Decode(format!("expected an object, got {}", line.trim())));
    };

    if let Some(event) = object.get("event") {
        return Ok(Frame::Event(event.as_str().unwrap_or_default().to_string()));
    }

    Ok(Frame::Response(IpcResponse {
        data: object.get("data").cloned().unwrap_or(Value::Null),
    }))
}

/// Keep trying to connect to the renderer's socket until it shows up or the
/// session is cancelled.
#[cfg(unix)]
pub async fn connect_with_retry(
    path: &Path,
    cancel: &CancellationToken,
) -> Option<tokio::net::UnixStream> {
    let mut attempts: u32 = 0;
    loop {
        match tokio::net::UnixStream::connect(path).await {
            Ok(stream) => {
                debug!(path = %path.display(), attempts, "connected to renderer");
                return Some(stream);
            }
            Err(e) => {
                attempts += 1;
                debug!(error = %e, attempts, "renderer socket not ready");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(CONNECT_RETRY_INTERVAL) => {}
        }
    }
}

// Windows stub: mpv only listens on named pipes there
#[cfg(not(unix))]
pub async fn connect_with_retry(
    path: &Path,
    cancel: &CancellationToken,
) -> Option<tokio::io::DuplexStream> {
    tracing::warn!(path = %path.display(), "renderer IPC is not supported on this platform");
    cancel.cancelled().await;
    None
}

type Reply = Result<IpcResponse, IpcError>;

struct Envelope {
    request: IpcRequest,
    reply: oneshot::Sender<Reply>,
}

/// Create the request queue shared by every client of one renderer
/// connection. The [`IpcServer`] half owns the socket.
pub fn channel() -> (IpcClient, IpcServer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IpcClient { tx }, IpcServer { rx })
}

#[derive(Clone)]
pub struct IpcClient {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl IpcClient {
    /// Queue a request now. Requests are written in the order they were
    /// submitted, regardless of when the replies are awaited.
    pub fn submit(&self, request: IpcRequest) -> PendingReply {
        let (reply, rx) = oneshot::channel();
        match self.tx.send(Envelope { request, reply }) {
            Ok(()) => PendingReply(Ok(rx)),
            Err(_) => PendingReply(Err(IpcError::ChannelClosed)),
        }
    }

    pub async fn request(&self, request: IpcRequest) -> Reply {
        self.submit(request).wait().await
    }

    pub async fn send(&self, command: &PlayerCommand) -> Reply {
        self.request(command.to_request()).await
    }
}

pub struct PendingReply(Result<oneshot::Receiver<Reply>, IpcError>);

impl PendingReply {
    pub async fn wait(self) -> Reply {
        match self.0 {
            Ok(rx) => rx.await.unwrap_or(Err(IpcError::ChannelClosed)),
            Err(e) => Err(e),
        }
    }
}

pub struct IpcServer {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl IpcServer {
    /// Serve queued requests over `stream`, one response line per request.
    /// Returns `Ok` once every client is gone, or the first fatal error.
    pub async fn serve<S>(mut self, stream: S) -> Result<(), IpcError>
    where
        S: AsyncRead + AsyncWrite,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut lines = BufReader::new(reader).lines();

        while let Some(Envelope { request, reply }) = self.rx.recv().await {
            let result = exchange(&request, &mut writer, &mut lines).await;
            let fatal = match &result {
                Err(e) if e.is_fatal() => Some(e.clone()),
                _ => None,
            };

            if let Err(e) = &result {
                debug!(command = request.name(), error = %e, "renderer request failed");
            }
            let _ = reply.send(result);

            if let Some(e) = fatal {
                self.rx.close();
                while let Ok(pending) = self.rx.try_recv() {
                    let _ = pending.reply.send(Err(IpcError::ChannelClosed));
                }
                return Err(e);
            }
        }

        Ok(())
    }
}

async fn exchange<W, R>(request: &IpcRequest, writer: &mut W, lines: &mut Lines<R>) -> Reply
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    let line = request.encode_line()?;
    trace!(request = line.trim_end(), "writing renderer request");

    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| IpcError::Transport(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| IpcError::Transport(e.to_string()))?;

    loop {
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| IpcError::Transport(e.to_string()))?
        else {
            return Err(IpcError::Closed);
        };

        if line.trim().is_empty() {
            continue;
        }

        match decode_line(&line)? {
            Frame::Event(event) => trace!(event = %event, "skipping renderer event"),
            Frame::Response(response) => return Ok(response),
        }
    }
}
