use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::command::{PlayerCommand, Property};
use super::events::{EventSink, PlayerEvent};
use super::ipc::{IpcClient, IpcError};

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long polled positions stay ignored after the user lets go of the
/// seek bar.
pub const SEEK_SETTLE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PollSample {
    pub duration: Duration,
    pub position: Duration,
}

/// Renderer values are float seconds, or null before the file is open.
pub fn seconds(value: f64) -> Duration {
    if value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

/// Query duration, then position.
pub async fn poll_once(ipc: &IpcClient) -> Result<PollSample, IpcError> {
    let duration = ipc
        .send(&PlayerCommand::GetProperty(Property::Duration))
        .await?;
    let position = ipc
        .send(&PlayerCommand::GetProperty(Property::TimePos))
        .await?;

    Ok(PollSample {
        duration: seconds(duration.as_f64().unwrap_or_default()),
        position: seconds(position.as_f64().unwrap_or_default()),
    })
}

/// Poll the renderer every [`POLL_INTERVAL`] until cancelled or the
/// connection dies.
pub fn spawn_poller(ipc: IpcClient, sink: EventSink, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = poll_once(&ipc) => result,
            };

            match result {
                Ok(sample) => {
                    if !sink.send(PlayerEvent::Sample(sample)).await {
                        break;
                    }
                }
                Err(e) if e.is_fatal() => {
                    debug!(error = %e, "renderer channel closed, stopping poller");
                    break;
                }
                Err(e) => warn!(error = %e, "skipping poll tick"),
            }
        }

        debug!(session = sink.session(), "poller stopped");
    })
}

/// Fires once, on the first sample with a known duration.
#[derive(Debug, Default)]
pub struct ReadyLatch {
    fired: bool,
}

impl ReadyLatch {
    pub fn observe(&mut self, sample: &PollSample) -> bool {
        if self.fired || sample.duration.is_zero() {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn is_ready(&self) -> bool {
        self.fired
    }
}

/// Tracks whether the user is moving the seek bar, so the poll loop does
/// not drag it back to the old position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekGuard {
    #[default]
    Idle,
    Dragging,
    Settling { deadline: Instant, renewed: bool },
}

impl SeekGuard {
    pub fn begin(&mut self) {
        *self = SeekGuard::Dragging;
    }

    pub fn release(&mut self, now: Instant) {
        if self.is_seeking() {
            *self = SeekGuard::Settling {
                deadline: now + SEEK_SETTLE,
                renewed: false,
            };
        }
    }

    /// Expire the settle window. A pointer still over the seek bar buys one
    /// extra window.
    pub fn tick(&mut self, now: Instant, hovering: bool) {
        if let SeekGuard::Settling { deadline, renewed } = *self
            && now >= deadline
        {
            *self = if hovering && !renewed {
                SeekGuard::Settling {
                    deadline: deadline + SEEK_SETTLE,
                    renewed: true,
                }
            } else {
                SeekGuard::Idle
            };
        }
    }

    pub fn is_seeking(&self) -> bool {
        !matches!(self, SeekGuard::Idle)
    }
}

/// `HH:MM:SS`, floored to whole seconds.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

pub fn format_remaining(total: Duration, elapsed: Duration) -> String {
    format!("-{}", format_duration(total.saturating_sub(elapsed)))
}
