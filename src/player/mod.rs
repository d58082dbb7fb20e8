//! Everything needed to drive an external mpv process: spawning and killing
//! it, the JSON IPC channel, the command set, and the poll loop that keeps
//! the controls in sync.

pub mod command;
pub mod events;
pub mod ipc;
pub mod process;
pub mod sync;

pub use command::{PlayPause, PlayerCommand, Property};
pub use events::{EventSink, PlayerEnvelope, PlayerEvent};
pub use ipc::{IpcClient, IpcError, IpcServer};
pub use process::{ExitKind, IpcEndpoint, PlayerProcess, ProcessError};
pub use sync::{PollSample, ReadyLatch, SeekGuard, format_duration, format_remaining};
