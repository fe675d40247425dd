//! mirror-session: the orchestrator that owns a mirroring session.
//!
//! Host callbacks and user actions enter through a [`SessionHandle`], are
//! serialized onto a single orchestrator task, and come back out as
//! [`PresentationRecord`](mirror_core::types::PresentationRecord) snapshots
//! on a watch channel plus entries in the shared [`LogSink`].

pub mod collaborators;
pub mod handle;
pub mod log_sink;
pub mod orchestrator;
pub mod sim;

pub use collaborators::Collaborators;
pub use handle::{MirrorControl, SessionHandle};
pub use log_sink::LogSink;
pub use orchestrator::{Orchestrator, SessionCommand};

use mirror_core::config::MirrorConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn a session onto the current tokio runtime.
///
/// The returned task finishes after `exit`, cancellation, or once every
/// handle has been dropped.
pub fn spawn_session(
    config: MirrorConfig,
    collaborators: Collaborators,
    log: LogSink,
    cancel: CancellationToken,
) -> (SessionHandle, JoinHandle<()>) {
    let (orchestrator, handle) = Orchestrator::new(config, collaborators, log, cancel);
    let task = tokio::spawn(orchestrator.run());
    (handle, task)
}
