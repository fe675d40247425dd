//! mirror-core: data model and pure state machines for a permission-gated
//! display mirroring session.
//!
//! Nothing in this crate performs IO (apart from reading a config file) or
//! depends on an async runtime. The orchestrator in `mirror-session` owns
//! these types and applies the decisions they return.

pub mod config;
pub mod derive;
pub mod error;
pub mod pending;
pub mod permission;
pub mod types;

pub use config::{MirrorConfig, RequestCodes, SessionSettings, StatusTexts};
pub use derive::{derive_presentation, derive_presentation_with};
pub use error::{ConfigError, SessionError};
pub use pending::{PendingAction, PendingJobQueue, ResumeOutcome};
pub use permission::{CaptureOutcome, Disposition, PermissionCoordinator};
pub use types::{
    CapturePayload, DisplayHandle, DisplayId, LogEntry, PresentationRecord, RequestKind,
    SessionFacts, SessionPhase, TouchMode,
};
