//! Error types for the mirroring session core.

use thiserror::Error;

use crate::types::RequestKind;

/// Errors surfaced by the session core and its collaborators.
///
/// None of these are retried automatically. Authorization requests are
/// user driven and only re-issued by an explicit user action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A result callback carried a request code that matches no request
    /// this session issues on that channel.
    #[error("unrecognized request code {code} on {channel} channel")]
    UnrecognizedRequest { channel: RequestKind, code: i32 },

    /// The user declined a capability prompt.
    #[error("{0} permission denied")]
    PermissionDenied(RequestKind),

    /// An external collaborator failed or is not reachable.
    #[error("{collaborator} unavailable: {detail}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        detail: String,
    },

    /// A core invariant was broken by the caller (programming error).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl SessionError {
    pub fn unavailable(collaborator: &'static str, detail: impl Into<String>) -> Self {
        SessionError::CollaboratorUnavailable {
            collaborator,
            detail: detail.into(),
        }
    }
}

/// Errors loading or validating [`crate::config::MirrorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("request code {code} assigned to both {first} and {second}")]
    DuplicateRequestCode {
        code: i32,
        first: RequestKind,
        second: RequestKind,
    },
}
