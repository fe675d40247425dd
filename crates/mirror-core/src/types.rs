//! Session data model: facts, presentation record, request kinds, log entries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Request Kinds ───────────────────────────────────────────────

/// One-shot authorization requests the session can issue.
///
/// The host only ever sees the numeric request code (see
/// [`crate::config::RequestCodes`]); inside the core a request is always one
/// of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Display capture grant (frame capture of the default display).
    Capture,
    /// Elevated-privilege grant (privileged system operations, input injection).
    Elevated,
    /// Host runtime permission for audio recording.
    AudioRecord,
}

impl RequestKind {
    pub const ALL: [RequestKind; 3] = [
        RequestKind::Capture,
        RequestKind::Elevated,
        RequestKind::AudioRecord,
    ];

    /// Stable index used for fixed-size per-kind tables.
    pub(crate) fn index(self) -> usize {
        match self {
            RequestKind::Capture => 0,
            RequestKind::Elevated => 1,
            RequestKind::AudioRecord => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Capture => "capture",
            RequestKind::Elevated => "elevated",
            RequestKind::AudioRecord => "audio_record",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Host Payloads ───────────────────────────────────────────────

/// Opaque capability token handed back by the host with a capture grant.
///
/// The core never inspects it; it is forwarded to the session service
/// either to start it or to bind the capability to the running instance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturePayload(Vec<u8>);

impl CapturePayload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CapturePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapturePayload({} bytes)", self.0.len())
    }
}

/// Numeric identifier of a display as reported by the host.
pub type DisplayId = u32;

/// A virtual display surface currently owned by the session service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayHandle {
    pub display_id: DisplayId,
    /// Human-readable source of the display (e.g. `"mirror"`, `"displaylink"`).
    pub source: String,
}

// ─── Session Facts ───────────────────────────────────────────────

/// Snapshot of externally observed facts about the session.
///
/// Owned and mutated only by the orchestrator. Every input of the
/// presentation derivation lives here, so derivation never reaches out to
/// collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFacts {
    /// The session service exists and is running.
    pub service_running: bool,
    /// A mirror or external virtual display is currently attached.
    pub virtual_display_present: bool,
    /// A single-app display was created and is still the active target.
    pub single_app_active_display: bool,
    /// Elevated permission is currently held.
    pub elevated_permission_granted: bool,
    /// Preference: single-app mode.
    pub single_app_mode: bool,
    /// Preference: use touchscreen instead of touchpad.
    pub use_touchscreen_preference: bool,
    /// Fatal error text. When set it supersedes every other derived field.
    pub error_text: Option<String>,
    /// Local network addresses, snapshotted best-effort before derivation.
    pub network_addresses: Vec<String>,
}

impl SessionFacts {
    /// Whether some display source is attached that the service mirrors to.
    pub fn has_display_source(&self) -> bool {
        self.virtual_display_present || self.single_app_active_display
    }
}

// ─── Presentation Record ─────────────────────────────────────────

/// Declarative description of what the UI should show.
///
/// Pure projection of [`SessionFacts`]; recomputed in full on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationRecord {
    pub status_text: String,
    pub settings_visible: bool,
    pub stop_mirroring_visible: bool,
    pub touch_mode_visible: bool,
    /// Present only while the touch-mode control is visible.
    pub touch_mode_label: Option<String>,
}

/// Mutually exclusive UI phases, in derivation precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// `error_text` is set.
    Error,
    /// The session service is absent (capture permission never granted).
    NoPermission,
    /// The service is running and a display source is attached.
    Mirroring,
    /// The service is running but no display source is attached yet.
    AwaitingDisplay,
}

impl SessionPhase {
    /// Classify a facts snapshot. First matching rule wins.
    pub fn of(facts: &SessionFacts) -> Self {
        if facts.error_text.is_some() {
            SessionPhase::Error
        } else if !facts.service_running {
            SessionPhase::NoPermission
        } else if facts.has_display_source() {
            SessionPhase::Mirroring
        } else {
            SessionPhase::AwaitingDisplay
        }
    }
}

/// Touch surface flavour offered while mirroring in single-app mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchMode {
    Touchscreen,
    Touchpad,
}

impl TouchMode {
    pub fn from_preference(use_touchscreen: bool) -> Self {
        if use_touchscreen {
            TouchMode::Touchscreen
        } else {
            TouchMode::Touchpad
        }
    }
}

// ─── Session Log ─────────────────────────────────────────────────

/// A single user-facing session log line. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────
