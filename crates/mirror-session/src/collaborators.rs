//! In-process contracts for the host collaborators around the session.
//!
//! Every trait is object safe and `Send + Sync` so a single host
//! implementation can be shared between the orchestrator task and the host's
//! own callback threads. None of these calls may block for unbounded time:
//! permission prompts return immediately and report back through the
//! session handle.

use std::sync::Arc;

use mirror_core::error::SessionError;
use mirror_core::types::{CapturePayload, DisplayHandle, DisplayId};

/// Listener the elevated broker invokes with `(request_code, granted)`.
pub type ElevatedListener = Arc<dyn Fn(i32, bool) + Send + Sync>;

/// Host prompts delivered through the activity-result and runtime-permission
/// paths.
pub trait CaptureBroker: Send + Sync {
    /// Show the display-capture prompt. The result arrives later through
    /// `SessionHandle::on_capture_result`.
    fn request_capture(&self, request_code: i32);

    /// Show the audio-record runtime permission prompt. The result arrives
    /// through `SessionHandle::on_audio_record_result`.
    fn request_audio_record(&self, request_code: i32);
}

/// Broker for the elevated-privilege grant.
pub trait ElevatedBroker: Send + Sync {
    fn request_elevated(&self, request_code: i32);

    /// Whether elevated permission is currently held.
    fn is_granted(&self) -> bool;

    /// Install the single result listener. Called once at session start.
    fn register_listener(&self, listener: ElevatedListener);

    /// Remove the listener. Called once at session shutdown.
    fn unregister_listener(&self);
}

/// The external service that owns the capture and mirroring pipeline.
pub trait SessionService: Send + Sync {
    fn exists(&self) -> bool;

    /// Start the service with a fresh capture grant. The service reports
    /// readiness later through `SessionHandle::on_service_started`.
    fn start(&self, payload: CapturePayload) -> Result<(), SessionError>;

    /// Hand a new capture grant to the already running service.
    fn bind_capability(&self, payload: CapturePayload) -> Result<(), SessionError>;

    /// Turn the phone's own panel off while mirroring continues.
    fn power_off_display(&self) -> Result<(), SessionError>;

    /// Tear down every mirroring job and the service itself.
    fn exit_all(&self);
}

pub trait DisplayRegistry: Send + Sync {
    /// Mirror or external virtual display currently attached, if any.
    fn active_virtual_display(&self) -> Option<DisplayHandle>;

    /// Display created for single-app mode, if one is still active.
    fn last_single_app_display(&self) -> Option<DisplayId>;
}

/// Read-only view of user preferences.
pub trait PreferenceStore: Send + Sync {
    fn single_app_mode(&self) -> bool;
    fn use_touchscreen(&self) -> bool;
    fn disable_accessibility(&self) -> bool;
}

pub trait AddressEnumerator: Send + Sync {
    /// Local network addresses to advertise for wireless clients.
    fn local_addresses(&self) -> Result<Vec<String>, SessionError>;
}

pub trait AccessibilityService: Send + Sync {
    /// Start the touch accessibility service if the user has enabled it.
    fn ensure_started(&self) -> Result<(), SessionError>;
}

/// Surfaces opened by the switch-touch-mode action.
pub trait TouchSurface: Send + Sync {
    fn open_touchscreen(&self, display: &DisplayHandle);
    fn open_touchpad(&self, display: Option<DisplayId>);
}

/// Bundle of collaborators handed to the orchestrator at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub capture: Arc<dyn CaptureBroker>,
    pub elevated: Arc<dyn ElevatedBroker>,
    pub service: Arc<dyn SessionService>,
    pub displays: Arc<dyn DisplayRegistry>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub addresses: Arc<dyn AddressEnumerator>,
    pub accessibility: Arc<dyn AccessibilityService>,
    pub touch: Arc<dyn TouchSurface>,
}

impl Collaborators {
    /// Use one host object for every collaborator role.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: CaptureBroker
            + ElevatedBroker
            + SessionService
            + DisplayRegistry
            + PreferenceStore
            + AddressEnumerator
            + AccessibilityService
            + TouchSurface
            + 'static,
    {
        Self {
            capture: host.clone(),
            elevated: host.clone(),
            service: host.clone(),
            displays: host.clone(),
            preferences: host.clone(),
            addresses: host.clone(),
            accessibility: host.clone(),
            touch: host,
        }
    }
}
