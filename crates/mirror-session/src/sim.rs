//! In-memory host that implements every collaborator role.
//!
//! Used by the `mirror simulate` command to replay scripted sessions and by
//! the integration tests. It records every call the orchestrator makes so
//! scenarios can assert on them.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};

use mirror_core::config::RequestCodes;
use mirror_core::error::SessionError;
use mirror_core::types::{CapturePayload, DisplayHandle, DisplayId, RequestKind};

use crate::collaborators::{
    AccessibilityService, AddressEnumerator, CaptureBroker, DisplayRegistry, ElevatedBroker,
    ElevatedListener, PreferenceStore, SessionService, TouchSurface,
};
use crate::handle::SessionHandle;

/// Observable and configurable state of the simulated host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimState {
    // Host behaviour.
    pub service_exists: bool,
    /// Report `on_service_started` as soon as the service is started.
    pub auto_report_service_start: bool,
    pub service_start_fails: bool,
    pub elevated_granted: bool,
    pub virtual_display: Option<DisplayHandle>,
    pub single_app_display: Option<DisplayId>,
    pub single_app_mode: bool,
    pub use_touchscreen: bool,
    pub disable_accessibility: bool,
    pub accessibility_fails: bool,
    pub addresses: Vec<String>,
    pub addresses_fail: bool,

    // Recorded calls.
    pub capture_requests: Vec<i32>,
    pub audio_record_requests: Vec<i32>,
    pub elevated_requests: Vec<i32>,
    pub started_with: Vec<CapturePayload>,
    pub bound: Vec<CapturePayload>,
    pub power_off_calls: u32,
    pub exit_calls: u32,
    pub accessibility_starts: u32,
    pub touchscreens_opened: Vec<DisplayId>,
    pub touchpads_opened: Vec<Option<DisplayId>>,
    pub listener_registrations: u32,
    pub listener_active: bool,
}

#[derive(Default)]
pub struct SimHost {
    state: Mutex<SimState>,
    listener: Mutex<Option<ElevatedListener>>,
    handle: OnceLock<SessionHandle>,
}

impl SimHost {
    pub fn new(state: SimState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            listener: Mutex::new(None),
            handle: OnceLock::new(),
        })
    }

    /// Give the host a handle for callbacks it makes on its own
    /// (service start reports). Only the first call takes effect.
    pub fn attach(&self, handle: SessionHandle) {
        let _ = self.handle.set(handle);
    }

    /// Copy of the current host state.
    pub fn state(&self) -> SimState {
        self.lock().clone()
    }

    /// Mutate host state, e.g. to attach a display before a refresh.
    pub fn update<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Deliver an elevated result through the registered listener, as the
    /// broker would from its own thread. Returns `false` if no listener is
    /// registered.
    pub fn deliver_elevated(&self, code: i32, granted: bool) -> bool {
        if granted {
            self.lock().elevated_granted = true;
        }
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match listener {
            Some(listener) => {
                listener(code, granted);
                true
            }
            None => false,
        }
    }

    /// Apply one scripted host event.
    pub fn apply(&self, handle: &SessionHandle, step: &SimStep, codes: &RequestCodes) {
        match step {
            SimStep::RequestMirroring => handle.request_mirroring(),
            SimStep::RequestPermission { kind, then } => match then {
                Some(label) => {
                    let log = handle.log().clone();
                    let label = label.clone();
                    handle.request_permission_then(*kind, move || {
                        log.append(format!("deferred job {label} resumed"));
                    });
                }
                None => handle.request_permission(*kind),
            },
            SimStep::CaptureResult {
                granted,
                code,
                with_payload,
            } => {
                let payload = with_payload.then(|| CapturePayload::new(SIM_CAPTURE_TOKEN.to_vec()));
                handle.on_capture_result(code.unwrap_or(codes.capture), *granted, payload);
            }
            SimStep::ElevatedResult { granted, code } => {
                self.deliver_elevated(code.unwrap_or(codes.elevated), *granted);
            }
            SimStep::AudioRecordResult { granted, code } => {
                handle.on_audio_record_result(code.unwrap_or(codes.audio_record), *granted);
            }
            SimStep::ServiceStarted => {
                self.lock().service_exists = true;
                handle.on_service_started();
            }
            SimStep::ServiceStopped => {
                self.lock().service_exists = false;
                handle.on_service_stopped();
            }
            SimStep::CaptureStopped => handle.on_capture_stopped(),
            SimStep::AttachDisplay { display_id, source } => {
                self.lock().virtual_display = Some(DisplayHandle {
                    display_id: *display_id,
                    source: source.clone().unwrap_or_else(|| "mirror".to_owned()),
                });
                handle.on_display_changed();
            }
            SimStep::DetachDisplay => {
                self.lock().virtual_display = None;
                handle.on_display_changed();
            }
            SimStep::SingleAppDisplay { display_id } => {
                self.lock().single_app_display = *display_id;
                handle.on_display_changed();
            }
            SimStep::SetPreferences {
                single_app_mode,
                use_touchscreen,
            } => {
                {
                    let mut state = self.lock();
                    if let Some(v) = single_app_mode {
                        state.single_app_mode = *v;
                    }
                    if let Some(v) = use_touchscreen {
                        state.use_touchscreen = *v;
                    }
                }
                handle.refresh();
            }
            SimStep::StopMirroring => handle.stop_mirroring(),
            SimStep::SwitchTouchMode => handle.switch_touch_mode(),
            SimStep::ReportError { text } => handle.report_error(text.clone()),
            SimStep::ClearError => handle.clear_error(),
            SimStep::Refresh => handle.refresh(),
            SimStep::Exit => handle.exit(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

const SIM_CAPTURE_TOKEN: &[u8] = b"sim-capture-grant";

fn default_true() -> bool {
    true
}

/// One scripted host event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimStep {
    RequestMirroring,
    /// Request a permission; `then` names a deferred job that logs when resumed.
    RequestPermission {
        kind: RequestKind,
        #[serde(default)]
        then: Option<String>,
    },
    CaptureResult {
        granted: bool,
        /// Defaults to the configured capture code.
        #[serde(default)]
        code: Option<i32>,
        #[serde(default = "default_true")]
        with_payload: bool,
    },
    ElevatedResult {
        granted: bool,
        #[serde(default)]
        code: Option<i32>,
    },
    AudioRecordResult {
        granted: bool,
        #[serde(default)]
        code: Option<i32>,
    },
    ServiceStarted,
    ServiceStopped,
    CaptureStopped,
    AttachDisplay {
        display_id: DisplayId,
        #[serde(default)]
        source: Option<String>,
    },
    DetachDisplay,
    SingleAppDisplay {
        display_id: Option<DisplayId>,
    },
    SetPreferences {
        #[serde(default)]
        single_app_mode: Option<bool>,
        #[serde(default)]
        use_touchscreen: Option<bool>,
    },
    StopMirroring,
    SwitchTouchMode,
    ReportError {
        text: String,
    },
    ClearError,
    Refresh,
    Exit,
}

// ─── Collaborator Roles ──────────────────────────────────────────

impl CaptureBroker for SimHost {
    fn request_capture(&self, request_code: i32) {
        self.lock().capture_requests.push(request_code);
    }

    fn request_audio_record(&self, request_code: i32) {
        self.lock().audio_record_requests.push(request_code);
    }
}

impl ElevatedBroker for SimHost {
    fn request_elevated(&self, request_code: i32) {
        self.lock().elevated_requests.push(request_code);
    }

    fn is_granted(&self) -> bool {
        self.lock().elevated_granted
    }

    fn register_listener(&self, listener: ElevatedListener) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
        let mut state = self.lock();
        state.listener_registrations += 1;
        state.listener_active = true;
    }

    fn unregister_listener(&self) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.lock().listener_active = false;
    }
}

impl SessionService for SimHost {
    fn exists(&self) -> bool {
        self.lock().service_exists
    }

    fn start(&self, payload: CapturePayload) -> Result<(), SessionError> {
        let report = {
            let mut state = self.lock();
            if state.service_start_fails {
                return Err(SessionError::unavailable(
                    "session service",
                    "foreground service start refused",
                ));
            }
            state.started_with.push(payload);
            state.service_exists = true;
            state.auto_report_service_start
        };
        if report {
            if let Some(handle) = self.handle.get() {
                handle.on_service_started();
            }
        }
        Ok(())
    }

    fn bind_capability(&self, payload: CapturePayload) -> Result<(), SessionError> {
        self.lock().bound.push(payload);
        Ok(())
    }

    fn power_off_display(&self) -> Result<(), SessionError> {
        self.lock().power_off_calls += 1;
        Ok(())
    }

    fn exit_all(&self) {
        let mut state = self.lock();
        state.exit_calls += 1;
        state.service_exists = false;
        state.virtual_display = None;
        state.single_app_display = None;
    }
}

impl DisplayRegistry for SimHost {
    fn active_virtual_display(&self) -> Option<DisplayHandle> {
        self.lock().virtual_display.clone()
    }

    fn last_single_app_display(&self) -> Option<DisplayId> {
        self.lock().single_app_display
    }
}

impl PreferenceStore for SimHost {
    fn single_app_mode(&self) -> bool {
        self.lock().single_app_mode
    }

    fn use_touchscreen(&self) -> bool {
        self.lock().use_touchscreen
    }

    fn disable_accessibility(&self) -> bool {
        self.lock().disable_accessibility
    }
}

impl AddressEnumerator for SimHost {
    fn local_addresses(&self) -> Result<Vec<String>, SessionError> {
        let state = self.lock();
        if state.addresses_fail {
            return Err(SessionError::unavailable(
                "address enumerator",
                "wifi interface unavailable",
            ));
        }
        Ok(state.addresses.clone())
    }
}

impl AccessibilityService for SimHost {
    fn ensure_started(&self) -> Result<(), SessionError> {
        let mut state = self.lock();
        if state.accessibility_fails {
            return Err(SessionError::unavailable(
                "accessibility service",
                "not enabled in system settings",
            ));
        }
        state.accessibility_starts += 1;
        Ok(())
    }
}

impl TouchSurface for SimHost {
    fn open_touchscreen(&self, display: &DisplayHandle) {
        self.lock().touchscreens_opened.push(display.display_id);
    }

    fn open_touchpad(&self, display: Option<DisplayId>) {
        self.lock().touchpads_opened.push(display);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_steps_parse_from_json() {
        let steps: Vec<SimStep> = serde_json::from_str(
            r#"[
                {"event": "request_permission", "kind": "elevated", "then": "create-display"},
                {"event": "capture_result", "granted": true},
                {"event": "capture_result", "granted": false, "code": 7, "with_payload": false},
                {"event": "attach_display", "display_id": 12},
                {"event": "set_preferences", "use_touchscreen": true},
                {"event": "exit"}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            steps[0],
            SimStep::RequestPermission {
                kind: RequestKind::Elevated,
                then: Some("create-display".into())
            }
        );
        assert_eq!(
            steps[1],
            SimStep::CaptureResult {
                granted: true,
                code: None,
                with_payload: true
            }
        );
        assert_eq!(
            steps[2],
            SimStep::CaptureResult {
                granted: false,
                code: Some(7),
                with_payload: false
            }
        );
        assert_eq!(
            steps[4],
            SimStep::SetPreferences {
                single_app_mode: None,
                use_touchscreen: Some(true)
            }
        );
        assert_eq!(steps[5], SimStep::Exit);
    }

    #[test]
    fn failing_start_records_nothing() {
        let host = SimHost::new(SimState {
            service_start_fails: true,
            ..Default::default()
        });
        let err = host.start(CapturePayload::new(vec![1])).unwrap_err();
        assert!(matches!(err, SessionError::CollaboratorUnavailable { .. }));
        let state = host.state();
        assert!(state.started_with.is_empty());
        assert!(!state.service_exists);
    }

    #[test]
    fn deliver_without_listener_reports_false() {
        let host = SimHost::new(SimState::default());
        assert!(!host.deliver_elevated(1003, true));
        assert!(host.state().elevated_granted);
    }
}
