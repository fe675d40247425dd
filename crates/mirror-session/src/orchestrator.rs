//! Session orchestrator: the single owner of facts, the pending slot and
//! the presentation record.
//!
//! Host callbacks arrive on arbitrary threads through [`SessionHandle`];
//! each one becomes a [`SessionCommand`] on an unbounded channel and is
//! applied here, one at a time, on the orchestrator task. Nothing else
//! touches the session state.

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mirror_core::config::MirrorConfig;
use mirror_core::derive::derive_presentation_with;
use mirror_core::error::SessionError;
use mirror_core::pending::{DeferredFn, PendingAction, PendingJobQueue, ResumeOutcome};
use mirror_core::permission::{CaptureOutcome, Disposition, PermissionCoordinator};
use mirror_core::types::{CapturePayload, PresentationRecord, RequestKind, SessionFacts};

use crate::collaborators::{Collaborators, ElevatedListener};
use crate::handle::SessionHandle;
use crate::log_sink::LogSink;

/// Work marshalled onto the orchestrator task.
pub enum SessionCommand {
    /// Issue an authorization prompt, optionally parking `then` until its result.
    RequestPermission {
        kind: RequestKind,
        then: Option<DeferredFn>,
    },
    CaptureResult {
        code: i32,
        granted: bool,
        payload: Option<CapturePayload>,
    },
    ElevatedResult {
        code: i32,
        granted: bool,
    },
    AudioRecordResult {
        code: i32,
        granted: bool,
    },
    ServiceStarted,
    ServiceStopped,
    /// The host revoked the capture capability bound to the service.
    CaptureStopped,
    DisplayChanged,
    StopMirroring,
    SwitchTouchMode,
    ReportError(String),
    ClearError,
    Refresh,
    Exit,
    /// Reply once every command queued before this one has been applied.
    Flush(oneshot::Sender<()>),
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionCommand::RequestPermission { kind, then } => f
                .debug_struct("RequestPermission")
                .field("kind", kind)
                .field("deferred", &then.is_some())
                .finish(),
            SessionCommand::CaptureResult {
                code,
                granted,
                payload,
            } => f
                .debug_struct("CaptureResult")
                .field("code", code)
                .field("granted", granted)
                .field("payload", payload)
                .finish(),
            SessionCommand::ElevatedResult { code, granted } => f
                .debug_struct("ElevatedResult")
                .field("code", code)
                .field("granted", granted)
                .finish(),
            SessionCommand::AudioRecordResult { code, granted } => f
                .debug_struct("AudioRecordResult")
                .field("code", code)
                .field("granted", granted)
                .finish(),
            SessionCommand::ServiceStarted => f.write_str("ServiceStarted"),
            SessionCommand::ServiceStopped => f.write_str("ServiceStopped"),
            SessionCommand::CaptureStopped => f.write_str("CaptureStopped"),
            SessionCommand::DisplayChanged => f.write_str("DisplayChanged"),
            SessionCommand::StopMirroring => f.write_str("StopMirroring"),
            SessionCommand::SwitchTouchMode => f.write_str("SwitchTouchMode"),
            SessionCommand::ReportError(text) => f.debug_tuple("ReportError").field(text).finish(),
            SessionCommand::ClearError => f.write_str("ClearError"),
            SessionCommand::Refresh => f.write_str("Refresh"),
            SessionCommand::Exit => f.write_str("Exit"),
            SessionCommand::Flush(_) => f.write_str("Flush"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub struct Orchestrator {
    config: MirrorConfig,
    collaborators: Collaborators,
    facts: SessionFacts,
    pending: PendingJobQueue,
    permissions: PermissionCoordinator,
    log: LogSink,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    /// Weak so that dropping every handle closes the channel.
    command_tx: mpsc::WeakUnboundedSender<SessionCommand>,
    record_tx: watch::Sender<PresentationRecord>,
    cancel: CancellationToken,
    listener_registered: bool,
    /// A capture grant started the service and its deferred work waits on
    /// the start report.
    awaiting_service_start: bool,
}

impl Orchestrator {
    /// Build an orchestrator and the handle used to drive it.
    ///
    /// Nothing happens until [`Orchestrator::run`] is awaited.
    pub fn new(
        config: MirrorConfig,
        collaborators: Collaborators,
        log: LogSink,
        cancel: CancellationToken,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let facts = SessionFacts::default();
        let initial = derive_presentation_with(&facts, &config.texts);
        let (record_tx, record_rx) = watch::channel(initial);
        let handle = SessionHandle::new(command_tx.clone(), record_rx, log.clone());
        let orchestrator = Self {
            permissions: PermissionCoordinator::new(config.request_codes),
            config,
            collaborators,
            facts,
            pending: PendingJobQueue::new(),
            log,
            command_rx,
            command_tx: command_tx.downgrade(),
            record_tx,
            cancel,
            listener_registered: false,
            awaiting_service_start: false,
        };
        (orchestrator, handle)
    }

    /// Start the session and process commands until exit, cancellation, or
    /// every handle has been dropped.
    pub async fn run(mut self) {
        info!("session: event loop started");
        self.start();
        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command) == Flow::Stop {
                                break;
                            }
                        }
                        None => {
                            info!("session: all handles dropped, shutting down");
                            break;
                        }
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("session: cancellation requested, shutting down");
                    break;
                }
            }
        }
        self.shutdown();
    }

    // ─── Lifecycle ───────────────────────────────────────────────

    fn start(&mut self) {
        self.register_elevated_listener();

        if !self.collaborators.preferences.disable_accessibility() {
            if let Err(err) = self.collaborators.accessibility.ensure_started() {
                warn!(error = %err, "accessibility service not started");
                self.log.append(format!("accessibility service not started: {err}"));
            }
        }

        if self.collaborators.service.exists() {
            self.log.append("session service already running");
        } else {
            self.request_permission(RequestKind::Capture, None);
        }

        self.refresh();
    }

    fn shutdown(&mut self) {
        if self.listener_registered {
            self.collaborators.elevated.unregister_listener();
            self.listener_registered = false;
            debug!("session: elevated listener unregistered");
        }
        if let Some(kind) = self.pending.discard() {
            warn!(waiting_on = %kind, "session: abandoning pending action");
        }
        info!("session: stopped");
    }

    fn register_elevated_listener(&mut self) {
        if self.listener_registered {
            return;
        }
        let tx = self.command_tx.clone();
        let listener: ElevatedListener = std::sync::Arc::new(move |code, granted| {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(SessionCommand::ElevatedResult { code, granted });
            }
        });
        self.collaborators.elevated.register_listener(listener);
        self.listener_registered = true;
    }

    // ─── Command Dispatch ────────────────────────────────────────

    fn handle_command(&mut self, command: SessionCommand) -> Flow {
        debug!(?command, "session: command");
        match command {
            SessionCommand::RequestPermission { kind, then } => self.request_permission(kind, then),
            SessionCommand::CaptureResult {
                code,
                granted,
                payload,
            } => {
                let service_exists = self.collaborators.service.exists();
                let disposition = self.permissions.on_capture_result(
                    code,
                    granted,
                    payload,
                    service_exists,
                    Utc::now(),
                );
                self.apply_disposition(disposition);
            }
            SessionCommand::ElevatedResult { code, granted } => {
                let disposition = self.permissions.on_elevated_result(code, granted);
                self.apply_disposition(disposition);
            }
            SessionCommand::AudioRecordResult { code, granted } => {
                let disposition = self.permissions.on_audio_record_result(code, granted);
                self.apply_disposition(disposition);
            }
            SessionCommand::ServiceStarted => {
                self.log.append("session service started");
                self.refresh();
                if std::mem::take(&mut self.awaiting_service_start) {
                    self.resume_pending(RequestKind::Capture);
                } else {
                    debug!("session: service start not triggered by a capture grant");
                }
            }
            SessionCommand::ServiceStopped => {
                self.log.append("session service stopped");
                self.refresh();
            }
            SessionCommand::CaptureStopped => {
                self.log.append("capture capability stopped by host");
                self.refresh();
            }
            SessionCommand::DisplayChanged | SessionCommand::Refresh => self.refresh(),
            SessionCommand::StopMirroring => self.stop_mirroring(),
            SessionCommand::SwitchTouchMode => self.switch_touch_mode(),
            SessionCommand::ReportError(text) => {
                error!(error = %text, "session: fatal error reported");
                self.log.append(text.clone());
                self.facts.error_text = Some(text);
                self.publish();
            }
            SessionCommand::ClearError => {
                self.facts.error_text = None;
                self.refresh();
            }
            SessionCommand::Exit => {
                self.log.append("exiting mirroring session");
                self.collaborators.service.exit_all();
                return Flow::Stop;
            }
            SessionCommand::Flush(reply) => {
                let _ = reply.send(());
            }
        }
        Flow::Continue
    }

    // ─── Permissions ─────────────────────────────────────────────

    fn request_permission(&mut self, kind: RequestKind, then: Option<DeferredFn>) {
        if let Some(action) = then {
            if let Err(err) = self.pending.defer(PendingAction::new(kind, action)) {
                error!(error = %err, "session: rejected deferred action");
                self.log.append(err.to_string());
                return;
            }
        }
        let code = self.permissions.request(kind);
        info!(
            %kind,
            code,
            issued = self.permissions.issued(kind),
            "session: requesting permission"
        );
        match kind {
            RequestKind::Capture => self.collaborators.capture.request_capture(code),
            RequestKind::AudioRecord => self.collaborators.capture.request_audio_record(code),
            RequestKind::Elevated => self.collaborators.elevated.request_elevated(code),
        }
    }

    fn apply_disposition(&mut self, disposition: Disposition) {
        self.log.append(disposition.log_message());
        match disposition.as_error() {
            Some(err @ SessionError::UnrecognizedRequest { .. }) => {
                warn!(error = %err, "session: ignoring result");
            }
            Some(err) => info!(error = %err, "session: permission result"),
            None => {}
        }
        if matches!(
            disposition,
            Disposition::Capture(
                CaptureOutcome::StartService(_) | CaptureOutcome::BindCapability(_)
            )
        ) {
            info!(
                granted_at = ?self.permissions.last_capture_grant_at(),
                "session: capture granted"
            );
        }
        if !disposition.changes_state() {
            return;
        }

        let resumes = disposition.resumes_pending();
        let kind = disposition.kind();
        match disposition {
            Disposition::Capture(CaptureOutcome::StartService(payload)) => {
                match self.collaborators.service.start(payload) {
                    Ok(()) => {
                        self.awaiting_service_start = true;
                        self.log.append("session service start requested");
                    }
                    Err(err) => {
                        warn!(error = %err, "session: service start failed");
                        self.log.append(format!("failed to start session service: {err}"));
                        // No service will come up to resume deferred work.
                        self.refresh();
                        self.resume_pending(RequestKind::Capture);
                        return;
                    }
                }
            }
            Disposition::Capture(CaptureOutcome::BindCapability(payload)) => {
                if let Err(err) = self.collaborators.service.bind_capability(payload) {
                    warn!(error = %err, "session: capability bind failed");
                    self.log.append(format!("failed to bind capture capability: {err}"));
                }
            }
            _ => {}
        }

        self.refresh();
        if resumes {
            if let Some(kind) = kind {
                if kind == RequestKind::Capture {
                    self.awaiting_service_start = false;
                }
                self.resume_pending(kind);
            }
        }
    }

    fn resume_pending(&mut self, kind: RequestKind) {
        match self.pending.resume_for(kind) {
            ResumeOutcome::Ran(kind) => debug!(%kind, "session: resumed pending action"),
            ResumeOutcome::Empty => {}
            ResumeOutcome::WaitingOnOther(other) => {
                debug!(result = %kind, waiting_on = %other, "session: pending action left in place");
            }
        }
    }

    // ─── User Actions ────────────────────────────────────────────

    fn stop_mirroring(&mut self) {
        if let Err(err) = self.collaborators.service.power_off_display() {
            warn!(error = %err, "session: power off display failed");
            self.log.append(format!("failed to power off display: {err}"));
        }
    }

    fn switch_touch_mode(&mut self) {
        let use_touchscreen = self.collaborators.preferences.use_touchscreen();
        if self.collaborators.elevated.is_granted() && use_touchscreen {
            match self.collaborators.displays.active_virtual_display() {
                Some(display) => self.collaborators.touch.open_touchscreen(&display),
                None => {
                    self.log.append("no virtual display to attach a touchscreen to");
                }
            }
        } else {
            let display = self.collaborators.displays.last_single_app_display();
            self.collaborators.touch.open_touchpad(display);
        }
    }

    // ─── Facts & Presentation ────────────────────────────────────

    /// Re-snapshot every collaborator-backed fact, then republish.
    fn refresh(&mut self) {
        self.snapshot_facts();
        self.publish();
    }

    fn snapshot_facts(&mut self) {
        let c = &self.collaborators;
        let facts = &mut self.facts;
        facts.service_running = c.service.exists();
        facts.virtual_display_present = c.displays.active_virtual_display().is_some();
        facts.single_app_active_display = c.displays.last_single_app_display().is_some();
        facts.elevated_permission_granted = c.elevated.is_granted();
        facts.single_app_mode = c.preferences.single_app_mode();
        facts.use_touchscreen_preference = c.preferences.use_touchscreen();

        // Addresses are only rendered while waiting for a display source.
        facts.network_addresses = if facts.service_running && !facts.has_display_source() {
            match c.addresses.local_addresses() {
                Ok(addresses) => addresses,
                Err(err) => {
                    debug!(error = %err, "session: address enumeration failed");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
    }

    fn publish(&mut self) {
        let record = derive_presentation_with(&self.facts, &self.config.texts);
        let changed = self.record_tx.send_if_modified(|current| {
            if *current == record {
                false
            } else {
                *current = record;
                true
            }
        });
        if changed {
            debug!("session: presentation record changed");
        }
    }
}
