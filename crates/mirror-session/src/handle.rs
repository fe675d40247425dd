//! Cloneable handle into a running session.
//!
//! Every method is non-blocking and safe to call from any thread,
//! including host callback threads outside the tokio runtime. Calls are
//! queued onto the orchestrator task and applied in order.

use tokio::sync::{mpsc, oneshot, watch};

use mirror_core::pending::DeferredFn;
use mirror_core::types::{CapturePayload, PresentationRecord, RequestKind};

use crate::log_sink::LogSink;
use crate::orchestrator::SessionCommand;

/// Narrow capability surface offered to UI surfaces and background jobs.
pub trait MirrorControl: Send + Sync {
    fn request_capture_permission(&self);
    fn request_elevated_permission(&self);
    fn refresh(&self);
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    record_rx: watch::Receiver<PresentationRecord>,
    log: LogSink,
}

impl SessionHandle {
    pub(crate) fn new(
        command_tx: mpsc::UnboundedSender<SessionCommand>,
        record_rx: watch::Receiver<PresentationRecord>,
        log: LogSink,
    ) -> Self {
        Self {
            command_tx,
            record_rx,
            log,
        }
    }

    // ─── Permission Requests ─────────────────────────────────────

    /// Request a permission and park `then` until its result arrives.
    ///
    /// Only one action may be parked at a time; a second one is rejected
    /// and reported in the session log.
    pub fn request_permission_then(
        &self,
        kind: RequestKind,
        then: impl FnOnce() + Send + 'static,
    ) {
        let then: DeferredFn = Box::new(then);
        self.send(SessionCommand::RequestPermission {
            kind,
            then: Some(then),
        });
    }

    pub fn request_permission(&self, kind: RequestKind) {
        self.send(SessionCommand::RequestPermission { kind, then: None });
    }

    pub fn request_capture_permission(&self) {
        self.request_permission(RequestKind::Capture);
    }

    pub fn request_elevated_permission(&self) {
        self.request_permission(RequestKind::Elevated);
    }

    pub fn request_audio_record_permission(&self) {
        self.request_permission(RequestKind::AudioRecord);
    }

    // ─── Host Callbacks ──────────────────────────────────────────

    pub fn on_capture_result(&self, code: i32, granted: bool, payload: Option<CapturePayload>) {
        self.send(SessionCommand::CaptureResult {
            code,
            granted,
            payload,
        });
    }

    pub fn on_elevated_result(&self, code: i32, granted: bool) {
        self.send(SessionCommand::ElevatedResult { code, granted });
    }

    pub fn on_audio_record_result(&self, code: i32, granted: bool) {
        self.send(SessionCommand::AudioRecordResult { code, granted });
    }

    pub fn on_service_started(&self) {
        self.send(SessionCommand::ServiceStarted);
    }

    pub fn on_service_stopped(&self) {
        self.send(SessionCommand::ServiceStopped);
    }

    pub fn on_capture_stopped(&self) {
        self.send(SessionCommand::CaptureStopped);
    }

    pub fn on_display_changed(&self) {
        self.send(SessionCommand::DisplayChanged);
    }

    // ─── User Actions ────────────────────────────────────────────

    pub fn request_mirroring(&self) {
        self.request_permission(RequestKind::Capture);
    }

    pub fn stop_mirroring(&self) {
        self.send(SessionCommand::StopMirroring);
    }

    pub fn switch_touch_mode(&self) {
        self.send(SessionCommand::SwitchTouchMode);
    }

    pub fn report_error(&self, text: impl Into<String>) {
        self.send(SessionCommand::ReportError(text.into()));
    }

    pub fn clear_error(&self) {
        self.send(SessionCommand::ClearError);
    }

    /// Re-snapshot every fact and republish the presentation record.
    pub fn refresh(&self) {
        self.send(SessionCommand::Refresh);
    }

    pub fn exit(&self) {
        self.send(SessionCommand::Exit);
    }

    /// Wait until every command sent before this call has been applied.
    ///
    /// Returns `false` if the session has already stopped.
    pub async fn flush(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(SessionCommand::Flush(reply_tx)).is_err() {
            return false;
        }
        reply_rx.await.is_ok()
    }

    // ─── Readers ─────────────────────────────────────────────────

    /// Latest published presentation record, by value.
    pub fn presentation(&self) -> PresentationRecord {
        self.record_rx.borrow().clone()
    }

    /// Receiver notified whenever a different record is published.
    pub fn subscribe(&self) -> watch::Receiver<PresentationRecord> {
        self.record_rx.clone()
    }

    pub fn log(&self) -> &LogSink {
        &self.log
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    fn send(&self, command: SessionCommand) {
        if let Err(err) = self.command_tx.send(command) {
            tracing::debug!(command = ?err.0, "session closed, dropping command");
        }
    }
}

impl MirrorControl for SessionHandle {
    fn request_capture_permission(&self) {
        SessionHandle::request_capture_permission(self);
    }

    fn request_elevated_permission(&self) {
        SessionHandle::request_elevated_permission(self);
    }

    fn refresh(&self) {
        SessionHandle::refresh(self);
    }
}
