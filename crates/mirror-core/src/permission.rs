//! Permission coordinator: issues and settles one-shot authorization requests.
//!
//! Pure state machine. It tracks which request kinds are outstanding and
//! turns raw host results into a [`Disposition`]; the orchestrator applies
//! the disposition (collaborator calls, logging, resuming deferred work).

use chrono::{DateTime, Utc};

use crate::config::RequestCodes;
use crate::error::SessionError;
use crate::types::{CapturePayload, RequestKind};

/// What to do with a granted or denied capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Service not running yet: start it with the granted capability.
    /// Deferred work resumes once the service reports that it started.
    StartService(CapturePayload),
    /// Service already running: hand it the new capability directly.
    BindCapability(CapturePayload),
    /// Denied, or granted without a payload.
    Denied,
}

/// Result of settling one host callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Request code not issued on this channel. Logged, otherwise inert.
    Unrecognized { channel: RequestKind, code: i32 },
    /// Result for a kind with no outstanding request. Logged, otherwise inert.
    Duplicate(RequestKind),
    Capture(CaptureOutcome),
    Elevated { granted: bool },
    AudioRecord { granted: bool },
}

impl Disposition {
    /// Whether the pending action waiting on this kind runs now.
    pub fn resumes_pending(&self) -> bool {
        match self {
            Disposition::Unrecognized { .. } | Disposition::Duplicate(_) => false,
            Disposition::Capture(CaptureOutcome::StartService(_)) => false,
            Disposition::Capture(_)
            | Disposition::Elevated { .. }
            | Disposition::AudioRecord { .. } => true,
        }
    }

    /// Whether facts must be re-snapshotted and the record recomputed.
    ///
    /// Inert dispositions leave the presentation record untouched.
    pub fn changes_state(&self) -> bool {
        !matches!(
            self,
            Disposition::Unrecognized { .. } | Disposition::Duplicate(_)
        )
    }

    /// The request kind this disposition settled, if any.
    pub fn kind(&self) -> Option<RequestKind> {
        match self {
            Disposition::Unrecognized { .. } => None,
            Disposition::Duplicate(kind) => Some(*kind),
            Disposition::Capture(_) => Some(RequestKind::Capture),
            Disposition::Elevated { .. } => Some(RequestKind::Elevated),
            Disposition::AudioRecord { .. } => Some(RequestKind::AudioRecord),
        }
    }

    /// Error classification for denial and unrecognized results.
    pub fn as_error(&self) -> Option<SessionError> {
        match self {
            Disposition::Unrecognized { channel, code } => Some(SessionError::UnrecognizedRequest {
                channel: *channel,
                code: *code,
            }),
            Disposition::Capture(CaptureOutcome::Denied) => {
                Some(SessionError::PermissionDenied(RequestKind::Capture))
            }
            Disposition::Elevated { granted: false } => {
                Some(SessionError::PermissionDenied(RequestKind::Elevated))
            }
            Disposition::AudioRecord { granted: false } => {
                Some(SessionError::PermissionDenied(RequestKind::AudioRecord))
            }
            _ => None,
        }
    }

    /// User-facing session log line for this disposition.
    pub fn log_message(&self) -> String {
        match self {
            Disposition::Unrecognized { channel, code } => {
                format!("unrecognized {channel} request code: {code}")
            }
            Disposition::Duplicate(kind) => format!("duplicate {kind} result ignored"),
            Disposition::Capture(CaptureOutcome::StartService(_)) => {
                "user granted capture permission".to_owned()
            }
            Disposition::Capture(CaptureOutcome::BindCapability(_)) => {
                "user granted capture permission, binding to running session service".to_owned()
            }
            Disposition::Capture(CaptureOutcome::Denied) => {
                "user denied capture permission".to_owned()
            }
            Disposition::Elevated { granted } => {
                format!("elevated permission result: {}", verdict(*granted))
            }
            Disposition::AudioRecord { granted } => {
                format!("audio record permission result: {}", verdict(*granted))
            }
        }
    }
}

fn verdict(granted: bool) -> &'static str {
    if granted { "granted" } else { "denied" }
}

// ─── Coordinator ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PermissionCoordinator {
    codes: RequestCodes,
    outstanding: [bool; 3],
    issued: [u32; 3],
    last_capture_grant_at: Option<DateTime<Utc>>,
}

impl PermissionCoordinator {
    pub fn new(codes: RequestCodes) -> Self {
        Self {
            codes,
            outstanding: [false; 3],
            issued: [0; 3],
            last_capture_grant_at: None,
        }
    }

    pub fn codes(&self) -> &RequestCodes {
        &self.codes
    }

    /// Mark `kind` as outstanding and return the code to hand to the host.
    ///
    /// Re-requesting an outstanding kind re-prompts but still expects a
    /// single result.
    pub fn request(&mut self, kind: RequestKind) -> i32 {
        self.outstanding[kind.index()] = true;
        let issued = &mut self.issued[kind.index()];
        *issued = issued.saturating_add(1);
        self.codes.code(kind)
    }

    pub fn is_outstanding(&self, kind: RequestKind) -> bool {
        self.outstanding[kind.index()]
    }

    /// Number of prompts issued for `kind` over the session lifetime.
    pub fn issued(&self, kind: RequestKind) -> u32 {
        self.issued[kind.index()]
    }

    /// When the most recent capture grant was settled.
    pub fn last_capture_grant_at(&self) -> Option<DateTime<Utc>> {
        self.last_capture_grant_at
    }

    /// Settle a capture result delivered through the host's activity-result path.
    ///
    /// A grant without a payload is treated as a denial.
    pub fn on_capture_result(
        &mut self,
        code: i32,
        granted: bool,
        payload: Option<CapturePayload>,
        service_exists: bool,
        now: DateTime<Utc>,
    ) -> Disposition {
        if let Err(inert) = self.settle(RequestKind::Capture, code) {
            return inert;
        }
        let outcome = match payload {
            Some(payload) if granted => {
                self.last_capture_grant_at = Some(now);
                if service_exists {
                    CaptureOutcome::BindCapability(payload)
                } else {
                    CaptureOutcome::StartService(payload)
                }
            }
            _ => CaptureOutcome::Denied,
        };
        Disposition::Capture(outcome)
    }

    /// Settle a result delivered to the elevated-privilege listener.
    pub fn on_elevated_result(&mut self, code: i32, granted: bool) -> Disposition {
        match self.settle(RequestKind::Elevated, code) {
            Ok(()) => Disposition::Elevated { granted },
            Err(inert) => inert,
        }
    }

    /// Settle a result delivered through the host runtime-permission path.
    pub fn on_audio_record_result(&mut self, code: i32, granted: bool) -> Disposition {
        match self.settle(RequestKind::AudioRecord, code) {
            Ok(()) => Disposition::AudioRecord { granted },
            Err(inert) => inert,
        }
    }

    /// Check the code against `channel` and clear its outstanding flag.
    fn settle(&mut self, channel: RequestKind, code: i32) -> Result<(), Disposition> {
        if self.codes.code(channel) != code {
            return Err(Disposition::Unrecognized { channel, code });
        }
        let slot = &mut self.outstanding[channel.index()];
        if !*slot {
            return Err(Disposition::Duplicate(channel));
        }
        *slot = false;
        Ok(())
    }
}

impl Default for PermissionCoordinator {
    fn default() -> Self {
        Self::new(RequestCodes::default())
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> CapturePayload {
        CapturePayload::new(vec![1, 2, 3])
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn request_returns_configured_code() {
        let mut coord = PermissionCoordinator::default();
        assert_eq!(coord.request(RequestKind::Capture), 1001);
        assert_eq!(coord.request(RequestKind::AudioRecord), 1002);
        assert_eq!(coord.request(RequestKind::Elevated), 1003);
        for kind in RequestKind::ALL {
            assert!(coord.is_outstanding(kind));
            assert_eq!(coord.issued(kind), 1);
        }
    }

    #[test]
    fn grant_without_service_starts_it() {
        let mut coord = PermissionCoordinator::default();
        let code = coord.request(RequestKind::Capture);
        let d = coord.on_capture_result(code, true, Some(payload()), false, now());
        assert_eq!(d, Disposition::Capture(CaptureOutcome::StartService(payload())));
        assert!(!d.resumes_pending());
        assert!(d.changes_state());
        assert_eq!(coord.last_capture_grant_at(), Some(now()));
        assert!(!coord.is_outstanding(RequestKind::Capture));
    }

    #[test]
    fn grant_with_service_binds_and_resumes() {
        let mut coord = PermissionCoordinator::default();
        let code = coord.request(RequestKind::Capture);
        let d = coord.on_capture_result(code, true, Some(payload()), true, now());
        assert_eq!(
            d,
            Disposition::Capture(CaptureOutcome::BindCapability(payload()))
        );
        assert!(d.resumes_pending());
    }

    #[test]
    fn denial_resumes_and_classifies() {
        let mut coord = PermissionCoordinator::default();
        let code = coord.request(RequestKind::Capture);
        let d = coord.on_capture_result(code, false, None, true, now());
        assert_eq!(d, Disposition::Capture(CaptureOutcome::Denied));
        assert!(d.resumes_pending());
        assert_eq!(
            d.as_error(),
            Some(SessionError::PermissionDenied(RequestKind::Capture))
        );
        assert_eq!(coord.last_capture_grant_at(), None);
    }

    #[test]
    fn grant_without_payload_is_denial() {
        let mut coord = PermissionCoordinator::default();
        let code = coord.request(RequestKind::Capture);
        let d = coord.on_capture_result(code, true, None, false, now());
        assert_eq!(d, Disposition::Capture(CaptureOutcome::Denied));
    }

    #[test]
    fn unrecognized_code_is_inert() {
        let mut coord = PermissionCoordinator::default();
        coord.request(RequestKind::Capture);
        let d = coord.on_capture_result(4242, true, Some(payload()), false, now());
        assert_eq!(
            d,
            Disposition::Unrecognized {
                channel: RequestKind::Capture,
                code: 4242
            }
        );
        assert!(!d.resumes_pending());
        assert!(!d.changes_state());
        // Still waiting for the real result.
        assert!(coord.is_outstanding(RequestKind::Capture));
    }

    #[test]
    fn elevated_code_on_capture_channel_is_unrecognized() {
        let mut coord = PermissionCoordinator::default();
        let elevated = coord.request(RequestKind::Elevated);
        let d = coord.on_capture_result(elevated, true, Some(payload()), false, now());
        assert!(matches!(d, Disposition::Unrecognized { .. }));
        assert!(coord.is_outstanding(RequestKind::Elevated));
    }

    #[test]
    fn duplicate_delivery_is_inert() {
        let mut coord = PermissionCoordinator::default();
        let code = coord.request(RequestKind::Elevated);
        assert_eq!(
            coord.on_elevated_result(code, true),
            Disposition::Elevated { granted: true }
        );
        let dup = coord.on_elevated_result(code, true);
        assert_eq!(dup, Disposition::Duplicate(RequestKind::Elevated));
        assert!(!dup.resumes_pending());
        assert_eq!(dup.log_message(), "duplicate elevated result ignored");
    }

    #[test]
    fn elevated_resumes_on_grant_and_denial() {
        let mut coord = PermissionCoordinator::default();
        for granted in [true, false] {
            let code = coord.request(RequestKind::Elevated);
            let d = coord.on_elevated_result(code, granted);
            assert!(d.resumes_pending(), "granted={granted}");
        }
        assert_eq!(coord.issued(RequestKind::Elevated), 2);
    }

    #[test]
    fn issued_counter_saturates() {
        let mut coord = PermissionCoordinator::default();
        coord.issued[RequestKind::Capture.index()] = u32::MAX;
        coord.request(RequestKind::Capture);
        assert_eq!(coord.issued(RequestKind::Capture), u32::MAX);
        assert!(coord.is_outstanding(RequestKind::Capture));
    }

    #[test]
    fn audio_record_result() {
        let mut coord = PermissionCoordinator::default();
        let code = coord.request(RequestKind::AudioRecord);
        let d = coord.on_audio_record_result(code, false);
        assert_eq!(d, Disposition::AudioRecord { granted: false });
        assert!(d.resumes_pending());
        assert_eq!(d.log_message(), "audio record permission result: denied");
    }

    #[test]
    fn re_request_keeps_single_outstanding_result() {
        let mut coord = PermissionCoordinator::default();
        let code = coord.request(RequestKind::Capture);
        coord.request(RequestKind::Capture);
        let first = coord.on_capture_result(code, false, None, false, now());
        assert_eq!(first, Disposition::Capture(CaptureOutcome::Denied));
        let second = coord.on_capture_result(code, false, None, false, now());
        assert_eq!(second, Disposition::Duplicate(RequestKind::Capture));
    }

    #[test]
    fn log_messages() {
        assert_eq!(
            Disposition::Unrecognized {
                channel: RequestKind::Elevated,
                code: 7
            }
            .log_message(),
            "unrecognized elevated request code: 7"
        );
        assert_eq!(
            Disposition::Capture(CaptureOutcome::Denied).log_message(),
            "user denied capture permission"
        );
    }
}
