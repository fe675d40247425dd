//! Session configuration: request codes, status texts, session knobs.
//!
//! Loaded from TOML. Every key is optional and falls back to its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::RequestKind;

/// Top-level configuration for a mirroring session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub request_codes: RequestCodes,
    pub texts: StatusTexts,
    pub session: SessionSettings,
}

impl MirrorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: MirrorConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded mirror config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.request_codes.validate()
    }
}

// ─── Request Codes ───────────────────────────────────────────────

/// Numeric request codes used at the untyped host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestCodes {
    pub capture: i32,
    pub audio_record: i32,
    pub elevated: i32,
}

impl Default for RequestCodes {
    fn default() -> Self {
        Self {
            capture: 1001,
            audio_record: 1002,
            elevated: 1003,
        }
    }
}

impl RequestCodes {
    /// Code the host sees for `kind`.
    pub fn code(&self, kind: RequestKind) -> i32 {
        match kind {
            RequestKind::Capture => self.capture,
            RequestKind::Elevated => self.elevated,
            RequestKind::AudioRecord => self.audio_record,
        }
    }

    /// Map a raw host code back to a request kind.
    pub fn kind_of(&self, code: i32) -> Option<RequestKind> {
        RequestKind::ALL
            .into_iter()
            .find(|&kind| self.code(kind) == code)
    }

    /// Codes must be pairwise distinct, otherwise results cannot be routed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kinds = RequestKind::ALL;
        for (i, &first) in kinds.iter().enumerate() {
            for &second in &kinds[i + 1..] {
                if self.code(first) == self.code(second) {
                    return Err(ConfigError::DuplicateRequestCode {
                        code: self.code(first),
                        first,
                        second,
                    });
                }
            }
        }
        Ok(())
    }
}

// ─── Status Texts ────────────────────────────────────────────────

/// Strings rendered by the presentation derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusTexts {
    pub no_permission: String,
    pub mirroring_active: String,
    pub connect_display: String,
    pub touchscreen: String,
    pub touchpad: String,
}

pub const DEFAULT_NO_PERMISSION_TEXT: &str = "no capture permission, exit manually";
pub const DEFAULT_MIRRORING_ACTIVE_TEXT: &str = "mirroring active. Turn off battery optimisation \
for this app in system settings and lock it in the recent-tasks list so it is not killed. \
Touch input may not work without elevated permission";
pub const DEFAULT_CONNECT_DISPLAY_TEXT: &str = "connect a display. Devices with a USB 2.0 port \
need a DisplayLink dock or a Moonlight wireless client";
pub const DEFAULT_TOUCHSCREEN_LABEL: &str = "touchscreen";
pub const DEFAULT_TOUCHPAD_LABEL: &str = "touchpad";

impl Default for StatusTexts {
    fn default() -> Self {
        Self {
            no_permission: DEFAULT_NO_PERMISSION_TEXT.to_owned(),
            mirroring_active: DEFAULT_MIRRORING_ACTIVE_TEXT.to_owned(),
            connect_display: DEFAULT_CONNECT_DISPLAY_TEXT.to_owned(),
            touchscreen: DEFAULT_TOUCHSCREEN_LABEL.to_owned(),
            touchpad: DEFAULT_TOUCHPAD_LABEL.to_owned(),
        }
    }
}

// ─── Session Settings ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Broadcast capacity for session log subscribers.
    pub log_broadcast_capacity: usize,
    /// Number of trailing log entries printed after a simulated session.
    pub log_tail: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            log_broadcast_capacity: 256,
            log_tail: 50,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = MirrorConfig::from_toml_str("").unwrap();
        assert_eq!(config, MirrorConfig::default());
        assert_eq!(config.request_codes.capture, 1001);
        assert_eq!(config.request_codes.audio_record, 1002);
        assert_eq!(config.request_codes.elevated, 1003);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = MirrorConfig::from_toml_str(
            r#"
            [request_codes]
            elevated = 77

            [texts]
            touchpad = "trackpad"
            "#,
        )
        .unwrap();
        assert_eq!(config.request_codes.elevated, 77);
        assert_eq!(config.request_codes.capture, 1001);
        assert_eq!(config.texts.touchpad, "trackpad");
        assert_eq!(config.texts.touchscreen, DEFAULT_TOUCHSCREEN_LABEL);
    }

    #[test]
    fn duplicate_codes_rejected() {
        let err = MirrorConfig::from_toml_str(
            r#"
            [request_codes]
            capture = 5
            elevated = 5
            "#,
        )
        .unwrap_err();
        match err {
            ConfigError::DuplicateRequestCode {
                code,
                first,
                second,
            } => {
                assert_eq!(code, 5);
                assert_eq!(first, RequestKind::Capture);
                assert_eq!(second, RequestKind::Elevated);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = MirrorConfig::from_toml_str("[request_codes\ncapture = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn kind_of_round_trips_configured_codes() {
        let codes = RequestCodes::default();
        for kind in RequestKind::ALL {
            assert_eq!(codes.kind_of(codes.code(kind)), Some(kind));
        }
        assert_eq!(codes.kind_of(9999), None);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.toml");
        std::fs::write(&path, "[session]\nlog_tail = 5\n").unwrap();
        let config = MirrorConfig::load(&path).unwrap();
        assert_eq!(config.session.log_tail, 5);
        assert_eq!(config.session.log_broadcast_capacity, 256);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MirrorConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
