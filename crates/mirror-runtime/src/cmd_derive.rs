use std::io::Read;
use std::path::Path;

use anyhow::Context;

use mirror_core::config::{MirrorConfig, StatusTexts};
use mirror_core::derive::derive_presentation_with;
use mirror_core::types::{PresentationRecord, SessionFacts};

pub fn cmd_derive(config: &MirrorConfig, facts_path: Option<&Path>) -> anyhow::Result<()> {
    let raw = match facts_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading facts {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading facts from stdin")?;
            buf
        }
    };

    let record = derive_from_json(&raw, &config.texts)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn derive_from_json(raw: &str, texts: &StatusTexts) -> anyhow::Result<PresentationRecord> {
    let facts: SessionFacts = serde_json::from_str(raw).context("parsing session facts")?;
    tracing::debug!(phase = ?mirror_core::types::SessionPhase::of(&facts), "deriving presentation");
    Ok(derive_presentation_with(&facts, texts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_service_absent() {
        let record = derive_from_json("{}", &StatusTexts::default()).unwrap();
        assert!(record.settings_visible);
        assert!(!record.stop_mirroring_visible);
        assert!(!record.touch_mode_visible);
    }

    #[test]
    fn awaiting_display_lists_addresses() {
        let raw = r#"{
            "service_running": true,
            "network_addresses": ["192.168.1.20", "10.0.0.4"]
        }"#;
        let record = derive_from_json(raw, &StatusTexts::default()).unwrap();
        assert!(record.status_text.ends_with("\n192.168.1.20\n10.0.0.4"));
        assert!(record.settings_visible);
        assert!(!record.stop_mirroring_visible);
    }

    #[test]
    fn configured_texts_are_used() {
        let texts = StatusTexts {
            touchpad: "pad".into(),
            ..StatusTexts::default()
        };
        let raw = r#"{
            "service_running": true,
            "virtual_display_present": true,
            "single_app_mode": true
        }"#;
        let record = derive_from_json(raw, &texts).unwrap();
        assert_eq!(record.touch_mode_label.as_deref(), Some("pad"));
    }

    #[test]
    fn malformed_facts_are_an_error() {
        let raw = r#"{ "service_running": "yes" }"#;
        assert!(derive_from_json(raw, &StatusTexts::default()).is_err());
    }
}
