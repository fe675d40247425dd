//! Presentation derivation: `SessionFacts -> PresentationRecord`.
//!
//! Pure, total and deterministic. All inputs, including the best-effort
//! network address list, are snapshotted into [`SessionFacts`] before this
//! runs, so nothing here touches collaborators or the clock.

use crate::config::StatusTexts;
use crate::types::{PresentationRecord, SessionFacts, SessionPhase, TouchMode};

/// Derive the presentation record using the default status texts.
pub fn derive_presentation(facts: &SessionFacts) -> PresentationRecord {
    derive_presentation_with(facts, &StatusTexts::default())
}

/// Derive the presentation record.
///
/// Precedence (first match wins):
/// 1. error text set: show it, settings only.
/// 2. service absent: "no permission" text, settings only.
/// 3. service running with a display source: mirroring text, stop button
///    iff elevated permission is held, touch-mode button iff single-app mode.
/// 4. otherwise: "connect a display" text plus one address per line.
pub fn derive_presentation_with(facts: &SessionFacts, texts: &StatusTexts) -> PresentationRecord {
    match SessionPhase::of(facts) {
        SessionPhase::Error => settings_only(facts.error_text.clone().unwrap_or_default()),
        SessionPhase::NoPermission => settings_only(texts.no_permission.clone()),
        SessionPhase::Mirroring => {
            let touch_mode_visible = facts.single_app_mode;
            let touch_mode_label = touch_mode_visible.then(|| {
                touch_label(
                    TouchMode::from_preference(facts.use_touchscreen_preference),
                    texts,
                )
            });
            PresentationRecord {
                status_text: texts.mirroring_active.clone(),
                settings_visible: false,
                stop_mirroring_visible: facts.elevated_permission_granted,
                touch_mode_visible,
                touch_mode_label,
            }
        }
        SessionPhase::AwaitingDisplay => {
            settings_only(connect_display_text(&texts.connect_display, &facts.network_addresses))
        }
    }
}

fn settings_only(status_text: String) -> PresentationRecord {
    PresentationRecord {
        status_text,
        settings_visible: true,
        stop_mirroring_visible: false,
        touch_mode_visible: false,
        touch_mode_label: None,
    }
}

fn touch_label(mode: TouchMode, texts: &StatusTexts) -> String {
    match mode {
        TouchMode::Touchscreen => texts.touchscreen.clone(),
        TouchMode::Touchpad => texts.touchpad.clone(),
    }
}

fn connect_display_text(base: &str, addresses: &[String]) -> String {
    let mut text = base.to_owned();
    for addr in addresses {
        text.push('\n');
        text.push_str(addr);
    }
    text
}

// ─── Tests ───────────────────────────────────────────────────────


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::config::DEFAULT_NO_PERMISSION_TEXT;
    use proptest::prelude::*;

    fn arb_facts() -> impl Strategy<Value = SessionFacts> {
        (
            any::<[bool; 6]>(),
            proptest::option::of("[a-z ]{1,24}"),
            proptest::collection::vec("[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}", 0..3),
        )
            .prop_map(|(flags, error_text, network_addresses)| SessionFacts {
                service_running: flags[0],
                virtual_display_present: flags[1],
                single_app_active_display: flags[2],
                elevated_permission_granted: flags[3],
                single_app_mode: flags[4],
                use_touchscreen_preference: flags[5],
                error_text,
                network_addresses,
            })
    }

    proptest! {
        #[test]
        fn error_text_means_settings_only(mut facts in arb_facts(), text in "[a-z]{1,16}") {
            facts.error_text = Some(text.clone());
            let record = derive_presentation(&facts);
            prop_assert_eq!(record.status_text, text);
            prop_assert!(record.settings_visible);
            prop_assert!(!record.stop_mirroring_visible);
            prop_assert!(!record.touch_mode_visible);
        }

        #[test]
        fn service_absent_means_no_permission(mut facts in arb_facts()) {
            facts.error_text = None;
            facts.service_running = false;
            let record = derive_presentation(&facts);
            prop_assert_eq!(record.status_text.as_str(), DEFAULT_NO_PERMISSION_TEXT);
            prop_assert!(record.settings_visible);
            prop_assert!(!record.stop_mirroring_visible);
            prop_assert!(!record.touch_mode_visible);
        }

        #[test]
        fn derivation_is_deterministic(facts in arb_facts()) {
            prop_assert_eq!(derive_presentation(&facts), derive_presentation(&facts));
        }

        #[test]
        fn label_present_iff_touch_mode_visible(facts in arb_facts()) {
            let record = derive_presentation(&facts);
            prop_assert_eq!(record.touch_mode_visible, record.touch_mode_label.is_some());
        }

        #[test]
        fn settings_and_stop_are_exclusive(facts in arb_facts()) {
            let record = derive_presentation(&facts);
            prop_assert!(!(record.settings_visible && record.stop_mirroring_visible));
        }
    }
}
