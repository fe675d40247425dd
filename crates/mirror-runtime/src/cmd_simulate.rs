//! Scripted session replay against the in-memory host.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use mirror_core::config::MirrorConfig;
use mirror_core::types::{LogEntry, PresentationRecord};
use mirror_session::sim::{SimHost, SimState, SimStep};
use mirror_session::{Collaborators, LogSink, SessionHandle, spawn_session};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    pub host: SimState,
    pub steps: Vec<SimStep>,
}

/// A presentation record as it stood after a step changed it.
#[derive(Debug, Serialize)]
pub struct PublishedRecord {
    /// `None` for the record published at start-up.
    pub step: Option<usize>,
    pub event: String,
    pub record: PresentationRecord,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub records: Vec<PublishedRecord>,
    pub log: Vec<LogEntry>,
    pub host: SimState,
    pub steps_applied: usize,
}

pub async fn cmd_simulate(config: MirrorConfig, script_path: &Path, json: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(script_path)
        .with_context(|| format!("reading script {}", script_path.display()))?;
    let script: Script = serde_json::from_str(&raw).context("parsing simulation script")?;

    let log_tail = config.session.log_tail;
    let report = run_script(config, script).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for published in &report.records {
        let step = published
            .step
            .map_or_else(|| "start".to_string(), |i| format!("#{i}"));
        let record = &published.record;
        println!("[{step} {}] {}", published.event, record.status_text.replace('\n', " | "));
        println!(
            "    settings={} stop={} touch={}",
            record.settings_visible,
            record.stop_mirroring_visible,
            record.touch_mode_label.as_deref().unwrap_or("-"),
        );
    }

    let skip = report.log.len().saturating_sub(log_tail);
    println!("--- log ({} entries) ---", report.log.len());
    for entry in &report.log[skip..] {
        println!("{} {}", entry.timestamp.format("%H:%M:%S%.3f"), entry.message);
    }
    Ok(())
}

pub async fn run_script(config: MirrorConfig, script: Script) -> anyhow::Result<SimulationReport> {
    let codes = config.request_codes;
    let log = LogSink::with_capacity(config.session.log_broadcast_capacity);
    let host = SimHost::new(script.host);
    let cancel = CancellationToken::new();

    let (handle, task) = spawn_session(
        config,
        Collaborators::from_host(host.clone()),
        log.clone(),
        cancel.clone(),
    );
    host.attach(handle.clone());
    settle(&handle).await;

    let mut last = handle.presentation();
    let mut records = vec![PublishedRecord {
        step: None,
        event: "start".to_string(),
        record: last.clone(),
    }];

    let mut steps_applied = 0;
    for (i, step) in script.steps.iter().enumerate() {
        host.apply(&handle, step, &codes);
        steps_applied += 1;
        let open = settle(&handle).await;

        let record = handle.presentation();
        if record != last {
            records.push(PublishedRecord {
                step: Some(i),
                event: event_name(step),
                record: record.clone(),
            });
            last = record;
        }
        if !open {
            tracing::info!(step = i, "session ended, skipping remaining steps");
            break;
        }
    }

    cancel.cancel();
    task.await.context("session task failed")?;

    Ok(SimulationReport {
        records,
        log: log.snapshot(),
        host: host.state(),
        steps_applied,
    })
}

/// Two flushes: the first drains the step, the second drains anything the
/// host sent back while the step was being applied.
async fn settle(handle: &SessionHandle) -> bool {
    handle.flush().await && handle.flush().await
}

fn event_name(step: &SimStep) -> String {
    serde_json::to_value(step)
        .ok()
        .and_then(|v| v.get("event").and_then(|e| e.as_str()).map(str::to_owned))
        .unwrap_or_else(|| "step".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::config::DEFAULT_MIRRORING_ACTIVE_TEXT;

    fn parse(raw: &str) -> Script {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn grant_and_display_reaches_mirroring() {
        let script = parse(
            r#"{
                "host": { "auto_report_service_start": true, "elevated_granted": true },
                "steps": [
                    { "event": "capture_result", "granted": true },
                    { "event": "attach_display", "display_id": 7 }
                ]
            }"#,
        );
        let report = run_script(MirrorConfig::default(), script).await.unwrap();

        assert_eq!(report.steps_applied, 2);
        let last = &report.records.last().unwrap().record;
        assert_eq!(last.status_text, DEFAULT_MIRRORING_ACTIVE_TEXT);
        assert!(last.stop_mirroring_visible);
        assert_eq!(report.host.capture_requests, vec![1001]);
        assert_eq!(report.host.started_with.len(), 1);
    }

    #[tokio::test]
    async fn exit_stops_replay() {
        let script = parse(
            r#"{
                "host": { "service_exists": true },
                "steps": [
                    { "event": "exit" },
                    { "event": "refresh" },
                    { "event": "refresh" }
                ]
            }"#,
        );
        let report = run_script(MirrorConfig::default(), script).await.unwrap();

        assert_eq!(report.steps_applied, 1);
        assert_eq!(report.host.exit_calls, 1);
    }

    #[tokio::test]
    async fn unchanged_records_are_not_repeated() {
        let script = parse(
            r#"{
                "steps": [
                    { "event": "refresh" },
                    { "event": "refresh" }
                ]
            }"#,
        );
        let report = run_script(MirrorConfig::default(), script).await.unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].event, "start");
    }

    #[test]
    fn event_names_follow_the_script_tags() {
        assert_eq!(event_name(&SimStep::SwitchTouchMode), "switch_touch_mode");
        assert_eq!(
            event_name(&SimStep::ReportError { text: "x".into() }),
            "report_error"
        );
    }

    #[tokio::test]
    async fn script_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"{ "steps": [ { "event": "refresh" } ] }"#).unwrap();
        cmd_simulate(MirrorConfig::default(), &path, true).await.unwrap();
    }
}
