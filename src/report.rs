//! Text and JSON rendering of decisions and execution reports

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write;

use crate::cli::OutputFormat;
use crate::executor::{ExecutionReport, OutcomeStatus};
use crate::pipeline::Decision;

#[derive(Serialize)]
struct JsonDocument<'a> {
    decision: &'a Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a ExecutionReport>,
}

/// Render a decision, plus its execution report when the plan was run
pub fn render(format: OutputFormat, decision: &Decision, report: Option<&ExecutionReport>) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(decision, report)),
        OutputFormat::Json => serde_json::to_string_pretty(&JsonDocument { decision, report })
            .map(|json| json + "\n")
            .context("Failed to serialize decision"),
    }
}

fn render_text(decision: &Decision, report: Option<&ExecutionReport>) -> String {
    let mut out = String::new();
    let subject = decision
        .event
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "<malformed event>".to_string());

    let _ = writeln!(
        out,
        "{}: {} ({})",
        subject, decision.classification.category, decision.classification.reason
    );

    match report {
        Some(report) => {
            for outcome in &report.outcomes {
                let status = match &outcome.status {
                    OutcomeStatus::Completed => "ok".to_string(),
                    OutcomeStatus::Detached => "detached".to_string(),
                    OutcomeStatus::Failed { error } => format!("FAILED: {}", error),
                };
                let _ = writeln!(out, "  {} ... {}", outcome.action, status);
            }
        }
        None => {
            for action in &decision.actions {
                let _ = writeln!(out, "  {}", action);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FixedSharing, KnownDrives};
    use crate::event::{DeviceAction, DeviceEvent};
    use crate::executor::ActionOutcome;
    use crate::pipeline::decide;

    fn usb_decision() -> Decision {
        let event = DeviceEvent::block("sdb", DeviceAction::Add).with_subsystems(["usb"]);
        decide(event, &KnownDrives::default(), &FixedSharing(true))
    }

    #[test]
    fn test_text_plan() {
        let text = render(OutputFormat::Text, &usb_decision(), None).unwrap();
        assert_eq!(
            text,
            "add block/sdb: block (whole disk)\n  symlink xapi/block/sdb -> sdb\n  run local-device-change sdb &\n"
        );
    }

    #[test]
    fn test_text_report() {
        let decision = usb_decision();
        let report = ExecutionReport {
            outcomes: vec![
                ActionOutcome {
                    action: decision.actions[0].clone(),
                    status: OutcomeStatus::Failed {
                        error: "read-only file system".to_string(),
                    },
                },
                ActionOutcome {
                    action: decision.actions[1].clone(),
                    status: OutcomeStatus::Detached,
                },
            ],
        };

        let text = render(OutputFormat::Text, &decision, Some(&report)).unwrap();
        assert!(text.contains("symlink xapi/block/sdb -> sdb ... FAILED: read-only file system"));
        assert!(text.contains("run local-device-change sdb & ... detached"));
    }

    #[test]
    fn test_json_plan() {
        let json = render(OutputFormat::Json, &usb_decision(), None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["decision"]["classification"]["category"], "usb_block");
        assert_eq!(value["decision"]["classification"]["reason"], "whole_disk");
        assert_eq!(value["decision"]["event"]["kernel_name"], "sdb");
        assert_eq!(value["decision"]["actions"][0]["target"], "xapi/block/sdb");
        assert!(value.get("report").is_none());
    }
}
