//! Final rendering of a run
//!
//! Step events are streamed through the [`crate::writer`] as they happen; this
//! module only renders what is left once the run is over: the closing status
//! line in human mode, or a single JSON document for scripts.

use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::report::{Report, ReportLevel};
use crate::validator::{RunState, ValidationOutcome};

/// How the final result is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format `{}`", other)),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutcome<'a> {
    level: ReportLevel,
    state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    steps: Vec<&'static str>,
    report: &'a Report,
}

pub struct Output {
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn without_colors(mut self) -> Self {
        self.show_colors = false;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_outcome(&self, outcome: &ValidationOutcome) -> String {
        match self.format {
            OutputFormat::Human => self.format_human(outcome),
            OutputFormat::Json => format_json(outcome),
        }
    }

    fn format_human(&self, outcome: &ValidationOutcome) -> String {
        let report = &outcome.report;
        let status = match report.level() {
            ReportLevel::Success => self.colorize("✓ SUCCESS", "32"),
            ReportLevel::Warning => self.colorize("! WARNING", "33"),
            ReportLevel::Error => self.colorize("✗ ERROR", "31"),
        };

        let mut output = format!("{}  {}", status, report.summary());
        if outcome.is_aborted() {
            output.push_str(&format!(
                "\n  {} {}",
                self.colorize("Aborted:", "31"),
                outcome
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default()
            ));
        }
        output.push_str(&format!("\n  Duration: {}", format_duration(report.elapsed)));
        output
    }
}

fn format_json(outcome: &ValidationOutcome) -> String {
    let document = JsonOutcome {
        level: outcome.report.level(),
        state: outcome.state,
        error: outcome.error.as_ref().map(|e| e.to_string()),
        steps: outcome.plan.steps().iter().map(|step| step.name()).collect(),
        report: &outcome.report,
    };
    serde_json::to_string_pretty(&document).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
}

pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
