use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::writer::{Severity, WriterHub};

/// Overall classification of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    Success,
    Warning,
    Error,
}

impl ReportLevel {
    pub fn severity(&self) -> Severity {
        match self {
            ReportLevel::Success => Severity::Success,
            ReportLevel::Warning => Severity::Warning,
            ReportLevel::Error => Severity::Error,
        }
    }
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Counters of one validation run. Event counters only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Steps that completed (the aborting step included)
    pub runs: usize,
    /// Plan length after pruning
    pub total: usize,
    pub success: usize,
    pub warnings: usize,
    pub errors: usize,
    #[serde(rename = "elapsedMs", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl Report {
    pub fn level(&self) -> ReportLevel {
        if self.errors > 0 {
            ReportLevel::Error
        } else if self.warnings > 0 {
            ReportLevel::Warning
        } else {
            ReportLevel::Success
        }
    }

    pub fn not_run(&self) -> usize {
        self.total.saturating_sub(self.runs)
    }

    pub fn summary(&self) -> String {
        format!(
            "{}/{} validators run, {} not run, {} success, {} warning(s), {} error(s)",
            self.runs,
            self.total,
            self.not_run(),
            self.success,
            self.warnings,
            self.errors
        )
    }

    /// Write the summary at the severity matching [`Report::level`]
    pub fn emit(&self, hub: &WriterHub) {
        hub.write(self.level().severity(), &self.summary());
    }
}
