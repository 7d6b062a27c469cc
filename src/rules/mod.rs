//! Rule steps of the validation pipeline.
//!
//! Pure checks take the loaded configuration and a [`Findings`] collector;
//! the context records the findings once the check returns, whatever its
//! outcome.

mod config_doc;
pub mod constraints;
pub mod extensions;
pub mod info;
pub mod master_page;
pub mod outputs;
pub mod properties;
mod structure;
mod xsd;

use crate::error::Result;
use crate::validator::{StepId, ValidationContext};
use crate::writer::Severity;

/// Events produced by a check, in emission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Findings {
    events: Vec<(Severity, String)>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, text: impl Into<String>) {
        self.events.push((severity, text.into()));
    }

    pub fn message(&mut self, text: impl Into<String>) {
        self.push(Severity::Message, text);
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.push(Severity::Success, text);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.push(Severity::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(Severity::Error, text);
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.events.iter().filter(|(s, _)| *s == severity).count()
    }

    pub fn lines(&self, severity: Severity) -> Vec<&str> {
        self.events
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    pub fn events(&self) -> &[(Severity, String)] {
        &self.events
    }

    pub fn into_events(self) -> Vec<(Severity, String)> {
        self.events
    }
}

/// Dispatch one step
pub(crate) async fn run(step: StepId, ctx: &mut ValidationContext) -> Result<()> {
    match step {
        StepId::ValidateFileStructure => structure::validate(ctx).await,
        StepId::ValidateFileExtensions => extensions::run(ctx),
        StepId::ValidateXmlAgainstXsd => xsd::validate(ctx).await,
        StepId::InitConfigXmlDoc => config_doc::init(ctx).await,
        StepId::ValidateAdxInfo => ctx.check_config(step, |config, _, findings| {
            info::validate(config, findings)
        }),
        StepId::ValidateAdxInfoConstraints => ctx.check_config(step, |config, _, findings| {
            constraints::validate(config.info(), findings)
        }),
        StepId::ValidateAdxOutputs => ctx.check_config(step, outputs::validate),
        StepId::ValidateAdxProperties => ctx.check_config(step, |config, _, findings| {
            properties::validate(config.properties(), findings)
        }),
        StepId::ValidateMasterPage => master_page::run(ctx).await,
        StepId::RunAdxUnitTests => unit_tests::run_unit_tests(ctx).await,
        StepId::RunAutoTests => unit_tests::run_auto_tests(ctx).await,
    }
}
