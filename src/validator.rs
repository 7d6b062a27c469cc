//! Sequential validation pipeline for ADX projects.
//!
//! A run builds a [`Plan`] of named steps from the [`RunOptions`], then
//! dispatches them strictly one at a time. Steps report events (success,
//! warning, error) through the [`ValidationContext`] and resume with a
//! `Result`: the first `Err` aborts the run and no later step executes.
//!
//! After `initConfigXMLDoc` the plan is pruned for the project type through
//! [`ValidationContext::remove_upcoming`]. The reported `total` is the plan
//! length once the run ends, so it reflects that pruning.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ValidatorSettings;
use crate::configurator::{CONFIG_FILE_NAME, Configurator};
use crate::error::{AdxError, Result};
use crate::output::format_duration;
use crate::report::Report;
use crate::resources::DirResources;
use crate::rules::{self, Findings};
use crate::runner::{ProcessTestShell, TestShell};
use crate::schema::{SchemaValidator, build_schema_validator, bundled_schemas_dir};
use crate::writer::{PrintMode, Severity, Writer, WriterHub};

/// Options of one validation run
#[derive(Clone)]
pub struct RunOptions {
    /// Run `runADXUnitTests`
    pub test: bool,
    /// Run `runAutoTests`
    pub auto_test: bool,
    /// Include the schema and config.xml content steps
    pub xml: bool,
    pub print_mode: PrintMode,
    pub logger: Option<Arc<dyn Writer>>,
    /// Long-lived test runner used by `runAutoTests` instead of a new process
    pub shell: Option<Arc<dyn TestShell>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            test: false,
            auto_test: false,
            xml: true,
            print_mode: PrintMode::Default,
            logger: None,
            shell: None,
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("test", &self.test)
            .field("auto_test", &self.auto_test)
            .field("xml", &self.xml)
            .field("print_mode", &self.print_mode)
            .field("has_logger", &self.logger.is_some())
            .field("has_shell", &self.shell.is_some())
            .finish()
    }
}

/// Registry of every validation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepId {
    ValidateFileStructure,
    ValidateFileExtensions,
    ValidateXmlAgainstXsd,
    InitConfigXmlDoc,
    ValidateAdxInfo,
    ValidateAdxInfoConstraints,
    ValidateAdxOutputs,
    ValidateAdxProperties,
    ValidateMasterPage,
    RunAdxUnitTests,
    RunAutoTests,
}

impl StepId {
    pub const ALL: [StepId; 11] = [
        StepId::ValidateFileStructure,
        StepId::ValidateFileExtensions,
        StepId::ValidateXmlAgainstXsd,
        StepId::InitConfigXmlDoc,
        StepId::ValidateAdxInfo,
        StepId::ValidateAdxInfoConstraints,
        StepId::ValidateAdxOutputs,
        StepId::ValidateAdxProperties,
        StepId::ValidateMasterPage,
        StepId::RunAdxUnitTests,
        StepId::RunAutoTests,
    ];

    /// Steps that always run
    pub const BASE: [StepId; 2] = [StepId::ValidateFileStructure, StepId::ValidateFileExtensions];

    /// Steps added when `xml` is enabled, in order
    pub const XML: [StepId; 7] = [
        StepId::ValidateXmlAgainstXsd,
        StepId::InitConfigXmlDoc,
        StepId::ValidateAdxInfo,
        StepId::ValidateAdxInfoConstraints,
        StepId::ValidateAdxOutputs,
        StepId::ValidateAdxProperties,
        StepId::ValidateMasterPage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StepId::ValidateFileStructure => "validateFileStructure",
            StepId::ValidateFileExtensions => "validateFileExtensions",
            StepId::ValidateXmlAgainstXsd => "validateXMLAgainstXSD",
            StepId::InitConfigXmlDoc => "initConfigXMLDoc",
            StepId::ValidateAdxInfo => "validateADXInfo",
            StepId::ValidateAdxInfoConstraints => "validateADXInfoConstraints",
            StepId::ValidateAdxOutputs => "validateADXOutputs",
            StepId::ValidateAdxProperties => "validateADXProperties",
            StepId::ValidateMasterPage => "validateMasterPage",
            StepId::RunAdxUnitTests => "runADXUnitTests",
            StepId::RunAutoTests => "runAutoTests",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        StepId::ALL
            .into_iter()
            .find(|step| step.name() == name)
            .ok_or_else(|| AdxError::UnknownStep(name.to_string()))
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered, duplicate-free list of steps with a dispatch cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<StepId>,
    cursor: usize,
}

impl Plan {
    pub fn build(options: &RunOptions) -> Self {
        let mut plan = Plan::default();
        for step in StepId::BASE {
            plan.insert(step);
        }
        if options.xml {
            for step in StepId::XML {
                plan.insert(step);
            }
        }
        if options.test {
            plan.insert(StepId::RunAdxUnitTests);
        }
        if options.auto_test {
            plan.insert(StepId::RunAutoTests);
        }
        plan
    }

    /// Plan from step names, rejecting unknown names
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut plan = Plan::default();
        for name in names {
            plan.insert(StepId::from_name(name)?);
        }
        Ok(plan)
    }

    /// Append `step` unless it is already planned
    pub fn insert(&mut self, step: StepId) -> bool {
        if self.steps.contains(&step) {
            return false;
        }
        self.steps.push(step);
        true
    }

    /// Take the next step to dispatch
    pub fn next(&mut self) -> Option<StepId> {
        let step = self.steps.get(self.cursor).copied();
        if step.is_some() {
            self.cursor += 1;
        }
        step
    }

    /// Remove `step` if it has not been dispatched yet
    pub fn remove_upcoming(&mut self, step: StepId) -> bool {
        match self.steps[self.cursor..].iter().position(|s| *s == step) {
            Some(offset) => {
                self.steps.remove(self.cursor + offset);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, step: StepId) -> bool {
        self.steps.contains(&step)
    }

    pub fn steps(&self) -> &[StepId] {
        &self.steps
    }

    pub fn dispatched(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Aborted,
    Completed,
}

/// Shared state of one run, handed to each step in turn
pub struct ValidationContext {
    project_dir: PathBuf,
    print_mode: PrintMode,
    plan: Plan,
    report: Report,
    state: RunState,
    hub: WriterHub,
    pub(crate) dir_resources: Option<DirResources>,
    pub(crate) configurator: Option<Configurator>,
    pub(crate) schemas_dir: PathBuf,
    pub(crate) bundled_schemas_dir: PathBuf,
    pub(crate) schema_validator: Arc<dyn SchemaValidator>,
    pub(crate) test_shell: Arc<dyn TestShell>,
    pub(crate) interactive_shell: Option<Arc<dyn TestShell>>,
}

impl ValidationContext {
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn print_mode(&self) -> PrintMode {
        self.print_mode
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn configurator(&self) -> Option<&Configurator> {
        self.configurator.as_ref()
    }

    pub fn dir_resources(&self) -> Option<&DirResources> {
        self.dir_resources.as_ref()
    }

    /// Drop a step that has not run yet; the only way a step may shrink the plan
    pub fn remove_upcoming(&mut self, step: StepId) -> bool {
        let removed = self.plan.remove_upcoming(step);
        if removed {
            debug!("Removed {} from the plan", step);
        }
        removed
    }

    /// Write an event and count it
    pub fn emit(&mut self, severity: Severity, text: &str) {
        match severity {
            Severity::Success => self.report.success += 1,
            Severity::Warning => self.report.warnings += 1,
            Severity::Error => self.report.errors += 1,
            Severity::Message => {}
        }
        self.hub.write(severity, text);
    }

    pub fn message(&mut self, text: &str) {
        self.emit(Severity::Message, text);
    }

    pub fn success(&mut self, text: &str) {
        self.emit(Severity::Success, text);
    }

    pub fn warning(&mut self, text: &str) {
        self.emit(Severity::Warning, text);
    }

    pub fn error(&mut self, text: &str) {
        self.emit(Severity::Error, text);
    }

    pub fn record(&mut self, findings: Findings) {
        for (severity, text) in findings.into_events() {
            self.emit(severity, &text);
        }
    }

    /// Run a rule over the loaded configuration and the resources inventory
    pub(crate) fn check_config<F>(&mut self, step: StepId, rule: F) -> Result<()>
    where
        F: FnOnce(&Configurator, &DirResources, &mut Findings) -> Result<()>,
    {
        let configurator = self
            .configurator
            .as_ref()
            .ok_or(AdxError::MissingPrerequisite {
                step: step.name(),
                requires: StepId::InitConfigXmlDoc.name(),
            })?;
        let resources = self
            .dir_resources
            .as_ref()
            .ok_or(AdxError::MissingPrerequisite {
                step: step.name(),
                requires: StepId::ValidateFileStructure.name(),
            })?;

        let mut findings = Findings::default();
        let result = rule(configurator, resources, &mut findings);
        self.record(findings);
        result
    }
}

/// Result of [`Validator::validate`]
#[derive(Debug)]
pub struct ValidationOutcome {
    /// The error that aborted the run, if any
    pub error: Option<AdxError>,
    pub report: Report,
    pub state: RunState,
    /// Plan as it stood when the run ended
    pub plan: Plan,
}

impl ValidationOutcome {
    pub fn is_aborted(&self) -> bool {
        self.state == RunState::Aborted
    }
}

pub struct Validator {
    options: RunOptions,
    schemas_dir: PathBuf,
    bundled_schemas_dir: PathBuf,
    schema_validator: Arc<dyn SchemaValidator>,
    test_shell: Arc<dyn TestShell>,
}

impl Validator {
    pub fn new(options: RunOptions) -> Self {
        Self::from_settings(options, &ValidatorSettings::default())
    }

    pub fn from_settings(options: RunOptions, settings: &ValidatorSettings) -> Self {
        let timeout = Duration::from_secs(settings.process_timeout_seconds);
        Self {
            options,
            schemas_dir: settings.schemas_dir.clone(),
            bundled_schemas_dir: bundled_schemas_dir(),
            schema_validator: build_schema_validator(
                settings.schema_linter,
                &settings.xmllint_path,
                timeout,
            ),
            test_shell: Arc::new(ProcessTestShell::new(&settings.test_runner_path, timeout)),
        }
    }

    pub fn with_schemas_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schemas_dir = dir.into();
        self
    }

    /// Directory receiving the bundled schemas when `schemas_dir` lacks one
    pub fn with_bundled_schemas_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_schemas_dir = dir.into();
        self
    }

    pub fn with_schema_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.schema_validator = validator;
        self
    }

    pub fn with_test_shell(mut self, shell: Arc<dyn TestShell>) -> Self {
        self.test_shell = shell;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Validate the project at `path` (the current directory when `None`)
    pub async fn validate(&self, path: Option<&Path>) -> ValidationOutcome {
        let started = Instant::now();
        let requested = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };

        let mut ctx = self.context(requested.clone());
        ctx.state = RunState::Running;
        info!(
            "Validating {} ({} planned steps)",
            requested.display(),
            ctx.plan.len()
        );

        let result = match preflight(&requested).await {
            Ok(dir) => {
                ctx.project_dir = dir;
                drive(&mut ctx).await
            }
            Err(err) => Err(err),
        };

        finalize(ctx, result, started.elapsed())
    }

    /// Same as [`Validator::validate`], then hands the terminal error and
    /// the report to `callback` exactly once.
    pub async fn validate_with<F>(&self, path: Option<&Path>, callback: F) -> ValidationOutcome
    where
        F: FnOnce(Option<&AdxError>, &Report),
    {
        let outcome = self.validate(path).await;
        callback(outcome.error.as_ref(), &outcome.report);
        outcome
    }

    fn context(&self, project_dir: PathBuf) -> ValidationContext {
        ValidationContext {
            project_dir,
            print_mode: self.options.print_mode,
            plan: Plan::build(&self.options),
            report: Report::default(),
            state: RunState::Idle,
            hub: WriterHub::new(self.options.logger.clone(), self.options.print_mode),
            dir_resources: None,
            configurator: None,
            schemas_dir: self.schemas_dir.clone(),
            bundled_schemas_dir: self.bundled_schemas_dir.clone(),
            schema_validator: Arc::clone(&self.schema_validator),
            test_shell: Arc::clone(&self.test_shell),
            interactive_shell: self.options.shell.clone(),
        }
    }
}

/// Resolve the project directory and require its `config.xml`
async fn preflight(path: &Path) -> Result<PathBuf> {
    let dir = tokio::fs::canonicalize(path)
        .await
        .map_err(|e| AdxError::from_io(e, path))?;
    let config = dir.join(CONFIG_FILE_NAME);
    tokio::fs::metadata(&config)
        .await
        .map_err(|e| AdxError::from_io(e, &config))?;
    Ok(dir)
}

async fn drive(ctx: &mut ValidationContext) -> Result<()> {
    while let Some(step) = ctx.plan.next() {
        debug!("Running step {}", step);
        let result = rules::run(step, ctx).await;
        ctx.report.runs += 1;
        if let Err(err) = result {
            debug!("Step {} aborted the run: {}", step, err);
            return Err(err);
        }
    }
    Ok(())
}

fn finalize(mut ctx: ValidationContext, result: Result<()>, elapsed: Duration) -> ValidationOutcome {
    let error = result.err();
    if let Some(err) = &error {
        ctx.error(&err.to_string());
    }
    ctx.state = if error.is_some() {
        RunState::Aborted
    } else {
        RunState::Completed
    };

    ctx.report.total = ctx.plan.len();
    ctx.report.elapsed = elapsed;
    ctx.message(&format!("Validations finished in {}", format_duration(elapsed)));
    ctx.report.emit(&ctx.hub);

    info!(
        "Validation {:?}: {} run, {} error(s)",
        ctx.state, ctx.report.runs, ctx.report.errors
    );

    ValidationOutcome {
        error,
        report: ctx.report,
        state: ctx.state,
        plan: ctx.plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(xml: bool, test: bool, auto_test: bool) -> RunOptions {
        RunOptions {
            xml,
            test,
            auto_test,
            ..Default::default()
        }
    }

    #[test]
    fn test_step_names_round_trip() {
        for step in StepId::ALL {
            assert_eq!(StepId::from_name(step.name()).unwrap(), step);
        }
        assert_eq!(StepId::ValidateXmlAgainstXsd.name(), "validateXMLAgainstXSD");
        assert_eq!(StepId::RunAdxUnitTests.to_string(), "runADXUnitTests");
    }

    #[test]
    fn test_unknown_step_name_is_rejected() {
        let err = Plan::from_names(["validateFileStructure", "validateEverything"]).unwrap_err();
        assert!(matches!(err, AdxError::UnknownStep(ref name) if name == "validateEverything"));
    }

    #[test]
    fn test_plan_without_xml_has_only_base_steps() {
        let plan = Plan::build(&options(false, false, false));
        assert_eq!(plan.steps(), &StepId::BASE);
    }

    #[test]
    fn test_plan_with_everything() {
        let plan = Plan::build(&options(true, true, true));
        assert_eq!(plan.len(), 11);
        assert_eq!(plan.steps()[2], StepId::ValidateXmlAgainstXsd);
        assert_eq!(plan.steps()[9], StepId::RunAdxUnitTests);
        assert_eq!(plan.steps()[10], StepId::RunAutoTests);
    }

    #[test]
    fn test_plan_test_without_xml() {
        let plan = Plan::build(&options(false, true, false));
        assert_eq!(
            plan.steps(),
            &[
                StepId::ValidateFileStructure,
                StepId::ValidateFileExtensions,
                StepId::RunAdxUnitTests
            ]
        );
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut plan = Plan::default();
        assert!(plan.insert(StepId::ValidateAdxInfo));
        assert!(!plan.insert(StepId::ValidateAdxInfo));
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_remove_upcoming_only_touches_pending_steps() {
        let mut plan = Plan::build(&options(true, false, false));
        assert_eq!(plan.next(), Some(StepId::ValidateFileStructure));
        assert_eq!(plan.next(), Some(StepId::ValidateFileExtensions));

        assert!(!plan.remove_upcoming(StepId::ValidateFileStructure));
        assert!(plan.remove_upcoming(StepId::ValidateMasterPage));
        assert!(!plan.remove_upcoming(StepId::ValidateMasterPage));
        assert!(!plan.remove_upcoming(StepId::RunAutoTests));

        assert_eq!(plan.len(), 8);
        assert_eq!(plan.dispatched(), 2);
        assert_eq!(plan.next(), Some(StepId::ValidateXmlAgainstXsd));
    }

    #[test]
    fn test_next_stops_at_end() {
        let mut plan = Plan::build(&options(false, false, false));
        assert!(plan.next().is_some());
        assert!(plan.next().is_some());
        assert_eq!(plan.next(), None);
        assert_eq!(plan.next(), None);
        assert_eq!(plan.dispatched(), 2);
    }

    mod runs {
        use super::*;
        use crate::runner::{MockTestShell, ShellOutput};
        use crate::schema::{MockSchemaValidator, SchemaOutcome};
        use crate::writer::RecordingWriter;
        use tempfile::TempDir;

        const ADC: &str = r#"<control version="2.1.0"><info><name>X</name><constraints>
            <constraint on="questions" single="true"/><constraint on="controls" label="true"/>
            </constraints></info></control>"#;

        fn project(config: &str) -> TempDir {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join(CONFIG_FILE_NAME), config).unwrap();
            for sub in ["dynamic", "static", "share"] {
                std::fs::create_dir_all(dir.path().join("resources").join(sub)).unwrap();
            }
            std::fs::create_dir_all(dir.path().join("schemas/adc/2.1.0")).unwrap();
            std::fs::write(dir.path().join("schemas/adc/2.1.0/Config.xsd"), "<xs:schema/>").unwrap();
            dir
        }

        fn never_called_shell() -> Arc<dyn TestShell> {
            let mut shell = MockTestShell::new();
            shell.expect_run().never();
            Arc::new(shell)
        }

        #[tokio::test]
        async fn test_schema_violation_aborts_the_run() {
            let dir = project(ADC);
            let mut linter = MockSchemaValidator::new();
            linter.expect_validate().times(1).returning(|_, _| {
                Ok(SchemaOutcome::Invalid {
                    errors: vec!["line 1: Element 'info': missing child".to_string()],
                })
            });

            let recorder = Arc::new(RecordingWriter::new());
            let validator = Validator::new(RunOptions {
                logger: Some(recorder.clone()),
                ..Default::default()
            })
            .with_schemas_dir(dir.path().join("schemas"))
            .with_schema_validator(Arc::new(linter))
            .with_test_shell(never_called_shell());

            let outcome = validator.validate(Some(dir.path())).await;

            assert_eq!(outcome.state, RunState::Aborted);
            assert!(matches!(outcome.error, Some(AdxError::SchemaValidation { .. })));
            assert_eq!(outcome.report.runs, 3);
            assert_eq!(outcome.report.total, 9);
            assert_eq!(outcome.report.errors, 1);
            assert!(recorder.lines(Severity::Error)[0].contains("missing child"));
        }

        #[tokio::test]
        async fn test_auto_tests_use_interactive_shell_in_html_mode() {
            let dir = project(ADC);
            let expected = dir.path().canonicalize().unwrap().display().to_string();

            let mut interactive = MockTestShell::new();
            interactive
                .expect_run()
                .withf(move |args| {
                    args == &vec![expected.clone(), "--auto".to_string(), "--html".to_string()]
                })
                .times(1)
                .returning(|_| {
                    Ok(ShellOutput {
                        code: Some(0),
                        stdout: "ok".to_string(),
                        stderr: String::new(),
                    })
                });

            let recorder = Arc::new(RecordingWriter::new());
            let validator = Validator::new(RunOptions {
                xml: false,
                auto_test: true,
                print_mode: PrintMode::Html,
                logger: Some(recorder.clone()),
                shell: Some(Arc::new(interactive)),
                ..Default::default()
            })
            .with_test_shell(never_called_shell());

            let outcome = validator.validate(Some(dir.path())).await;

            assert!(outcome.error.is_none(), "{:?}", outcome.error);
            assert_eq!(outcome.report.runs, 3);
            assert!(
                recorder
                    .lines(Severity::Success)
                    .contains(&"<div class=\"success\">Auto tests passed</div>".to_string())
            );
        }

        #[tokio::test]
        async fn test_validate_with_invokes_callback_once() {
            let dir = TempDir::new().unwrap();
            let validator = Validator::new(RunOptions {
                logger: Some(Arc::new(RecordingWriter::new())),
                ..Default::default()
            });

            let mut calls = 0;
            let outcome = validator
                .validate_with(Some(dir.path()), |err, report| {
                    calls += 1;
                    assert!(err.is_some());
                    assert_eq!(report.runs, 0);
                })
                .await;

            assert_eq!(calls, 1);
            assert!(outcome.is_aborted());
        }
    }

    #[test]
    fn test_default_options_enable_xml_only() {
        let options = RunOptions::default();
        assert!(options.xml);
        assert!(!options.test);
        assert!(!options.auto_test);
        assert_eq!(options.print_mode, PrintMode::Default);
    }
}
