//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use adxutil::{
    AdxError, RecordingWriter, RunOptions, SchemaOutcome, SchemaValidator, ShellOutput, TestShell,
    Validator,
};
use async_trait::async_trait;
use tempfile::TempDir;

/// Minimal ADC project descriptor that passes every content rule
pub const MINIMAL_ADC: &str = r#"<control><info><name>X</name><constraints><constraint on="questions" single="true"/><constraint on="controls" label="true"/></constraints></info></control>"#;

pub const MINIMAL_ADP: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<page version="2.1.0">
  <info><name>Page</name></info>
  <outputs defaultOutput="main">
    <output id="main" masterPage="master.html" />
  </outputs>
</page>"#;

pub const MASTER_PAGE: &str = r#"<html><head><askia-head/></head>
<body><askia-form><askia-questions/></askia-form><askia-foot/></body></html>"#;

/// Builds an ADX project in a temporary directory
pub struct ProjectBuilder {
    dir: TempDir,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn config(self, xml: &str) -> Self {
        self.file("config.xml", xml)
    }

    /// Create `resources/{dynamic,static,share}`
    pub fn resource_dirs(self) -> Self {
        for sub in ["dynamic", "static", "share"] {
            std::fs::create_dir_all(self.dir.path().join("resources").join(sub))
                .expect("Failed to create resources dir");
        }
        self
    }

    pub fn resource(self, sub: &str, name: &str, content: &str) -> Self {
        self.file(&format!("resources/{}/{}", sub, name), content)
    }

    /// Write a file relative to the project root, creating parents
    pub fn file(self, relative: &str, content: &str) -> Self {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write fixture");
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn build(self) -> TempDir {
        self.dir
    }
}

/// Schema linter answering a fixed outcome and counting calls
pub struct FakeSchemaValidator {
    outcome: SchemaOutcome,
    calls: AtomicUsize,
}

impl FakeSchemaValidator {
    pub fn valid() -> Self {
        Self::with(SchemaOutcome::Valid)
    }

    pub fn invalid(error: &str) -> Self {
        Self::with(SchemaOutcome::Invalid {
            errors: vec![error.to_string()],
        })
    }

    fn with(outcome: SchemaOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaValidator for FakeSchemaValidator {
    async fn validate(&self, _schema: &Path, _document: &Path) -> Result<SchemaOutcome, AdxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.outcome.clone())
    }
}

/// Test runner recording every invocation
pub struct RecordingShell {
    output: ShellOutput,
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingShell {
    pub fn new(code: i32, stdout: &str) -> Self {
        Self {
            output: ShellOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl TestShell for RecordingShell {
    async fn run(&self, args: Vec<String>) -> Result<ShellOutput, AdxError> {
        self.calls.lock().expect("poisoned").push(args);
        Ok(self.output.clone())
    }
}

/// Directory holding a `Config.xsd` for every supported project type and version
pub fn schemas_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    for kind in ["adc", "adp"] {
        for version in ["2.0.0", "2.1.0", "2.2.0", "2.3.0"] {
            let path: PathBuf = dir.path().join(kind).join(version);
            std::fs::create_dir_all(&path).expect("Failed to create schema dir");
            std::fs::write(path.join("Config.xsd"), "<xs:schema/>").expect("Failed to write xsd");
        }
    }
    dir
}

/// Validator wired to fakes; every line is kept by the returned recorder
pub fn validator(
    options: RunOptions,
    schemas: &Path,
    linter: Arc<FakeSchemaValidator>,
    shell: Arc<RecordingShell>,
) -> (Validator, Arc<RecordingWriter>) {
    let recorder = Arc::new(RecordingWriter::new());
    let validator = Validator::new(RunOptions {
        logger: Some(recorder.clone()),
        ..options
    })
    .with_schemas_dir(schemas)
    .with_schema_validator(linter)
    .with_test_shell(shell);
    (validator, recorder)
}
