//! Schema selection and linting of `config.xml`.
//!
//! The schema is chosen from the root element (`control` / `page`) and its
//! `version` attribute: `{schemas_dir}/{adc|adp}/{version}/Config.xsd`.
//! Projects without an installed schema fall back to the schemas bundled
//! in the crate (`schemas/{adc,adp}/Config.xsd`).

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AdxError, ConfiguratorError, Result};
use crate::libxml2::{LibXml2Wrapper, ValidationResult};
use crate::model::ProjectType;
use crate::runner::run_process;
use crate::xml;

pub const SUPPORTED_VERSIONS: [&str; 4] = ["2.0.0", "2.1.0", "2.2.0", "2.3.0"];

/// Version assumed when the root element has no `version` attribute
pub const DEFAULT_VERSION: &str = "2.0.0";

pub const SCHEMA_FILE_NAME: &str = "Config.xsd";

pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

/// Compare dotted versions numerically; missing or non-numeric parts count as 0
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub fn version_at_least(version: &str, min: &str) -> bool {
    compare_versions(version, min) != Ordering::Less
}

/// Project type and schema version announced by a `config.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTarget {
    pub project_type: ProjectType,
    pub version: String,
}

impl SchemaTarget {
    /// Read the root element of `config_path` without mapping the whole document
    pub async fn sniff(config_path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(config_path)
            .await
            .map_err(|e| AdxError::from_io(e, config_path))?;
        let root = xml::read_root(&text)?;

        let project_type = ProjectType::from_root(&root.name)
            .ok_or_else(|| ConfiguratorError::UnknownRoot(root.name.clone()))?;
        let version = root.attr("version").unwrap_or(DEFAULT_VERSION).to_string();
        if !is_supported_version(&version) {
            return Err(AdxError::UnsupportedVersion { version });
        }

        Ok(Self {
            project_type,
            version,
        })
    }

    pub fn schema_path(&self, schemas_dir: &Path) -> PathBuf {
        schemas_dir
            .join(self.project_type.as_str())
            .join(&self.version)
            .join(SCHEMA_FILE_NAME)
    }

    /// Schema shipped with the crate for this project type
    pub fn bundled_schema(&self) -> &'static str {
        match self.project_type {
            ProjectType::Adc => BUNDLED_ADC_SCHEMA,
            ProjectType::Adp => BUNDLED_ADP_SCHEMA,
        }
    }
}

pub const BUNDLED_ADC_SCHEMA: &str = include_str!("../schemas/adc/Config.xsd");
pub const BUNDLED_ADP_SCHEMA: &str = include_str!("../schemas/adp/Config.xsd");

static BUNDLED_WRITES: AtomicUsize = AtomicUsize::new(0);

/// Where bundled schemas are unpacked for the linters, which read from files
pub fn bundled_schemas_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("adxutil")
        .join("schemas")
        .join(env!("CARGO_PKG_VERSION"))
}

/// Schema file for `target`: `{schemas_dir}/{type}/{version}/Config.xsd`
/// when present, otherwise the bundled schema unpacked under `bundle_dir`.
pub async fn resolve_schema(
    target: &SchemaTarget,
    schemas_dir: &Path,
    bundle_dir: &Path,
) -> Result<PathBuf> {
    let installed = target.schema_path(schemas_dir);
    if tokio::fs::try_exists(&installed).await.unwrap_or(false) {
        return Ok(installed);
    }

    let bundled = match unpack_bundled(target, bundle_dir).await {
        Ok(path) => path,
        Err(err) => {
            warn!("Cannot unpack schemas under {}: {}", bundle_dir.display(), err);
            let fallback = std::env::temp_dir()
                .join("adxutil-schemas")
                .join(env!("CARGO_PKG_VERSION"));
            unpack_bundled(target, &fallback).await?
        }
    };
    debug!(
        "No schema at {}, using bundled {}",
        installed.display(),
        bundled.display()
    );
    Ok(bundled)
}

async fn unpack_bundled(target: &SchemaTarget, bundle_dir: &Path) -> Result<PathBuf> {
    let path = target.schema_path(bundle_dir);
    let content = target.bundled_schema();
    let current = tokio::fs::read_to_string(&path).await.ok();
    if current.as_deref() != Some(content) {
        unpack(&path, content).await?;
    }
    Ok(path)
}

/// Write through a unique temporary file and rename, so concurrent runs
/// never read a partial schema
async fn unpack(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AdxError::from_io(e, parent))?;
    }
    let tmp = path.with_extension(format!(
        "xsd.{}.{}.tmp",
        std::process::id(),
        BUNDLED_WRITES.fetch_add(1, AtomicOrdering::Relaxed)
    ));
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| AdxError::from_io(e, &tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AdxError::from_io(e, path))
}

/// Outcome of linting one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOutcome {
    Valid,
    Invalid { errors: Vec<String> },
}

/// Black-box XSD linter
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    async fn validate(&self, schema: &Path, document: &Path) -> Result<SchemaOutcome>;
}

/// Which linter implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaLinter {
    #[default]
    Libxml2,
    Xmllint,
}

impl std::str::FromStr for SchemaLinter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "libxml2" => Ok(SchemaLinter::Libxml2),
            "xmllint" => Ok(SchemaLinter::Xmllint),
            other => Err(format!("Unknown schema linter: {}", other)),
        }
    }
}

/// In-process linter over the libxml2 FFI wrapper
#[derive(Clone)]
pub struct LibXml2SchemaValidator {
    wrapper: Arc<LibXml2Wrapper>,
}

impl LibXml2SchemaValidator {
    pub fn new() -> Self {
        Self {
            wrapper: Arc::new(LibXml2Wrapper::new()),
        }
    }
}

impl Default for LibXml2SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchemaValidator for LibXml2SchemaValidator {
    async fn validate(&self, schema: &Path, document: &Path) -> Result<SchemaOutcome> {
        let wrapper = Arc::clone(&self.wrapper);
        let schema = schema.to_path_buf();
        let document = document.to_path_buf();

        // Parsing and validation block; keep them off the runtime threads
        let result = tokio::task::spawn_blocking(move || {
            let parsed = match wrapper.parse_schema_from_file(&schema) {
                Ok(parsed) => parsed,
                Err((err, details)) => {
                    return Err(AdxError::SchemaValidation {
                        file: schema,
                        details: if details.is_empty() {
                            err.to_string()
                        } else {
                            details.join("\n")
                        },
                    });
                }
            };
            Ok(wrapper.validate_file(&parsed, &document)?)
        })
        .await
        .map_err(|e| AdxError::Concurrency {
            details: e.to_string(),
        })??;

        Ok(match result {
            ValidationResult::Valid => SchemaOutcome::Valid,
            ValidationResult::Invalid { errors, .. } => SchemaOutcome::Invalid { errors },
            ValidationResult::InternalError { code } => {
                return Err(AdxError::LibXml2Internal {
                    details: format!("Internal error code: {}", code),
                });
            }
        })
    }
}

/// External `xmllint --noout --schema <xsd> <xml>`
#[derive(Debug, Clone)]
pub struct XmllintSchemaValidator {
    program: PathBuf,
    timeout: Duration,
}

impl XmllintSchemaValidator {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn args(schema: &Path, document: &Path) -> Vec<String> {
        vec![
            "--noout".to_string(),
            "--schema".to_string(),
            schema.display().to_string(),
            document.display().to_string(),
        ]
    }
}

#[async_trait]
impl SchemaValidator for XmllintSchemaValidator {
    async fn validate(&self, schema: &Path, document: &Path) -> Result<SchemaOutcome> {
        let output = run_process(&self.program, &Self::args(schema, document), self.timeout).await?;
        debug!("xmllint exited with {:?}", output.code);

        if output.success() {
            return Ok(SchemaOutcome::Valid);
        }

        let errors = output
            .stderr
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.ends_with("fails to validate"))
            .map(str::to_string)
            .collect();
        Ok(SchemaOutcome::Invalid { errors })
    }
}

/// Build the linter selected by the settings
pub fn build_schema_validator(
    linter: SchemaLinter,
    xmllint_path: &Path,
    timeout: Duration,
) -> Arc<dyn SchemaValidator> {
    match linter {
        SchemaLinter::Libxml2 => Arc::new(LibXml2SchemaValidator::new()),
        SchemaLinter::Xmllint => Arc::new(XmllintSchemaValidator::new(xmllint_path, timeout)),
    }
}
