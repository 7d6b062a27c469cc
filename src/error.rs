use std::path::PathBuf;

use thiserror::Error;

/// Main error type shared by the configurator, the validator and the publisher
#[derive(Error, Debug)]
pub enum AdxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no such file or directory: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url} - {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Process `{program}` did not finish within {timeout_seconds} seconds")]
    ProcessTimeout {
        program: String,
        timeout_seconds: u64,
    },

    #[error("Blocking task failed: {details}")]
    Concurrency { details: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Configurator(#[from] ConfiguratorError),

    #[error("LibXML2 internal error: {details}")]
    LibXml2Internal { details: String },

    #[error("XSD validation failed: {} - {details}", file.display())]
    SchemaValidation { file: PathBuf, details: String },

    #[error("Unsupported ADX version `{version}` (expected one of 2.0.0, 2.1.0, 2.2.0, 2.3.0)")]
    UnsupportedVersion { version: String },

    #[error("{0}")]
    Rule(String),

    #[error("Step `{step}` requires `{requires}` to run first")]
    MissingPrerequisite {
        step: &'static str,
        requires: &'static str,
    },

    #[error("Unknown validation step: {0}")]
    UnknownStep(String),

    #[error("Section not found: {name}")]
    SectionNotFound { name: String },

    #[error("Found {count} articles titled `{title}`, expected at most one")]
    DuplicateArticle { title: String, count: usize },

    #[error("Unexpected response from {url}: {details}")]
    UnexpectedResponse { url: String, details: String },
}

impl AdxError {
    /// Convert an IO error into `NotFound` when it refers to a missing path
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AdxError::NotFound { path: path.into() }
        } else {
            AdxError::Io(err)
        }
    }
}

/// Errors raised while mapping `config.xml` to and from the object graph
#[derive(Error, Debug)]
pub enum ConfiguratorError {
    #[error("Malformed XML at byte {position}: {details}")]
    Xml { position: u64, details: String },

    #[error("Unexpected root element `{0}`, expected `control` or `page`")]
    UnknownRoot(String),

    #[error("Empty XML document")]
    EmptyDocument,

    #[error("XML serialization error: {0}")]
    Write(String),
}

/// Settings-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Schema parsing failed: null pointer returned")]
    SchemaParseFailed,

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("File validation failed with code {code}: {}", file.display())]
    ValidationFailed { code: i32, file: PathBuf },

    #[error("Memory allocation failed in libxml2")]
    MemoryAllocation,

    #[error("Invalid path for libxml2: {}", path.display())]
    InvalidPath { path: PathBuf },
}

impl From<ConfigError> for AdxError {
    fn from(err: ConfigError) -> Self {
        AdxError::Config(err.to_string())
    }
}

impl From<LibXml2Error> for AdxError {
    fn from(err: LibXml2Error) -> Self {
        AdxError::LibXml2Internal {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AdxError>;

/// Settings result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
