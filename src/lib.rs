//! # adxutil Library
//!
//! Tooling for ADX survey plugin projects (ADC controls and ADP pages):
//! a `config.xml` configurator, a sequential validation pipeline with a
//! leveled report, and a ZenDesk help center publisher.

pub mod cli;
pub mod config;
pub mod configurator;
pub mod error;
pub mod http_client;
pub mod libxml2;
pub mod model;
pub mod output;
pub mod publisher;
pub mod report;
pub mod resources;
pub mod rules;
pub mod runner;
pub mod schema;
pub mod template;
pub mod validator;
pub mod writer;
pub mod xml;

pub use cli::{Cli, Command, VerbosityLevel};
pub use config::{ConfigManager, OutputSettings, PublisherSettings, Settings, ValidatorSettings};
pub use configurator::{CONFIG_FILE_NAME, Configurator};
pub use error::{AdxError, ConfigError, ConfiguratorError, LibXml2Error, Result};
pub use http_client::{AsyncHttpClient, Credentials, HttpClientConfig};
pub use libxml2::{LibXml2Wrapper, ValidationResult, XmlSchemaPtr};
pub use model::{
    Category, Constraint, Content, ContentAttribute, Info, Output, Outputs, ProjectType,
    Properties, Property, PropertyOption, Style,
};
pub use publisher::{PublishFiles, PublishOutcome, ZenDeskPublisher};
pub use report::{Report, ReportLevel};
pub use resources::{DirListing, DirResources, ResourceMode};
pub use runner::{ProcessTestShell, ShellOutput, TestShell};
pub use schema::{SchemaLinter, SchemaOutcome, SchemaTarget, SchemaValidator};
pub use validator::{
    Plan, RunOptions, RunState, StepId, ValidationContext, ValidationOutcome, Validator,
};
pub use writer::{ConsoleWriter, PrintMode, RecordingWriter, Severity, Writer, WriterHub};
