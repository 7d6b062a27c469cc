use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;
use crate::schema::SchemaLinter;

/// Verbosity levels for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only errors reach the terminal
    Quiet,
    #[default]
    Normal,
    /// Step dispatch and HTTP traffic are logged
    Verbose,
}

/// Validate, inspect and publish ADX projects
#[derive(Parser, Debug, Clone)]
#[command(name = "adxutil")]
#[command(about = "Validate, inspect and publish ADX (ADC/ADP) projects")]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML or JSON)
    #[arg(short = 'c', long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Quiet mode
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the validation pipeline over a project directory
    Validate(ValidateArgs),
    /// Publish a packaged project to the ZenDesk help center
    Publish(PublishArgs),
    /// Print a section of `config.xml` as JSON
    Show(ShowArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Project directory (defaults to the current directory)
    pub path: Option<PathBuf>,

    /// Skip the XSD and config.xml content checks
    #[arg(long = "no-xml")]
    pub no_xml: bool,

    /// Run the unit tests under `tests/units`
    #[arg(long = "test")]
    pub test: bool,

    /// Run the fixture-driven auto tests
    #[arg(long = "auto-test")]
    pub auto_test: bool,

    /// Wrap every message in an HTML block
    #[arg(long = "html")]
    pub html: bool,

    /// Root of the `{adc|adp}/{version}/Config.xsd` tree
    #[arg(long = "schemas-dir", value_name = "DIR")]
    pub schemas_dir: Option<PathBuf>,

    /// Schema linter (libxml2 or xmllint)
    #[arg(long = "linter", value_name = "LINTER")]
    pub linter: Option<SchemaLinter>,

    /// Final report format (human or json)
    #[arg(long = "format", value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Timeout for external processes in seconds
    #[arg(long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PublishArgs {
    /// Project directory (defaults to the current directory)
    pub path: Option<PathBuf>,

    /// Help center section receiving the article
    #[arg(long = "section")]
    pub section: Option<String>,

    /// ZenDesk base URL, e.g. https://example.zendesk.com
    #[arg(long = "url")]
    pub url: Option<String>,

    #[arg(long = "username")]
    pub username: Option<String>,

    /// API token (prefer ADXUTIL_ZENDESK_TOKEN)
    #[arg(long = "token")]
    pub token: Option<String>,

    /// Article locale
    #[arg(long = "locale")]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShowSection {
    Info,
    Outputs,
    Properties,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ShowArgs {
    /// Project directory (defaults to the current directory)
    pub path: Option<PathBuf>,

    /// Section to print; all sections when omitted
    #[arg(long = "section", value_enum)]
    pub section: Option<ShowSection>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Project directory of the selected command
    pub fn project_path(&self) -> Option<&Path> {
        match &self.command {
            Command::Validate(args) => args.path.as_deref(),
            Command::Publish(args) => args.path.as_deref(),
            Command::Show(args) => args.path.as_deref(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(path) = self.project_path()
            && !path.exists()
        {
            return Err(format!("Path does not exist: {}", path.display()));
        }
        if let Command::Validate(args) = &self.command
            && args.timeout == Some(0)
        {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_defaults() {
        let cli = Cli::try_parse_from(["adxutil", "validate"]).unwrap();
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.path, None);
        assert!(!args.no_xml);
        assert!(!args.test);
        assert!(!args.auto_test);
        assert!(!args.html);
        assert_eq!(args.format, None);
        assert_eq!(args.linter, None);
    }

    #[test]
    fn test_validate_flags() {
        let cli = Cli::try_parse_from([
            "adxutil",
            "-v",
            "validate",
            "/tmp/project",
            "--no-xml",
            "--test",
            "--auto-test",
            "--html",
            "--linter",
            "xmllint",
            "--format",
            "json",
            "--timeout",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.verbosity(), VerbosityLevel::Verbose);
        assert_eq!(cli.project_path(), Some(Path::new("/tmp/project")));
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert!(args.no_xml && args.test && args.auto_test && args.html);
        assert_eq!(args.linter, Some(SchemaLinter::Xmllint));
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.timeout, Some(5));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["adxutil", "show", ".", "-q", "--config", "a.toml"]).unwrap();
        assert_eq!(cli.verbosity(), VerbosityLevel::Quiet);
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["adxutil", "-v", "-q", "validate"]).is_err());
    }

    #[test]
    fn test_show_section() {
        let cli = Cli::try_parse_from(["adxutil", "show", "--section", "outputs"]).unwrap();
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.section, Some(ShowSection::Outputs));
        assert!(Cli::try_parse_from(["adxutil", "show", "--section", "styles"]).is_err());
    }

    #[test]
    fn test_publish_args() {
        let cli = Cli::try_parse_from([
            "adxutil",
            "publish",
            "--section",
            "Controls",
            "--url",
            "https://example.zendesk.com",
        ])
        .unwrap();
        let Command::Publish(args) = cli.command else {
            panic!("expected publish");
        };
        assert_eq!(args.section.as_deref(), Some("Controls"));
        assert_eq!(args.url.as_deref(), Some("https://example.zendesk.com"));
        assert_eq!(args.token, None);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cli = Cli::try_parse_from(["adxutil", "validate", "--timeout", "0"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
