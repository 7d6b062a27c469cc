use crate::cli::{Cli, Command};
use crate::error::{ConfigError, ConfigResult as Result};
use crate::output::OutputFormat;
use crate::schema::SchemaLinter;
use crate::writer::PrintMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub validator: ValidatorSettings,
    pub publisher: PublisherSettings,
    pub output: OutputSettings,
}

/// Validator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidatorSettings {
    /// Root of the `{adc|adp}/{version}/Config.xsd` tree
    pub schemas_dir: PathBuf,
    pub schema_linter: SchemaLinter,
    pub xmllint_path: PathBuf,
    /// Executable running unit and auto tests
    pub test_runner_path: PathBuf,
    /// Upper bound for any spawned process
    pub process_timeout_seconds: u64,
}

/// ZenDesk publisher settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublisherSettings {
    /// Help center base URL, e.g. `https://example.zendesk.com`
    pub url: String,
    pub username: String,
    /// API token; takes precedence over `password`
    pub token: Option<String>,
    pub password: Option<String>,
    /// Name of the section receiving the article
    pub section: String,
    pub locale: String,
    pub promoted: bool,
    pub comments_disabled: bool,
    /// Article body template; the built-in template is used when unset
    pub template: Option<PathBuf>,
    pub demo_url: Option<String>,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub print_mode: PrintMode,
    pub format: OutputFormat,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            schemas_dir: dirs::data_dir()
                .map(|dir| dir.join("adxutil").join("schemas"))
                .unwrap_or_else(|| PathBuf::from("schemas")),
            schema_linter: SchemaLinter::default(),
            xmllint_path: PathBuf::from("xmllint"),
            test_runner_path: PathBuf::from("ADXShell"),
            process_timeout_seconds: 300,
        }
    }
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            token: None,
            password: None,
            section: String::new(),
            locale: "en-us".to_string(),
            promoted: false,
            comments_disabled: false,
            template: None,
            demo_url: None,
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            print_mode: PrintMode::Default,
            format: OutputFormat::Human,
            verbose: false,
            quiet: false,
        }
    }
}

const CONFIG_NAMES: [&str; 4] = [
    "adxutil.toml",
    "adxutil.json",
    ".adxutil.toml",
    ".adxutil.json",
];

/// Loads and merges settings
pub struct ConfigManager;

impl ConfigManager {
    /// Load settings with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Settings> {
        Self::load_config_with(&SystemEnvProvider, cli).await
    }

    pub async fn load_config_with(env: &impl EnvProvider, cli: &Cli) -> Result<Settings> {
        let settings = match &cli.config {
            Some(path) => Self::load_from_file(path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        let settings = Self::apply_environment_overrides_with(env, settings)?;
        let settings = Self::merge_with_cli(settings, cli);
        Self::validate_settings(&settings)?;
        Ok(settings)
    }

    /// Load settings from a file (TOML or JSON); missing keys keep their defaults
    pub async fn load_from_file(path: &Path) -> Result<Settings> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                if let Ok(settings) = toml::from_str::<Settings>(&content) {
                    Ok(settings)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find a settings file in the current directory, then in the user config directory
    pub async fn find_config_file() -> Result<Option<Settings>> {
        let mut dirs = vec![PathBuf::new()];
        if let Some(config_dir) = dirs::config_dir() {
            dirs.push(config_dir.join("adxutil"));
        }
        Self::find_config_file_in(&dirs).await
    }

    pub async fn find_config_file_in(dirs: &[PathBuf]) -> Result<Option<Settings>> {
        for dir in dirs {
            for name in CONFIG_NAMES {
                let path = dir.join(name);
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }
        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(settings: Settings) -> Result<Settings> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, settings)
    }

    /// Apply `ADXUTIL_*` overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut settings: Settings,
    ) -> Result<Settings> {
        // Validator
        if let Some(dir) = env.get("ADXUTIL_SCHEMAS_DIR") {
            settings.validator.schemas_dir = PathBuf::from(dir);
        }
        if let Some(linter) = parse_env(env, "ADXUTIL_SCHEMA_LINTER")? {
            settings.validator.schema_linter = linter;
        }
        if let Some(path) = env.get("ADXUTIL_XMLLINT_PATH") {
            settings.validator.xmllint_path = PathBuf::from(path);
        }
        if let Some(path) = env.get("ADXUTIL_TEST_RUNNER") {
            settings.validator.test_runner_path = PathBuf::from(path);
        }
        if let Some(timeout) = parse_env(env, "ADXUTIL_PROCESS_TIMEOUT")? {
            settings.validator.process_timeout_seconds = timeout;
        }

        // Publisher
        if let Some(url) = env.get("ADXUTIL_ZENDESK_URL") {
            settings.publisher.url = url;
        }
        if let Some(username) = env.get("ADXUTIL_ZENDESK_USERNAME") {
            settings.publisher.username = username;
        }
        if let Some(token) = env.get("ADXUTIL_ZENDESK_TOKEN") {
            settings.publisher.token = Some(token);
        }
        if let Some(password) = env.get("ADXUTIL_ZENDESK_PASSWORD") {
            settings.publisher.password = Some(password);
        }
        if let Some(section) = env.get("ADXUTIL_ZENDESK_SECTION") {
            settings.publisher.section = section;
        }
        if let Some(locale) = env.get("ADXUTIL_ZENDESK_LOCALE") {
            settings.publisher.locale = locale;
        }
        if let Some(timeout) = parse_env(env, "ADXUTIL_HTTP_TIMEOUT")? {
            settings.publisher.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = parse_env(env, "ADXUTIL_RETRY_ATTEMPTS")? {
            settings.publisher.retry_attempts = retry_attempts;
        }

        // Output
        if let Some(print_mode) = parse_env(env, "ADXUTIL_PRINT_MODE")? {
            settings.output.print_mode = print_mode;
        }
        if let Some(format) = parse_env(env, "ADXUTIL_FORMAT")? {
            settings.output.format = format;
        }
        if let Some(verbose) = parse_env(env, "ADXUTIL_VERBOSE")? {
            settings.output.verbose = verbose;
        }
        if let Some(quiet) = parse_env(env, "ADXUTIL_QUIET")? {
            settings.output.quiet = quiet;
        }

        Ok(settings)
    }

    /// Merge CLI arguments into the settings (CLI takes precedence)
    pub fn merge_with_cli(mut settings: Settings, cli: &Cli) -> Settings {
        if cli.verbose {
            settings.output.verbose = true;
            settings.output.quiet = false;
        }
        if cli.quiet {
            settings.output.quiet = true;
            settings.output.verbose = false;
        }

        match &cli.command {
            Command::Validate(args) => {
                if let Some(dir) = &args.schemas_dir {
                    settings.validator.schemas_dir = dir.clone();
                }
                if let Some(linter) = args.linter {
                    settings.validator.schema_linter = linter;
                }
                if let Some(timeout) = args.timeout {
                    settings.validator.process_timeout_seconds = timeout;
                }
                if args.html {
                    settings.output.print_mode = PrintMode::Html;
                }
                if let Some(format) = args.format {
                    settings.output.format = format;
                }
            }
            Command::Publish(args) => {
                if let Some(section) = &args.section {
                    settings.publisher.section = section.clone();
                }
                if let Some(url) = &args.url {
                    settings.publisher.url = url.clone();
                }
                if let Some(username) = &args.username {
                    settings.publisher.username = username.clone();
                }
                if let Some(token) = &args.token {
                    settings.publisher.token = Some(token.clone());
                }
                if let Some(locale) = &args.locale {
                    settings.publisher.locale = locale.clone();
                }
            }
            Command::Show(_) => {}
        }

        settings
    }

    /// Validate settings shared by every command
    pub fn validate_settings(settings: &Settings) -> Result<()> {
        if settings.validator.process_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Process timeout must be greater than 0".to_string(),
            ));
        }

        if settings.publisher.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "HTTP timeout must be greater than 0".to_string(),
            ));
        }

        if settings.publisher.retry_attempts > 10 {
            return Err(ConfigError::Validation(
                "Retry attempts cannot exceed 10".to_string(),
            ));
        }

        if settings.publisher.locale.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Locale cannot be empty".to_string(),
            ));
        }

        if settings.output.verbose && settings.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Ok(())
    }

    /// Extra checks before talking to ZenDesk
    pub fn validate_publisher(publisher: &PublisherSettings) -> Result<()> {
        if publisher.url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ZenDesk URL is required to publish".to_string(),
            ));
        }
        if !publisher.url.starts_with("http://") && !publisher.url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "Invalid ZenDesk URL: {}",
                publisher.url
            )));
        }
        if publisher.username.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ZenDesk username is required to publish".to_string(),
            ));
        }
        if publisher.token.is_none() && publisher.password.is_none() {
            return Err(ConfigError::Validation(
                "Either a ZenDesk token or a password is required to publish".to_string(),
            ));
        }
        if publisher.section.trim().is_empty() {
            return Err(ConfigError::Validation(
                "A help center section is required to publish".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_process_timeout(settings: &Settings) -> Duration {
        Duration::from_secs(settings.validator.process_timeout_seconds)
    }

    pub fn get_http_timeout(settings: &Settings) -> Duration {
        Duration::from_secs(settings.publisher.timeout_seconds)
    }
}

fn parse_env<T: FromStr>(env: &impl EnvProvider, key: &str) -> Result<Option<T>> {
    env.get(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
        })
        .transpose()
}
