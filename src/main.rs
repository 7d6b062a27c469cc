use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use adxutil::cli::{Cli, Command, ShowArgs, ShowSection, ValidateArgs, VerbosityLevel};
use adxutil::config::{ConfigManager, Settings};
use adxutil::configurator::Configurator;
use adxutil::output::{Output, OutputFormat};
use adxutil::publisher::ZenDeskPublisher;
use adxutil::report::ReportLevel;
use adxutil::validator::{RunOptions, Validator};
use adxutil::writer::{NullWriter, QuietWriter, Writer};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbosity());

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        return Ok(ExitCode::from(2));
    }

    let settings = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load settings")?;
    let path = match cli.project_path() {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };

    match &cli.command {
        Command::Validate(args) => run_validate(args, &settings, &path).await,
        Command::Publish(_) => run_publish(&settings, &path).await,
        Command::Show(args) => run_show(args, &path).await,
    }
}

fn init_tracing(verbosity: VerbosityLevel) {
    let default = match verbosity {
        VerbosityLevel::Quiet => "adxutil=error",
        VerbosityLevel::Normal => "adxutil=warn",
        VerbosityLevel::Verbose => "adxutil=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// JSON output owns stdout; quiet mode keeps errors only
fn logger(settings: &Settings) -> Option<Arc<dyn Writer>> {
    if settings.output.format == OutputFormat::Json {
        Some(Arc::new(NullWriter))
    } else if settings.output.quiet {
        Some(Arc::new(QuietWriter))
    } else {
        None
    }
}

async fn run_validate(args: &ValidateArgs, settings: &Settings, path: &Path) -> Result<ExitCode> {
    let options = RunOptions {
        test: args.test,
        auto_test: args.auto_test,
        xml: !args.no_xml,
        print_mode: settings.output.print_mode,
        logger: logger(settings),
        shell: None,
    };

    let validator = Validator::from_settings(options, &settings.validator);
    let outcome = validator.validate(Some(path)).await;

    let output = Output::new(settings.output.format);
    if settings.output.format == OutputFormat::Json || settings.output.verbose {
        println!("{}", output.format_outcome(&outcome));
    }

    Ok(if outcome.report.level() == ReportLevel::Error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn run_publish(settings: &Settings, path: &Path) -> Result<ExitCode> {
    ConfigManager::validate_publisher(&settings.publisher).context("Cannot publish")?;

    let publisher = ZenDeskPublisher::new(
        &settings.publisher,
        logger(settings),
        settings.output.print_mode,
    )?;

    // Failures were already written by the publisher
    match publisher.publish(path).await {
        Ok(outcome) => {
            if let Some(url) = outcome.html_url {
                println!("{}", url);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

async fn run_show(args: &ShowArgs, path: &Path) -> Result<ExitCode> {
    let configurator = Configurator::load(path)
        .await
        .with_context(|| format!("Failed to read {}", display_config(path).display()))?;

    let value = match args.section {
        Some(ShowSection::Info) => serde_json::to_value(configurator.info())?,
        Some(ShowSection::Outputs) => serde_json::to_value(configurator.outputs())?,
        Some(ShowSection::Properties) => serde_json::to_value(configurator.properties())?,
        None => json!({
            "type": configurator.project_type(),
            "version": configurator.project_version(),
            "info": configurator.info(),
            "outputs": configurator.outputs(),
            "properties": configurator.properties(),
        }),
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(ExitCode::SUCCESS)
}

fn display_config(path: &Path) -> PathBuf {
    path.join(adxutil::configurator::CONFIG_FILE_NAME)
}
