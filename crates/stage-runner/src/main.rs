//! Stage Runner binary.
//!
//! Runs one component invocation and exits.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stage_runner::component::load_component;
use stage_runner::{LogFormat, RunOptions, RunnerConfig, StageError, StageRunner};

#[derive(Parser, Debug)]
#[command(name = "stage-runner")]
#[command(version, about = "Run one pipeline stage with typed, split-aware artifacts", long_about = None)]
struct Cli {
    /// Log output format (overrides STAGE_LOG_FORMAT)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Resolve and stamp paths, print the plan as JSON, create and run nothing
    #[arg(long)]
    dry_run: bool,

    /// Print the component spec as YAML and exit
    #[arg(long)]
    describe: bool,

    /// Spec file path, built-in component name, or name under STAGE_SPEC_DIR
    #[arg(value_name = "COMPONENT")]
    component: String,

    /// Component flags (--<name> <value> ...)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "FLAGS")]
    args: Vec<String>,
}

fn init_tracing(config: &RunnerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr, stdout carries plans and descriptions
    match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn run(cli: Cli, config: RunnerConfig) -> Result<()> {
    let spec = load_component(&cli.component, config.spec_dir.as_deref())?;

    if cli.describe {
        let yaml = serde_yaml::to_string(&spec).context("Failed to render component spec")?;
        print!("{}", yaml);
        return Ok(());
    }

    let runner = StageRunner::default();
    tracing::debug!(engines = ?runner.registry().list(), "Engines registered");

    let report = runner
        .run(&spec, &cli.args, RunOptions { dry_run: cli.dry_run })
        .await?;

    if cli.dry_run {
        let plan = serde_json::to_string_pretty(&report).context("Failed to render plan")?;
        println!("{}", plan);
    } else {
        tracing::info!(
            run_id = %report.invocation.run_id,
            written = report.written.len(),
            "Stage completed"
        );
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = RunnerConfig::from_env().with_log_format(cli.log_format);
    init_tracing(&config);

    let Err(err) = run(cli, config).await else {
        return ExitCode::SUCCESS;
    };

    match err.downcast_ref::<StageError>() {
        Some(StageError::Usage(usage)) => usage.exit(),
        Some(stage_err) => {
            tracing::error!(stage = %stage_err.stage(), error = %stage_err, "Stage failed");
            eprintln!("error [{}]: {}", stage_err.stage(), stage_err);
            ExitCode::from(stage_err.exit_code().clamp(1, 255) as u8)
        }
        None => {
            tracing::error!(error = %err, "Stage runner failed");
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
