use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use catalog_mirror::app::{App, SyncOptions};
use catalog_mirror::catalog::CatalogHttpClient;
use catalog_mirror::config::{ConfigLoader, ConfigOverrides, ResolvedConfig};
use catalog_mirror::error::MirrorError;
use catalog_mirror::ledger::LedgerStore;
use catalog_mirror::output::{JsonOutput, OutputMode, TextOutput};
use catalog_mirror::store::Store;
use catalog_mirror::worker::PayloadHttpClient;

#[derive(Parser)]
#[command(name = "catalog-mirror")]
#[command(about = "Incrementally mirror themed datasets from an open-data metastore")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    sync: SyncArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone)]
struct CommonArgs {
    #[arg(long, global = true, help = "Path to a JSON config file")]
    config: Option<String>,

    #[arg(long, global = true)]
    catalog_url: Option<String>,

    #[arg(long, global = true, help = "Case-insensitive theme substring to mirror")]
    theme: Option<String>,

    #[arg(long, global = true)]
    output_dir: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    ledger: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[arg(long, global = true, help = "Print machine-readable JSON to stdout")]
    json: bool,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum Commands {
    #[command(about = "Run one sync cycle (default)")]
    Sync,
    #[command(about = "Show what a sync would do without downloading")]
    Plan,
    #[command(about = "Print the persisted ledger")]
    Ledger,
}

#[derive(Args, Clone)]
struct SyncArgs {
    #[arg(long, global = true, help = "Maximum number of concurrent downloads")]
    concurrency: Option<usize>,

    #[arg(long, global = true, help = "Ignore the persisted ledger and refetch everything")]
    reset: bool,
}

impl Cli {
    /// The subcommand to run; sync-only flags given to another command are an
    /// error rather than being ignored.
    fn selected_command(&self) -> Result<Commands, clap::Error> {
        let command = self.command.unwrap_or(Commands::Sync);
        let sync_flags = self.sync.reset || self.sync.concurrency.is_some();
        if command != Commands::Sync && sync_flags {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                "--reset and --concurrency only apply to sync",
            ));
        }
        Ok(command)
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<MirrorError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MirrorError) -> u8 {
    if error.is_catalog_failure() {
        return 3;
    }
    match error {
        MirrorError::CorruptState { .. }
        | MirrorError::ConfigRead(_)
        | MirrorError::ConfigParse(_)
        | MirrorError::InvalidConfig(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.common.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let command = cli.selected_command().unwrap_or_else(|err| err.exit());

    let config = resolve_config(&cli.common, cli.sync.concurrency)?;
    tracing::debug!(?config, "resolved configuration");

    match command {
        Commands::Sync => run_sync(&config, cli.sync.reset, output_mode),
        Commands::Plan => run_plan(&config, output_mode),
        Commands::Ledger => run_ledger(&config, output_mode),
    }
}

fn resolve_config(
    common: &CommonArgs,
    concurrency: Option<usize>,
) -> miette::Result<ResolvedConfig> {
    let overrides = ConfigOverrides {
        catalog_url: common.catalog_url.clone(),
        theme: common.theme.clone(),
        concurrency,
        output_dir: common.output_dir.clone(),
        ledger_path: common.ledger.clone(),
        timeout_secs: common.timeout_secs,
    };
    Ok(ConfigLoader::resolve(common.config.as_deref(), overrides)?)
}

fn build_app(
    config: &ResolvedConfig,
) -> miette::Result<App<CatalogHttpClient, PayloadHttpClient>> {
    let catalog = CatalogHttpClient::new(config.catalog_url.clone(), config.timeout)?;
    let payload = PayloadHttpClient::new(config.timeout)?;
    Ok(App::new(
        Store::new(config.output_dir.clone()),
        LedgerStore::new(config.ledger_path.clone()),
        catalog,
        payload,
    ))
}

fn run_sync(config: &ResolvedConfig, reset: bool, output_mode: OutputMode) -> miette::Result<()> {
    let app = build_app(config)?;
    let options = SyncOptions {
        theme: config.theme.clone(),
        concurrency: config.concurrency,
        reset,
    };
    match output_mode {
        OutputMode::Json => {
            let report = app.sync(&options, &JsonOutput)?;
            JsonOutput::print_sync(&report).into_diagnostic()
        }
        OutputMode::Text => {
            let report = app.sync(&options, &TextOutput)?;
            TextOutput::print_sync(&report).into_diagnostic()
        }
    }
}

fn run_plan(config: &ResolvedConfig, output_mode: OutputMode) -> miette::Result<()> {
    let app = build_app(config)?;
    match output_mode {
        OutputMode::Json => {
            let report = app.plan(&config.theme, &JsonOutput)?;
            JsonOutput::print_plan(&report).into_diagnostic()
        }
        OutputMode::Text => {
            let report = app.plan(&config.theme, &TextOutput)?;
            TextOutput::print_plan(&report).into_diagnostic()
        }
    }
}

fn run_ledger(config: &ResolvedConfig, output_mode: OutputMode) -> miette::Result<()> {
    let ledger = LedgerStore::new(config.ledger_path.clone()).load()?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_ledger(&ledger).into_diagnostic(),
        OutputMode::Text => TextOutput::print_ledger(&ledger).into_diagnostic(),
    }
}
