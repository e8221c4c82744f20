use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use prettytable::{Table, row};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;
use ysnap_core::config::{Config, ConfigDoctor, ConfigOverrides};
use ysnap_core::{CycleReport, ImageArchiver, Poller, Ys7Client};

const DEFAULT_LOG_FILTER: &str = "ysnap=info,ysnap_core=info";

/// Flags that may also be spelled with a single dash, e.g. `-appKey`.
const SINGLE_DASH_FLAGS: &[&str] = &["appKey", "appSecret", "nowpath", "sn", "interval"];

#[derive(Parser, Debug)]
#[command(name = "ysnap", version)]
#[command(about = "Periodically capture snapshots from a ys7 cloud camera")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Open platform appKey
    #[arg(long = "appKey", global = true)]
    app_key: Option<String>,
    /// Open platform appSecret
    #[arg(long = "appSecret", global = true)]
    app_secret: Option<String>,
    /// Where the latest snapshot is written [default: <exe dir>/now.jpg]
    #[arg(long = "nowpath", global = true)]
    now_path: Option<PathBuf>,
    /// Device serial number
    #[arg(long = "sn", global = true)]
    sn: Option<String>,
    /// Minutes between captures [default: 1]
    #[arg(long = "interval", global = true)]
    interval: Option<u64>,
    /// Directory for timestamped copies [default: <exe dir>/img]
    #[arg(long, global = true)]
    history_dir: Option<PathBuf>,
    /// Open platform base URL
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Capture once immediately and exit
    #[arg(long)]
    once: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    format: OutputFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print effective configuration (redacts appSecret).
    Doctor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            app_key: self.app_key.clone(),
            app_secret: self.app_secret.clone(),
            device_serial: self.sn.clone(),
            interval_minutes: self.interval,
            latest_path: self.now_path.clone(),
            history_dir: self.history_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse_from(normalize_flags(std::env::args()));
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load().context("failed to load configuration")?;
    config.apply(cli.overrides());

    if let Some(Commands::Doctor) = cli.command {
        emit_json_or_table(cli.format, &config.doctor(), doctor_table);
        return Ok(());
    }

    let creds = config.credentials()?;
    let device = config.device()?;
    let period = config.interval()?;
    let client = Ys7Client::new(&config.base_url)?;
    let archiver = ImageArchiver::new(config.latest_path.clone(), config.history_dir.clone());
    let mut poller = Poller::new(client, creds, device, archiver);

    if cli.once {
        let report = poller.run_cycle().await.context("capture cycle failed")?;
        emit_json_or_table(cli.format, &report, report_table);
        return Ok(());
    }

    poller.run(period).await;
    Ok(())
}

/// Rewrite `-appKey x` / `-sn=1` style flags to the `--` form clap expects.
fn normalize_flags(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .enumerate()
        .map(|(idx, arg)| {
            if idx == 0 || arg.starts_with("--") {
                return arg;
            }
            let Some(rest) = arg.strip_prefix('-') else {
                return arg;
            };
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if SINGLE_DASH_FLAGS.contains(&name) {
                format!("-{arg}")
            } else {
                arg
            }
        })
        .collect()
}

fn emit_json_or_table<T: Serialize>(
    format: OutputFormat,
    value: &T,
    table_builder: impl FnOnce(&T) -> Table,
) {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).expect("serializable output");
            println!("{json}");
        }
        OutputFormat::Table => {
            let table = table_builder(value);
            table.printstd();
        }
    }
}

fn doctor_table(report: &ConfigDoctor) -> Table {
    let mut table = Table::new();
    table.add_row(row!["base_url", report.base_url]);
    table.add_row(row!["app_key", report.app_key.as_deref().unwrap_or("-")]);
    table.add_row(row![
        "app_secret",
        report.app_secret_redacted.as_deref().unwrap_or("-")
    ]);
    table.add_row(row![
        "device_serial",
        report.device_serial.as_deref().unwrap_or("-")
    ]);
    table.add_row(row!["interval", report.interval]);
    table.add_row(row!["latest_path", report.latest_path]);
    table.add_row(row!["history_dir", report.history_dir]);
    if let Some(path) = &report.config_file {
        table.add_row(row!["config_file", path]);
    }
    table
}

fn report_table(report: &CycleReport) -> Table {
    let mut table = Table::new();
    table.add_row(row!["bytes", report.bytes]);
    table.add_row(row!["latest_path", report.latest_path.display()]);
    table.add_row(row!["history_path", report.history_path.display()]);
    table.add_row(row!["token_refreshed", report.token_refreshed]);
    table
}
