mod logging;
mod server;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures_util::stream::{self, Stream, StreamExt};
use tablesync_config::{Config, DEFAULT_CONFIG_FILE};
use tablesync_runner::{
    source_from_config, target_from_config, FieldMapper, Reconciler, ReconcilerOptions, RunReport,
    SourceClient, TargetClient,
};
use tokio::sync::watch;

/// Exit code of a run that finished but had failed operations.
const EXIT_PARTIAL_FAILURE: u8 = 2;

/// Exit code after a second Ctrl-C aborted the run.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "tablesync",
    version,
    about = "Keeps a Webflow collection in line with an Airtable table"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (optional, defaults apply when missing)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP trigger server
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one reconciliation and print the report
    Sync,
    /// Compute the plan without changing anything
    Plan,
    /// Print the records of a source collection
    Records {
        /// Source collection (table) name
        collection: String,
    },
    /// Print the items of the target collection
    Items,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::from_path_and_env(&cli.config)?;

    match cli.command {
        Commands::Serve { port } => {
            let (source, target, reconciler) = build(&config)?;
            let state = Arc::new(server::AppState::new(source, target, reconciler));
            let router = server::router(state, config.server.cors);
            server::serve(router, port.unwrap_or(config.server.port)).await?;
        }
        Commands::Sync => {
            let (_, _, reconciler) = build(&config)?;
            let (cancel_tx, cancel_rx) = watch::channel(false);

            let report = tokio::select! {
                result = reconciler.run_cancellable(cancel_rx) => result?,
                () = watch_interrupts(ctrl_c_presses(), cancel_tx) => {
                    return Ok(ExitCode::from(EXIT_INTERRUPTED));
                }
            };
            print_json(&serde_json::json!({ "report": report }))?;
            return Ok(exit_code(&report));
        }
        Commands::Plan => {
            let (_, _, reconciler) = build(&config)?;
            let plan = reconciler.plan_only().await?;
            print_json(&serde_json::json!({ "plan": plan }))?;
        }
        Commands::Records { collection } => {
            let source = source_from_config(&config.source)?;
            let records = source.fetch_records(&collection).await?;
            print_json(&records)?;
        }
        Commands::Items => {
            let target = target_from_config(&config.target)?;
            let items = target.fetch_items().await?;
            print_json(&items)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

type Clients = (Arc<dyn SourceClient>, Arc<dyn TargetClient>, Reconciler);

fn build(config: &Config) -> anyhow::Result<Clients> {
    let source = source_from_config(&config.source)?;
    let target = target_from_config(&config.target)?;
    let reconciler = Reconciler::new(
        Arc::clone(&source),
        Arc::clone(&target),
        FieldMapper::from_config(&config.mapping),
        ReconcilerOptions::from_config(config),
    );
    Ok((source, target, reconciler))
}

/// Resolves on the second interrupt, the first one only cancels the run.
async fn watch_interrupts<S>(interrupts: S, cancel: watch::Sender<bool>)
where
    S: Stream<Item = ()>,
{
    futures_util::pin_mut!(interrupts);

    if interrupts.next().await.is_none() {
        return std::future::pending().await;
    }
    tracing::warn!("Ctrl-C received, cancelling before execution (press again to abort)");
    let _ = cancel.send(true);

    if interrupts.next().await.is_none() {
        return std::future::pending().await;
    }
    tracing::error!("Second Ctrl-C received, aborting");
}

fn ctrl_c_presses() -> impl Stream<Item = ()> {
    stream::unfold((), |()| async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some(((), ())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                None
            }
        }
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL_FAILURE)
    }
}
