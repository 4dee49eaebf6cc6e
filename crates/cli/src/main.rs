use crate::{
    commands::{Commands, RunArgs, SourceFormat, parse_delimiter},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::{
    erp::{ErpClient, Session},
    file::{CsvFileErpClient, JsonFileErpClient},
};
use engine_config::SyncConfig;
use engine_core::state::{KvStore, sled_store::SledKvStore};
use engine_processing::handler::{HandlerRegistry, JsonLinesStore};
use engine_runtime::orchestrator::{SyncOrchestrator, TickOptions, TickResult};
use model::{
    core::{entity::Entity, identifiers::RunId},
    execution::run::Filters,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "erpsync", version = "0.1.0", about = "Batch synchronization of ERP data")]
struct Cli {
    #[arg(long, global = true, help = "Path to a TOML settings file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Directory holding the ERP exports (<entity>.json or <entity>.csv)"
    )]
    data_dir: PathBuf,

    #[arg(long, global = true, value_enum, default_value_t = SourceFormat::Json)]
    source_format: SourceFormat,

    #[arg(
        long,
        global = true,
        default_value = ",",
        value_parser = parse_delimiter,
        help = "Field separator of CSV exports"
    )]
    csv_delimiter: u8,

    #[arg(
        long,
        global = true,
        env = "ERPSYNC_SOURCE_TOKEN",
        help = "Token the export source expects; sessions without it are rejected"
    )]
    source_token: Option<String>,

    #[arg(
        long,
        global = true,
        default_value = "store",
        help = "Directory receiving synchronized records as JSON lines"
    )]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

enum Completion {
    Done,
    Interrupted,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let code = match execute(cli).await {
        Ok(Completion::Done) => ExitCode::Success,
        Ok(Completion::Interrupted) => ExitCode::ShutdownRequested,
        Err(e) => {
            error!("{e}");
            ExitCode::GeneralError
        }
    };
    code.into()
}

async fn execute(cli: Cli) -> Result<Completion, CliError> {
    let config = SyncConfig::load(cli.config.as_deref())?;
    let store = open_state_store(&config)?;
    let sync = build_orchestrator(&cli, store, config);

    match cli.command {
        Commands::Tick { entity, run } => {
            let result = sync.tick(entity, tick_options(run)).await;
            output::print_tick(&result);
            if let TickResult::Failed(e) = result {
                return Err(e.into());
            }
        }
        Commands::Run {
            entity,
            run,
            interval_ms,
        } => {
            let completion =
                drive(&sync, entity, tick_options(run), Duration::from_millis(interval_ms)).await;
            output::print_metrics(&sync.metrics());
            return completion;
        }
        Commands::Cancel { entity } => {
            if sync.request_cancel(entity).await? {
                println!("Cancellation requested for '{entity}'; it applies on the next tick.");
            } else {
                return Err(CliError::NoRun(entity));
            }
        }
        Commands::Ack { entity } => {
            sync.acknowledge_cancel(entity).await?;
            println!("Progress for '{entity}' acknowledged.");
        }
        Commands::Progress { entity, json } => {
            let overview = sync.status(entity).await?;
            let Some(snapshot) = overview.progress.as_ref() else {
                return Err(CliError::NoRun(entity));
            };
            if json {
                output::print_json(snapshot)?;
            } else {
                output::print_progress_table(snapshot, overview.stalled);
            }
        }
        Commands::Errors {
            entity,
            run,
            purge,
            json,
        } => {
            let run_id = match run {
                Some(run) => RunId::new(run),
                None => current_run(&sync, entity).await?,
            };
            let records = sync.errors(entity, &run_id).await?;
            if json {
                output::print_json(&records)?;
            } else {
                output::print_errors(&records);
            }
            if purge {
                let purged = sync.purge_errors(entity, &run_id).await?;
                println!("Purged {purged} error record(s) of run '{run_id}'.");
            }
        }
        Commands::Status { entity, json } => {
            let entities = entity.map(|e| vec![e]).unwrap_or_else(|| Entity::ALL.to_vec());
            let mut overviews = Vec::with_capacity(entities.len());
            for entity in entities {
                overviews.push(sync.status(entity).await?);
            }
            if json {
                output::print_json(&overviews)?;
            } else {
                overviews.iter().for_each(output::print_overview);
            }
        }
    }

    Ok(Completion::Done)
}

/// Ticks until a terminal result or a shutdown signal.
async fn drive(
    sync: &SyncOrchestrator,
    entity: Entity,
    mut options: TickOptions,
    interval: Duration,
) -> Result<Completion, CliError> {
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();
    let token = shutdown.cancel_token();

    loop {
        let result = sync.tick(entity, options.clone()).await;
        output::print_tick(&result);
        // A restart applies to the first tick only.
        options.force_restart = false;

        match result {
            TickResult::Completed(_) | TickResult::Cancelled(_) => return Ok(Completion::Done),
            TickResult::Failed(e) => return Err(e.into()),
            TickResult::Busy => warn!(entity = %entity, "Another tick holds the lock, waiting"),
            TickResult::Running(_) => {}
        }

        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(interval) => {}
        }
        if shutdown.is_shutdown_requested() {
            info!(entity = %entity, "Stopped between ticks; the run resumes on the next tick");
            return Ok(Completion::Interrupted);
        }
    }
}

async fn current_run(sync: &SyncOrchestrator, entity: Entity) -> Result<RunId, CliError> {
    let overview = sync.status(entity).await?;
    overview
        .checkpoint
        .map(|cp| cp.run_id)
        .or_else(|| overview.progress.map(|snap| snap.run_id))
        .ok_or(CliError::NoRun(entity))
}

fn tick_options(args: RunArgs) -> TickOptions {
    TickOptions {
        direction: args.direction,
        filters: args.filters.into_iter().collect::<Filters>(),
        batch_size: args.batch_size,
        force_restart: args.force_restart,
        session: args.token.map(Session::new).unwrap_or_default(),
    }
}

fn open_state_store(config: &SyncConfig) -> Result<Arc<dyn KvStore>, CliError> {
    let path = config.state_path()?;
    let store = SledKvStore::open(&path).map_err(|err| CliError::StateStore {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    Ok(Arc::new(store))
}

fn build_orchestrator(cli: &Cli, store: Arc<dyn KvStore>, config: SyncConfig) -> SyncOrchestrator {
    let client: Arc<dyn ErpClient> = match cli.source_format {
        SourceFormat::Json => {
            let client = JsonFileErpClient::new(&cli.data_dir);
            Arc::new(match &cli.source_token {
                Some(token) => client.with_token(token),
                None => client,
            })
        }
        SourceFormat::Csv => {
            let client = CsvFileErpClient::new(&cli.data_dir).with_delimiter(cli.csv_delimiter);
            Arc::new(match &cli.source_token {
                Some(token) => client.with_token(token),
                None => client,
            })
        }
    };

    let handlers = Entity::ALL.iter().fold(HandlerRegistry::new(), |registry, entity| {
        let path = cli.output_dir.join(format!("{entity}.jsonl"));
        registry.register(*entity, Arc::new(JsonLinesStore::new(path)))
    });

    SyncOrchestrator::new(store, client, handlers, config)
}
