//! CG to NG migration CLI.
//!
//! Provides the `ngmig` binary. Source entities come from a JSON catalog
//! file (`{"accountId": ..., "entities": [...]}`); roots are given as
//! `KIND:id`, e.g. `WORKFLOW:deploy-prod`.
//!
//! - `discover`: print the dependency graph of the given roots
//! - `plan`: print the generation plan without creating anything
//! - `migrate`: run a full import through the task handler, writing NG YAML
//!   into an output directory and recording mappings in the database
//! - `tasks`: list an account's task records
//!
//! `migrate` and `tasks` read `NGMIG_DB_PATH`, `NGMIG_TASK_WORKERS` and
//! `NGMIG_TASK_DEDUP_TTL_SECS` like the service does; `--db` overrides the path.

mod yaml_dir;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use ngmig_core::{CaseFormat, DiscoveryGraph, EntityRef, EntityType, TaskStatus};
use ngmig_engine::{
    DiscoverySummary, EngineError, EntityInput, InMemorySourceRepository, MigrationEngine,
    MigrationInput, SharedMappingStore, SourceCatalog,
};
use ngmig_server::{AppState, DiscoveryResponse, ImportRequest, ServerConfig};
use ngmig_storage::{InMemoryStore, SqliteStore, TaskStore};

use crate::yaml_dir::YamlDirClient;

/// CG to NG entity migration tools.
#[derive(Parser)]
#[command(name = "ngmig", about = "CG to NG entity migration tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Path to the JSON source catalog.
    #[arg(short, long)]
    catalog: PathBuf,

    /// Root entity as KIND:id. Repeat for several roots.
    #[arg(short, long = "root", required = true)]
    roots: Vec<String>,

    /// Application the roots belong to.
    #[arg(short, long)]
    app: Option<String>,
}

#[derive(Args)]
struct DestinationArgs {
    /// Destination org identifier.
    #[arg(long)]
    org: Option<String>,

    /// Destination project identifier (requires --org).
    #[arg(long, requires = "org")]
    project: Option<String>,

    /// Generate snake_case identifiers instead of camelCase.
    #[arg(long)]
    snake_case: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover the dependency graph of one or more entities.
    Discover {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Generate NG documents in dependency order without creating anything.
    Plan {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        destination: DestinationArgs,

        /// Mapping database consulted for already-migrated entities.
        #[arg(long)]
        db: Option<String>,
    },
    /// Discover and import, writing NG YAML files.
    Migrate {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        destination: DestinationArgs,

        /// Database file (default: $NGMIG_DB_PATH or ngmig.db).
        #[arg(long)]
        db: Option<String>,

        /// Output directory for generated YAML.
        #[arg(short = 'O', long, default_value = "./ng-yaml")]
        output_dir: PathBuf,

        /// Seconds to wait for the import task.
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
    /// List the task records of an account.
    Tasks {
        /// Account id.
        #[arg(long)]
        account: String,

        /// Database file (default: $NGMIG_DB_PATH or ngmig.db).
        #[arg(long)]
        db: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Discover { source } => run_discover(&source),
        Commands::Plan {
            source,
            destination,
            db,
        } => run_plan(&source, &destination, db.as_deref()),
        Commands::Migrate {
            source,
            destination,
            db,
            output_dir,
            timeout_secs,
        } => {
            run_migrate(
                &source,
                &destination,
                db,
                output_dir,
                Duration::from_secs(timeout_secs),
            )
            .await
        }
        Commands::Tasks { account, db } => run_tasks(&account, db),
    };
    process::exit(exit_code);
}

/// Loaded catalog plus parsed roots.
struct Source {
    account_id: String,
    repo: InMemorySourceRepository,
    roots: Vec<EntityInput>,
}

/// Exit codes: 0 = success, 1 = migration error, 2 = invalid input,
/// 3 = I/O or storage error.
fn load_source(args: &SourceArgs) -> Result<Source, i32> {
    let roots = parse_roots(&args.roots, args.app.as_deref()).map_err(|msg| {
        eprintln!("Error: {}", msg);
        2
    })?;
    let catalog = read_catalog(&args.catalog)?;
    Ok(Source {
        account_id: catalog.account_id.clone(),
        repo: InMemorySourceRepository::from_catalog(catalog),
        roots,
    })
}

fn read_catalog(path: &Path) -> Result<SourceCatalog, i32> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read catalog '{}': {}", path.display(), e);
        3
    })?;
    serde_json::from_str(&text).map_err(|e| {
        eprintln!("Error: invalid catalog '{}': {}", path.display(), e);
        2
    })
}

fn parse_roots(raw: &[String], app: Option<&str>) -> Result<Vec<EntityInput>, String> {
    raw.iter()
        .map(|text| {
            let entity_ref: EntityRef = text
                .parse()
                .map_err(|e| format!("invalid root '{}': {}", text, e))?;
            if entity_ref.kind == EntityType::DummyHead {
                return Err(format!("invalid root '{}'", text));
            }
            Ok(EntityInput::new(entity_ref.kind, entity_ref.id, app))
        })
        .collect()
}

fn migration_input(account_id: &str, args: &DestinationArgs) -> MigrationInput {
    let mut input = MigrationInput::new(account_id);
    input.org_identifier = args.org.clone();
    input.project_identifier = args.project.clone();
    if args.snake_case {
        input.identifier_case = CaseFormat::SnakeCase;
    }
    input
}

fn print_json<T: serde::Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}

fn discover(
    engine: &MigrationEngine,
    account_id: &str,
    roots: &[EntityInput],
) -> Result<DiscoveryGraph, EngineError> {
    match roots {
        [single] => engine.discovery().discover_single(
            account_id,
            single.app_id.as_deref(),
            &single.id,
            single.kind,
        ),
        many => engine.discovery().discover_multi(account_id, many),
    }
}

fn in_memory_mappings() -> SharedMappingStore {
    Arc::new(parking_lot::Mutex::new(InMemoryStore::new()))
}

fn run_discover(args: &SourceArgs) -> i32 {
    let Source {
        account_id,
        repo,
        roots,
    } = match load_source(args) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let engine = MigrationEngine::generic(Arc::new(repo), in_memory_mappings());
    match discover(&engine, &account_id, &roots) {
        Ok(graph) => {
            print_json(&DiscoveryResponse {
                summary: DiscoverySummary::of(&graph),
                graph,
            });
            0
        }
        Err(e) => {
            eprintln!("Discovery failed: {}", e);
            1
        }
    }
}

fn run_plan(source: &SourceArgs, destination: &DestinationArgs, db: Option<&str>) -> i32 {
    let Source {
        account_id,
        repo,
        roots,
    } = match load_source(source) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let store: SharedMappingStore = match db {
        Some(path) => match SqliteStore::new(path) {
            Ok(s) => Arc::new(parking_lot::Mutex::new(s)),
            Err(e) => {
                eprintln!("Error: failed to open database '{}': {}", path, e);
                return 3;
            }
        },
        None => in_memory_mappings(),
    };
    let engine = MigrationEngine::generic(Arc::new(repo), store);

    let graph = match discover(&engine, &account_id, &roots) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Discovery failed: {}", e);
            return 1;
        }
    };
    match engine.plan(&graph, &migration_input(&account_id, destination)) {
        Ok(plan) => {
            print_json(&plan);
            if plan.errors.is_empty() {
                0
            } else {
                1
            }
        }
        Err(e) => {
            eprintln!("Planning failed: {}", e);
            1
        }
    }
}

async fn run_migrate(
    source: &SourceArgs,
    destination: &DestinationArgs,
    db: Option<String>,
    output_dir: PathBuf,
    timeout: Duration,
) -> i32 {
    let Source {
        account_id,
        repo,
        roots,
    } = match load_source(source) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let mut config = ServerConfig::from_env();
    if let Some(path) = db {
        config.db_path = path;
    }

    let client = Arc::new(YamlDirClient::new(output_dir));
    tracing::info!(output = %client.root().display(), db = %config.db_path, "migration starting");
    let state = match AppState::new(&config, Arc::new(repo), client) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to open database '{}': {}", config.db_path, e);
            return 3;
        }
    };

    let request = ImportRequest {
        entities: roots,
        input: migration_input(&account_id, destination),
    };
    let task_id = match state.import.submit(&account_id, request).await {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    let record = match state.tasks.wait_for(&account_id, &task_id, timeout).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            state.tasks.shutdown().await;
            return 1;
        }
    };
    print_json(&record);
    match record.status {
        TaskStatus::Done => 0,
        _ => 1,
    }
}

fn run_tasks(account: &str, db: Option<String>) -> i32 {
    let path = db.unwrap_or_else(|| ServerConfig::from_env().db_path);
    let store = match SqliteStore::new(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to open database '{}': {}", path, e);
            return 3;
        }
    };
    match store.list_tasks(account) {
        Ok(records) => {
            print_json(&records);
            0
        }
        Err(e) => {
            eprintln!("Error: failed to list tasks: {}", e);
            3
        }
    }
}
