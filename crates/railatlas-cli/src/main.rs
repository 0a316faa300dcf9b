use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use railatlas_lib::{
    CompilerConfig, JsonDataSource, LiveResolver, MemoryStore, ScopeKey, SnapshotCompiler,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "RailAtlas rail-network geometry utilities")]
struct Cli {
    /// Root of the per-scope JSON data tree.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ScopeArgs {
    /// Server identifier.
    #[arg(long)]
    server: String,
    /// Railway mod identifier.
    #[arg(long = "mod")]
    railway_mod: String,
    /// Dimension name.
    #[arg(long)]
    dimension: String,
}

impl ScopeArgs {
    fn key(&self) -> ScopeKey {
        ScopeKey::new(&self.server, &self.railway_mod, &self.dimension)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a scope's route and station snapshots, printing the outcome.
    Compile {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Resolve one route's live geometry.
    Route {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Route entity id.
        #[arg(long)]
        route_id: i64,
    },
    /// Resolve one station's live route map.
    Station {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Station entity id.
        #[arg(long)]
        station_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Compile { scope } => handle_compile(&cli.data_dir, &scope.key()).await,
        Command::Route { scope, route_id } => handle_route(&cli.data_dir, &scope.key(), route_id),
        Command::Station { scope, station_id } => {
            handle_station(&cli.data_dir, &scope.key(), station_id)
        }
    }
}

async fn handle_compile(data_dir: &PathBuf, scope: &ScopeKey) -> Result<()> {
    let compiler = SnapshotCompiler::new(
        JsonDataSource::new(data_dir),
        MemoryStore::new(),
        CompilerConfig::default(),
    );
    let outcome = compiler
        .compile(scope)
        .await
        .with_context(|| format!("failed to compile scope {scope}"))?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn handle_route(data_dir: &PathBuf, scope: &ScopeKey, route_id: i64) -> Result<()> {
    let resolver = LiveResolver::new(JsonDataSource::new(data_dir));
    let geometry = resolver
        .route_detail(scope, route_id)
        .with_context(|| format!("failed to resolve route {route_id} in scope {scope}"))?;

    println!("{}", serde_json::to_string_pretty(&geometry)?);
    Ok(())
}

fn handle_station(data_dir: &PathBuf, scope: &ScopeKey, station_id: i64) -> Result<()> {
    let resolver = LiveResolver::new(JsonDataSource::new(data_dir));
    let route_map = resolver
        .station_detail(scope, station_id)
        .with_context(|| format!("failed to resolve station {station_id} in scope {scope}"))?;

    println!("{}", serde_json::to_string_pretty(&route_map)?);
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
