use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "verifier-assign",
    version,
    about = "Assign waste reports to volunteer verifiers and keep the load ranking in sync"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision users and reports from a JSON fixture.
    Import(ImportArgs),
    /// Add a volunteer to the load ranking.
    Register(RegisterArgs),
    /// Remove a volunteer from the load ranking.
    Deregister(DeregisterArgs),
    /// Assign one report to volunteers.
    Assign(AssignArgs),
    /// Assign every pending report.
    AssignPending(AssignPendingArgs),
    /// Rebuild the load ranking from the database.
    Resync(ResyncArgs),
    /// List ranking entries the database does not back.
    Drift(DriftArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    #[arg(long, default_value = ".cache/verifier-assign")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub ranking_path: Option<PathBuf>,

    /// JSON engine configuration; flags below override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub target_verifiers: Option<u32>,

    #[arg(long)]
    pub io_timeout_ms: Option<u64>,

    /// Append notification intents to this JSONL file instead of the log.
    #[arg(long)]
    pub outbox_path: Option<PathBuf>,
}

impl EngineArgs {
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("assignments.sqlite"))
    }

    pub fn ranking_path(&self) -> PathBuf {
        self.ranking_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("ranking.json"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(long)]
    pub fixture: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(long)]
    pub volunteer_id: String,

    #[arg(long)]
    pub capacity: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct DeregisterArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(long)]
    pub volunteer_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct AssignArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(long)]
    pub report_id: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AssignPendingArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ResyncArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DriftArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
}
