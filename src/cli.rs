use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::store::StoreKind;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Jsonl,
    Sqlite,
    None,
}

impl From<StoreBackend> for StoreKind {
    fn from(backend: StoreBackend) -> Self {
        match backend {
            StoreBackend::Jsonl => StoreKind::Jsonl,
            StoreBackend::Sqlite => StoreKind::Sqlite,
            StoreBackend::None => StoreKind::None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Optional path to config file (YAML)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan one or more artifacts
    Scan(ScanArgs),
    /// Show recently stored scans
    History(HistoryArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Artifacts to scan
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for scan records
    #[arg(short, long, default_value = "./output")]
    pub output: PathBuf,

    /// Persistence backend
    #[arg(long, value_enum, default_value_t = StoreBackend::Jsonl)]
    pub store: StoreBackend,

    /// Number of artifacts scanned concurrently
    #[arg(long, default_value_t = num_cpus::get())]
    pub workers: usize,

    /// Skip the toxicity service
    #[arg(long)]
    pub no_toxicity: bool,

    /// Add the display-only risk tier to printed records
    #[arg(long)]
    pub presentation: bool,

    /// Override the YARA rule file
    #[arg(long)]
    pub rules: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Output directory holding the SQLite scan store
    #[arg(short, long, default_value = "./output")]
    pub output: PathBuf,

    /// Number of records to show
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
