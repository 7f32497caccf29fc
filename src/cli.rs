use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "aoilog",
    version,
    about = "AOI batch log ingestion and share maintenance tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse batch logs and store new lots in the SQLite database.
    Ingest(IngestArgs),
    /// Copy finished batch logs from a station folder to the shared folder.
    Sync(SyncArgs),
    /// Report line differences between two folders of ini files.
    Compare(CompareArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = ".cache/aoilog")]
    pub state_root: PathBuf,

    /// Folder holding the batch logs, searched recursively.
    #[arg(long)]
    pub data_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,

    /// Screen-management ini listing the lots still on the line (`Lot=<n>`).
    #[arg(long)]
    pub running_lots_ini: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    #[arg(long)]
    pub local_root: PathBuf,

    #[arg(long)]
    pub server_root: PathBuf,

    #[arg(long)]
    pub running_lots_ini: Option<PathBuf>,

    /// Lot still being printed; matched on its last six characters.
    #[arg(long = "exclude-lot")]
    pub exclude_lots: Vec<String>,

    /// Leave files younger than this many hours on the station.
    #[arg(long, default_value_t = 1)]
    pub min_age_hours: u64,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long)]
    pub left: PathBuf,

    #[arg(long)]
    pub right: PathBuf,

    #[arg(long, default_value = "differences_output.ini")]
    pub output_path: PathBuf,

    #[arg(long, default_value = "ini")]
    pub extension: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/aoilog")]
    pub state_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}
