use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "glyph",
    about = "Glyph: content-addressed blob store over an unreliable ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Path to a glyph.toml configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override `ledger.data_dir` from the configuration
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a payload under a logical id
    Put(PutArgs),
    /// Read a payload back, verifying its content hash
    Get(GetArgs),
    /// Latch an entry so it can never be rewritten
    Finalize(FinalizeArgs),
    /// Compose a document with its image
    Resolve(ResolveArgs),
    /// Find unhealthy entries and re-drive their writes
    Scan(ScanArgs),
    /// Show entry states without touching the ledger
    Status(StatusArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct PutArgs {
    /// Logical id, e.g. image/7
    pub id: String,
    /// File to read the payload from; `-` reads stdin
    pub file: PathBuf,
    /// Derive the pointer from content instead of the ledger nonce
    #[arg(long)]
    pub deterministic: bool,
    /// Resource limit for this submission
    #[arg(long)]
    pub limit: Option<u64>,
    /// Finalize the entry if the write verifies
    #[arg(long)]
    pub finalize: bool,
}

#[derive(Args)]
pub struct GetArgs {
    pub id: String,
    /// Write the payload here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct FinalizeArgs {
    pub id: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Document id, e.g. document/7
    pub id: String,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Ids to scan; defaults to every recorded entry
    pub ids: Vec<String>,
    /// Scan image/1..=N
    #[arg(long)]
    pub images: Option<u64>,
    /// Scan document/1..=N
    #[arg(long)]
    pub documents: Option<u64>,
    /// Directory of payloads laid out as <dir>/<logical id>
    #[arg(long)]
    pub source: Option<PathBuf>,
    /// Rewrite healthy entries from the source
    #[arg(long)]
    pub force: bool,
    /// Finalize every entry that ends the scan healthy
    #[arg(long)]
    pub finalize: bool,
    /// Override `repair.max_attempts`
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Ids to show; defaults to every recorded entry
    pub ids: Vec<String>,
}
