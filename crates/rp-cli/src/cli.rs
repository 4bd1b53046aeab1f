use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use rp_sdk::SnapshotInterval;
use rp_types::RestorePointId;

#[derive(Parser)]
#[command(
    name = "rp",
    about = "Restore points: inspect, export and manage document snapshots",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Restore point database [default: platform data directory]
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Settings file holding the snapshot interval [default: platform config directory]
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List restore points, newest first
    List,
    /// Store a project archive as a restore point
    Snapshot(SnapshotArgs),
    /// Export a restore point as a project archive
    Export(ExportArgs),
    /// Load a restore point into a fresh document and save the result
    Restore(RestoreArgs),
    /// Delete one restore point
    Delete(DeleteArgs),
    /// Delete every restore point
    Clear(ClearArgs),
    /// Apply the retention policy now
    Prune,
    /// Remove blobs no restore point references
    Gc,
    /// Print or save a restore point's thumbnail
    Thumbnail(ThumbnailArgs),
    /// Show or set the automatic snapshot interval
    Interval(IntervalArgs),
}

#[derive(Args)]
pub struct SnapshotArgs {
    /// Project archive (zip with project.json and assets)
    pub archive: PathBuf,
    /// Project title [default: archive file name]
    #[arg(short, long)]
    pub title: Option<String>,
    /// Record as a manual restore point, exempt from retention
    #[arg(long)]
    pub manual: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    pub id: RestorePointId,
    /// Output file [default: <title>.sb3]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RestoreArgs {
    pub id: RestorePointId,
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: RestorePointId,
}

#[derive(Args)]
pub struct ClearArgs {
    /// Confirm deleting everything
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ThumbnailArgs {
    pub id: RestorePointId,
    /// Write the image here instead of printing a data URL
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct IntervalArgs {
    /// Milliseconds between automatic snapshots, or "off"
    #[arg(value_parser = parse_interval, allow_hyphen_values = true)]
    pub value: Option<SnapshotInterval>,
}

fn parse_interval(value: &str) -> Result<SnapshotInterval, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" | "disabled" | "never" => Ok(SnapshotInterval::Disabled),
        other => other
            .parse::<i64>()
            .map(SnapshotInterval::from_millis)
            .map_err(|_| format!("expected milliseconds or \"off\", got {value:?}")),
    }
}
