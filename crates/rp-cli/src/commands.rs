use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;

use rp_archive::ProjectArchive;
use rp_sdk::{MemoryDocument, RestorePoints, Settings, SnapshotInterval};
use rp_store::{RestorePointStore, Session, StoreConfig};
use rp_types::{RestorePointKind, UnixSeconds};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    if let Command::Interval(args) = cli.command {
        return cmd_interval(settings(cli.settings.as_deref()), args, format);
    }

    let points = open_points(cli.db.as_deref());
    match cli.command {
        Command::List => cmd_list(&points, format).await,
        Command::Snapshot(args) => cmd_snapshot(&points, args).await,
        Command::Export(args) => cmd_export(&points, args).await,
        Command::Restore(args) => cmd_restore(&points, args).await,
        Command::Delete(args) => {
            let report = points.delete_one(args.id).await?;
            println!("{} Deleted restore point {} ({} freed)", "✓".green(), args.id.to_string().yellow(), human_size(report.bytes_freed));
            Ok(())
        }
        Command::Clear(args) => {
            if !args.yes {
                bail!("refusing to delete every restore point without --yes");
            }
            points.delete_all().await?;
            println!("{} Deleted all restore points.", "✓".green().bold());
            Ok(())
        }
        Command::Prune => cmd_prune(&points, format).await,
        Command::Gc => {
            let report = points.collect_garbage().await?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} GC: {} projects, {} assets, {} thumbnails removed ({} freed)",
                    "✓".green(),
                    report.projects_removed,
                    report.assets_removed,
                    report.thumbnails_removed,
                    human_size(report.bytes_freed)
                );
            }
            Ok(())
        }
        Command::Thumbnail(args) => cmd_thumbnail(&points, args).await,
        Command::Interval(_) => Ok(()),
    }
}

fn open_points(db: Option<&Path>) -> RestorePoints {
    let config = match db {
        Some(path) => StoreConfig::at(path),
        None => StoreConfig::default(),
    };
    let session = Arc::new(Session::new(config));
    session.delete_legacy_database();
    RestorePoints::new(RestorePointStore::new(session))
}

fn settings(path: Option<&Path>) -> Settings {
    match path {
        Some(path) => Settings::at(path),
        None => Settings::platform_default(),
    }
}

async fn cmd_list(points: &RestorePoints, format: OutputFormat) -> anyhow::Result<()> {
    let listing = points.list_all().await?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if listing.is_empty() {
        println!("No restore points.");
        return Ok(());
    }
    for point in &listing.restore_points {
        let kind = match point.metadata.kind {
            RestorePointKind::Automatic => "automatic".dimmed(),
            RestorePointKind::Manual => "manual".cyan(),
        };
        println!(
            "{:>6}  {}  {:<9}  {}  ({} + {} assets)",
            format!("#{}", point.id).yellow().bold(),
            format_created(point.metadata.created),
            kind,
            point.metadata.title.bold(),
            human_size(point.metadata.own_size()),
            point.metadata.assets.len()
        );
    }
    println!(
        "\n{} restore points, {} total",
        listing.restore_points.len(),
        human_size(listing.total_size).bold()
    );
    Ok(())
}

async fn cmd_snapshot(points: &RestorePoints, args: SnapshotArgs) -> anyhow::Result<()> {
    let archive = ProjectArchive::open(&args.archive)
        .with_context(|| format!("reading {}", args.archive.display()))?;
    let title = args.title.unwrap_or_else(|| title_from_path(&args.archive));
    let kind = if args.manual {
        RestorePointKind::Manual
    } else {
        RestorePointKind::Automatic
    };

    let document = MemoryDocument::with_project(archive.project_json, archive.assets);
    match points.create_snapshot(&document, &title, kind).await? {
        Some(id) => println!("{} Created {} restore point {} for {}", "✓".green().bold(), kind, id.to_string().yellow(), title.bold()),
        None => println!("{} No persistent storage available; nothing saved.", "!".yellow()),
    }
    Ok(())
}

async fn cmd_export(points: &RestorePoints, args: ExportArgs) -> anyhow::Result<()> {
    let exported = points.export_snapshot(args.id).await?;
    let output = args
        .output
        .unwrap_or_else(|| default_export_name(&exported.title));
    std::fs::write(&output, &exported.archive)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "{} Exported {} to {} ({})",
        "✓".green().bold(),
        exported.title.bold(),
        output.display(),
        human_size(exported.archive.len() as u64)
    );
    Ok(())
}

async fn cmd_restore(points: &RestorePoints, args: RestoreArgs) -> anyhow::Result<()> {
    let document = MemoryDocument::new();
    points.load_snapshot(args.id, &document).await?;

    let archive = ProjectArchive {
        project_json: document.project_json(),
        assets: document.assets(),
    };
    std::fs::write(&args.output, archive.to_bytes()?)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!(
        "{} Restored {} into {} ({} assets)",
        "✓".green().bold(),
        args.id.to_string().yellow(),
        args.output.display(),
        archive.assets.len()
    );
    Ok(())
}

async fn cmd_prune(points: &RestorePoints, format: OutputFormat) -> anyhow::Result<()> {
    let report = points.prune().await?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!(
        "{} Scanned {}, evicted {} ({} freed)",
        "✓".green(),
        report.scanned,
        report.evicted.len(),
        human_size(report.gc.bytes_freed)
    );
    for id in &report.evicted {
        println!("  {} {}", "evicted".red(), id);
    }
    Ok(())
}

async fn cmd_thumbnail(points: &RestorePoints, args: ThumbnailArgs) -> anyhow::Result<()> {
    match args.output {
        Some(output) => {
            let thumbnail = points.thumbnail(args.id).await?;
            std::fs::write(&output, &thumbnail.data)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("{} Saved {} thumbnail to {}", "✓".green(), thumbnail.mime_type, output.display());
        }
        None => println!("{}", points.thumbnail_url(args.id).await?),
    }
    Ok(())
}

fn cmd_interval(settings: Settings, args: IntervalArgs, format: OutputFormat) -> anyhow::Result<()> {
    if let Some(interval) = args.value {
        settings.set_interval(interval);
    }
    let current = settings.read_interval();
    if format == OutputFormat::Json {
        println!("{}", serde_json::json!({ "interval_ms": current.as_millis() }));
        return Ok(());
    }
    match current {
        SnapshotInterval::Disabled => println!("Automatic snapshots: {}", "off".red()),
        SnapshotInterval::Every(period) => println!(
            "Automatic snapshots every {}",
            format!("{}s", period.as_secs_f64()).green()
        ),
    }
    Ok(())
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| rp_types::metadata::UNKNOWN_TITLE.to_string())
}

fn default_export_name(title: &str) -> PathBuf {
    let safe: String = title
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect();
    PathBuf::from(format!("{safe}.sb3"))
}

fn format_created(created: UnixSeconds) -> String {
    chrono::DateTime::from_timestamp(created.0, 0)
        .map(|at| at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| created.to_string())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}
