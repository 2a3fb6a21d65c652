use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use glyph_ledger::{DirLedger, ResourceLimit};
use glyph_repair::{DirSource, EntryState, RepairReport, RepairScanner, ScanOptions};
use glyph_resolver::MetadataResolver;
use glyph_store::{BlobStore, EntryStore, JsonFileEntryStore};
use glyph_types::{Entry, LogicalId, ResolutionResult, Salt, Strategy, WriterId};
use serde::Serialize;
use tracing::warn;

use crate::cli::*;
use crate::config::GlyphConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = GlyphConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.ledger.data_dir = dir;
    }
    let format = cli.format;

    match cli.command {
        Command::Put(args) => cmd_put(&config, format, args).await,
        Command::Get(args) => cmd_get(&config, args).await,
        Command::Finalize(args) => cmd_finalize(&config, format, args).await,
        Command::Resolve(args) => cmd_resolve(&config, format, args).await,
        Command::Scan(args) => cmd_scan(&config, format, args).await,
        Command::Status(args) => cmd_status(&config, format, args),
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn open_store(config: &GlyphConfig) -> anyhow::Result<Arc<BlobStore>> {
    let ledger = DirLedger::open(
        config.ledger.ledger_dir(),
        WriterId::derive(&config.ledger.writer),
    )
    .with_context(|| format!("opening ledger in {}", config.ledger.ledger_dir().display()))?
    .with_limits(config.ledger.max_record_size, config.ledger.cost);
    let entries = JsonFileEntryStore::open(config.ledger.entries_path())
        .with_context(|| format!("opening {}", config.ledger.entries_path().display()))?;
    Ok(Arc::new(BlobStore::new(
        Arc::new(ledger),
        Arc::new(entries),
        config.store.to_store_config(),
    )))
}

fn parse_id(s: &str) -> anyhow::Result<LogicalId> {
    s.parse::<LogicalId>()
        .with_context(|| format!("invalid logical id {s:?}"))
}

fn read_payload(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn state_label(state: EntryState) -> colored::ColoredString {
    match state {
        EntryState::Healthy => state.name().green(),
        EntryState::Finalized => state.name().cyan(),
        EntryState::WriteFailed => state.name().red(),
        EntryState::Uninitialized => state.name().dimmed(),
    }
}

async fn cmd_put(config: &GlyphConfig, format: OutputFormat, args: PutArgs) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let id = parse_id(&args.id)?;
    let payload = read_payload(&args.file)?;
    let strategy = if args.deterministic {
        Strategy::deterministic(Salt::for_logical_id(&id))
    } else {
        Strategy::Sequential
    };
    let limit = args
        .limit
        .map(ResourceLimit)
        .unwrap_or(config.store.default_limit);

    let mut entry = store.write_with_limit(&id, &payload, strategy, limit).await?;
    if args.finalize && entry.healthy {
        store.finalize(&id).await?;
        entry.finalized = true;
    }

    match format {
        OutputFormat::Json => print_json(&entry)?,
        OutputFormat::Text => print_entry_line(&entry),
    }
    if !entry.healthy {
        bail!("write for {id} was accepted but did not verify; run `glyph scan` to repair");
    }
    Ok(())
}

fn print_entry_line(entry: &Entry) {
    let state = EntryState::classify(Some(entry));
    let mark = if entry.healthy { "✓".green().bold() } else { "!".yellow().bold() };
    println!(
        "{} {} -> {} ({}, {}, writes: {})",
        mark,
        entry.logical_id.as_str().bold(),
        entry.pointer.short_hex().yellow(),
        state_label(state),
        entry.strategy,
        entry.writes,
    );
    if let Some(failure) = &entry.last_failure {
        println!("  last failure: {}", failure.to_string().red());
    }
}

async fn cmd_get(config: &GlyphConfig, args: GetArgs) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let id = parse_id(&args.id)?;
    let payload = match store.read(&id).await {
        ResolutionResult::Healthy(payload) | ResolutionResult::Placeholder { payload, .. } => {
            payload
        }
        ResolutionResult::Unreadable(reason) => bail!("{id} is unreadable: {reason}"),
    };
    match &args.output {
        Some(path) => std::fs::write(path, &payload)
            .with_context(|| format!("writing {}", path.display()))?,
        None => std::io::stdout().write_all(&payload)?,
    }
    Ok(())
}

async fn cmd_finalize(
    config: &GlyphConfig,
    format: OutputFormat,
    args: FinalizeArgs,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let id = parse_id(&args.id)?;
    store.finalize(&id).await?;
    match format {
        OutputFormat::Json => print_json(&store.entry(&id)?)?,
        OutputFormat::Text => println!("{} Finalized {}", "✓".green().bold(), id.as_str().bold()),
    }
    Ok(())
}

async fn cmd_resolve(
    config: &GlyphConfig,
    format: OutputFormat,
    args: ResolveArgs,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let id = parse_id(&args.id)?;
    let resolution = MetadataResolver::new(store).resolve(&id).await?;
    match format {
        OutputFormat::Json => print_json(&resolution)?,
        OutputFormat::Text => {
            let status = if resolution.placeholder {
                "placeholder".yellow()
            } else {
                "healthy".green()
            };
            println!(
                "{} {} ({})",
                id.as_str().bold(),
                status,
                resolution.content_hash.short_hex().dimmed()
            );
            if let Some(reason) = &resolution.image_failure {
                println!("  image: {}", reason.to_string().red());
            }
            println!("{}", String::from_utf8_lossy(&resolution.payload));
        }
    }
    Ok(())
}

fn scan_ids(args: &ScanArgs) -> anyhow::Result<Vec<LogicalId>> {
    let mut ids = args
        .ids
        .iter()
        .map(|s| parse_id(s))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if let Some(n) = args.images {
        ids.extend((1..=n).map(LogicalId::image));
    }
    if let Some(n) = args.documents {
        ids.extend((1..=n).map(LogicalId::document));
    }
    Ok(ids)
}

async fn cmd_scan(config: &GlyphConfig, format: OutputFormat, args: ScanArgs) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let mut repair = config.repair.clone();
    if let Some(n) = args.max_attempts {
        repair.max_attempts = n;
    }
    let mut scanner = RepairScanner::new(store, repair)?;
    if let Some(dir) = &args.source {
        scanner = scanner.with_source(Arc::new(DirSource::new(dir)));
    }
    let scanner = Arc::new(scanner);

    let interrupt = {
        let scanner = Arc::clone(&scanner);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let cancelled = scanner.cancel();
                warn!(cancelled, "interrupted; queued repair jobs cancelled");
            }
        })
    };

    let options = ScanOptions {
        force: args.force,
        finalize: args.finalize,
    };
    let ids = scan_ids(&args)?;
    let report = if ids.is_empty() {
        scanner.scan_all(options).await
    } else {
        scanner.scan(&ids, options).await
    };
    interrupt.abort();
    let report = report?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &RepairReport) {
    let mark = if report.failures.is_empty() && report.counts.write_failed == 0 {
        "✓".green().bold()
    } else {
        "!".yellow().bold()
    };
    println!("{mark} {report}");
    for change in &report.changes {
        println!(
            "  {}: {} -> {}",
            change.logical_id.as_str().bold(),
            state_label(change.from),
            state_label(change.to)
        );
    }
    for failure in &report.failures {
        println!("  {}: {}", failure.logical_id.as_str().bold(), failure.error.red());
    }
}

#[derive(Serialize)]
struct StatusRow {
    logical_id: LogicalId,
    state: EntryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry: Option<Entry>,
}

fn cmd_status(config: &GlyphConfig, format: OutputFormat, args: StatusArgs) -> anyhow::Result<()> {
    let entries = JsonFileEntryStore::open(config.ledger.entries_path())?;
    let ids = if args.ids.is_empty() {
        entries.ids()?
    } else {
        args.ids
            .iter()
            .map(|s| parse_id(s))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let entry = entries.get(&id)?;
        rows.push(StatusRow {
            state: EntryState::classify(entry.as_ref()),
            logical_id: id,
            entry,
        });
    }

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No entries.");
            }
            for row in &rows {
                match &row.entry {
                    Some(entry) => print_entry_line(entry),
                    None => println!(
                        "- {} ({})",
                        row.logical_id.as_str().bold(),
                        state_label(row.state)
                    ),
                }
            }
        }
    }
    Ok(())
}
