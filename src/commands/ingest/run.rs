use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

use super::DB_SCHEMA_VERSION;
use super::db_setup::{configure_connection, count_rows, ensure_schema};
use super::selection::{ParsedLot, skip_reason, sort_by_start_time};
use super::store::{LotWriteStats, load_existing_lot_keys, store_lot};
use crate::cli::IngestArgs;
use crate::commands::running_lots::{load_running_lots, running_lot_exclusions};
use aoilog::lotlog::LotLogParser;
use aoilog::model::{
    IngestCounts, IngestPaths, IngestRunManifest, LotKey, LotRecord, SourceEntry,
};
use aoilog::util::{
    collect_files, ensure_directory, file_name_lossy, now_utc_string, sha256_file,
    utc_compact_string, write_json_pretty,
};

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let state_root = args.state_root.clone();
    let manifest_dir = state_root.join("manifests");
    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| state_root.join("aoilog.sqlite"));

    info!(
        data_root = %args.data_root.display(),
        run_id = %run_id,
        dry_run = args.dry_run,
        "starting ingest"
    );

    let (mut connection, mut existing) = open_store(&state_root, &db_path, args.dry_run)?;
    info!(known_lots = existing.len(), "loaded existing lot keys");

    let running = match &args.running_lots_ini {
        Some(path) => running_lot_exclusions(&load_running_lots(path)?),
        None => Vec::new(),
    };

    let parser = LotLogParser::new()?;
    let mut counts = IngestCounts::default();
    let mut warnings = Vec::new();

    let mut parsed = parse_new_lots(
        &parser,
        &args.data_root,
        &mut existing,
        &running,
        &mut counts,
        &mut warnings,
    )?;
    sort_by_start_time(&mut parsed);

    if parsed.is_empty() {
        info!("no new lots found");
    } else {
        info!(lots = parsed.len(), "lots to upload");
    }

    let sources = upload_lots(
        connection.as_mut(),
        parsed,
        &args.data_root,
        &mut counts,
        &mut warnings,
    );

    let Some(connection) = connection else {
        info!(
            files = counts.files_seen,
            skipped = counts.files_skipped,
            lots = counts.lots_accepted,
            duplicates = counts.duplicate_lots,
            failed = counts.failed_files,
            "ingest dry-run complete"
        );
        return Ok(());
    };

    counts.lots_total = count_rows(&connection, "SELECT COUNT(*) FROM lot_data")?;
    counts.circuits_total = count_rows(&connection, "SELECT COUNT(*) FROM circuit_data")?;

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_ingest_command(&args),
        paths: IngestPaths {
            state_root: state_root.display().to_string(),
            data_root: args.data_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            db_path: db_path.display().to_string(),
            running_lots_ini: args
                .running_lots_ini
                .as_ref()
                .map(|path| path.display().to_string()),
        },
        counts,
        sources,
        warnings,
    };
    write_json_pretty(&ingest_manifest_path, &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        lots = manifest.counts.lots_accepted,
        circuits = manifest.counts.circuits_inserted,
        duplicates = manifest.counts.duplicate_lots,
        failed = manifest.counts.failed_files,
        "ingest completed"
    );

    Ok(())
}

/// Opens the store and loads the keys already ingested. Dry runs read an
/// existing database without writing to it and return no connection.
fn open_store(
    state_root: &Path,
    db_path: &Path,
    dry_run: bool,
) -> Result<(Option<Connection>, HashSet<LotKey>)> {
    if dry_run {
        if !db_path.exists() {
            return Ok((None, HashSet::new()));
        }
        let connection = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open {} read-only", db_path.display()))?;
        return Ok((None, load_existing_lot_keys(&connection)?));
    }

    ensure_directory(state_root)?;
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    let existing = load_existing_lot_keys(&connection)?;

    Ok((Some(connection), existing))
}

/// Parses every candidate under `data_root`. Accepted keys go straight into
/// `existing` so a second file resolving to the same lot is a duplicate.
pub(super) fn parse_new_lots(
    parser: &LotLogParser,
    data_root: &Path,
    existing: &mut HashSet<LotKey>,
    running: &[String],
    counts: &mut IngestCounts,
    warnings: &mut Vec<String>,
) -> Result<Vec<ParsedLot>> {
    let mut parsed = Vec::new();
    // The filename screen only trusts keys stored by earlier runs.
    let stored = existing.clone();

    for path in collect_files(data_root)? {
        counts.files_seen += 1;

        let file_name = file_name_lossy(&path);
        if let Some(reason) = skip_reason(&file_name, &stored, running) {
            debug!(file = %file_name, reason = reason.as_str(), "skipping log");
            counts.files_skipped += 1;
            continue;
        }

        match parser.parse_lot(&path, existing) {
            Ok(lot) => {
                counts.files_parsed += 1;
                existing.insert(lot.key());
                parsed.push(ParsedLot { path, lot });
            }
            Err(err) if err.is_duplicate() => {
                info!(path = %path.display(), error = %err, "skipping duplicate lot");
                counts.duplicate_lots += 1;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "error while parsing");
                warnings.push(format!("{}: {err}", path.display()));
                counts.failed_files += 1;
            }
        }
    }

    Ok(parsed)
}

/// Hashes and stores each parsed lot. A lot whose file can no longer be
/// hashed or whose rows fail to commit is counted as failed and the batch
/// moves on. Without a connection nothing is hashed or stored.
pub(super) fn upload_lots(
    mut connection: Option<&mut Connection>,
    parsed: Vec<ParsedLot>,
    data_root: &Path,
    counts: &mut IngestCounts,
    warnings: &mut Vec<String>,
) -> Vec<SourceEntry> {
    let mut sources = Vec::with_capacity(parsed.len());

    for ParsedLot { path, lot } in parsed {
        let corrupted = lot.circuits.iter().filter(|c| c.is_corrupted()).count();

        if let Some(connection) = connection.as_deref_mut() {
            match store_source(connection, &path, &lot) {
                Ok((sha256, stats)) => {
                    counts.circuits_inserted += stats.circuits_inserted;
                    counts.circuits_replaced += stats.circuits_replaced;
                    counts.circuits_skipped += stats.circuits_skipped;
                    sources.push(SourceEntry {
                        path: path
                            .strip_prefix(data_root)
                            .unwrap_or(&path)
                            .display()
                            .to_string(),
                        lot_id: lot.lot_id,
                        machine: lot.machine.clone(),
                        layer: lot.layer.clone(),
                        circuit_count: lot.circuits.len(),
                        sha256,
                    });
                }
                Err(err) => {
                    warn!(lot_id = lot.lot_id, layer = %lot.layer, error = %err, "failed to store lot");
                    warnings.push(format!("{}: {err:#}", path.display()));
                    counts.failed_files += 1;
                    continue;
                }
            }
        }

        info!(
            lot_id = lot.lot_id,
            layer = %lot.layer,
            circuits = lot.circuits.len(),
            corrupted,
            "uploaded lot"
        );
        counts.lots_accepted += 1;
        counts.corrupted_circuits += corrupted;
    }

    sources
}

fn store_source(
    connection: &mut Connection,
    path: &Path,
    lot: &LotRecord,
) -> Result<(String, LotWriteStats)> {
    let sha256 = sha256_file(path)?;
    let stats = store_lot(connection, lot)?;
    Ok((sha256, stats))
}

pub(super) fn render_ingest_command(args: &IngestArgs) -> String {
    let mut command = vec![
        "aoilog".to_string(),
        "ingest".to_string(),
        "--state-root".to_string(),
        args.state_root.display().to_string(),
        "--data-root".to_string(),
        args.data_root.display().to_string(),
    ];

    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.ingest_manifest_path {
        command.push("--ingest-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.running_lots_ini {
        command.push("--running-lots-ini".to_string());
        command.push(path.display().to_string());
    }
    if args.dry_run {
        command.push("--dry-run".to_string());
    }

    command.join(" ")
}
