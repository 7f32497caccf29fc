use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::ingest::count_rows;
use aoilog::model::IngestRunManifest;
use aoilog::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.state_root.join("manifests");
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.state_root.join("aoilog.sqlite"));

    info!(state_root = %args.state_root.display(), "status requested");

    match latest_ingest_manifest(&manifest_dir)? {
        Some(path) => {
            let manifest: IngestRunManifest = read_json(&path)?;
            info!(
                run_id = %manifest.run_id,
                status = %manifest.status,
                started_at = %manifest.started_at,
                updated_at = %manifest.updated_at,
                files_seen = manifest.counts.files_seen,
                lots_accepted = manifest.counts.lots_accepted,
                duplicate_lots = manifest.counts.duplicate_lots,
                failed_files = manifest.counts.failed_files,
                corrupted_circuits = manifest.counts.corrupted_circuits,
                warnings = manifest.warnings.len(),
                "loaded latest ingest run manifest"
            );
        }
        None => warn!(path = %manifest_dir.display(), "no ingest run manifest found"),
    }

    if db_path.exists() {
        let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let lots = count_rows(&conn, "SELECT COUNT(*) FROM lot_data").unwrap_or(0);
        let circuits = count_rows(&conn, "SELECT COUNT(*) FROM circuit_data").unwrap_or(0);
        let corrupted =
            count_rows(&conn, "SELECT COUNT(*) FROM circuit_data WHERE circuit_num = -1")
                .unwrap_or(0);

        info!(
            path = %db_path.display(),
            lots,
            circuits,
            corrupted,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

/// Run manifests embed a compact UTC timestamp, so the greatest name is the
/// newest run.
fn latest_ingest_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.is_dir() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("ingest_run_") && name.ends_with(".json"))
            .unwrap_or(false);

        if is_run_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}
