use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::cli::SyncArgs;
use crate::commands::running_lots::load_running_lots;
use aoilog::util::{collect_files, ensure_directory, file_name_lossy, sha256_file};

/// Print-management lot numbers carry a plant code; logs only use the tail.
const LOT_SUFFIX_LEN: usize = 6;
const SECONDS_PER_HOUR: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedCopy {
    source: PathBuf,
    destination: PathBuf,
}

#[derive(Debug, Default)]
struct CopyPlan {
    copies: Vec<PlannedCopy>,
    already_on_server: usize,
    held_back: usize,
}

struct Exclusions<'a> {
    running_lots: &'a [String],
    incomplete_suffixes: &'a [String],
    min_age: Duration,
    now: SystemTime,
}

pub fn run(args: SyncArgs) -> Result<()> {
    info!(
        local_root = %args.local_root.display(),
        server_root = %args.server_root.display(),
        dry_run = args.dry_run,
        "starting sync"
    );

    let running_lots: Vec<String> = match &args.running_lots_ini {
        Some(path) => load_running_lots(path)?
            .iter()
            .map(ToString::to_string)
            .collect(),
        None => Vec::new(),
    };
    let incomplete_suffixes = incomplete_lot_suffixes(&args.exclude_lots);

    let exclusions = Exclusions {
        running_lots: &running_lots,
        incomplete_suffixes: &incomplete_suffixes,
        min_age: Duration::from_secs(args.min_age_hours * SECONDS_PER_HOUR),
        now: SystemTime::now(),
    };
    let plan = plan_copies(&args.local_root, &args.server_root, &exclusions)?;

    info!(
        to_copy = plan.copies.len(),
        already_on_server = plan.already_on_server,
        held_back = plan.held_back,
        "sync plan ready"
    );
    for copy in &plan.copies {
        info!(source = %copy.source.display(), destination = %copy.destination.display(), "file to move");
    }

    if args.dry_run {
        info!("sync dry-run complete");
        return Ok(());
    }

    let mut unverified = 0_usize;
    for copy in &plan.copies {
        copy_file(copy)?;
        if !copy_matches(copy)? {
            warn!(destination = %copy.destination.display(), "copied file does not match source");
            unverified += 1;
        }
    }

    if unverified > 0 {
        bail!(
            "{unverified} of {} copied files failed verification",
            plan.copies.len()
        );
    }

    info!(copied = plan.copies.len(), "sync completed");
    Ok(())
}

fn plan_copies(local_root: &Path, server_root: &Path, exclusions: &Exclusions<'_>) -> Result<CopyPlan> {
    let mut plan = CopyPlan::default();

    for source in collect_files(local_root)? {
        let destination = destination_for(&source, server_root);
        if destination.exists() {
            plan.already_on_server += 1;
            continue;
        }

        if let Some(reason) = hold_back_reason(&source, exclusions)? {
            debug!(path = %source.display(), reason, "holding file back");
            plan.held_back += 1;
            continue;
        }

        plan.copies.push(PlannedCopy {
            source,
            destination,
        });
    }

    Ok(plan)
}

/// Logs land in `<server_root>/<parent folder>/<file name>`.
fn destination_for(source: &Path, server_root: &Path) -> PathBuf {
    let parent_name = source
        .parent()
        .and_then(Path::file_name)
        .map(PathBuf::from)
        .unwrap_or_default();
    server_root.join(parent_name).join(file_name_lossy(source))
}

fn hold_back_reason(source: &Path, exclusions: &Exclusions<'_>) -> Result<Option<&'static str>> {
    let file_name = file_name_lossy(source);
    if exclusions
        .running_lots
        .iter()
        .any(|lot| file_name.contains(lot.as_str()))
    {
        return Ok(Some("running lot"));
    }

    let path_text = source.to_string_lossy();
    if exclusions
        .incomplete_suffixes
        .iter()
        .any(|suffix| path_text.contains(suffix.as_str()))
    {
        return Ok(Some("incomplete lot"));
    }

    let metadata = fs::metadata(source)
        .with_context(|| format!("failed to inspect {}", source.display()))?;
    let created = metadata
        .created()
        .or_else(|_| metadata.modified())
        .with_context(|| format!("failed to read timestamps of {}", source.display()))?;
    let age = exclusions.now.duration_since(created).unwrap_or_default();
    if age < exclusions.min_age {
        return Ok(Some("too new"));
    }

    Ok(None)
}

fn incomplete_lot_suffixes(lots: &[String]) -> Vec<String> {
    lots.iter()
        .map(|lot| lot.trim())
        .filter(|lot| !lot.is_empty())
        .map(|lot| {
            let skip = lot.chars().count().saturating_sub(LOT_SUFFIX_LEN);
            lot.chars().skip(skip).collect()
        })
        .collect()
}

fn copy_file(copy: &PlannedCopy) -> Result<()> {
    if let Some(parent) = copy.destination.parent() {
        ensure_directory(parent)?;
    }
    fs::copy(&copy.source, &copy.destination).with_context(|| {
        format!(
            "failed to copy {} to {}",
            copy.source.display(),
            copy.destination.display()
        )
    })?;
    info!(file = %file_name_lossy(&copy.source), "copied");
    Ok(())
}

fn copy_matches(copy: &PlannedCopy) -> Result<bool> {
    if !copy.destination.is_file() {
        return Ok(false);
    }
    Ok(sha256_file(&copy.source)? == sha256_file(&copy.destination)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write file");
    }

    #[test]
    fn incomplete_lot_suffixes_drop_plant_codes() {
        let lots = vec!["27240117".to_string(), "1234".to_string(), " ".to_string()];
        assert_eq!(incomplete_lot_suffixes(&lots), vec!["240117", "1234"]);
    }

    #[test]
    fn destination_keeps_parent_folder_name() {
        let destination = destination_for(
            Path::new("/station/BatchLogs/2024-04/240117_A2_top.log"),
            Path::new("/share/BatchLogs"),
        );
        assert_eq!(
            destination,
            PathBuf::from("/share/BatchLogs/2024-04/240117_A2_top.log")
        );
    }

    #[test]
    fn plan_copies_skips_synced_running_and_incomplete_lots() {
        let local = TempDir::new().expect("local dir");
        let server = TempDir::new().expect("server dir");
        write(&local.path().join("2024-04/240117_A2_top.log"), "done");
        write(&local.path().join("2024-04/240118_A2_top.log"), "synced");
        write(&local.path().join("2024-04/240119_A2_top.log"), "running");
        write(&local.path().join("2024-04/240120_A2_top.log"), "printing");
        write(&server.path().join("2024-04/240118_A2_top.log"), "synced");

        let running = vec!["240119".to_string()];
        let incomplete = incomplete_lot_suffixes(&["27240120".to_string()]);
        let exclusions = Exclusions {
            running_lots: &running,
            incomplete_suffixes: &incomplete,
            min_age: Duration::ZERO,
            now: SystemTime::now() + Duration::from_secs(1),
        };

        let plan = plan_copies(local.path(), server.path(), &exclusions).expect("plan");
        assert_eq!(plan.already_on_server, 1);
        assert_eq!(plan.held_back, 2);
        assert_eq!(
            plan.copies,
            vec![PlannedCopy {
                source: local.path().join("2024-04/240117_A2_top.log"),
                destination: server.path().join("2024-04/240117_A2_top.log"),
            }]
        );
    }

    #[test]
    fn plan_copies_holds_back_fresh_files() {
        let local = TempDir::new().expect("local dir");
        let server = TempDir::new().expect("server dir");
        write(&local.path().join("2024-04/240117_A2_top.log"), "fresh");

        let exclusions = Exclusions {
            running_lots: &[],
            incomplete_suffixes: &[],
            min_age: Duration::from_secs(SECONDS_PER_HOUR),
            now: SystemTime::now(),
        };

        let plan = plan_copies(local.path(), server.path(), &exclusions).expect("plan");
        assert!(plan.copies.is_empty());
        assert_eq!(plan.held_back, 1);
    }

    #[test]
    fn copy_file_creates_folders_and_verifies() {
        let local = TempDir::new().expect("local dir");
        let server = TempDir::new().expect("server dir");
        let source = local.path().join("2024-04/240117_A2_top.log");
        write(&source, "[ChargenNr]240117\n");

        let copy = PlannedCopy {
            destination: destination_for(&source, server.path()),
            source,
        };
        copy_file(&copy).expect("copy should succeed");
        assert!(copy_matches(&copy).expect("hash both files"));
    }
}
