use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use aoilog::lotlog::resolve_lot_id;
use regex::Regex;
use tracing::{info, warn};

/// Lot ids listed as `Lot=<digits>` in the screen-management ini.
pub fn load_running_lots(path: &Path) -> Result<Vec<i64>> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let content = String::from_utf8_lossy(&bytes);
    let lots = parse_running_lots(&content)?;

    for lot in &lots {
        info!(lot, "currently running lot");
    }

    Ok(lots)
}

pub fn parse_running_lots(content: &str) -> Result<Vec<i64>> {
    let pattern = Regex::new(r"Lot=(\d+)").context("failed to compile running lot regex")?;
    let mut lots = Vec::new();

    for line in content.lines() {
        let Some(raw) = pattern.captures(line).and_then(|captures| captures.get(1)) else {
            continue;
        };
        match resolve_lot_id(raw.as_str()) {
            Ok(lot) => lots.push(lot),
            Err(err) => warn!(line, error = %err, "skipping unreadable running lot"),
        }
    }

    Ok(lots)
}

/// Filename fragments to leave alone while lots are on the line. A running
/// lot also holds back its sister, numbered one higher.
pub fn running_lot_exclusions(lots: &[i64]) -> Vec<String> {
    lots.iter()
        .flat_map(|lot| {
            let sister = lot.checked_add(1).map(|sister| sister.to_string());
            std::iter::once(lot.to_string()).chain(sister)
        })
        .collect()
}
