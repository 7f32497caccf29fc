use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;

use aoilog::model::{LotKey, LotRecord};

/// Number of leading lot-id characters matched against filenames.
const LOT_PREFIX_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    RunningLot,
    AlreadyIngested,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunningLot => "running lot",
            Self::AlreadyIngested => "already ingested",
        }
    }
}

/// Cheap filename screen run before a file is opened. Lots still on the line
/// are left alone; a name carrying a known lot prefix and its layer was
/// ingested by an earlier run.
pub fn skip_reason(
    file_name: &str,
    existing: &HashSet<LotKey>,
    running: &[String],
) -> Option<SkipReason> {
    if running.iter().any(|lot| file_name.contains(lot.as_str())) {
        return Some(SkipReason::RunningLot);
    }

    let ingested = existing.iter().any(|key| {
        let lot = key.lot_id.to_string();
        let prefix: String = lot.chars().take(LOT_PREFIX_LEN).collect();
        file_name.contains(&prefix) && file_name.contains(&key.layer)
    });
    ingested.then_some(SkipReason::AlreadyIngested)
}

#[derive(Debug)]
pub struct ParsedLot {
    pub path: PathBuf,
    pub lot: LotRecord,
}

/// Oldest runs first; lots without a start time go last.
pub fn sort_by_start_time(lots: &mut [ParsedLot]) {
    lots.sort_by(|a, b| match (a.lot.start_time, b.lot.start_time) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
