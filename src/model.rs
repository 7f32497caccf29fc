use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Machine name stored when the log names the generic AOI station.
pub const NULL_MACHINE: &str = "NULL";
/// Placeholder for layout and layer when the log does not provide one.
pub const UNSET_LABEL: &str = "NA";
/// Value reported for every numeric circuit field of a corrupted line.
pub const CORRUPTED_SENTINEL: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitStatus {
    NonRepairable,
    Repairable,
    FalseDefect,
    NotReviewed,
    Unknown,
    NoFailure,
}

impl CircuitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NonRepairable => "NonRepairable",
            Self::Repairable => "Repairable",
            Self::FalseDefect => "FalseDefect",
            Self::NotReviewed => "NotReviewed",
            Self::Unknown => "Unknown",
            Self::NoFailure => "No Failure",
        }
    }

    /// Maps the optional `FC` code of a failure line. Unknown codes and a
    /// missing code both mean the defect was never reviewed.
    pub fn from_failure_code(code: Option<&str>) -> Self {
        match code {
            Some("1001") => Self::NonRepairable,
            Some("1002") => Self::Repairable,
            Some("1003") => Self::FalseDefect,
            _ => Self::NotReviewed,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NonRepairable" => Some(Self::NonRepairable),
            "Repairable" => Some(Self::Repairable),
            "FalseDefect" => Some(Self::FalseDefect),
            "NotReviewed" => Some(Self::NotReviewed),
            "Unknown" => Some(Self::Unknown),
            "No Failure" => Some(Self::NoFailure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CircuitReading {
    Measured {
        circuit_number: i64,
        status: CircuitStatus,
        length: f64,
        breadth: f64,
        area: f64,
    },
    /// The failure line did not match the expected structure.
    Corrupted,
    /// A substrate reported without defects.
    NoFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitRecord {
    pub lot_id: i64,
    pub substrate_number: i64,
    pub did_stop: bool,
    pub reading: CircuitReading,
}

impl CircuitRecord {
    pub fn circuit_number(&self) -> i64 {
        match &self.reading {
            CircuitReading::Measured { circuit_number, .. } => *circuit_number,
            CircuitReading::Corrupted => CORRUPTED_SENTINEL,
            CircuitReading::NoFailure => 0,
        }
    }

    pub fn status(&self) -> CircuitStatus {
        match &self.reading {
            CircuitReading::Measured { status, .. } => *status,
            CircuitReading::Corrupted => CircuitStatus::Unknown,
            CircuitReading::NoFailure => CircuitStatus::NoFailure,
        }
    }

    /// Returns `(length, breadth, area)`.
    pub fn dimensions(&self) -> (f64, f64, f64) {
        match &self.reading {
            CircuitReading::Measured {
                length,
                breadth,
                area,
                ..
            } => (*length, *breadth, *area),
            CircuitReading::Corrupted => {
                let sentinel = CORRUPTED_SENTINEL as f64;
                (sentinel, sentinel, sentinel)
            }
            CircuitReading::NoFailure => (0.0, 0.0, 0.0),
        }
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self.reading, CircuitReading::Corrupted)
    }

    pub fn key(&self, layer: &str) -> CircuitKey {
        CircuitKey {
            lot_id: self.lot_id,
            substrate_number: self.substrate_number,
            circuit_number: self.circuit_number(),
            layer: layer.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LotRecord {
    pub lot_id: i64,
    pub machine: String,
    pub layout: String,
    pub layer: String,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub substrate_count: i64,
    pub input_count: i64,
    pub reviewed_count: i64,
    pub good_count: i64,
    pub reject_count: i64,
    pub output_count: i64,
    pub circuits: Vec<CircuitRecord>,
}

impl Default for LotRecord {
    fn default() -> Self {
        Self {
            lot_id: 0,
            machine: NULL_MACHINE.to_string(),
            layout: UNSET_LABEL.to_string(),
            layer: UNSET_LABEL.to_string(),
            start_time: None,
            end_time: None,
            substrate_count: 0,
            input_count: 0,
            reviewed_count: 0,
            good_count: 0,
            reject_count: 0,
            output_count: 0,
            circuits: Vec::new(),
        }
    }
}

impl LotRecord {
    pub fn key(&self) -> LotKey {
        LotKey {
            lot_id: self.lot_id,
            machine: self.machine.clone(),
            layer: self.layer.clone(),
        }
    }
}

/// Natural identity of an ingested lot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LotKey {
    pub lot_id: i64,
    pub machine: String,
    pub layer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CircuitKey {
    pub lot_id: i64,
    pub substrate_number: i64,
    pub circuit_number: i64,
    pub layer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub path: String,
    pub lot_id: i64,
    pub machine: String,
    pub layer: String,
    pub circuit_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPaths {
    pub state_root: String,
    pub data_root: String,
    pub manifest_dir: String,
    pub db_path: String,
    pub running_lots_ini: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestCounts {
    pub files_seen: usize,
    pub files_skipped: usize,
    pub files_parsed: usize,
    pub lots_accepted: usize,
    pub duplicate_lots: usize,
    pub failed_files: usize,
    pub circuits_inserted: usize,
    pub circuits_replaced: usize,
    pub circuits_skipped: usize,
    pub corrupted_circuits: usize,
    pub lots_total: i64,
    pub circuits_total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub sources: Vec<SourceEntry>,
    pub warnings: Vec<String>,
}
