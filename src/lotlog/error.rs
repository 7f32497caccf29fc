use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while turning one AOI log into a lot record.
///
/// Every variant is scoped to a single file: batch callers log it and move on
/// to the next file.
#[derive(Debug, Error)]
pub enum LotLogError {
    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),

    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed time value: {0:?}")]
    MalformedTime(String),

    #[error("malformed {field} value: {value:?}")]
    MalformedDate { field: &'static str, value: String },

    #[error("{field} appears before its date")]
    TimeWithoutDate { field: &'static str },

    #[error("malformed lot identifier: {0:?}")]
    MalformedLotId(String),

    #[error("malformed numeric {field} value: {value:?}")]
    MalformedNumber { field: String, value: String },

    #[error("lot {lot_id} has already been parsed")]
    DuplicateLot { lot_id: i64 },
}

impl LotLogError {
    /// Duplicates are routine during a batch run and are not data problems.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateLot { .. })
    }
}
