use std::collections::HashSet;

use super::error::LotLogError;
use crate::model::{LotKey, LotRecord};

/// Passes `lot` through unless its `(lot_id, machine, layer)` key is already
/// known. The caller owns `existing` and adds accepted keys between files.
pub fn admit(lot: LotRecord, existing: &HashSet<LotKey>) -> Result<LotRecord, LotLogError> {
    if existing.contains(&lot.key()) {
        return Err(LotLogError::DuplicateLot { lot_id: lot.lot_id });
    }
    Ok(lot)
}
