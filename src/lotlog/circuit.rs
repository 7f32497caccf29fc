use anyhow::{Context, Result};
use regex::{Captures, Regex};

use crate::model::{CircuitReading, CircuitRecord, CircuitStatus};

#[derive(Debug)]
pub struct CircuitBuilder {
    failure: Regex,
}

impl CircuitBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            failure: Regex::new(
                r"ES\s+(\d+)\s+FC(?:\s+(\d+))?\s+Length\s+(\d+\.\d+)\s+Breadth\s+(\d+\.\d+)\s+Area\s+(\d+\.\d+)",
            )
            .context("failed to compile circuit failure regex")?,
        })
    }

    /// Builds the record for a `\tES ...` failure line. Lines that do not fit
    /// the failure layout become [`CircuitReading::Corrupted`] instead of
    /// failing the whole lot.
    pub fn build(&self, line: &str, lot_id: i64, substrate_number: i64) -> CircuitRecord {
        let reading = self
            .failure
            .captures(line)
            .and_then(|captures| measured_reading(&captures))
            .unwrap_or(CircuitReading::Corrupted);

        CircuitRecord {
            lot_id,
            substrate_number,
            did_stop: caused_stop(line),
            reading,
        }
    }

    pub fn no_failure(&self, lot_id: i64, substrate_number: i64) -> CircuitRecord {
        CircuitRecord {
            lot_id,
            substrate_number,
            did_stop: false,
            reading: CircuitReading::NoFailure,
        }
    }
}

fn measured_reading(captures: &Captures<'_>) -> Option<CircuitReading> {
    let number = |index: usize| captures.get(index).map(|m| m.as_str());

    Some(CircuitReading::Measured {
        circuit_number: number(1)?.parse().ok()?,
        status: CircuitStatus::from_failure_code(number(2)),
        length: number(3)?.parse().ok()?,
        breadth: number(4)?.parse().ok()?,
        area: number(5)?.parse().ok()?,
    })
}

// Matches anywhere on the line; the two words need not belong to one field.
fn caused_stop(line: &str) -> bool {
    line.contains("Serial") && line.contains("True")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CORRUPTED_SENTINEL;

    fn builder() -> CircuitBuilder {
        CircuitBuilder::new().expect("circuit regex should compile")
    }

    #[test]
    fn build_extracts_measured_failure() {
        let record = builder().build("\tES 7 FC 1001 Length 2.50 Breadth 1.20 Area 3.00", 12345, 2);

        assert_eq!(record.lot_id, 12345);
        assert_eq!(record.substrate_number, 2);
        assert_eq!(record.circuit_number(), 7);
        assert_eq!(record.status(), CircuitStatus::NonRepairable);
        assert_eq!(record.dimensions(), (2.50, 1.20, 3.00));
        assert!(!record.did_stop);
        assert!(!record.is_corrupted());
    }

    #[test]
    fn build_maps_failure_codes_to_status() {
        let cases = [
            ("FC 1002", CircuitStatus::Repairable),
            ("FC 1003", CircuitStatus::FalseDefect),
            ("FC 2040", CircuitStatus::NotReviewed),
            ("FC", CircuitStatus::NotReviewed),
        ];

        for (code, expected) in cases {
            let line = format!("\tES 11 {code} Length 0.10 Breadth 0.20 Area 0.02");
            assert_eq!(builder().build(&line, 1, 1).status(), expected, "{code}");
        }
    }

    #[test]
    fn build_degrades_unstructured_lines_to_sentinels() {
        let record = builder().build("\tES 7 FC 1001 Serial True", 12345, 3);

        assert!(record.is_corrupted());
        assert_eq!(record.circuit_number(), CORRUPTED_SENTINEL);
        assert_eq!(record.status(), CircuitStatus::Unknown);
        assert_eq!(record.dimensions(), (-1.0, -1.0, -1.0));
        assert_eq!(record.substrate_number, 3);
        assert!(record.did_stop);
    }

    #[test]
    fn did_stop_needs_both_words() {
        let base = "\tES 4 FC 1001 Length 1.00 Breadth 1.00 Area 1.00";
        assert!(!builder().build(&format!("{base} Serial False"), 1, 1).did_stop);
        assert!(!builder().build(&format!("{base} true serial"), 1, 1).did_stop);
        assert!(builder().build(&format!("{base} Stop True Serial 9"), 1, 1).did_stop);
    }
}
