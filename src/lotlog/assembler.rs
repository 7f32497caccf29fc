use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, NaiveTime};
use regex::Regex;
use tracing::{debug, trace};

use super::circuit::CircuitBuilder;
use super::error::LotLogError;
use super::guard::admit;
use super::line::{
    HeaderField, LineClassifier, LogLine, parse_count, parse_date, parse_leading_count,
    parse_substrate_number,
};
use super::lot_id::resolve_lot_id;
use super::time::decode_time;
use crate::model::{LotKey, LotRecord, NULL_MACHINE, UNSET_LABEL};

/// Station name written by the generic AOI setup; stored as [`NULL_MACHINE`].
const GENERIC_MACHINE: &str = "BoschDsp - AOI";

/// Parses AOI batch logs into [`LotRecord`]s.
#[derive(Debug)]
pub struct LotLogParser {
    classifier: LineClassifier,
    circuits: CircuitBuilder,
    layer_token: Regex,
}

impl LotLogParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            classifier: LineClassifier::new()?,
            circuits: CircuitBuilder::new()?,
            layer_token: Regex::new(r"_([A-Z]\d+)_").context("failed to compile layer token regex")?,
        })
    }

    /// Reads and parses one log file, then rejects it if its key is already in
    /// `existing`.
    pub fn parse_lot(
        &self,
        path: &Path,
        existing: &HashSet<LotKey>,
    ) -> Result<LotRecord, LotLogError> {
        let is_file = fs::metadata(path)
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(LotLogError::NotAFile(path.to_path_buf()));
        }

        debug!(path = %path.display(), "parsing lot log");
        let bytes = fs::read(path).map_err(|source| LotLogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();

        self.parse_lot_text(&file_name, &text, existing)
    }

    pub fn parse_lot_text(
        &self,
        file_name: &str,
        text: &str,
        existing: &HashSet<LotKey>,
    ) -> Result<LotRecord, LotLogError> {
        let lot = self.assemble(file_name, text)?;
        admit(lot, existing)
    }

    /// Runs the line scan without the duplicate check.
    pub fn assemble(&self, file_name: &str, text: &str) -> Result<LotRecord, LotLogError> {
        let mut state = ScanState::new(self.layer_from_file_name(file_name));

        for line in text.lines() {
            state.step(self.classifier.classify(line), &self.circuits)?;
        }

        let lot = state.finish();
        debug!(
            lot_id = lot.lot_id,
            machine = %lot.machine,
            layout = %lot.layout,
            layer = %lot.layer,
            substrates = lot.substrate_count,
            failures = lot.circuits.len(),
            "lot data extracted"
        );
        Ok(lot)
    }

    /// `LOT_A23_x.log` yields `A2`; names without a layer token yield `NA`.
    pub fn layer_from_file_name(&self, file_name: &str) -> String {
        self.layer_token
            .captures(file_name)
            .and_then(|captures| captures.get(1))
            .map(|token| token.as_str().chars().take(2).collect())
            .unwrap_or_else(|| UNSET_LABEL.to_string())
    }
}

/// Everything carried from one line to the next during a scan.
#[derive(Debug)]
pub struct ScanState {
    lot: LotRecord,
    substrate_number: i64,
    substrate_headers_seen: i64,
}

impl ScanState {
    pub fn new(layer: String) -> Self {
        Self {
            lot: LotRecord {
                layer,
                ..LotRecord::default()
            },
            substrate_number: 0,
            substrate_headers_seen: 0,
        }
    }

    pub fn step(&mut self, line: LogLine<'_>, circuits: &CircuitBuilder) -> Result<(), LotLogError> {
        match line {
            LogLine::Header { field, value } => self.apply_header(field, value)?,
            LogLine::IgnoredHeader { key } => trace!(key, "ignoring header"),
            LogLine::CircuitFailure(raw) => {
                let circuit = circuits.build(raw, self.lot.lot_id, self.substrate_number);
                debug!(
                    substrate = circuit.substrate_number,
                    circuit = circuit.circuit_number(),
                    status = circuit.status().as_str(),
                    did_stop = circuit.did_stop,
                    "circuit data extracted"
                );
                self.lot.circuits.push(circuit);
            }
            LogLine::NoFailure => {
                // Clean substrates are not persisted.
                let clean = circuits.no_failure(self.lot.lot_id, self.substrate_number);
                debug!(
                    substrate = clean.substrate_number,
                    status = clean.status().as_str(),
                    "no failure on substrate"
                );
            }
            LogLine::Other => {}
        }
        Ok(())
    }

    fn apply_header(&mut self, field: HeaderField, value: &str) -> Result<(), LotLogError> {
        let lot = &mut self.lot;
        match field {
            HeaderField::Machine => {
                lot.machine = if value == GENERIC_MACHINE {
                    NULL_MACHINE.to_string()
                } else {
                    value.to_string()
                };
            }
            HeaderField::Layout => lot.layout = value.to_string(),
            HeaderField::LotNumber => lot.lot_id = resolve_lot_id(value)?,
            HeaderField::StartDate => lot.start_time = Some(midnight(field, value)?),
            HeaderField::EndDate => lot.end_time = Some(midnight(field, value)?),
            HeaderField::StartTime => {
                lot.start_time = Some(with_time(lot.start_time, field, value)?);
            }
            HeaderField::EndTime => {
                lot.end_time = Some(with_time(lot.end_time, field, value)?);
            }
            HeaderField::SubstrateInput => lot.substrate_count = parse_count(field, value)?,
            HeaderField::InputCount => lot.input_count = parse_count(field, value)?,
            HeaderField::ReviewedCount => lot.reviewed_count = parse_count(field, value)?,
            HeaderField::GoodCount => lot.good_count = parse_leading_count(field, value)?,
            HeaderField::RejectCount => lot.reject_count = parse_count(field, value)?,
            HeaderField::OutputCount => lot.output_count = parse_count(field, value)?,
            HeaderField::Substrate => {
                self.substrate_number = parse_substrate_number(value)?;
                self.substrate_headers_seen += 1;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> LotRecord {
        let mut lot = self.lot;

        if lot.substrate_count == 0 && self.substrate_headers_seen > 0 {
            debug!(
                substrates = self.substrate_headers_seen,
                "GS-Input missing, counting substrate headers"
            );
            lot.substrate_count = self.substrate_headers_seen;
        }

        // ChargenNr may follow the first circuit lines.
        let lot_id = lot.lot_id;
        for circuit in &mut lot.circuits {
            circuit.lot_id = lot_id;
        }

        lot
    }
}

fn midnight(field: HeaderField, value: &str) -> Result<NaiveDateTime, LotLogError> {
    Ok(parse_date(field, value)?.and_time(NaiveTime::default()))
}

fn with_time(
    current: Option<NaiveDateTime>,
    field: HeaderField,
    value: &str,
) -> Result<NaiveDateTime, LotLogError> {
    let date = current
        .ok_or(LotLogError::TimeWithoutDate { field: field.key() })?
        .date();
    let (hour, minute, second) = decode_time(value)?;

    date.and_hms_opt(hour, minute, second)
        .ok_or_else(|| LotLogError::MalformedTime(value.to_string()))
}
