use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;

use super::error::LotLogError;

const DATE_FORMAT: &str = "%m/%d/%Y";
const CIRCUIT_PREFIX: &str = "\tES ";
const NO_FAILURE_PREFIX: &str = "\tNo Failure";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Machine,
    Layout,
    LotNumber,
    StartDate,
    StartTime,
    EndDate,
    EndTime,
    SubstrateInput,
    InputCount,
    ReviewedCount,
    GoodCount,
    RejectCount,
    OutputCount,
    Substrate,
}

impl HeaderField {
    pub fn from_key(key: &str) -> Option<Self> {
        let field = match key {
            "Machine" => Self::Machine,
            "Typ" => Self::Layout,
            "ChargenNr" => Self::LotNumber,
            "StartDate" => Self::StartDate,
            "StartTime" => Self::StartTime,
            "EndDate" => Self::EndDate,
            "EndTime" => Self::EndTime,
            "GS-Input" => Self::SubstrateInput,
            "ES-Input" => Self::InputCount,
            "ES-Reviewed" => Self::ReviewedCount,
            "ES-Good" => Self::GoodCount,
            "Total-rejects" => Self::RejectCount,
            "ES-Output" => Self::OutputCount,
            "GS" => Self::Substrate,
            _ => return None,
        };
        Some(field)
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Machine => "Machine",
            Self::Layout => "Typ",
            Self::LotNumber => "ChargenNr",
            Self::StartDate => "StartDate",
            Self::StartTime => "StartTime",
            Self::EndDate => "EndDate",
            Self::EndTime => "EndTime",
            Self::SubstrateInput => "GS-Input",
            Self::InputCount => "ES-Input",
            Self::ReviewedCount => "ES-Reviewed",
            Self::GoodCount => "ES-Good",
            Self::RejectCount => "Total-rejects",
            Self::OutputCount => "ES-Output",
            Self::Substrate => "GS",
        }
    }
}

/// Shape of one log line, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLine<'a> {
    Header { field: HeaderField, value: &'a str },
    /// A bracketed header whose key this parser does not use.
    IgnoredHeader { key: &'a str },
    CircuitFailure(&'a str),
    NoFailure,
    Other,
}

#[derive(Debug)]
pub struct LineClassifier {
    header: Regex,
}

impl LineClassifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            header: Regex::new(r"\[(.*?)\](.*)").context("failed to compile header line regex")?,
        })
    }

    pub fn classify<'a>(&self, line: &'a str) -> LogLine<'a> {
        if let Some(captures) = self.header.captures(line) {
            let key = captures.get(1).map_or("", |m| m.as_str()).trim();
            let value = captures.get(2).map_or("", |m| m.as_str()).trim();
            return match HeaderField::from_key(key) {
                Some(field) => LogLine::Header { field, value },
                None => LogLine::IgnoredHeader { key },
            };
        }

        if line.starts_with(CIRCUIT_PREFIX) {
            LogLine::CircuitFailure(line)
        } else if line.starts_with(NO_FAILURE_PREFIX) {
            LogLine::NoFailure
        } else {
            LogLine::Other
        }
    }
}

pub fn parse_count(field: HeaderField, value: &str) -> Result<i64, LotLogError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| LotLogError::MalformedNumber {
            field: field.key().to_string(),
            value: value.to_string(),
        })
}

/// `ES-Good` carries trailing text after the count, e.g. `118 (98.3%)`.
pub fn parse_leading_count(field: HeaderField, value: &str) -> Result<i64, LotLogError> {
    parse_count(field, value.split_whitespace().next().unwrap_or_default())
}

/// `GS` values look like `3A...`; the substrate number is the part before the
/// first `A`.
pub fn parse_substrate_number(value: &str) -> Result<i64, LotLogError> {
    let prefix = value.split('A').next().unwrap_or_default();
    parse_count(HeaderField::Substrate, prefix)
}

pub fn parse_date(field: HeaderField, value: &str) -> Result<NaiveDate, LotLogError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| LotLogError::MalformedDate {
        field: field.key(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> LineClassifier {
        LineClassifier::new().expect("classifier regexes should compile")
    }

    #[test]
    fn classify_extracts_trimmed_header_key_and_value() {
        let line = classifier().classify("[ChargenNr]  240117-2 ");
        assert_eq!(
            line,
            LogLine::Header {
                field: HeaderField::LotNumber,
                value: "240117-2"
            }
        );
    }

    #[test]
    fn classify_keeps_unknown_keys_inert() {
        let line = classifier().classify("[Operator]J. Doe");
        assert_eq!(line, LogLine::IgnoredHeader { key: "Operator" });
    }

    #[test]
    fn classify_recognizes_tab_prefixed_circuit_lines() {
        let raw = "\tES 7 FC 1001 Length 2.50 Breadth 1.20 Area 3.00";
        assert_eq!(classifier().classify(raw), LogLine::CircuitFailure(raw));
        assert_eq!(classifier().classify("ES 7 FC 1001"), LogLine::Other);
    }

    #[test]
    fn classify_recognizes_no_failure_lines() {
        assert_eq!(classifier().classify("\tNo Failure"), LogLine::NoFailure);
        assert_eq!(classifier().classify("No Failure"), LogLine::Other);
    }

    #[test]
    fn header_wins_over_circuit_prefix() {
        let line = classifier().classify("\tES 3 [GS]4A");
        assert_eq!(
            line,
            LogLine::Header {
                field: HeaderField::Substrate,
                value: "4A"
            }
        );
    }

    #[test]
    fn field_extractors_handle_log_value_shapes() {
        assert_eq!(
            parse_leading_count(HeaderField::GoodCount, "118 (98.3%)").expect("good count"),
            118
        );
        assert_eq!(parse_substrate_number("12A03").expect("substrate"), 12);
        assert_eq!(parse_substrate_number("5").expect("bare substrate"), 5);
        assert_eq!(
            parse_date(HeaderField::StartDate, "04/24/2024").expect("date"),
            NaiveDate::from_ymd_opt(2024, 4, 24).expect("valid date")
        );
    }

    #[test]
    fn field_extractors_report_the_offending_field() {
        let err = parse_count(HeaderField::InputCount, "n/a").expect_err("not a number");
        assert!(matches!(
            err,
            LotLogError::MalformedNumber { ref field, .. } if field == "ES-Input"
        ));

        let err = parse_date(HeaderField::EndDate, "2024-04-24").expect_err("wrong format");
        assert!(matches!(err, LotLogError::MalformedDate { field: "EndDate", .. }));
    }
}
