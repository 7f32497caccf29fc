use std::collections::HashSet;
use std::fs;

use chrono::NaiveDate;
use tempfile::TempDir;

use super::*;
use crate::model::{CircuitStatus, LotKey, LotRecord};

const SAMPLE_LOG: &str = "\
[Machine]AOI-Line-2
[Typ]LX-4410
[ChargenNr]240117-2
[StartDate]04/24/2024
[StartTime]1:05 PM
[EndDate]04/24/2024
[EndTime]11:59PM
[GS-Input]3
[ES-Input]120
[ES-Reviewed]14
[ES-Good]118 (98.3%)
[Total-rejects]2
[ES-Output]118
[GS]1A01
\tES 7 FC 1001 Length 2.50 Breadth 1.20 Area 3.00
\tES 9 FC 1003 Length 0.40 Breadth 0.30 Area 0.12 Serial True
[GS]2A01
\tNo Failure
[GS]3A01
\tES 12 FC Length 1.10 Breadth 0.90 Area 0.99
\tES 13 broken line
";

fn parser() -> LotLogParser {
    LotLogParser::new().expect("parser regexes should compile")
}

fn no_keys() -> HashSet<LotKey> {
    HashSet::new()
}

fn assemble(file_name: &str, text: &str) -> LotRecord {
    parser()
        .parse_lot_text(file_name, text, &no_keys())
        .expect("sample log should parse")
}

#[test]
fn parse_lot_text_extracts_headers_and_counters() {
    let lot = assemble("240117-2_A23_top.log", SAMPLE_LOG);

    assert_eq!(lot.lot_id, 2401172);
    assert_eq!(lot.machine, "AOI-Line-2");
    assert_eq!(lot.layout, "LX-4410");
    assert_eq!(lot.layer, "A2");
    assert_eq!(lot.substrate_count, 3);
    assert_eq!(lot.input_count, 120);
    assert_eq!(lot.reviewed_count, 14);
    assert_eq!(lot.good_count, 118);
    assert_eq!(lot.reject_count, 2);
    assert_eq!(lot.output_count, 118);

    let day = NaiveDate::from_ymd_opt(2024, 4, 24).expect("valid date");
    assert_eq!(lot.start_time, day.and_hms_opt(13, 5, 0));
    assert_eq!(lot.end_time, day.and_hms_opt(23, 59, 0));
}

#[test]
fn parse_lot_text_tracks_substrate_context_and_skips_clean_substrates() {
    let lot = assemble("240117-2_A23_top.log", SAMPLE_LOG);

    let summary: Vec<(i64, i64, CircuitStatus)> = lot
        .circuits
        .iter()
        .map(|circuit| {
            (
                circuit.substrate_number,
                circuit.circuit_number(),
                circuit.status(),
            )
        })
        .collect();

    assert_eq!(
        summary,
        vec![
            (1, 7, CircuitStatus::NonRepairable),
            (1, 9, CircuitStatus::FalseDefect),
            (3, 12, CircuitStatus::NotReviewed),
            (3, -1, CircuitStatus::Unknown),
        ]
    );
    assert!(lot.circuits.iter().all(|circuit| circuit.lot_id == 2401172));
    assert!(lot.circuits.iter().all(|c| c.status() != CircuitStatus::NoFailure));
    assert_eq!(
        lot.circuits.iter().filter(|circuit| circuit.did_stop).count(),
        1
    );
    assert!(lot.circuits[3].is_corrupted());
}

#[test]
fn parse_lot_text_defaults_when_headers_are_missing() {
    let lot = assemble("nolayer.log", "[ChargenNr]4711\n[Machine]BoschDsp - AOI\n");

    assert_eq!(lot.lot_id, 4711);
    assert_eq!(lot.machine, "NULL");
    assert_eq!(lot.layout, "NA");
    assert_eq!(lot.layer, "NA");
    assert_eq!(lot.start_time, None);
    assert_eq!(lot.end_time, None);
    assert!(lot.circuits.is_empty());
}

#[test]
fn parse_lot_text_propagates_late_lot_number_to_circuits() {
    let text = "[GS]2A\n\tES 5 FC 1002 Length 1.00 Breadth 1.00 Area 1.00\n[ChargenNr]1234-5\n";
    let lot = assemble("x_B4_y.log", text);

    assert_eq!(lot.lot_id, 12345);
    assert_eq!(lot.circuits[0].lot_id, 12345);
    assert_eq!(lot.circuits[0].status(), CircuitStatus::Repairable);
    assert_eq!(lot.substrate_count, 1);
}

#[test]
fn parse_lot_text_accepts_crlf_line_endings() {
    let text = SAMPLE_LOG.replace('\n', "\r\n");
    let lot = assemble("240117-2_A23_top.log", &text);

    assert_eq!(lot.circuits.len(), 4);
    assert_eq!(lot.circuits[0].circuit_number(), 7);
}

#[test]
fn parse_lot_text_rejects_time_before_date() {
    let err = parser()
        .parse_lot_text("a.log", "[StartTime]1:05PM\n[StartDate]04/24/2024\n", &no_keys())
        .expect_err("time without date");
    assert!(matches!(
        err,
        LotLogError::TimeWithoutDate { field: "StartTime" }
    ));
}

#[test]
fn parse_lot_text_propagates_malformed_time() {
    let err = parser()
        .parse_lot_text("a.log", "[EndDate]04/24/2024\n[EndTime]23:10\n", &no_keys())
        .expect_err("24-hour time is malformed");
    assert!(matches!(err, LotLogError::MalformedTime(_)));
}

#[test]
fn parse_lot_text_rejects_known_keys() {
    let existing = HashSet::from([LotKey {
        lot_id: 2401172,
        machine: "AOI-Line-2".to_string(),
        layer: "A2".to_string(),
    }]);

    let err = parser()
        .parse_lot_text("240117-2_A23_top.log", SAMPLE_LOG, &existing)
        .expect_err("lot already ingested");
    assert!(matches!(err, LotLogError::DuplicateLot { lot_id: 2401172 }));

    let other_layer = parser()
        .parse_lot_text("240117-2_B11_bottom.log", SAMPLE_LOG, &existing)
        .expect("other layer is a new lot");
    assert_eq!(other_layer.layer, "B1");
}

#[test]
fn layer_from_file_name_uses_first_two_token_characters() {
    let parser = parser();
    assert_eq!(parser.layer_from_file_name("L240117_A2_print.txt"), "A2");
    assert_eq!(parser.layer_from_file_name("L240117_C104_print.txt"), "C1");
    assert_eq!(parser.layer_from_file_name("L240117_a2_print.txt"), "NA");
    assert_eq!(parser.layer_from_file_name("L240117-A2.txt"), "NA");
}

#[test]
fn parse_lot_reads_files_from_disk() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("240117-2_A23_top.log");
    fs::write(&path, SAMPLE_LOG).expect("write sample log");

    let lot = parser()
        .parse_lot(&path, &no_keys())
        .expect("file should parse");
    assert_eq!(lot.lot_id, 2401172);
    assert_eq!(lot.circuits.len(), 4);
}

#[test]
fn parse_lot_tolerates_non_utf8_bytes() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("4711_A1_x.log");
    let mut bytes = b"[Typ]Gr\xf6\xdfe\n[ChargenNr]4711\n".to_vec();
    bytes.extend_from_slice(b"\tES 1 FC 1001 Length 1.00 Breadth 1.00 Area 1.00\n");
    fs::write(&path, bytes).expect("write latin-1 log");

    let lot = parser()
        .parse_lot(&path, &no_keys())
        .expect("lossy decode should parse");
    assert_eq!(lot.lot_id, 4711);
    assert_eq!(lot.circuits.len(), 1);
}

#[test]
fn parse_lot_rejects_missing_paths_and_directories() {
    let dir = TempDir::new().expect("temp dir");

    let missing = parser()
        .parse_lot(&dir.path().join("missing.log"), &no_keys())
        .expect_err("missing file");
    assert!(matches!(missing, LotLogError::NotAFile(_)));

    let directory = parser()
        .parse_lot(dir.path(), &no_keys())
        .expect_err("directory is not a file");
    assert!(matches!(directory, LotLogError::NotAFile(_)));
}
