//! Integration tests for the sigreuse CLI

use assert_cmd::Command;
use predicates::prelude::*;

const PRIVATE_KEY_HEX: &str = "c477f9f65c22cce20657faa5b2d1d8122336f851a508a1ed04e479c34985bf96";
const PRIVATE_KEY_DECIMAL: &str =
    "88865298299719117682218467295833367085649033095698151055007620974294165995414";

fn sigreuse() -> Command {
    Command::cargo_bin("sigreuse").unwrap()
}

#[test]
fn test_analyze_recovers_key_from_file() {
    sigreuse()
        .arg("analyze")
        .arg("tests/fixtures/vulnerable_tx.json")
        .arg("--prevouts")
        .arg("tests/fixtures/prevouts.json")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Recovered 1 private keys"))
        .stdout(predicate::str::contains(PRIVATE_KEY_HEX))
        .stdout(predicate::str::contains(PRIVATE_KEY_DECIMAL));
}

#[test]
fn test_analyze_from_stdin() {
    let input = include_str!("fixtures/block.csv");
    sigreuse()
        .arg("analyze")
        .arg("-")
        .write_stdin(input)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(PRIVATE_KEY_HEX));
}

#[test]
fn test_per_transaction_scope() {
    sigreuse()
        .args(["analyze", "tests/fixtures/block.csv", "--scope", "tx"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(PRIVATE_KEY_HEX));
}

#[test]
fn test_per_transaction_scope_reports_too_few_signatures() {
    sigreuse()
        .args(["analyze", "tests/fixtures/vulnerable_tx.json", "--scope", "tx"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains(
            "note: transaction yielded fewer than 2 signatures",
        ));
}

#[test]
fn test_per_transaction_scope_note_in_json() {
    let output = sigreuse()
        .args(["--json", "analyze", "tests/fixtures/block.csv", "--scope", "tx"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let transactions = json["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 3);
    // The two funding transactions spend outputs outside the file.
    for tx in &transactions[..2] {
        assert_eq!(
            tx["note"].as_str(),
            Some("transaction yielded fewer than 2 signatures")
        );
    }
    assert!(transactions[2].get("note").is_none());
}

#[test]
fn test_batch_scope_has_no_per_transaction_note() {
    sigreuse()
        .args(["analyze", "tests/fixtures/vulnerable_tx.json"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("fewer than 2 signatures").not());
}

#[test]
fn test_missing_prevouts_clean_exit() {
    sigreuse()
        .arg("analyze")
        .arg("tests/fixtures/vulnerable_tx.json")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("No private keys recovered."))
        .stdout(predicate::str::contains("failure to get prevout"));
}

#[test]
fn test_json_output_schema() {
    let output = sigreuse()
        .arg("--json")
        .arg("analyze")
        .arg("tests/fixtures/vulnerable_tx.json")
        .arg("--prevouts")
        .arg("tests/fixtures/prevouts.json")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");

    assert_eq!(json["summary"]["transactions"].as_u64(), Some(1));
    assert_eq!(json["summary"]["tuples"].as_u64(), Some(2));
    assert_eq!(json["summary"]["keys_recovered"].as_u64(), Some(1));
    assert_eq!(json["summary"]["alarms"].as_u64(), Some(0));

    let tx = &json["transactions"][0];
    assert_eq!(
        tx["txid"].as_str(),
        Some("9ec4bc49e828d924af1d1029cacf709431abbde46d59554b62bc270e3b29c4b1")
    );
    assert_eq!(tx["extracted"].as_u64(), Some(2));
    assert_eq!(tx["outcomes"][0]["status"].as_str(), Some("extracted"));

    let key = &json["recovered_keys"][0];
    assert_eq!(key["private_key_hex"].as_str(), Some(PRIVATE_KEY_HEX));
    assert_eq!(key["private_key_decimal"].as_str(), Some(PRIVATE_KEY_DECIMAL));
    assert_eq!(key["sources"][0]["input"].as_u64(), Some(0));
    assert_eq!(key["sources"][1]["input"].as_u64(), Some(1));
}

#[test]
fn test_sink_writes_tuples() {
    let path = std::env::temp_dir().join(format!("sigreuse-sink-{}.csv", std::process::id()));
    sigreuse()
        .arg("analyze")
        .arg("tests/fixtures/vulnerable_tx.json")
        .arg("--prevouts")
        .arg("tests/fixtures/prevouts.json")
        .arg("--sink")
        .arg(&path)
        .assert()
        .code(1);

    let written = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("txid,pubkey,z,r,s"));
    assert_eq!(lines.count(), 2);
    assert!(written.contains("c0e2d0a89a348de88fda08211c70d1d7e52ccef2eb9459911bf977d587784c6e"));
}

#[test]
fn test_invalid_input_error() {
    sigreuse()
        .arg("analyze")
        .arg("-")
        .write_stdin("not valid")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unable to detect input format"));
}

#[test]
fn test_undecodable_transaction_error() {
    sigreuse()
        .arg("analyze")
        .arg("-")
        .write_stdin(r#"["deadbeef"]"#)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("transaction #0"));
}

#[test]
fn test_nonexistent_file_error() {
    sigreuse()
        .arg("analyze")
        .arg("nonexistent.json")
        .assert()
        .code(2);
}
