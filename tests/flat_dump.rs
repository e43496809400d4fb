//! File-backed reading, through `ReaderSource` and the `flat-dump` binary.

use std::fs::{self, File};
use std::io::Write;
use std::process::Command;

use flatfile_rs::{ReadEvent, ReaderSource, TextSource, layouts};
use tempfile::NamedTempFile;

const EMPLOYEES: &str = "SMITH   JOHN      SALES     00050000\n\
JONES   MARY      ENGINEER  00075000\n\
DOE     JANE      SALES     00060000\n";

const ORDERS: &str = "ORDA00042002WIDGET  0003GADGET  0010YHappy birthday|\n\
ORDB00007001BOLT    0100N\n";

fn data_file(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn flat_dump(args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_flat-dump"))
        .args(args)
        .output()
        .unwrap();
    (
        output.status.success(),
        String::from_utf8(output.stdout).unwrap(),
        String::from_utf8(output.stderr).unwrap(),
    )
}

#[test]
fn test_reader_source_reads_file() {
    let data = data_file(EMPLOYEES);
    let file = layouts::lines_of(layouts::employee().unwrap()).unwrap();
    let mut source = ReaderSource::new(File::open(data.path()).unwrap());
    let entity = file.read_entity(&mut source).unwrap();
    assert_eq!(entity.as_sequence().unwrap().len(), 3);
    assert_eq!(entity.to_text().unwrap(), EMPLOYEES);
}

#[test]
fn test_reader_source_matches_text_source() {
    let data = data_file(ORDERS);
    let file = layouts::lines_of(layouts::order().unwrap()).unwrap();

    let mut from_file: Vec<ReadEvent> = Vec::new();
    let mut source = ReaderSource::new(File::open(data.path()).unwrap());
    file.push_read(&mut source, &mut from_file).unwrap();

    let from_text: Vec<ReadEvent> = file
        .pull_read(&mut TextSource::new(ORDERS))
        .collect::<flatfile_rs::Result<_>>()
        .unwrap();
    assert_eq!(from_file, from_text);
}

#[test]
fn test_verify_round_trip() {
    let data = data_file(EMPLOYEES);
    let path = data.path().to_str().unwrap();
    let (ok, stdout, _) = flat_dump(&["--layout", "employee", "--verify", path]);
    assert!(ok);
    assert_eq!(stdout, "OK: 3 records round-trip\n");
}

#[test]
fn test_push_and_pull_print_the_same() {
    let data = data_file(ORDERS);
    let path = data.path().to_str().unwrap();
    let (ok, pushed, _) = flat_dump(&["--layout", "order", "--mode", "push", path]);
    assert!(ok);
    let (ok, pulled, _) = flat_dump(&["--layout", "order", "--mode", "pull", path]);
    assert!(ok);
    assert_eq!(pushed, pulled);
    assert!(pushed.starts_with("start records\n  start order\n"));
    assert!(pushed.contains("text = \"Happy birthday\""));
}

#[test]
fn test_entity_tree_to_output_file() {
    let data = data_file(ORDERS);
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested").join("tree.txt");
    let (ok, stdout, stderr) = flat_dump(&[
        "--layout",
        "order",
        "--mode",
        "entity",
        "-v",
        "-o",
        out.to_str().unwrap(),
        data.path().to_str().unwrap(),
    ]);
    assert!(ok);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Records: 2"));
    let tree = fs::read_to_string(out).unwrap();
    assert!(tree.starts_with("records [2 elements, "));
    assert!(tree.contains("note [absent, 0 chars]"));
}

#[test]
fn test_malformed_record_is_not_silently_dropped() {
    let text = "SMITH   JOHN      SALES     00050000\n\
JONES   MARY      engineer  00075000\n\
DOE     JANE      SALES     00060000\n";
    let data = data_file(text);
    let path = data.path().to_str().unwrap();
    for mode in ["push", "pull", "entity"] {
        let (ok, stdout, stderr) = flat_dump(&["--mode", mode, path]);
        assert!(!ok, "{mode} mode accepted a malformed record");
        assert!(stdout.is_empty());
        assert!(stderr.contains("unread input at character 37"), "{stderr}");
    }
}

#[test]
fn test_missing_input_fails() {
    let (ok, _, stderr) = flat_dump(&["/nonexistent/input.data"]);
    assert!(!ok);
    assert!(stderr.contains("Read error"));
}
