//! CLI integration tests for the `init` and `describe` commands.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn seglog_cmd() -> Command {
    Command::cargo_bin("seglog").unwrap()
}

#[test]
fn test_init_creates_log() {
    let dir = tempdir().unwrap();

    seglog_cmd()
        .args(["init", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("WAL initialized"));

    assert!(dir.path().join("00000000000000000000.wal").exists());
}

#[test]
fn test_init_refuses_initialized_directory() {
    let dir = tempdir().unwrap();

    seglog_cmd().args(["init", "-d"]).arg(dir.path()).assert().success();

    seglog_cmd()
        .args(["init", "-d"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_describe_prints_header_fields() {
    let dir = tempdir().unwrap();

    seglog_cmd()
        .args(["init", "-l", "uvarint", "-c", "crc64", "-d"])
        .arg(dir.path())
        .assert()
        .success();

    seglog_cmd()
        .args(["describe", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Magic:                 WAL")
                .and(predicate::str::contains("Version:               1"))
                .and(predicate::str::contains("Entry Length Encoding: uvarint"))
                .and(predicate::str::contains("Entry Checksum Type:   crc64"))
                .and(predicate::str::contains("First Sequence Number: 0"))
                .and(predicate::str::contains("Entries:               0")),
        );
}

#[test]
fn test_describe_counts_entries() {
    let dir = tempdir().unwrap();

    seglog_cmd().args(["init", "-d"]).arg(dir.path()).assert().success();

    // Append through the library, the way an embedding application would.
    let mut reader = seglog::Reader::new(dir.path(), 0).unwrap();
    while reader.next() {}
    let writer = reader
        .into_writer(
            seglog::WriterOptions::new().with_sync_policy(seglog::SyncPolicy::Immediate),
        )
        .unwrap();
    writer.append_entry(b"foo").unwrap();
    writer.append_entry(b"bar").unwrap();
    writer.close().unwrap();

    seglog_cmd()
        .args(["describe", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Entries:               2")
                .and(predicate::str::contains("Next Sequence Number:  2")),
        );
}

#[test]
fn test_describe_fails_on_empty_directory() {
    let dir = tempdir().unwrap();

    seglog_cmd()
        .args(["describe", "-d"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no segment found"));
}

#[test]
fn test_init_rejects_unknown_encoding() {
    let dir = tempdir().unwrap();

    seglog_cmd()
        .args(["init", "-l", "u128", "-d"])
        .arg(dir.path())
        .assert()
        .failure();
}
