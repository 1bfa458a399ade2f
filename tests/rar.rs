//! RAR listing, resolution and scanning.

#![cfg(feature = "rar")]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use burrow::archive::rar::RarArchive;
use burrow::{Config, Entry, Result, ScanOptions, Scanner, Threads};
use tempfile::TempDir;

mod common;

use common::Method;

/// Stored members `first.txt`, `nested.zip` (holding `inside.txt`), `last.txt`.
const MEMBERS_RAR: &[u8] = include_bytes!("data/members.rar");

fn rar_on_disk(dir: &Path) -> PathBuf {
    common::write_file(dir, "members.rar", MEMBERS_RAR);
    dir.join("members.rar")
}

fn spool_dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

// =============================================================================
// Archive Access
// =============================================================================

#[test]
fn test_members_listed_in_stored_order() {
    let dir = TempDir::new().unwrap();
    let archive = RarArchive::new(rar_on_disk(dir.path()));

    let members = archive.members().unwrap();
    let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["first.txt", "nested.zip", "last.txt"]);
    assert_eq!(members[0].size, Some(13));
    let expected = burrow::timestamp::from_dos(((2024 - 1980) << 9) | (3 << 5) | 1, 12 << 11);
    assert_eq!(members[0].modified, expected);
}

#[test]
fn test_read_named_member() {
    let dir = TempDir::new().unwrap();
    let archive = RarArchive::new(rar_on_disk(dir.path()));

    assert_eq!(archive.read("last.txt").unwrap(), b"last member\n");
    let err = archive.read("absent.txt").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_for_each_visits_in_order_and_stops() {
    let dir = TempDir::new().unwrap();
    let archive = RarArchive::new(rar_on_disk(dir.path()));

    let mut seen = Vec::new();
    archive
        .for_each(|header, data| {
            seen.push((header.name, data.len()));
            Ok(true)
        })
        .unwrap();
    let names: Vec<_> = seen.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["first.txt", "nested.zip", "last.txt"]);

    let mut visited = 0;
    archive
        .for_each(|_, _| {
            visited += 1;
            Ok(false)
        })
        .unwrap();
    assert_eq!(visited, 1);
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_resolve_through_local_rar() {
    let dir = TempDir::new().unwrap();
    let path = rar_on_disk(dir.path());

    let first = Entry::resolve(&format!("{}!first.txt", path.display())).unwrap();
    assert_eq!(first.read_to_string().unwrap(), "first member\n");

    let nested = Entry::resolve(&format!("{}!nested.zip!inside.txt", path.display())).unwrap();
    assert_eq!(nested.read_to_string().unwrap(), "inside");
}

#[test]
fn test_resolve_rar_inside_zip_removes_spool() {
    let spool = TempDir::new().unwrap();
    let config = Config::new().temp_dir(spool.path());
    let zip = common::zip(&[("members.rar", MEMBERS_RAR)], Method::Deflated);
    let uri = common::data_uri(&zip, "application/zip");

    let entry =
        Entry::resolve_with(&format!("{uri}!members.rar!last.txt"), config.clone()).unwrap();
    assert_eq!(entry.read_all().unwrap(), b"last member\n");
    assert!(spool_dir_is_empty(spool.path()));

    let missing = Entry::resolve_with(&format!("{uri}!members.rar!absent.txt"), config).unwrap();
    assert!(missing.read_all().unwrap_err().is_not_found());
    assert!(spool_dir_is_empty(spool.path()));
}

// =============================================================================
// Scanning
// =============================================================================

#[test]
fn test_native_rar_members_scanned() {
    let dir = TempDir::new().unwrap();
    rar_on_disk(dir.path());

    let seen = Arc::new(Mutex::new(BTreeMap::new()));
    let sink = Arc::clone(&seen);
    let scanner = Scanner::with_options(
        move |entry: &Entry| -> Result<()> {
            sink.lock().unwrap().insert(entry.last_name(), entry.read_to_string()?);
            Ok(())
        },
        ScanOptions::new().threads(Threads::count_or_single(4)),
    )
    .unwrap();
    let summary = scanner.scan_path(dir.path()).unwrap();
    assert!(summary.is_complete(), "{:?}", summary.failures);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen["first.txt"], "first member\n");
    assert_eq!(seen["inside.txt"], "inside");
    assert_eq!(seen["last.txt"], "last member\n");
}

#[test]
fn test_spooled_rar_scanned_one_member_at_a_time() {
    let dir = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let outer = common::zip(&[("members.rar", MEMBERS_RAR)], Method::Stored);
    common::write_file(dir.path(), "outer.zip", &outer);

    let order = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&order);
    let spool_path = spool.path().to_path_buf();
    let scanner = Scanner::with_options(
        move |entry: &Entry| -> Result<()> {
            let spooled = std::fs::read_dir(&spool_path)?.count();
            sink.lock().unwrap().push((entry.last_name(), spooled));
            Ok(())
        },
        ScanOptions::new()
            .threads(Threads::count_or_single(4))
            .config(Config::new().temp_dir(spool.path())),
    )
    .unwrap();
    let summary = scanner.scan_path(dir.path()).unwrap();
    assert!(summary.is_complete(), "{:?}", summary.failures);

    let order = order.lock().unwrap();
    let names: Vec<_> = order.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["first.txt", "inside.txt", "last.txt"]);
    assert!(order.iter().all(|&(_, spooled)| spooled == 1), "{order:?}");
    assert!(spool_dir_is_empty(spool.path()));
}

#[test]
fn test_corrupt_spooled_rar_removes_spool() {
    let dir = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let outer = common::zip(
        &[("broken.rar", b"not a rar archive"), ("ok.txt", b"ok")],
        Method::Stored,
    );
    common::write_file(dir.path(), "outer.zip", &outer);

    let scanner = Scanner::with_options(
        |_: &Entry| -> Result<()> { Ok(()) },
        ScanOptions::new().config(Config::new().temp_dir(spool.path())),
    )
    .unwrap();
    let summary = scanner.scan_path(dir.path()).unwrap();
    assert_eq!(summary.entries_delivered, 1);
    assert_eq!(summary.branches_failed, 1);
    assert!(summary.failures[0].0.ends_with("broken.rar"));
    assert!(spool_dir_is_empty(spool.path()));
}
