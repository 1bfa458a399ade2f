//! Resolution of nested entries through the public API.

use std::io::Read;
use std::time::{Duration, UNIX_EPOCH};

use burrow::address::parse_path;
use burrow::{Base, Entry, Stream};
use tempfile::TempDir;

mod common;

use common::Method;

// =============================================================================
// Address Parsing
// =============================================================================

#[test]
fn test_parse_path_data_uri() {
    assert_eq!(parse_path("data:test").unwrap(), ["data:test"]);
}

#[test]
fn test_parse_path_layered_url() {
    assert_eq!(
        parse_path("gz:http://example.org/test.csv.gz!test.csv").unwrap(),
        ["http://example.org/test.csv.gz", "test.csv"]
    );
}

#[test]
fn test_parse_path_file_url() {
    assert_eq!(
        parse_path("zip:file:///data/x.zip!dir/y.txt").unwrap(),
        ["/data/x.zip", "dir/y.txt"]
    );
}

#[test]
fn test_resolve_classifies_bases() {
    let local = Entry::resolve("/tmp/a.zip!b.txt").unwrap();
    assert!(matches!(local.base(), Base::LocalFile(_)));
    assert_eq!(local.segments(), ["b.txt"]);

    let remote = Entry::resolve("gz:https://example.org/x.gz!x").unwrap();
    assert!(matches!(remote.base(), Base::RemoteUrl(_)));

    let data = Entry::resolve("data:,hello").unwrap();
    assert!(matches!(data.base(), Base::DataUri(_)));
}

#[test]
fn test_resolve_rejects_empty_address() {
    let err = Entry::resolve("zip:!").unwrap_err();
    assert!(matches!(err, burrow::Error::MalformedAddress { .. }));
}

// =============================================================================
// Decode Chains
// =============================================================================

#[test]
fn test_data_uri_content() {
    let entry = Entry::resolve("data:application/octet-stream;base64,dGVzdA==").unwrap();
    assert_eq!(entry.read_all().unwrap(), b"test");
}

#[test]
fn test_gzip_data_uri_member() {
    let uri = common::data_uri(&common::gzip(b"test"), "application/gzip");
    let entry = Entry::resolve(&format!("gz:{uri}!file")).unwrap();
    assert_eq!(entry.read_all().unwrap(), b"test");
}

#[test]
fn test_zip_data_uri_member() {
    let zip = common::zip(&[("test.txt", b"test")], Method::Deflated);
    let uri = common::data_uri(&zip, "application/zip");
    let entry = Entry::resolve(&format!("zip:{uri}!test.txt")).unwrap();
    assert_eq!(entry.read_all().unwrap(), b"test");
}

#[cfg(feature = "bzip2")]
#[test]
fn test_bzip2_data_uri_member() {
    let uri = common::data_uri(&common::bzip2(b"test"), "application/bzip2");
    let entry = Entry::resolve(&format!("bz2:{uri}!file")).unwrap();
    assert_eq!(entry.read_all().unwrap(), b"test");
}

#[cfg(feature = "zstd")]
#[test]
fn test_zstd_member_of_zip() {
    let zip = common::zip(&[("a.json.zst", &common::zstd(b"{}"))], Method::Stored);
    let dir = TempDir::new().unwrap();
    common::write_file(dir.path(), "z.zip", &zip);
    let address = format!("{}!a.json.zst!a.json", dir.path().join("z.zip").display());
    assert_eq!(Entry::resolve(&address).unwrap().read_to_string().unwrap(), "{}");
}

#[test]
fn test_compressed_member_inside_zip_inside_tar() {
    let zip = common::zip(&[("report.csv.gz", &common::gzip(b"a,b\n1,2\n"))], Method::Stored);
    let tar = common::tar(&[("nested/inner.zip", &zip), ("other.txt", b"x")]);
    let dir = TempDir::new().unwrap();
    common::write_file(dir.path(), "bundle.tar.gz", &common::gzip(&tar));

    let address = format!(
        "{}!nested/inner.zip!report.csv.gz!report.csv",
        dir.path().join("bundle.tar.gz").display()
    );
    let entry = Entry::resolve(&address).unwrap();
    assert_eq!(entry.read_to_string().unwrap(), "a,b\n1,2\n");
    assert_eq!(entry.last_name(), "report.csv");
}

#[test]
fn test_missing_member_names_target() {
    let zip = common::zip(&[("present.txt", b"x")], Method::Stored);
    let uri = common::data_uri(&zip, "application/zip");
    let err = Entry::resolve(&format!("{uri}!absent.txt"))
        .unwrap()
        .read_all()
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("absent.txt"));
}

#[test]
fn test_corrupt_gzip_is_decode_failure() {
    let uri = common::data_uri(b"definitely not gzip", "application/gzip");
    let err = Entry::resolve(&format!("{uri}!file"))
        .unwrap()
        .read_all()
        .unwrap_err();
    assert!(err.is_decode_failure(), "{err:?}");
}

#[test]
fn test_stream_close_is_final() {
    let zip = common::zip(&[("a.txt", b"abcdef")], Method::Deflated);
    let uri = common::data_uri(&zip, "application/zip");
    let entry = Entry::resolve(&format!("{uri}!a.txt")).unwrap();

    let mut stream = entry.open().unwrap();
    let mut head = [0u8; 3];
    stream.read_exact(&mut head).unwrap();
    assert_eq!(&head, b"abc");
    stream.close().unwrap();

    // Each open walks the chain again.
    assert_eq!(entry.read_all().unwrap(), b"abcdef");
}

#[test]
fn test_for_each_chunk_sees_all_bytes() {
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let zip = common::zip(&[("big.bin", &data)], Method::Deflated);
    let dir = TempDir::new().unwrap();
    common::write_file(dir.path(), "big.zip", &zip);

    let entry = Entry::from_path(dir.path().join("big.zip")).child("big.bin");
    let mut seen = Vec::new();
    let mut calls = 0;
    entry
        .for_each_chunk(|chunk| {
            calls += 1;
            assert!(chunk.len() <= burrow::READ_BUFFER_SIZE);
            seen.extend_from_slice(chunk);
            Ok(())
        })
        .unwrap();
    assert!(calls >= 200_000 / burrow::READ_BUFFER_SIZE);
    assert_eq!(seen, data);
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn test_modified_native_and_nested() {
    let dir = TempDir::new().unwrap();
    common::write_file(dir.path(), "plain.txt", b"x");
    let path = dir.path().join("plain.txt");

    let native = Entry::from_path(&path);
    let expected = std::fs::metadata(&path).unwrap().modified().unwrap();
    assert_eq!(native.modified(), Some(expected));

    let nested = native.child("member");
    assert_eq!(nested.modified(), None);

    let stamp = UNIX_EPOCH + Duration::from_secs(1_000_000);
    assert_eq!(nested.with_modified(stamp).modified(), Some(stamp));
}

#[test]
fn test_last_name_and_last_path() {
    let entry = Entry::resolve("/data/a.zip!dir/sub/file.txt").unwrap();
    assert_eq!(entry.last_path(), "dir/sub/file.txt");
    assert_eq!(entry.last_name(), "file.txt");

    let windows = Entry::resolve("/data/a.zip!dir\\sub\\file.txt").unwrap();
    assert_eq!(windows.last_name(), "file.txt");
    assert_eq!(windows.last_path(), "dir\\sub\\file.txt");

    let root = Entry::resolve("/data/a.zip").unwrap();
    assert_eq!(root.last_name(), "a.zip");
    assert_eq!(root.last_path(), "/data/a.zip");
}

#[test]
fn test_child_does_not_touch_parent() {
    let parent = Entry::resolve("/data/a.zip!b.zip").unwrap();
    let child = parent.child("c.txt");
    assert_eq!(parent.segments(), ["b.zip"]);
    assert_eq!(child.segments(), ["b.zip", "c.txt"]);
    assert_eq!(child.address(), "/data/a.zip!b.zip!c.txt");
    assert_eq!(Entry::resolve(&child.address()).unwrap(), child);
}
