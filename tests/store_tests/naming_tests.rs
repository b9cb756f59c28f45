//! Tests for versioned naming and logical path validation

use std::path::PathBuf;

use rfs::store::{is_reserved_name, versioned_name, LogicalPath};
use rfs::RfsError;

// =============================================================================
// Naming Tests
// =============================================================================

#[test]
fn test_version_zero_is_literal_path() {
    assert_eq!(versioned_name("notes.txt".as_ref(), 0), PathBuf::from("notes.txt"));
}

#[test]
fn test_version_inserted_before_suffix() {
    assert_eq!(versioned_name("notes.txt".as_ref(), 1), PathBuf::from("notes_1.txt"));
    assert_eq!(versioned_name("notes.txt".as_ref(), 12), PathBuf::from("notes_12.txt"));
}

#[test]
fn test_only_last_dot_splits() {
    assert_eq!(
        versioned_name("archive.tar.gz".as_ref(), 2),
        PathBuf::from("archive.tar_2.gz")
    );
}

#[test]
fn test_no_suffix_appends_version() {
    assert_eq!(versioned_name("Makefile".as_ref(), 3), PathBuf::from("Makefile_3"));
}

#[test]
fn test_hidden_file_is_not_a_suffix() {
    assert_eq!(versioned_name(".bashrc".as_ref(), 1), PathBuf::from(".bashrc_1"));
}

#[test]
fn test_nested_path_keeps_directory() {
    let path = LogicalPath::parse("docs/report.pdf").unwrap();
    assert_eq!(path.versioned(2), PathBuf::from("docs/report_2.pdf"));
    assert_eq!(path.versioned(0), PathBuf::from("docs/report.pdf"));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_parse_valid_paths() {
    let path = LogicalPath::parse("a/b/c.txt").unwrap();
    assert_eq!(path.key(), "a/b/c.txt");
    assert_eq!(path.file_name(), "c.txt");
    assert_eq!(path.to_string(), "a/b/c.txt");
}

#[test]
fn test_parse_rejects_traversal_and_absolute() {
    for bad in ["../etc/passwd", "a/../../b", "/etc/passwd", "", ".", "./"] {
        assert!(
            matches!(LogicalPath::parse(bad), Err(RfsError::InvalidPath(..))),
            "expected {:?} to be rejected",
            bad
        );
    }
}

#[test]
fn test_parse_rejects_control_characters() {
    assert!(LogicalPath::parse("a\nb.txt").is_err());
    assert!(LogicalPath::parse("a\0b.txt").is_err());
}

#[test]
fn test_parse_rejects_reserved_names() {
    for reserved in [".file_VERSION", "sub/.file_LOCK", ".rfs-lock.a.txt", ".rfs-tmp.a.txt.1"] {
        assert!(LogicalPath::parse(reserved).is_err(), "{:?} should be reserved", reserved);
    }
    assert!(is_reserved_name(".file_VERSION.tmp"));
    assert!(!is_reserved_name(".bashrc"));
}

#[test]
fn test_parse_rejects_reserved_directories() {
    for reserved in [
        ".rfs-lock.a.txt/x",
        ".file_LOCK/x",
        "a/.rfs-tmp.q/b",
        ".file_VERSION/z",
    ] {
        match LogicalPath::parse(reserved) {
            Err(RfsError::InvalidPath(_, why)) => assert!(why.contains("reserved")),
            other => panic!("{:?} should be reserved, got {:?}", reserved, other),
        }
    }
    assert!(LogicalPath::parse(".config/a.txt").is_ok());
}

#[test]
fn test_same_file_same_key() {
    let a = LogicalPath::parse("./dir/x.txt").unwrap();
    let b = LogicalPath::parse("dir/x.txt").unwrap();
    assert_eq!(a, b);
}
