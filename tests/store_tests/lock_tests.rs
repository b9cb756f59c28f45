//! Tests for LockManager

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use rfs::store::{LockManager, LogicalPath, DIR_LOCK_FILENAME, PATH_LOCK_PREFIX};
use rfs::{LockScope, RfsError};
use tempfile::TempDir;

fn path(raw: &str) -> LogicalPath {
    LogicalPath::parse(raw).unwrap()
}

// =============================================================================
// Path Scope
// =============================================================================

#[test]
fn test_acquire_creates_marker() {
    let temp = TempDir::new().unwrap();
    let locks = LockManager::new(temp.path(), LockScope::Path);

    let guard = locks.acquire(&path("notes.txt")).unwrap();
    let marker = temp.path().join(format!("{}notes.txt", PATH_LOCK_PREFIX));
    assert_eq!(temp.path().join(guard.marker()), marker);
    assert!(marker.exists());
    assert!(locks.is_locked(&path("notes.txt")));

    drop(guard);
    assert!(!marker.exists());
    assert!(!locks.is_locked(&path("notes.txt")));
}

#[test]
fn test_second_acquire_is_busy() {
    let temp = TempDir::new().unwrap();
    let locks = LockManager::new(temp.path(), LockScope::Path);

    let _guard = locks.acquire(&path("a.txt")).unwrap();
    match locks.acquire(&path("a.txt")) {
        Err(RfsError::LockBusy(p)) => assert_eq!(p, std::path::PathBuf::from("a.txt")),
        Err(other) => panic!("Expected LockBusy, got {:?}", other),
        Ok(_) => panic!("Expected LockBusy, got a second guard"),
    };
}

#[test]
fn test_release_allows_reacquire() {
    let temp = TempDir::new().unwrap();
    let locks = LockManager::new(temp.path(), LockScope::Path);

    for _ in 0..3 {
        let guard = locks.acquire(&path("a.txt")).unwrap();
        drop(guard);
    }
}

#[test]
fn test_path_scope_siblings_independent() {
    let temp = TempDir::new().unwrap();
    let locks = LockManager::new(temp.path(), LockScope::Path);

    let _a = locks.acquire(&path("dir/a.txt")).unwrap();
    let _b = locks.acquire(&path("dir/b.txt")).unwrap();
    assert!(temp.path().join("dir").is_dir());
}

#[test]
fn test_foreign_marker_is_busy() {
    let temp = TempDir::new().unwrap();
    let locks = LockManager::new(temp.path(), LockScope::Path);

    // Another process holding the lock
    fs::write(temp.path().join(format!("{}x.txt", PATH_LOCK_PREFIX)), b"").unwrap();

    assert!(matches!(locks.acquire(&path("x.txt")), Err(RfsError::LockBusy(_))));
    assert!(locks.is_locked(&path("x.txt")));
}

// =============================================================================
// Directory Scope
// =============================================================================

#[test]
fn test_directory_scope_covers_siblings() {
    let temp = TempDir::new().unwrap();
    let locks = LockManager::new(temp.path(), LockScope::Directory);

    let guard = locks.acquire(&path("docs/a.txt")).unwrap();
    assert!(temp.path().join("docs").join(DIR_LOCK_FILENAME).exists());

    assert!(matches!(locks.acquire(&path("docs/b.txt")), Err(RfsError::LockBusy(_))));
    // A different directory is unaffected
    let _other = locks.acquire(&path("other/b.txt")).unwrap();

    drop(guard);
    assert!(!temp.path().join("docs").join(DIR_LOCK_FILENAME).exists());
    let _again = locks.acquire(&path("docs/b.txt")).unwrap();
}

#[test]
fn test_top_level_directory_marker() {
    let temp = TempDir::new().unwrap();
    let locks = LockManager::new(temp.path(), LockScope::Directory);

    let _guard = locks.acquire(&path("a.txt")).unwrap();
    assert!(temp.path().join(DIR_LOCK_FILENAME).exists());
    assert_eq!(locks.scope(), LockScope::Directory);
}

// =============================================================================
// Stale Markers & Concurrency
// =============================================================================

#[test]
fn test_sweep_stale_markers() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("sub")).unwrap();
    fs::write(temp.path().join(DIR_LOCK_FILENAME), b"").unwrap();
    fs::write(temp.path().join("sub").join(format!("{}f", PATH_LOCK_PREFIX)), b"").unwrap();
    fs::write(temp.path().join("sub").join("data.txt"), b"keep").unwrap();

    let locks = LockManager::new(temp.path(), LockScope::Path);
    assert_eq!(locks.sweep_stale().unwrap(), 2);

    assert!(!temp.path().join(DIR_LOCK_FILENAME).exists());
    assert!(temp.path().join("sub").join("data.txt").exists());
    let _guard = locks.acquire(&path("sub/f")).unwrap();
}

#[test]
fn test_only_one_thread_wins() {
    let temp = TempDir::new().unwrap();
    let locks = Arc::new(LockManager::new(temp.path(), LockScope::Path));
    let barrier = Arc::new(Barrier::new(8));
    let target = path("contended.txt");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let locks = Arc::clone(&locks);
            let barrier = Arc::clone(&barrier);
            let target = target.clone();
            thread::spawn(move || {
                barrier.wait();
                let guard = locks.acquire(&target);
                let won = guard.is_ok();
                // Hold until every thread has tried
                barrier.wait();
                won
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}
