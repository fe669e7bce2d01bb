//! End-to-end reload through the platform file watcher.

use std::{io::Write, time::Duration};

use credir::{BackendOptions, DirectoryBackend, NotifyWatcher};
use tempfile::NamedTempFile;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_write_triggers_reload() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"users:\n  alice:\n    password: $plaintext$a\n    groups: [staff]\n")
        .unwrap();
    file.flush().unwrap();

    let backend = DirectoryBackend::start(
        BackendOptions::new(file.path()),
        Box::new(NotifyWatcher::new()),
    )
    .unwrap();
    assert!(backend.resolve_user("alice").is_ok());

    // In-place rewrite keeps the watched inode
    std::fs::write(
        file.path(),
        "users:\n  bob:\n    password: $plaintext$b\n    groups: [ops]\n",
    )
    .unwrap();

    let mut reloaded = false;
    for _ in 0..100 {
        if backend.resolve_user("bob").is_ok() {
            reloaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(reloaded, "file write was not picked up");
    assert!(backend.resolve_user("alice").is_err());
    assert_eq!(backend.verify_password("bob", "b"), Ok(()));

    // Close-write is the only reload trigger on inotify
    #[cfg(target_os = "linux")]
    {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let stats = backend.stats();
        assert_eq!(stats.reloads, 1);
        assert_eq!(stats.failed_reloads, 0);
    }

    backend.shutdown().unwrap();
    backend.wait_for_shutdown().await;
    assert!(!backend.is_running());
}

#[tokio::test]
async fn test_missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = DirectoryBackend::start(
        BackendOptions::new(dir.path().join("users.yml")),
        Box::new(NotifyWatcher::new()),
    )
    .unwrap_err();
    assert_eq!(err.status_code(), credir::StatusCode::Io);
}
