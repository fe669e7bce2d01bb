//! Readers racing a reloading writer must always see a whole snapshot.

use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use credir::{DirectoryStore, Snapshot, TracingReporter};
use tempfile::NamedTempFile;

/// `count` users, each in its own group plus a shared `tag` group.
fn generation(
    tag: &str,
    count: usize,
) -> String {
    let mut yaml = String::from("users:\n");
    for i in 0..count {
        yaml.push_str(&format!(
            "  {tag}{i:03}:\n    password: $plaintext$pw\n    groups: [{tag}-own-{i:03}, {tag}]\n"
        ));
    }
    yaml
}

fn assert_whole(snapshot: &Snapshot) {
    assert!(!snapshot.is_empty());
    for user in snapshot.users() {
        let primary = snapshot
            .group(&user.primary_group.name)
            .expect("primary group missing from its own snapshot");
        assert_eq!(primary.gid_number, user.primary_group.gid_number);
        for other in &user.other_groups {
            assert!(snapshot.group(&other.name).is_some());
        }
    }
    // Every generation pairs N users with N + 1 groups
    assert_eq!(snapshot.group_count(), snapshot.user_count() + 1);
}

#[test]
fn test_readers_never_observe_torn_state() {
    let first = generation("a", 40);
    let second = generation("b", 25);

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(first.as_bytes()).unwrap();
    file.flush().unwrap();

    let store = Arc::new(DirectoryStore::open(file.path(), Arc::new(TracingReporter)).unwrap());
    let stop = Arc::new(AtomicBool::new(false));
    let observed = Arc::new(AtomicU64::new(0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            let observed = Arc::clone(&observed);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    assert_whole(&store.current());
                    observed.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for round in 0..60 {
        let content = if round % 2 == 0 { &second } else { &first };
        store.reload(content.as_bytes()).unwrap();
        // A malformed file in between must not disturb anyone
        assert!(store.reload(b"users: [").is_err());
        thread::sleep(Duration::from_millis(1));
    }

    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(observed.load(Ordering::Relaxed) > 0);
    let stats = store.stats();
    assert_eq!(stats.reloads, 60);
    assert_eq!(stats.failed_reloads, 60);
    // Last round installed the first generation
    assert_eq!(store.current().user_count(), 40);
}

#[test]
fn test_completed_reload_is_visible_to_next_lookup() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(generation("a", 3).as_bytes()).unwrap();
    file.flush().unwrap();
    let store = DirectoryStore::open(file.path(), Arc::new(TracingReporter)).unwrap();

    for round in 0..20 {
        let tag = if round % 2 == 0 { "b" } else { "a" };
        store.reload(generation(tag, 3).as_bytes()).unwrap();
        assert!(store.current().user(&format!("{tag}000")).is_some());
    }
}

#[test]
fn test_held_snapshot_outlives_reload() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(generation("a", 5).as_bytes()).unwrap();
    file.flush().unwrap();
    let store = DirectoryStore::open(file.path(), Arc::new(TracingReporter)).unwrap();

    let held = store.current();
    store.reload(generation("b", 2).as_bytes()).unwrap();

    assert_eq!(held.user_count(), 5);
    assert_whole(&held);
    assert_eq!(store.current().user_count(), 2);
}
