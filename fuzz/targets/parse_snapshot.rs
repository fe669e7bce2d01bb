#![no_main]

use credir::parse_snapshot;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Either a complete snapshot or an error, never a panic
    if let Ok(snapshot) = parse_snapshot(data) {
        for user in snapshot.users() {
            assert!(snapshot.group(&user.primary_group.name).is_some());
            assert!(user.uid_number >= credir::directory::USER_ID_BASE);
        }
    }
});
