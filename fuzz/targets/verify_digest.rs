#![no_main]

use credir::CredentialVerifier;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (digest, candidate) = text.split_once('\n').unwrap_or((text, ""));
    // Only plaintext-style schemes here; key-derivation schemes are too slow to fuzz
    const SLOW: [&str; 6] = ["$argon2", "$2", "$5$", "$6$", "$pbkdf2-", "$scrypt$"];
    if SLOW.iter().any(|p| digest.starts_with(p)) {
        return;
    }
    let _ = CredentialVerifier::default().verify(digest, candidate);
});
