//! Built-in digest schemes.

use argon2::{
    password_hash::{self, PasswordHash, PasswordVerifier},
    Argon2,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use credir_error::CredentialError;
use sha2::{Digest as _, Sha256};

use super::digest::{Digest, DigestScheme};

const ARGON2_PREFIXES: [&str; 3] = ["$argon2id$", "$argon2i$", "$argon2d$"];
const BCRYPT_PREFIXES: [&str; 4] = ["$2a$", "$2b$", "$2x$", "$2y$"];
const BCRYPT_LEN: usize = 60;
const PLAINTEXT_PREFIX: &str = "$plaintext$";
const BASE64_PREFIX: &str = "$base64$";

/// Argon2 in PHC string format (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Scheme;

/// bcrypt (`$2b$<cost>$<salt+hash>`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BcryptScheme;

/// Plaintext pass-through (`$plaintext$<password>`), for tests and migrations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextScheme;

/// Base64 pass-through (`$base64$<standard base64 of the password>`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Scheme;

#[derive(Debug)]
struct Argon2Digest {
    encoded: String,
}

#[derive(Debug)]
struct BcryptDigest {
    encoded: String,
}

#[derive(Debug)]
struct ClearDigest {
    scheme: &'static str,
    secret: Vec<u8>,
}

////////////////////////////////////////////////////////////////////////////////
// Schemes
////////////////////////////////////////////////////////////////////////////////

impl DigestScheme for Argon2Scheme {
    fn name(&self) -> &'static str {
        "argon2"
    }

    fn accepts(
        &self,
        encoded: &str,
    ) -> bool {
        ARGON2_PREFIXES.iter().any(|p| encoded.starts_with(p))
    }

    fn decode(
        &self,
        encoded: &str,
    ) -> Result<Box<dyn Digest>, CredentialError> {
        let parsed = PasswordHash::new(encoded)
            .map_err(|e| CredentialError::unsupported(format!("argon2: {e}")))?;
        if parsed.salt.is_none() || parsed.hash.is_none() {
            return Err(CredentialError::unsupported("argon2: missing salt or hash"));
        }
        Ok(Box::new(Argon2Digest {
            encoded: encoded.to_string(),
        }))
    }
}

impl DigestScheme for BcryptScheme {
    fn name(&self) -> &'static str {
        "bcrypt"
    }

    fn accepts(
        &self,
        encoded: &str,
    ) -> bool {
        BCRYPT_PREFIXES.iter().any(|p| encoded.starts_with(p))
    }

    fn decode(
        &self,
        encoded: &str,
    ) -> Result<Box<dyn Digest>, CredentialError> {
        validate_bcrypt(encoded)?;
        Ok(Box::new(BcryptDigest {
            encoded: encoded.to_string(),
        }))
    }
}

impl DigestScheme for PlaintextScheme {
    fn name(&self) -> &'static str {
        "plaintext"
    }

    fn accepts(
        &self,
        encoded: &str,
    ) -> bool {
        encoded.starts_with(PLAINTEXT_PREFIX)
    }

    fn decode(
        &self,
        encoded: &str,
    ) -> Result<Box<dyn Digest>, CredentialError> {
        let secret = encoded.strip_prefix(PLAINTEXT_PREFIX).unwrap_or_default();
        if secret.is_empty() {
            return Err(CredentialError::unsupported("plaintext: empty password"));
        }
        Ok(Box::new(ClearDigest {
            scheme: self.name(),
            secret: secret.as_bytes().to_vec(),
        }))
    }
}

impl DigestScheme for Base64Scheme {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn accepts(
        &self,
        encoded: &str,
    ) -> bool {
        encoded.starts_with(BASE64_PREFIX)
    }

    fn decode(
        &self,
        encoded: &str,
    ) -> Result<Box<dyn Digest>, CredentialError> {
        let secret = STANDARD
            .decode(encoded.strip_prefix(BASE64_PREFIX).unwrap_or_default())
            .map_err(|e| CredentialError::unsupported(format!("base64: {e}")))?;
        if secret.is_empty() {
            return Err(CredentialError::unsupported("base64: empty password"));
        }
        Ok(Box::new(ClearDigest {
            scheme: self.name(),
            secret,
        }))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Digests
////////////////////////////////////////////////////////////////////////////////

impl Digest for Argon2Digest {
    fn scheme(&self) -> &'static str {
        "argon2"
    }

    fn matches(
        &self,
        candidate: &str,
    ) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(&self.encoded)
            .map_err(|e| CredentialError::match_failure(format!("argon2: {e}")))?;
        // Parameters come from the digest itself
        match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::match_failure(format!("argon2: {e}"))),
        }
    }
}

impl Digest for BcryptDigest {
    fn scheme(&self) -> &'static str {
        "bcrypt"
    }

    fn matches(
        &self,
        candidate: &str,
    ) -> Result<bool, CredentialError> {
        bcrypt::verify(candidate, &self.encoded)
            .map_err(|e| CredentialError::match_failure(format!("bcrypt: {e}")))
    }
}

impl Digest for ClearDigest {
    fn scheme(&self) -> &'static str {
        self.scheme
    }

    fn matches(
        &self,
        candidate: &str,
    ) -> Result<bool, CredentialError> {
        Ok(constant_time_eq(&self.secret, candidate.as_bytes()))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Internal functions
////////////////////////////////////////////////////////////////////////////////

/// Compares fixed-size hashes of both inputs so neither content nor length
/// leaks through timing.
pub(super) fn constant_time_eq(
    a: &[u8],
    b: &[u8],
) -> bool {
    let (ha, hb) = (Sha256::digest(a), Sha256::digest(b));
    ha.iter().zip(hb.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// `$2b$NN$` followed by 53 characters of the bcrypt alphabet.
fn validate_bcrypt(encoded: &str) -> Result<(), CredentialError> {
    if encoded.len() != BCRYPT_LEN {
        return Err(CredentialError::unsupported(format!(
            "bcrypt: expected {BCRYPT_LEN} characters, got {}",
            encoded.len()
        )));
    }
    let cost = encoded
        .get(4..6)
        .and_then(|c| c.parse::<u32>().ok())
        .filter(|c| (4..=31).contains(c))
        .ok_or_else(|| CredentialError::unsupported("bcrypt: invalid cost"))?;
    if encoded.as_bytes()[6] != b'$' {
        return Err(CredentialError::unsupported("bcrypt: missing separator"));
    }
    let body_ok = encoded.as_bytes()[7..]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'.' || b == b'/');
    if !body_ok {
        return Err(CredentialError::unsupported(format!(
            "bcrypt: invalid characters (cost {cost})"
        )));
    }
    Ok(())
}
