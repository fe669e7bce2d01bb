use std::fmt;

use credir_error::CredentialError;

use super::{
    kdf::{Pbkdf2Scheme, ScryptScheme, ShaCryptScheme},
    schemes::{Argon2Scheme, Base64Scheme, BcryptScheme, PlaintextScheme},
};

/// A decoded password digest.
pub trait Digest: Send + Sync {
    /// Name of the scheme that produced the digest.
    fn scheme(&self) -> &'static str;

    /// Compares `candidate` against the digest.
    ///
    /// A wrong password is `Ok(false)`; `Err` means the comparison itself
    /// could not complete.
    fn matches(
        &self,
        candidate: &str,
    ) -> Result<bool, CredentialError>;
}

/// One digest algorithm, recognized by the prefix of its encoding.
pub trait DigestScheme: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `encoded` carries this scheme's identifier.
    fn accepts(
        &self,
        encoded: &str,
    ) -> bool;

    fn decode(
        &self,
        encoded: &str,
    ) -> Result<Box<dyn Digest>, CredentialError>;
}

/// Registry of digest schemes, fixed once built.
///
/// The stored digest names its own algorithm; the caller never chooses.
pub struct CredentialVerifier {
    schemes: Vec<Box<dyn DigestScheme>>,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl CredentialVerifier {
    /// A verifier with no schemes; every digest is unsupported.
    pub fn empty() -> Self {
        Self {
            schemes: Vec::new(),
        }
    }

    /// Argon2, bcrypt, SHA-crypt, PBKDF2 and scrypt, plus the plaintext
    /// pass-through schemes when `allow_plaintext` is set.
    pub fn with_defaults(allow_plaintext: bool) -> Self {
        let verifier = Self::empty()
            .register(Argon2Scheme)
            .register(BcryptScheme)
            .register(ShaCryptScheme)
            .register(Pbkdf2Scheme)
            .register(ScryptScheme);
        if allow_plaintext {
            verifier.register(PlaintextScheme).register(Base64Scheme)
        } else {
            verifier
        }
    }

    pub fn register(
        mut self,
        scheme: impl DigestScheme + 'static,
    ) -> Self {
        self.schemes.push(Box::new(scheme));
        self
    }

    pub fn scheme_names(&self) -> Vec<&'static str> {
        self.schemes.iter().map(|s| s.name()).collect()
    }

    /// Decodes `encoded` with the first scheme that accepts it.
    pub fn decode(
        &self,
        encoded: &str,
    ) -> Result<Box<dyn Digest>, CredentialError> {
        let scheme = self
            .schemes
            .iter()
            .find(|s| s.accepts(encoded))
            .ok_or_else(|| unsupported_prefix(encoded))?;
        scheme.decode(encoded)
    }

    /// Decodes `encoded` and matches `candidate` against it.
    pub fn verify(
        &self,
        encoded: &str,
        candidate: &str,
    ) -> Result<bool, CredentialError> {
        self.decode(encoded)?.matches(candidate)
    }
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::with_defaults(true)
    }
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("schemes", &self.scheme_names())
            .finish()
    }
}

/// Builds the error for a digest no scheme recognizes, without echoing the
/// digest body.
fn unsupported_prefix(encoded: &str) -> CredentialError {
    match encoded.strip_prefix('$').and_then(|rest| rest.split_once('$')) {
        Some((id, _)) => CredentialError::unsupported(format!(
            "no scheme registered for identifier `{id}`"
        )),
        None => CredentialError::unsupported("digest is not in modular crypt format"),
    }
}
