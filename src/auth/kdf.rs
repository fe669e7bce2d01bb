//! Key-derivation digests carried over from existing user databases:
//! SHA-crypt (`$5$`, `$6$`), PBKDF2 in the passlib layout
//! (`$pbkdf2-sha512$<rounds>$<salt>$<key>`) and scrypt in PHC form
//! (`$scrypt$ln=..,r=..,p=..$<salt>$<key>`).

use argon2::password_hash::PasswordHash;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use credir_error::CredentialError;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use sha_crypt::{sha256_crypt_b64, sha512_crypt_b64, Sha256Params, Sha512Params};

use super::{
    digest::{Digest, DigestScheme},
    schemes::constant_time_eq,
};

const SHA_CRYPT_DEFAULT_ROUNDS: usize = 5_000;
const SHA_CRYPT_MIN_ROUNDS: usize = 1_000;
const SHA_CRYPT_MAX_ROUNDS: usize = 999_999_999;
const SHA_CRYPT_MAX_SALT: usize = 16;
const SCRYPT_MAX_SALT: usize = 64;

/// SHA-256 and SHA-512 crypt.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaCryptScheme;

/// PBKDF2-HMAC with a SHA-2 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pbkdf2Scheme;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScryptScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShaCryptVariant {
    Sha256,
    Sha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pbkdf2Variant {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

#[derive(Debug)]
struct ShaCryptDigest {
    variant: ShaCryptVariant,
    rounds: usize,
    salt: String,
    hash: String,
}

#[derive(Debug)]
struct Pbkdf2Digest {
    variant: Pbkdf2Variant,
    rounds: u32,
    salt: Vec<u8>,
    key: Vec<u8>,
}

#[derive(Debug)]
struct ScryptDigest {
    params: scrypt::Params,
    salt: Vec<u8>,
    key: Vec<u8>,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl ShaCryptVariant {
    fn from_id(id: &str) -> Option<Self> {
        match id {
            "5" => Some(Self::Sha256),
            "6" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Length of the encoded checksum.
    fn hash_len(self) -> usize {
        match self {
            Self::Sha256 => 43,
            Self::Sha512 => 86,
        }
    }
}

impl Pbkdf2Variant {
    fn from_id(id: &str) -> Option<Self> {
        match id {
            "pbkdf2-sha224" => Some(Self::Sha224),
            "pbkdf2-sha256" => Some(Self::Sha256),
            "pbkdf2-sha384" => Some(Self::Sha384),
            "pbkdf2-sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Schemes
////////////////////////////////////////////////////////////////////////////////

impl DigestScheme for ShaCryptScheme {
    fn name(&self) -> &'static str {
        "sha-crypt"
    }

    fn accepts(
        &self,
        encoded: &str,
    ) -> bool {
        encoded.starts_with("$5$") || encoded.starts_with("$6$")
    }

    fn decode(
        &self,
        encoded: &str,
    ) -> Result<Box<dyn Digest>, CredentialError> {
        let mut fields = encoded.split('$').skip(1);
        let variant = fields
            .next()
            .and_then(ShaCryptVariant::from_id)
            .ok_or_else(|| CredentialError::unsupported("sha-crypt: unknown identifier"))?;

        let mut field = fields
            .next()
            .ok_or_else(|| CredentialError::unsupported("sha-crypt: missing salt"))?;
        let rounds = match field.strip_prefix("rounds=") {
            Some(rounds) => {
                let rounds = rounds
                    .parse::<usize>()
                    .map_err(|e| CredentialError::unsupported(format!("sha-crypt rounds: {e}")))?;
                field = fields
                    .next()
                    .ok_or_else(|| CredentialError::unsupported("sha-crypt: missing salt"))?;
                // Out-of-range round counts are clamped, not rejected
                rounds.clamp(SHA_CRYPT_MIN_ROUNDS, SHA_CRYPT_MAX_ROUNDS)
            }
            None => SHA_CRYPT_DEFAULT_ROUNDS,
        };

        // Only the first 16 salt characters take part in the hash
        let salt: String = field.chars().take(SHA_CRYPT_MAX_SALT).collect();
        let hash = fields
            .next()
            .ok_or_else(|| CredentialError::unsupported("sha-crypt: missing checksum"))?;
        if fields.next().is_some() {
            return Err(CredentialError::unsupported("sha-crypt: trailing fields"));
        }
        if hash.len() != variant.hash_len() || !hash.bytes().all(is_crypt_char) {
            return Err(CredentialError::unsupported("sha-crypt: malformed checksum"));
        }

        Ok(Box::new(ShaCryptDigest {
            variant,
            rounds,
            salt,
            hash: hash.to_string(),
        }))
    }
}

impl DigestScheme for Pbkdf2Scheme {
    fn name(&self) -> &'static str {
        "pbkdf2"
    }

    fn accepts(
        &self,
        encoded: &str,
    ) -> bool {
        encoded.starts_with("$pbkdf2-")
    }

    fn decode(
        &self,
        encoded: &str,
    ) -> Result<Box<dyn Digest>, CredentialError> {
        let fields: Vec<&str> = encoded.split('$').collect();
        let [_, id, rounds, salt, key] = fields.as_slice() else {
            return Err(CredentialError::unsupported(
                "pbkdf2: expected $pbkdf2-<digest>$<rounds>$<salt>$<key>",
            ));
        };
        let variant = Pbkdf2Variant::from_id(id)
            .ok_or_else(|| CredentialError::unsupported(format!("pbkdf2: unknown variant `{id}`")))?;
        let rounds = rounds
            .parse::<u32>()
            .ok()
            .filter(|r| *r > 0)
            .ok_or_else(|| CredentialError::unsupported("pbkdf2: invalid rounds"))?;
        let salt = ab64_decode(salt)?;
        let key = ab64_decode(key)?;
        if salt.is_empty() || key.is_empty() {
            return Err(CredentialError::unsupported("pbkdf2: empty salt or key"));
        }

        Ok(Box::new(Pbkdf2Digest {
            variant,
            rounds,
            salt,
            key,
        }))
    }
}

impl DigestScheme for ScryptScheme {
    fn name(&self) -> &'static str {
        "scrypt"
    }

    fn accepts(
        &self,
        encoded: &str,
    ) -> bool {
        encoded.starts_with("$scrypt$")
    }

    fn decode(
        &self,
        encoded: &str,
    ) -> Result<Box<dyn Digest>, CredentialError> {
        let parsed = PasswordHash::new(encoded)
            .map_err(|e| CredentialError::unsupported(format!("scrypt: {e}")))?;
        let param = |name: &str| {
            parsed
                .params
                .get_decimal(name)
                .ok_or_else(|| CredentialError::unsupported(format!("scrypt: missing `{name}`")))
        };
        let log_n = u8::try_from(param("ln")?)
            .map_err(|_| CredentialError::unsupported("scrypt: `ln` out of range"))?;
        let (r, p) = (param("r")?, param("p")?);

        let (Some(salt), Some(key)) = (parsed.salt, parsed.hash) else {
            return Err(CredentialError::unsupported("scrypt: missing salt or key"));
        };
        let mut salt_buf = [0u8; SCRYPT_MAX_SALT];
        let salt = salt
            .decode_b64(&mut salt_buf)
            .map_err(|e| CredentialError::unsupported(format!("scrypt salt: {e}")))?
            .to_vec();
        let key = key.as_bytes().to_vec();

        let params = scrypt::Params::new(log_n, r, p, key.len())
            .map_err(|e| CredentialError::unsupported(format!("scrypt params: {e}")))?;

        Ok(Box::new(ScryptDigest { params, salt, key }))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Digests
////////////////////////////////////////////////////////////////////////////////

impl Digest for ShaCryptDigest {
    fn scheme(&self) -> &'static str {
        "sha-crypt"
    }

    fn matches(
        &self,
        candidate: &str,
    ) -> Result<bool, CredentialError> {
        let (password, salt) = (candidate.as_bytes(), self.salt.as_bytes());
        let computed = match self.variant {
            ShaCryptVariant::Sha256 => Sha256Params::new(self.rounds)
                .and_then(|params| sha256_crypt_b64(password, salt, &params)),
            ShaCryptVariant::Sha512 => Sha512Params::new(self.rounds)
                .and_then(|params| sha512_crypt_b64(password, salt, &params)),
        }
        .map_err(|e| CredentialError::match_failure(format!("sha-crypt: {e:?}")))?;
        Ok(constant_time_eq(computed.as_bytes(), self.hash.as_bytes()))
    }
}

impl Digest for Pbkdf2Digest {
    fn scheme(&self) -> &'static str {
        "pbkdf2"
    }

    fn matches(
        &self,
        candidate: &str,
    ) -> Result<bool, CredentialError> {
        let mut derived = vec![0u8; self.key.len()];
        let password = candidate.as_bytes();
        match self.variant {
            Pbkdf2Variant::Sha224 => {
                pbkdf2::pbkdf2_hmac::<Sha224>(password, &self.salt, self.rounds, &mut derived)
            }
            Pbkdf2Variant::Sha256 => {
                pbkdf2::pbkdf2_hmac::<Sha256>(password, &self.salt, self.rounds, &mut derived)
            }
            Pbkdf2Variant::Sha384 => {
                pbkdf2::pbkdf2_hmac::<Sha384>(password, &self.salt, self.rounds, &mut derived)
            }
            Pbkdf2Variant::Sha512 => {
                pbkdf2::pbkdf2_hmac::<Sha512>(password, &self.salt, self.rounds, &mut derived)
            }
        }
        Ok(constant_time_eq(&derived, &self.key))
    }
}

impl Digest for ScryptDigest {
    fn scheme(&self) -> &'static str {
        "scrypt"
    }

    fn matches(
        &self,
        candidate: &str,
    ) -> Result<bool, CredentialError> {
        let mut derived = vec![0u8; self.key.len()];
        scrypt::scrypt(candidate.as_bytes(), &self.salt, &self.params, &mut derived)
            .map_err(|e| CredentialError::match_failure(format!("scrypt: {e}")))?;
        Ok(constant_time_eq(&derived, &self.key))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Internal functions
////////////////////////////////////////////////////////////////////////////////

/// `./0-9A-Za-z`
fn is_crypt_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'/'
}

/// passlib's adapted base64: standard alphabet with `.` for `+`, unpadded.
fn ab64_decode(field: &str) -> Result<Vec<u8>, CredentialError> {
    STANDARD_NO_PAD
        .decode(field.trim_end_matches('=').replace('.', "+"))
        .map_err(|e| CredentialError::unsupported(format!("pbkdf2: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab64_encode(bytes: &[u8]) -> String {
        STANDARD_NO_PAD.encode(bytes).replace('+', ".")
    }

    #[test]
    fn test_sha512_crypt_reference_vector() {
        let encoded = "$6$saltstring$svn8UoSVapNtMuq1ukKS4tPQd8iKwSMHWjl/O817G3uBnIFNjnQJuesI68u4OTLiBFdcbYEdFCoEOfaS35inz1";
        assert!(ShaCryptScheme.accepts(encoded));

        let digest = ShaCryptScheme.decode(encoded).unwrap();
        assert_eq!(digest.scheme(), "sha-crypt");
        assert!(digest.matches("Hello world!").unwrap());
        assert!(!digest.matches("Hello world").unwrap());
    }

    #[test]
    fn test_sha256_crypt_roundtrip() {
        let params = Sha256Params::new(5_000).unwrap();
        let hash = sha256_crypt_b64(b"correct horse", b"Zm9vYmFy", &params).unwrap();
        let encoded = format!("$5$rounds=5000$Zm9vYmFy${hash}");

        let digest = ShaCryptScheme.decode(&encoded).unwrap();
        assert!(digest.matches("correct horse").unwrap());
        assert!(!digest.matches("battery staple").unwrap());
    }

    #[test]
    fn test_sha_crypt_structure_validation() {
        assert!(ShaCryptScheme.decode("$6$salt").is_err());
        assert!(ShaCryptScheme.decode("$6$rounds=many$salt$abc").is_err());
        assert!(ShaCryptScheme.decode("$6$salt$tooshort").is_err());
        let bad_chars = format!("$5$salt${}", "#".repeat(43));
        assert!(ShaCryptScheme.decode(&bad_chars).is_err());
    }

    #[test]
    fn test_pbkdf2_roundtrip() {
        let salt = b"0123456789abcdef";
        let mut key = [0u8; 64];
        pbkdf2::pbkdf2_hmac::<Sha512>(b"correct horse", salt, 1_000, &mut key);
        let encoded = format!(
            "$pbkdf2-sha512$1000${}${}",
            ab64_encode(salt),
            ab64_encode(&key)
        );
        assert!(Pbkdf2Scheme.accepts(&encoded));

        let digest = Pbkdf2Scheme.decode(&encoded).unwrap();
        assert!(digest.matches("correct horse").unwrap());
        assert!(!digest.matches("battery staple").unwrap());
    }

    #[test]
    fn test_pbkdf2_variant_is_part_of_the_digest() {
        let salt = b"saltsaltsaltsalt";
        let mut key = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(b"pw", salt, 10, &mut key);
        let as_sha256 = format!("$pbkdf2-sha256$10${}${}", ab64_encode(salt), ab64_encode(&key));
        let as_sha384 = as_sha256.replacen("sha256", "sha384", 1);

        assert!(Pbkdf2Scheme.decode(&as_sha256).unwrap().matches("pw").unwrap());
        assert!(!Pbkdf2Scheme.decode(&as_sha384).unwrap().matches("pw").unwrap());
    }

    #[test]
    fn test_pbkdf2_structure_validation() {
        assert!(Pbkdf2Scheme.decode("$pbkdf2-md5$1000$c2FsdA$a2V5").is_err());
        assert!(Pbkdf2Scheme.decode("$pbkdf2-sha512$0$c2FsdA$a2V5").is_err());
        assert!(Pbkdf2Scheme.decode("$pbkdf2-sha512$1000$c2FsdA").is_err());
        assert!(Pbkdf2Scheme.decode("$pbkdf2-sha512$1000$!!$a2V5").is_err());
    }

    #[test]
    fn test_scrypt_roundtrip() {
        let salt = b"0123456789abcdef";
        let params = scrypt::Params::new(10, 8, 1, 32).unwrap();
        let mut key = [0u8; 32];
        scrypt::scrypt(b"correct horse", salt, &params, &mut key).unwrap();
        let encoded = format!(
            "$scrypt$ln=10,r=8,p=1${}${}",
            STANDARD_NO_PAD.encode(salt),
            STANDARD_NO_PAD.encode(key)
        );
        assert!(ScryptScheme.accepts(&encoded));

        let digest = ScryptScheme.decode(&encoded).unwrap();
        assert_eq!(digest.scheme(), "scrypt");
        assert!(digest.matches("correct horse").unwrap());
        assert!(!digest.matches("battery staple").unwrap());
    }

    #[test]
    fn test_scrypt_requires_cost_parameters() {
        assert!(matches!(
            ScryptScheme.decode("$scrypt$r=8,p=1$MDEyMzQ1Njc4OWFiY2RlZg$c2NyeXB0a2V5c2NyeXB0a2V5"),
            Err(CredentialError::UnsupportedDigestFormat { .. })
        ));
        assert!(ScryptScheme.decode("$scrypt$ln=10,r=8,p=1").is_err());
    }
}
