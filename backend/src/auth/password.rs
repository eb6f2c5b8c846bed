//! Salted PBKDF2-HMAC-SHA256 password hashes, stored self-describing as
//! `pbkdf2:sha256:<iterations>$<salt hex>$<hash hex>` so the iteration count
//! can be raised without invalidating existing accounts.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const SALT_LENGTH: usize = 16;
pub const HASH_LENGTH: usize = 32;
pub const MIN_PASSWORD_LENGTH: usize = 8;
const SCHEME: &str = "pbkdf2:sha256";

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password must be at least 8 characters")]
    TooShort,
    #[error("Malformed password hash")]
    Malformed,
}

#[derive(Clone, Debug)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(PasswordError::TooShort);
        }
        let mut salt = [0u8; SALT_LENGTH];
        rand::rng().fill_bytes(&mut salt);
        let hash = derive(password, &salt, self.iterations);
        Ok(format!(
            "{}:{}${}${}",
            SCHEME,
            self.iterations,
            hex::encode(salt),
            hex::encode(hash)
        ))
    }

    /// `Ok(false)` on mismatch, `Err` only when the stored hash is unreadable.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool, PasswordError> {
        let (iterations, salt, expected) = parse(stored)?;
        let actual = derive(password, &salt, iterations);
        Ok(actual.as_slice().ct_eq(expected.as_slice()).into())
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

fn parse(stored: &str) -> Result<(u32, Vec<u8>, Vec<u8>), PasswordError> {
    let mut parts = stored.split('$');
    let (Some(method), Some(salt), Some(hash), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(PasswordError::Malformed);
    };
    let iterations = method
        .strip_prefix(SCHEME)
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .ok_or(PasswordError::Malformed)?;
    let salt = hex::decode(salt).map_err(|_| PasswordError::Malformed)?;
    let hash = hex::decode(hash).map_err(|_| PasswordError::Malformed)?;
    if hash.len() != HASH_LENGTH {
        return Err(PasswordError::Malformed);
    }
    Ok((iterations, salt, hash))
}
