use argon2::password_hash::{self, SaltString};
use argon2::{
    ARGON2ID_IDENT, Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier,
    Version,
};
use rand::RngCore;

use crate::auth::{AuthError, AuthResult};

const SALT_LEN: usize = 16;
const MEMORY_KIB: u32 = 19 * 1024;
const ITERATIONS: u32 = 2;
const LANES: u32 = 1;

/// Credential hasher for account passwords. Stored hashes are Argon2id PHC
/// strings, so each carries the salt and cost it was made with.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> AuthResult<Self> {
        let params = Params::new(MEMORY_KIB, ITERATIONS, LANES, None)?;
        Ok(Self::with_params(params))
    }

    fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    pub fn hash_password(&self, plaintext: &str) -> AuthResult<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt)?;
        Ok(self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)?
            .to_string())
    }

    /// `Ok(false)` on a wrong password; `Err` only when `stored` is not a
    /// usable PHC string.
    pub fn verify_password(&self, plaintext: &str, stored: &str) -> AuthResult<bool> {
        let stored = PasswordHash::new(stored)?;
        match self.argon2.verify_password(plaintext.as_bytes(), &stored) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::from(err)),
        }
    }

    /// Whether `stored` was made with another algorithm, version or cost
    /// than the one this service hashes with.
    pub fn needs_rehash(&self, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return true;
        };
        if parsed.algorithm != ARGON2ID_IDENT || parsed.version != Some(Version::V0x13.into()) {
            return true;
        }
        match Params::try_from(&parsed) {
            Ok(params) => {
                let current = self.argon2.params();
                params.m_cost() != current.m_cost()
                    || params.t_cost() != current.t_cost()
                    || params.p_cost() != current.p_cost()
            }
            Err(_) => true,
        }
    }
}
