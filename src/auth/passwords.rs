use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::RngCore;

use crate::auth::{AuthError, AuthResult};

const SALT_LEN: usize = 16;

#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> AuthResult<Self> {
        Self::with_params(19 * 1024, 2, 1) // 19 MiB
    }

    /// Build with explicit Argon2id costs (memory in KiB, iterations, lanes).
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(m_cost);
        builder.t_cost(t_cost);
        builder.p_cost(p_cost);
        let params = builder.build().map_err(AuthError::from)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng()
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|err| AuthError::PasswordHash(format!("salt generation failed: {err}")))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    /// Returns false on mismatch and on a stored hash that cannot be parsed.
    ///
    /// The digest comparison inside `argon2` is constant time.
    pub fn verify_password(&self, password: &str, encoded: &str) -> bool {
        let parsed = match PasswordHash::new(encoded) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("stored password hash is unreadable: {}", err);
                return false;
            }
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PasswordService {
        PasswordService::with_params(1024, 1, 1).expect("password service")
    }

    #[test]
    fn hashes_and_verifies_passwords() {
        let service = service();
        let hash = service.hash_password("Passw0rd!").expect("hash generation");
        assert!(service.verify_password("Passw0rd!", &hash));
        assert!(!service.verify_password("wrong-passw0rd", &hash));
    }

    #[test]
    fn salts_every_hash() {
        let service = service();
        let first = service.hash_password("Passw0rd!").expect("first hash");
        let second = service.hash_password("Passw0rd!").expect("second hash");
        assert_ne!(first, second);
        assert!(service.verify_password("Passw0rd!", &first));
        assert!(service.verify_password("Passw0rd!", &second));
    }

    #[test]
    fn garbage_hash_is_a_mismatch() {
        assert!(!service().verify_password("Passw0rd!", "not-a-phc-string"));
    }

    #[test]
    fn default_costs_are_accepted() {
        assert!(PasswordService::new().is_ok());
    }
}
