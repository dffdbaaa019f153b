use anyhow::{Result, anyhow};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand_core::OsRng;

/// PHC string produced by [`CredentialHasher::hash`].
///
/// Two hashes of the same secret differ (fresh salt each time), so never
/// compare these with `==`; use [`CredentialHasher::verify`].
#[derive(Debug, Clone)]
pub struct HashedSecret(String);

impl HashedSecret {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Argon2id hasher shared by access passwords and one-time tokens.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl CredentialHasher {
    /// Build a hasher with explicit cost parameters (memory in KiB).
    ///
    /// Verification always uses the parameters encoded in the stored hash,
    /// so hashes made under different costs stay verifiable.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| anyhow!("Invalid argon2 params: {}", e))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, secret: &str) -> Result<HashedSecret> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| anyhow!("Hashing failed: {}", e))?
            .to_string();
        Ok(HashedSecret(hash))
    }

    /// Constant-time check of `secret` against a stored hash.
    /// A malformed stored hash is a mismatch, not an error.
    pub fn verify(&self, secret: &str, hashed: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hashed) else {
            return false;
        };
        self.argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::with_params(Params::MIN_M_COST, 1, 1).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let h = hasher();
        let hashed = h.hash("pw123").unwrap();

        assert!(hashed.as_str().starts_with("$argon2id$"));
        assert!(h.verify("pw123", hashed.as_str()));
        assert!(!h.verify("wrong", hashed.as_str()));
    }

    #[test]
    fn same_secret_hashes_differently() {
        let h = hasher();
        let a = h.hash("pw123").unwrap();
        let b = h.hash("pw123").unwrap();

        assert_ne!(a.as_str(), b.as_str());
        assert!(h.verify("pw123", a.as_str()));
        assert!(h.verify("pw123", b.as_str()));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        let h = hasher();
        assert!(!h.verify("pw123", ""));
        assert!(!h.verify("pw123", "not-a-phc-string"));
        assert!(!h.verify("pw123", "$argon2id$v=19$m=8,t=1,p=1$garbage"));
    }

    #[test]
    fn verifies_hashes_made_with_other_params() {
        let cheap = hasher();
        let other = CredentialHasher::with_params(Params::MIN_M_COST * 2, 2, 1).unwrap();
        let hashed = other.hash("pw123").unwrap();

        assert!(cheap.verify("pw123", hashed.as_str()));
    }

    #[test]
    fn rejects_invalid_params() {
        assert!(CredentialHasher::with_params(0, 0, 0).is_err());
    }
}
