use thiserror::Error;

#[derive(Debug, Error)]
#[error("Password hashing failed: {0}")]
pub struct PasswordError(#[from] bcrypt::BcryptError);

/// One-way bcrypt hashing with a fixed work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    /// bcrypt re-derives the hash with the stored salt and cost, so the work
    /// done does not depend on where the candidate diverges.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        Ok(bcrypt::verify(password, hash)?)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4 /* bcrypt minimum cost */)
    }

    #[test]
    fn hash_and_verify() {
        let hash = hasher().hash("my_secure_password").unwrap();
        assert!(hasher().verify("my_secure_password", &hash).unwrap());
        assert!(!hasher().verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_different_salts() {
        let h1 = hasher().hash("same").unwrap();
        let h2 = hasher().hash("same").unwrap();
        assert_ne!(h1, h2);
        assert!(hasher().verify("same", &h1).unwrap());
        assert!(hasher().verify("same", &h2).unwrap());
    }

    #[test]
    fn hash_uses_configured_cost() {
        let hash = PasswordHasher::new(10).hash("pw").unwrap();
        assert!(hash.starts_with("$2b$10$"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(hasher().verify("pw", "not-a-bcrypt-hash").is_err());
    }
}
