use crate::errors::ServiceError;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
// Use the older rand version for compatibility with argon2
use rand_core::OsRng as ArgonOsRng;
use std::time::Duration;

/// Credential hashing and the simulated network latency applied to
/// login/registration. There is no token server: authentication is local to
/// the store, and the "session" is just a record-store key.
pub struct AuthService {
    simulated_latency: Option<Duration>,
}

impl AuthService {
    pub fn new(simulated_latency: Option<Duration>) -> Self {
        Self { simulated_latency }
    }

    /// Hash a plain-text password for storage.
    pub fn hash_password(&self, password: &str) -> Result<String, ServiceError> {
        let mut rng = ArgonOsRng;
        let salt = SaltString::generate(&mut rng);

        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ServiceError::Authentication(format!("Failed to hash password: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Verify a plain-text password against a stored hash.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<(), ServiceError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|_| ServiceError::Authentication("Stored password hash is invalid".to_string()))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| ServiceError::Authentication("Invalid email or password".to_string()))
    }

    /// Sleep for the configured artificial delay, imitating a round-trip to a
    /// backend that does not exist.
    pub async fn simulate_network_delay(&self) {
        if let Some(delay) = self.simulated_latency {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new(None)
    }
}
