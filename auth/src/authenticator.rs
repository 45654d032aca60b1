use chrono::Duration;

use crate::jwt::AccessClaims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;
use crate::password::PasswordError;
use crate::password::PasswordHasher;

/// Credential coordinator combining password hashing and token issuance.
///
/// Holds the process-wide signing secret and token TTL; both are fixed at
/// construction and immutable for the lifetime of the process.
pub struct Authenticator {
    password_hasher: PasswordHasher,
    jwt_handler: JwtHandler,
    token_ttl: Duration,
}

impl Authenticator {
    /// Create a new authenticator.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for JWT signing
    /// * `token_ttl` - Validity window of issued access tokens
    ///
    /// # Returns
    /// Configured Authenticator instance
    pub fn new(jwt_secret: &[u8], token_ttl: Duration) -> Self {
        Self {
            password_hasher: PasswordHasher::new(),
            jwt_handler: JwtHandler::new(jwt_secret),
            token_ttl,
        }
    }

    /// Hash a password for storage.
    ///
    /// # Arguments
    /// * `password` - Plaintext password
    ///
    /// # Returns
    /// Hashed password string
    ///
    /// # Errors
    /// * `PasswordError` - Hashing operation failed
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        self.password_hasher.hash(password)
    }

    /// Verify a password against a stored hash.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to verify
    /// * `stored_hash` - Stored password hash
    ///
    /// # Returns
    /// True if the password matches
    ///
    /// # Errors
    /// * `MalformedHash` - Stored hash is unreadable
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
        self.password_hasher.verify(password, stored_hash)
    }

    /// Issue a signed access token bound to a user id and role.
    ///
    /// The validity window starts now and ends after the configured TTL.
    ///
    /// # Arguments
    /// * `user_id` - Subject of the token
    /// * `role` - Role bound to the token
    ///
    /// # Returns
    /// Signed JWT string
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn issue_token(
        &self,
        user_id: impl ToString,
        role: impl ToString,
    ) -> Result<String, JwtError> {
        let claims = AccessClaims::new(user_id, role, self.token_ttl);
        self.jwt_handler.encode(&claims)
    }

    /// Validate and decode an access token.
    ///
    /// # Arguments
    /// * `token` - JWT token string
    ///
    /// # Returns
    /// Decoded access claims
    ///
    /// # Errors
    /// * `TokenExpired` - Token validity window has elapsed
    /// * `InvalidToken` - Signature, algorithm, or structure is invalid
    pub fn validate_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        self.jwt_handler.decode(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_validate_token() {
        let authenticator = Authenticator::new(
            b"test_secret_key_at_least_32_bytes!",
            Duration::minutes(15),
        );

        let token = authenticator
            .issue_token("user123", "admin")
            .expect("Failed to issue token");

        let claims = authenticator
            .validate_token(&token)
            .expect("Token validation failed");
        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_hash_and_verify_password() {
        let authenticator = Authenticator::new(
            b"test_secret_key_at_least_32_bytes!",
            Duration::minutes(15),
        );

        let password = "my_password";
        let hash = authenticator
            .hash_password(password)
            .expect("Failed to hash password");

        assert!(authenticator.verify_password(password, &hash).unwrap());
        assert!(!authenticator
            .verify_password("wrong_password", &hash)
            .unwrap());
    }

    #[test]
    fn test_validate_expired_token() {
        let authenticator = Authenticator::new(
            b"test_secret_key_at_least_32_bytes!",
            Duration::minutes(-5),
        );

        let token = authenticator
            .issue_token("user123", "user")
            .expect("Failed to issue token");

        let result = authenticator.validate_token(&token);
        assert!(matches!(result, Err(JwtError::TokenExpired)));
    }

    #[test]
    fn test_validate_token_from_other_key() {
        let issuer = Authenticator::new(
            b"secret1_at_least_32_bytes_long_key!",
            Duration::minutes(15),
        );
        let validator = Authenticator::new(
            b"secret2_at_least_32_bytes_long_key!",
            Duration::minutes(15),
        );

        let token = issuer
            .issue_token("user123", "user")
            .expect("Failed to issue token");

        let result = validator.validate_token(&token);
        assert!(matches!(result, Err(JwtError::InvalidToken(_))));
    }
}
