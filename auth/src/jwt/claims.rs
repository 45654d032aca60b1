use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Claims carried by a signed access token.
///
/// The validity window is fixed at issuance; a token is never mutated
/// after creation. `role` travels with the subject so authorization
/// decisions do not need a store round-trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user identifier)
    pub sub: String,

    /// Role granted to the subject
    pub role: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AccessClaims {
    /// Create claims for a user with the validity window starting now.
    ///
    /// # Arguments
    /// * `user_id` - Unique user identifier
    /// * `role` - Role bound to the token
    /// * `ttl` - Duration until the token expires
    ///
    /// # Returns
    /// AccessClaims with sub, role, iat, and exp set
    pub fn new(user_id: impl ToString, role: impl ToString, ttl: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + ttl;

        Self {
            sub: user_id.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        }
    }

    /// Check whether the claims are expired at the given timestamp.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}
