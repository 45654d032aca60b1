use thiserror::Error;

/// Error for UserId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

/// Error for Role parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("Unknown role: {0}")]
    Unknown(String),
}

/// Rejection reasons for reset-token redemption.
///
/// `AlreadyUsed` and `Expired` are terminal states of an existing token
/// and are deliberately distinct from `NotFound`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResetTokenError {
    #[error("Reset token not found")]
    NotFound,

    #[error("Reset token is expired")]
    Expired,

    #[error("Reset token was already used")]
    AlreadyUsed,
}

/// Error for notification hand-off operations
#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("Failed to serialize notification: {0}")]
    SerializationFailed(String),

    #[error("Failed to publish notification: {0}")]
    PublishFailed(String),
}

/// Top-level error for all identity operations
#[derive(Debug, Clone, Error)]
pub enum UserError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid user ID: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid role: {0}")]
    InvalidRole(#[from] RoleError),

    // Domain-level errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Email already exists: {0}")]
    EmailAlreadyExists(String),

    #[error("{0}")]
    ResetToken(#[from] ResetTokenError),

    /// Stored hash is unreadable. Data-integrity fault: detail is logged
    /// at the point of detection, never shown to callers.
    #[error("Stored credential is corrupt for user {0}")]
    CorruptCredential(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<auth::JwtError> for UserError {
    fn from(err: auth::JwtError) -> Self {
        UserError::Unknown(err.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        UserError::Unknown(err.to_string())
    }
}
