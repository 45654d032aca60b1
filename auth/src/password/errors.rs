use thiserror::Error;

/// Error type for password operations.
///
/// A mismatching password is not an error; `verify` reports it as
/// `Ok(false)`. `MalformedHash` means the stored secret itself is
/// unreadable and the caller should treat the record as corrupt.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),
}
