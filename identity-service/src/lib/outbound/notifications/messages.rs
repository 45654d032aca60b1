use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Serializable envelope for notification messages.
///
/// Infrastructure representation of the notification hand-off; a
/// downstream mailer consumes these and owns delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "notification_type", rename_all = "snake_case")]
pub enum NotificationMessage {
    PasswordResetRequested(PasswordResetRequestedMessage),
}

/// Message asking the mailer to deliver a password-reset email.
///
/// Carries the plaintext token; the topic must be treated as sensitive
/// as the token grants a password reset until it expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetRequestedMessage {
    pub email: String,
    pub token: String,
    pub requested_at: DateTime<Utc>,
}

impl From<PasswordResetRequestedMessage> for NotificationMessage {
    fn from(message: PasswordResetRequestedMessage) -> Self {
        NotificationMessage::PasswordResetRequested(message)
    }
}
