use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::user::models::AuthenticatedSession;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::ResetToken;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserProfile;
use crate::user::errors::NotifierError;
use crate::user::errors::UserError;

/// Port for identity and credential-lifecycle operations.
#[async_trait]
pub trait UserServicePort: Send + Sync + 'static {
    /// Register a new user with validated fields.
    ///
    /// The password is hashed before storage; new users start with the
    /// `user` role and an unverified email.
    ///
    /// # Arguments
    /// * `command` - Validated command with email, password, and profile fields
    ///
    /// # Returns
    /// Profile of the created user
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `Database` - Store operation failed
    async fn register(&self, command: RegisterUserCommand) -> Result<UserProfile, UserError>;

    /// Authenticate by email and password, issuing an access token.
    ///
    /// Unknown email and wrong password are indistinguishable to the
    /// caller; both fail with `InvalidCredentials`.
    ///
    /// # Arguments
    /// * `email` - Login email
    /// * `password` - Plaintext password
    ///
    /// # Returns
    /// Profile plus a signed access token bound to the user id and role
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email or password mismatch
    /// * `CorruptCredential` - Stored hash is unreadable
    /// * `Database` - Store operation failed
    async fn login(
        &self,
        email: &EmailAddress,
        password: &str,
    ) -> Result<AuthenticatedSession, UserError>;

    /// Retrieve a user profile by unique identifier.
    ///
    /// # Arguments
    /// * `id` - User ID
    ///
    /// # Returns
    /// User profile (credential fields stripped)
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `Database` - Store operation failed
    async fn get_user(&self, id: &UserId) -> Result<UserProfile, UserError>;

    /// Update the mutable profile attributes of an existing user.
    ///
    /// # Arguments
    /// * `id` - User ID to update
    /// * `command` - New first name, last name, and birth date
    ///
    /// # Returns
    /// Updated user profile
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `Database` - Store operation failed
    async fn update_profile(
        &self,
        id: &UserId,
        command: UpdateProfileCommand,
    ) -> Result<UserProfile, UserError>;

    /// Replace a user's password after verifying the current one.
    ///
    /// The stored hash is untouched unless the old password verifies.
    ///
    /// # Arguments
    /// * `id` - User ID
    /// * `old_password` - Current plaintext password
    /// * `new_password` - Replacement plaintext password
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `InvalidCredentials` - Old password does not match
    /// * `CorruptCredential` - Stored hash is unreadable
    /// * `Database` - Store operation failed
    async fn update_password(
        &self,
        id: &UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), UserError>;

    /// Start the forgot-password flow for an email address.
    ///
    /// Succeeds whether or not the email is registered, so callers cannot
    /// probe for accounts. For registered users any still-active token is
    /// retired, a fresh one is persisted, and the notifier is handed the
    /// token; notification failure does not fail the operation.
    ///
    /// # Arguments
    /// * `email` - Address the reset was requested for
    ///
    /// # Errors
    /// * `Database` - Store operation failed
    async fn forgot_password(&self, email: &EmailAddress) -> Result<(), UserError>;

    /// Redeem a reset token and set a new password.
    ///
    /// Redemption is atomic: concurrent attempts on the same token yield
    /// exactly one success.
    ///
    /// # Arguments
    /// * `token` - Reset token string
    /// * `new_password` - Replacement plaintext password
    ///
    /// # Errors
    /// * `ResetToken(NotFound)` - No such token
    /// * `ResetToken(Expired)` - Token deadline passed
    /// * `ResetToken(AlreadyUsed)` - Token was redeemed before
    /// * `Database` - Store operation failed
    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), UserError>;

    /// Mark a user's email address as verified.
    ///
    /// # Arguments
    /// * `id` - User ID
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `Database` - Store operation failed
    async fn verify_email(&self, id: &UserId) -> Result<(), UserError>;
}

/// Persistence operations for the user aggregate.
///
/// Email uniqueness is enforced by the store (unique index) and surfaced
/// as `EmailAlreadyExists`, not re-checked by the service under race.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist a new user to storage.
    ///
    /// # Arguments
    /// * `user` - User entity to create
    ///
    /// # Returns
    /// Created user entity
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `Database` - Store operation failed
    async fn insert(&self, user: User) -> Result<User, UserError>;

    /// Retrieve a user by identifier.
    ///
    /// # Arguments
    /// * `id` - User ID
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `Database` - Store operation failed
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    /// Retrieve a user by email address.
    ///
    /// # Arguments
    /// * `email` - Email address string
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `Database` - Store operation failed
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError>;

    /// Update an existing user's profile fields and `updated_at`.
    ///
    /// # Arguments
    /// * `user` - User entity with updated fields
    ///
    /// # Returns
    /// Updated user entity
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `Database` - Store operation failed
    async fn update(&self, user: User) -> Result<User, UserError>;

    /// Replace the stored password hash for a user.
    ///
    /// The single password-write point at the persistence boundary; also
    /// bumps `updated_at`.
    ///
    /// # Arguments
    /// * `id` - User ID
    /// * `password_hash` - New derived secret
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `Database` - Store operation failed
    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), UserError>;

    /// Set the email-verified flag for a user.
    ///
    /// # Arguments
    /// * `id` - User ID
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `Database` - Store operation failed
    async fn mark_email_verified(&self, id: &UserId) -> Result<(), UserError>;
}

/// Persistence operations for password-reset tokens.
#[async_trait]
pub trait ResetTokenRepository: Send + Sync + 'static {
    /// Persist a freshly generated token.
    ///
    /// # Arguments
    /// * `token` - Active reset token
    ///
    /// # Returns
    /// The persisted token
    ///
    /// # Errors
    /// * `Database` - Store operation failed
    async fn insert(&self, token: ResetToken) -> Result<ResetToken, UserError>;

    /// Retrieve a token record by its token string.
    ///
    /// # Arguments
    /// * `token` - Token string
    ///
    /// # Returns
    /// Optional token record (None if not found)
    ///
    /// # Errors
    /// * `Database` - Store operation failed
    async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, UserError>;

    /// Atomically redeem a token: mark it used only if it is currently
    /// unused and unexpired.
    ///
    /// The conditional write is a single unit; of any number of
    /// concurrent calls with the same token, at most one observes
    /// `Some(user_id)`.
    ///
    /// # Arguments
    /// * `token` - Token string
    /// * `now` - Redemption instant, compared against `expires_at`
    ///
    /// # Returns
    /// Owning user id if the token was active and is now consumed
    ///
    /// # Errors
    /// * `Database` - Store operation failed
    async fn consume(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, UserError>;

    /// Retire any still-active tokens belonging to a user.
    ///
    /// Keeps at most one active reset token per user at any time.
    ///
    /// # Arguments
    /// * `user_id` - Owner whose active tokens are retired
    ///
    /// # Errors
    /// * `Database` - Store operation failed
    async fn invalidate_for_user(&self, user_id: &UserId) -> Result<(), UserError>;
}

/// Outbound hand-off of password-reset notifications.
///
/// Fire-and-forget from the domain's perspective: the service logs a
/// delivery failure and still reports success to the caller.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Hand off a password-reset notification for delivery.
    ///
    /// # Arguments
    /// * `email` - Recipient address
    /// * `token` - Plaintext reset token to embed in the message
    ///
    /// # Errors
    /// * `SerializationFailed` - Message could not be serialized
    /// * `PublishFailed` - Hand-off to the delivery channel failed
    async fn send_password_reset(
        &self,
        email: &EmailAddress,
        token: &str,
    ) -> Result<(), NotifierError>;
}
