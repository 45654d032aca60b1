use std::sync::Arc;

use auth::Authenticator;
use auth::PasswordError;
use async_trait::async_trait;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::user::models::AuthenticatedSession;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::ResetToken;
use crate::domain::user::models::Role;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserProfile;
use crate::user::errors::ResetTokenError;
use crate::user::errors::UserError;
use crate::user::ports::Notifier;
use crate::user::ports::ResetTokenRepository;
use crate::user::ports::UserRepository;
use crate::user::ports::UserServicePort;

/// Domain service implementation for identity operations.
///
/// Concrete implementation of UserServicePort with dependency injection.
/// Argon2 hashing and verification run on the blocking thread pool so the
/// deliberately slow KDF never stalls the async executor.
pub struct UserService<UR, RT, N>
where
    UR: UserRepository,
    RT: ResetTokenRepository,
    N: Notifier,
{
    users: Arc<UR>,
    reset_tokens: Arc<RT>,
    notifier: Arc<N>,
    authenticator: Arc<Authenticator>,
    reset_ttl: Duration,
}

impl<UR, RT, N> UserService<UR, RT, N>
where
    UR: UserRepository,
    RT: ResetTokenRepository,
    N: Notifier,
{
    /// Create a new identity service with injected dependencies.
    ///
    /// # Arguments
    /// * `users` - User persistence implementation
    /// * `reset_tokens` - Reset-token persistence implementation
    /// * `notifier` - Password-reset notification hand-off
    /// * `authenticator` - Process-wide hashing and token configuration
    /// * `reset_ttl` - Validity window of issued reset tokens
    ///
    /// # Returns
    /// Configured identity service instance
    pub fn new(
        users: Arc<UR>,
        reset_tokens: Arc<RT>,
        notifier: Arc<N>,
        authenticator: Arc<Authenticator>,
        reset_ttl: Duration,
    ) -> Self {
        Self {
            users,
            reset_tokens,
            notifier,
            authenticator,
            reset_ttl,
        }
    }

    async fn hash_password(&self, password: String) -> Result<String, UserError> {
        let authenticator = Arc::clone(&self.authenticator);
        tokio::task::spawn_blocking(move || authenticator.hash_password(&password))
            .await
            .map_err(|e| UserError::Unknown(format!("Hashing task failed: {}", e)))?
            .map_err(|e| UserError::Unknown(format!("Password hashing failed: {}", e)))
    }

    async fn verify_password(&self, user: &User, password: String) -> Result<bool, UserError> {
        let authenticator = Arc::clone(&self.authenticator);
        let stored_hash = user.password_hash.clone();
        let user_id = user.id;

        tokio::task::spawn_blocking(move || authenticator.verify_password(&password, &stored_hash))
            .await
            .map_err(|e| UserError::Unknown(format!("Verification task failed: {}", e)))?
            .map_err(|e| match e {
                PasswordError::MalformedHash(detail) => {
                    tracing::error!(
                        user_id = %user_id,
                        error = %detail,
                        "stored password hash is unreadable"
                    );
                    UserError::CorruptCredential(user_id.to_string())
                }
                other => UserError::Unknown(other.to_string()),
            })
    }

    /// The single write path for new passwords: hash, then store.
    async fn store_new_password(
        &self,
        id: &UserId,
        new_password: String,
    ) -> Result<(), UserError> {
        let password_hash = self.hash_password(new_password).await?;
        self.users.update_password(id, &password_hash).await
    }

    /// Explain why `consume` rejected a token, preserving the
    /// not-found / already-used / expired distinction.
    async fn classify_rejected_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ResetTokenError, UserError> {
        let Some(record) = self.reset_tokens.find_by_token(token).await? else {
            return Ok(ResetTokenError::NotFound);
        };

        if record.used {
            Ok(ResetTokenError::AlreadyUsed)
        } else if record.is_expired(now) {
            Ok(ResetTokenError::Expired)
        } else {
            // Lost a redemption race between consume and this lookup
            Ok(ResetTokenError::AlreadyUsed)
        }
    }
}

#[async_trait]
impl<UR, RT, N> UserServicePort for UserService<UR, RT, N>
where
    UR: UserRepository,
    RT: ResetTokenRepository,
    N: Notifier,
{
    async fn register(&self, command: RegisterUserCommand) -> Result<UserProfile, UserError> {
        let RegisterUserCommand {
            email,
            password,
            first_name,
            last_name,
            birth_date,
        } = command;

        let password_hash = self.hash_password(password).await?;

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            email,
            password_hash,
            first_name,
            last_name,
            birth_date,
            role: Role::User,
            is_email_verified: false,
            created_at: now,
            updated_at: now,
        };

        let created = self.users.insert(user).await?;
        tracing::info!(user_id = %created.id, "user registered");

        Ok(UserProfile::from(&created))
    }

    async fn login(
        &self,
        email: &EmailAddress,
        password: &str,
    ) -> Result<AuthenticatedSession, UserError> {
        // Unknown email and wrong password collapse into the same failure
        let Some(user) = self.users.find_by_email(email.as_str()).await? else {
            return Err(UserError::InvalidCredentials);
        };

        if !self.verify_password(&user, password.to_owned()).await? {
            tracing::warn!(user_id = %user.id, "login rejected: password mismatch");
            return Err(UserError::InvalidCredentials);
        }

        let access_token = self.authenticator.issue_token(user.id, user.role)?;
        tracing::info!(user_id = %user.id, "user logged in");

        Ok(AuthenticatedSession {
            profile: UserProfile::from(&user),
            access_token,
        })
    }

    async fn get_user(&self, id: &UserId) -> Result<UserProfile, UserError> {
        self.users
            .find_by_id(id)
            .await?
            .map(|user| UserProfile::from(&user))
            .ok_or(UserError::NotFound(id.to_string()))
    }

    async fn update_profile(
        &self,
        id: &UserId,
        command: UpdateProfileCommand,
    ) -> Result<UserProfile, UserError> {
        let mut user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))?;

        user.first_name = command.first_name;
        user.last_name = command.last_name;
        user.birth_date = command.birth_date;
        user.updated_at = Utc::now();

        let updated = self.users.update(user).await?;

        Ok(UserProfile::from(&updated))
    }

    async fn update_password(
        &self,
        id: &UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), UserError> {
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))?;

        if !self.verify_password(&user, old_password.to_owned()).await? {
            tracing::warn!(user_id = %user.id, "password change rejected: old password mismatch");
            return Err(UserError::InvalidCredentials);
        }

        self.store_new_password(id, new_password.to_owned()).await?;
        tracing::info!(user_id = %id, "password updated");

        Ok(())
    }

    async fn forgot_password(&self, email: &EmailAddress) -> Result<(), UserError> {
        // Silent success for unknown emails: the response never reveals
        // whether an address is registered
        let Some(user) = self.users.find_by_email(email.as_str()).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(());
        };

        // At most one active reset token per user
        self.reset_tokens.invalidate_for_user(&user.id).await?;

        let token = ResetToken::generate(user.id, self.reset_ttl);
        let token = self.reset_tokens.insert(token).await?;

        if let Err(e) = self
            .notifier
            .send_password_reset(&user.email, &token.token)
            .await
        {
            tracing::error!(
                user_id = %user.id,
                error = %e,
                "failed to hand off password reset notification"
            );
        }

        tracing::info!(user_id = %user.id, "password reset token issued");

        Ok(())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), UserError> {
        let now = Utc::now();

        let user_id = match self.reset_tokens.consume(token, now).await? {
            Some(id) => id,
            None => return Err(self.classify_rejected_token(token, now).await?.into()),
        };

        self.store_new_password(&user_id, new_password.to_owned())
            .await?;
        tracing::info!(user_id = %user_id, "password reset completed");

        Ok(())
    }

    async fn verify_email(&self, id: &UserId) -> Result<(), UserError> {
        self.users.mark_email_verified(id).await?;
        tracing::info!(user_id = %id, "email verified");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::NaiveDate;
    use mockall::mock;
    use mockall::predicate::*;

    use super::*;
    use crate::user::errors::NotifierError;

    const TEST_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

    // Define mocks in the test module using mockall
    mock! {
        pub TestUserRepository {}

        #[async_trait]
        impl UserRepository for TestUserRepository {
            async fn insert(&self, user: User) -> Result<User, UserError>;
            async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;
            async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError>;
            async fn update(&self, user: User) -> Result<User, UserError>;
            async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), UserError>;
            async fn mark_email_verified(&self, id: &UserId) -> Result<(), UserError>;
        }
    }

    mock! {
        pub TestResetTokenRepository {}

        #[async_trait]
        impl ResetTokenRepository for TestResetTokenRepository {
            async fn insert(&self, token: ResetToken) -> Result<ResetToken, UserError>;
            async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, UserError>;
            async fn consume(&self, token: &str, now: DateTime<Utc>) -> Result<Option<UserId>, UserError>;
            async fn invalidate_for_user(&self, user_id: &UserId) -> Result<(), UserError>;
        }
    }

    mock! {
        pub TestNotifier {}

        #[async_trait]
        impl Notifier for TestNotifier {
            async fn send_password_reset(&self, email: &EmailAddress, token: &str) -> Result<(), NotifierError>;
        }
    }

    fn make_service<RT: ResetTokenRepository>(
        users: MockTestUserRepository,
        reset_tokens: Arc<RT>,
        notifier: MockTestNotifier,
    ) -> UserService<MockTestUserRepository, RT, MockTestNotifier> {
        UserService::new(
            Arc::new(users),
            reset_tokens,
            Arc::new(notifier),
            Arc::new(Authenticator::new(TEST_SECRET, Duration::minutes(15))),
            Duration::minutes(30),
        )
    }

    fn test_user(password: &str) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            email: EmailAddress::new("test@example.com".to_string()).unwrap(),
            password_hash: auth::PasswordHasher::new().hash(password).unwrap(),
            first_name: "Jo".to_string(),
            last_name: "Doe".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            role: Role::User,
            is_email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn register_command() -> RegisterUserCommand {
        RegisterUserCommand::new(
            EmailAddress::new("a@x.com".to_string()).unwrap(),
            "pw12345A".to_string(),
            "Jo".to_string(),
            "Do".to_string(),
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_register_success() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        users
            .expect_insert()
            .withf(|user| {
                user.email.as_str() == "a@x.com"
                    && user.password_hash.starts_with("$argon2")
                    && user.role == Role::User
                    && !user.is_email_verified
            })
            .times(1)
            .returning(|value| Ok(value));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let profile = service.register(register_command()).await.unwrap();
        assert_eq!(profile.email.as_str(), "a@x.com");
        assert_eq!(profile.role, Role::User);
        assert!(!profile.is_email_verified);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        users
            .expect_insert()
            .times(1)
            .returning(|user| Err(UserError::EmailAlreadyExists(user.email.to_string())));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let result = service.register(register_command()).await;
        assert!(matches!(
            result.unwrap_err(),
            UserError::EmailAlreadyExists(_)
        ));
    }

    #[tokio::test]
    async fn test_login_success_issues_token_bound_to_user() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let user = test_user("pw12345A");
        let user_id = user.id;
        let returned_user = user.clone();
        users
            .expect_find_by_email()
            .withf(|email| email == "test@example.com")
            .times(1)
            .returning(move |_| Ok(Some(returned_user.clone())));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let session = service
            .login(&user.email, "pw12345A")
            .await
            .expect("login should succeed");

        // Claims decode back to the authenticated identity
        let validator = Authenticator::new(TEST_SECRET, Duration::minutes(15));
        let claims = validator.validate_token(&session.access_token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "user");
        assert_eq!(session.profile.id, user_id);
    }

    #[tokio::test]
    async fn test_login_unknown_email_and_wrong_password_are_indistinguishable() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let user = test_user("pw12345A");
        let known_email = user.email.clone();
        users
            .expect_find_by_email()
            .withf(move |email| email == "test@example.com")
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_find_by_email()
            .withf(move |email| email == "ghost@example.com")
            .returning(|_| Ok(None));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let wrong_password = service.login(&known_email, "wrong").await.unwrap_err();
        let unknown_email = service
            .login(
                &EmailAddress::new("ghost@example.com".to_string()).unwrap(),
                "pw12345A",
            )
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, UserError::InvalidCredentials));
        assert!(matches!(unknown_email, UserError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_corrupt_stored_hash() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let mut user = test_user("pw12345A");
        user.password_hash = "not-a-phc-string".to_string();
        let email = user.email.clone();
        users
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let result = service.login(&email, "pw12345A").await;
        assert!(matches!(
            result.unwrap_err(),
            UserError::CorruptCredential(_)
        ));
    }

    #[tokio::test]
    async fn test_get_user_strips_credentials() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let user = test_user("pw12345A");
        let user_id = user.id;
        let returned_user = user.clone();
        users
            .expect_find_by_id()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(move |_| Ok(Some(returned_user.clone())));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let profile = service.get_user(&user_id).await.unwrap();
        assert_eq!(profile.id, user_id);
        assert_eq!(profile.email, user.email);
        // UserProfile carries no password hash by construction
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        users.expect_find_by_id().times(1).returning(|_| Ok(None));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let result = service.get_user(&UserId::new()).await;
        assert!(matches!(result.unwrap_err(), UserError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_profile_success() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let user = test_user("pw12345A");
        let user_id = user.id;
        let previous_updated_at = user.updated_at;
        let returned_user = user.clone();
        users
            .expect_find_by_id()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(move |_| Ok(Some(returned_user.clone())));
        users
            .expect_update()
            .withf(move |user| {
                user.first_name == "Jane"
                    && user.last_name == "Smith"
                    && user.updated_at >= previous_updated_at
            })
            .times(1)
            .returning(|value| Ok(value));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let command = UpdateProfileCommand {
            first_name: "Jane".to_string(),
            last_name: "Smith".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1985, 6, 15).unwrap(),
        };

        let profile = service.update_profile(&user_id, command).await.unwrap();
        assert_eq!(profile.first_name, "Jane");
        assert_eq!(profile.birth_date, NaiveDate::from_ymd_opt(1985, 6, 15).unwrap());
    }

    #[tokio::test]
    async fn test_update_profile_not_found() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        users.expect_find_by_id().times(1).returning(|_| Ok(None));
        users.expect_update().times(0);

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let command = UpdateProfileCommand {
            first_name: "Jane".to_string(),
            last_name: "Smith".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1985, 6, 15).unwrap(),
        };

        let result = service.update_profile(&UserId::new(), command).await;
        assert!(matches!(result.unwrap_err(), UserError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_password_success() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let user = test_user("oldPw123A");
        let user_id = user.id;
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update_password()
            .withf(move |id, hash| {
                *id == user_id
                    && auth::PasswordHasher::new()
                        .verify("newPw123A", hash)
                        .unwrap()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        service
            .update_password(&user_id, "oldPw123A", "newPw123A")
            .await
            .expect("password update should succeed");
    }

    #[tokio::test]
    async fn test_update_password_wrong_old_password_leaves_hash_untouched() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let user = test_user("oldPw123A");
        let user_id = user.id;
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        // Stored hash must not be rewritten on a failed verification
        users.expect_update_password().times(0);

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let result = service
            .update_password(&user_id, "wrongOld", "newPw123A")
            .await;
        assert!(matches!(
            result.unwrap_err(),
            UserError::InvalidCredentials
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_is_silent_success() {
        let mut users = MockTestUserRepository::new();
        let mut reset_tokens = MockTestResetTokenRepository::new();
        let mut notifier = MockTestNotifier::new();

        users
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        reset_tokens.expect_insert().times(0);
        reset_tokens.expect_invalidate_for_user().times(0);
        notifier.expect_send_password_reset().times(0);

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        service
            .forgot_password(&EmailAddress::new("ghost@example.com".to_string()).unwrap())
            .await
            .expect("unknown email must still succeed");
    }

    #[tokio::test]
    async fn test_forgot_password_issues_token_and_notifies() {
        let mut users = MockTestUserRepository::new();
        let mut reset_tokens = MockTestResetTokenRepository::new();
        let mut notifier = MockTestNotifier::new();

        let user = test_user("pw12345A");
        let user_id = user.id;
        let email = user.email.clone();
        users
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        reset_tokens
            .expect_invalidate_for_user()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(|_| Ok(()));
        reset_tokens
            .expect_insert()
            .withf(move |token| {
                token.user_id == user_id
                    && token.token.len() == 32
                    && !token.used
                    && token.expires_at > Utc::now()
            })
            .times(1)
            .returning(|value| Ok(value));
        notifier
            .expect_send_password_reset()
            .withf(|email, token| email.as_str() == "test@example.com" && token.len() == 32)
            .times(1)
            .returning(|_, _| Ok(()));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        service
            .forgot_password(&email)
            .await
            .expect("forgot password should succeed");
    }

    #[tokio::test]
    async fn test_forgot_password_survives_notifier_failure() {
        let mut users = MockTestUserRepository::new();
        let mut reset_tokens = MockTestResetTokenRepository::new();
        let mut notifier = MockTestNotifier::new();

        let user = test_user("pw12345A");
        let email = user.email.clone();
        users
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        reset_tokens
            .expect_invalidate_for_user()
            .times(1)
            .returning(|_| Ok(()));
        reset_tokens.expect_insert().times(1).returning(|token| Ok(token));
        notifier
            .expect_send_password_reset()
            .times(1)
            .returning(|_, _| Err(NotifierError::PublishFailed("broker down".to_string())));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        service
            .forgot_password(&email)
            .await
            .expect("notification failure must not fail the operation");
    }

    #[tokio::test]
    async fn test_reset_password_success() {
        let mut users = MockTestUserRepository::new();
        let mut reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let user_id = UserId::new();
        reset_tokens
            .expect_consume()
            .withf(|token, _| token == "valid-token")
            .times(1)
            .returning(move |_, _| Ok(Some(user_id)));
        users
            .expect_update_password()
            .withf(move |id, hash| {
                *id == user_id
                    && auth::PasswordHasher::new()
                        .verify("newPw123A", hash)
                        .unwrap()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        service
            .reset_password("valid-token", "newPw123A")
            .await
            .expect("reset should succeed");
    }

    #[tokio::test]
    async fn test_reset_password_not_found() {
        let users = MockTestUserRepository::new();
        let mut reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        reset_tokens
            .expect_consume()
            .times(1)
            .returning(|_, _| Ok(None));
        reset_tokens
            .expect_find_by_token()
            .times(1)
            .returning(|_| Ok(None));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let result = service.reset_password("missing-token", "newPw123A").await;
        assert!(matches!(
            result.unwrap_err(),
            UserError::ResetToken(ResetTokenError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_reset_password_already_used() {
        let users = MockTestUserRepository::new();
        let mut reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let mut record = ResetToken::generate(UserId::new(), Duration::minutes(30));
        record.used = true;
        reset_tokens
            .expect_consume()
            .times(1)
            .returning(|_, _| Ok(None));
        reset_tokens
            .expect_find_by_token()
            .times(1)
            .returning(move |_| Ok(Some(record.clone())));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let result = service.reset_password("spent-token", "newPw123A").await;
        assert!(matches!(
            result.unwrap_err(),
            UserError::ResetToken(ResetTokenError::AlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn test_reset_password_expired() {
        let users = MockTestUserRepository::new();
        let mut reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let record = ResetToken::generate(UserId::new(), Duration::minutes(-5));
        reset_tokens
            .expect_consume()
            .times(1)
            .returning(|_, _| Ok(None));
        reset_tokens
            .expect_find_by_token()
            .times(1)
            .returning(move |_| Ok(Some(record.clone())));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let result = service.reset_password("stale-token", "newPw123A").await;
        assert!(matches!(
            result.unwrap_err(),
            UserError::ResetToken(ResetTokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_verify_email_success() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        let user_id = UserId::new();
        users
            .expect_mark_email_verified()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(|_| Ok(()));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        service.verify_email(&user_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_email_not_found() {
        let mut users = MockTestUserRepository::new();
        let reset_tokens = MockTestResetTokenRepository::new();
        let notifier = MockTestNotifier::new();

        users
            .expect_mark_email_verified()
            .times(1)
            .returning(|id| Err(UserError::NotFound(id.to_string())));

        let service = make_service(users, Arc::new(reset_tokens), notifier);

        let result = service.verify_email(&UserId::new()).await;
        assert!(matches!(result.unwrap_err(), UserError::NotFound(_)));
    }

    /// In-memory reset-token store with the same conditional-redeem
    /// semantics the Postgres adapter provides, for concurrency tests.
    struct InMemoryResetTokens {
        tokens: Mutex<HashMap<String, ResetToken>>,
    }

    impl InMemoryResetTokens {
        fn new() -> Self {
            Self {
                tokens: Mutex::new(HashMap::new()),
            }
        }

        fn snapshot(&self) -> Vec<ResetToken> {
            self.tokens.lock().unwrap().values().cloned().collect()
        }
    }

    #[async_trait]
    impl ResetTokenRepository for InMemoryResetTokens {
        async fn insert(&self, token: ResetToken) -> Result<ResetToken, UserError> {
            self.tokens
                .lock()
                .unwrap()
                .insert(token.token.clone(), token.clone());
            Ok(token)
        }

        async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, UserError> {
            Ok(self.tokens.lock().unwrap().get(token).cloned())
        }

        async fn consume(
            &self,
            token: &str,
            now: DateTime<Utc>,
        ) -> Result<Option<UserId>, UserError> {
            let mut tokens = self.tokens.lock().unwrap();
            match tokens.get_mut(token) {
                Some(record) if !record.used && !record.is_expired(now) => {
                    record.used = true;
                    Ok(Some(record.user_id))
                }
                _ => Ok(None),
            }
        }

        async fn invalidate_for_user(&self, user_id: &UserId) -> Result<(), UserError> {
            for record in self.tokens.lock().unwrap().values_mut() {
                if record.user_id == *user_id && !record.used {
                    record.used = true;
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_reset_redeems_exactly_once() {
        let mut users = MockTestUserRepository::new();
        let notifier = MockTestNotifier::new();

        let user_id = UserId::new();
        // Exactly one winner writes a new hash
        users
            .expect_update_password()
            .times(1)
            .returning(|_, _| Ok(()));

        let store = Arc::new(InMemoryResetTokens::new());
        let token = ResetToken::generate(user_id, Duration::minutes(30));
        let token_value = token.token.clone();
        store.insert(token).await.unwrap();

        let service = make_service(users, Arc::clone(&store), notifier);

        let (first, second) = tokio::join!(
            service.reset_password(&token_value, "newPw123A"),
            service.reset_password(&token_value, "again123A"),
        );

        let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let failure = if first.is_ok() { second } else { first };
        assert!(matches!(
            failure.unwrap_err(),
            UserError::ResetToken(ResetTokenError::AlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_retires_previous_token() {
        let mut users = MockTestUserRepository::new();
        let mut notifier = MockTestNotifier::new();

        let user = test_user("pw12345A");
        let email = user.email.clone();
        users
            .expect_find_by_email()
            .times(2)
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update_password()
            .times(1)
            .returning(|_, _| Ok(()));
        notifier
            .expect_send_password_reset()
            .times(2)
            .returning(|_, _| Ok(()));

        let store = Arc::new(InMemoryResetTokens::new());
        let service = make_service(users, Arc::clone(&store), notifier);

        service.forgot_password(&email).await.unwrap();
        let first_token = store.snapshot().pop().unwrap().token;

        service.forgot_password(&email).await.unwrap();
        let second_token = store
            .snapshot()
            .into_iter()
            .find(|t| !t.used)
            .expect("fresh token should be active")
            .token;
        assert_ne!(first_token, second_token);

        // The retired token no longer redeems; the fresh one does
        let stale = service.reset_password(&first_token, "newPw123A").await;
        assert!(matches!(
            stale.unwrap_err(),
            UserError::ResetToken(ResetTokenError::AlreadyUsed)
        ));
        service
            .reset_password(&second_token, "newPw123A")
            .await
            .expect("fresh token should redeem");
    }
}
