use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::user::models::ResetToken;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::ResetTokenRepository;
use crate::user::errors::UserError;

pub struct PostgresResetTokenRepository {
    pool: PgPool,
}

impl PostgresResetTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ResetTokenRow {
    token: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    used: bool,
}

impl From<ResetTokenRow> for ResetToken {
    fn from(row: ResetTokenRow) -> Self {
        Self {
            token: row.token,
            user_id: UserId(row.user_id),
            expires_at: row.expires_at,
            used: row.used,
        }
    }
}

#[async_trait]
impl ResetTokenRepository for PostgresResetTokenRepository {
    async fn insert(&self, token: ResetToken) -> Result<ResetToken, UserError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (token, user_id, expires_at, used)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.token)
        .bind(token.user_id.0)
        .bind(token.expires_at)
        .bind(token.used)
        .execute(&self.pool)
        .await
        .map_err(|e| UserError::Database(e.to_string()))?;

        Ok(token)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ResetToken>, UserError> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            r#"
            SELECT token, user_id, expires_at, used
            FROM password_reset_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::Database(e.to_string()))?;

        Ok(row.map(ResetToken::from))
    }

    async fn consume(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, UserError> {
        // Single conditional write: the token is redeemed only if it is
        // still unused and unexpired, so concurrent redeemers cannot both win
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE password_reset_tokens
            SET used = TRUE
            WHERE token = $1 AND used = FALSE AND expires_at > $2
            RETURNING user_id
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::Database(e.to_string()))?;

        Ok(user_id.map(UserId))
    }

    async fn invalidate_for_user(&self, user_id: &UserId) -> Result<(), UserError> {
        sqlx::query(
            r#"
            UPDATE password_reset_tokens
            SET used = TRUE
            WHERE user_id = $1 AND used = FALSE
            "#,
        )
        .bind(user_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| UserError::Database(e.to_string()))?;

        Ok(())
    }
}
