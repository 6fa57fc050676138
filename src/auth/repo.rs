use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Account record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub verify_code: String,
    #[serde(skip_serializing)]
    pub verify_code_expires_at: OffsetDateTime,
    pub is_verified: bool,
    pub is_accepting_messages: bool,
    pub created_at: OffsetDateTime,
}

const USER_COLUMNS: &str = "id, username, email, password_hash, verify_code, \
     verify_code_expires_at, is_verified, is_accepting_messages, created_at";

impl User {
    /// Find an account by exact username.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find an account by id.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(user)
    }

    /// Find an account by username or email, for sign-in.
    pub async fn find_by_identifier(db: &PgPool, identifier: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1"
        ))
        .bind(identifier)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a verified account holding the given username or email.
    /// Only verified accounts block an identity at registration.
    pub async fn find_verified_holder(
        db: &PgPool,
        username: &str,
        email: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE is_verified = TRUE AND (username = $1 OR email = $2)"
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a verified account by username, for the availability check.
    pub async fn find_verified_by_username(
        db: &PgPool,
        username: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND is_verified = TRUE"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Remove stale unverified registrations holding the username or email,
    /// so a new sign-up can claim the identity.
    pub async fn evict_unverified(
        db: &PgPool,
        username: &str,
        email: &str,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM users \
             WHERE is_verified = FALSE AND (username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Create a new unverified account with a pending verification code.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        verify_code: &str,
        verify_code_expires_at: OffsetDateTime,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, verify_code, verify_code_expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(verify_code)
        .bind(verify_code_expires_at)
        .fetch_one(db)
        .await
    }

    /// Flip the account to verified. One-way; nothing ever resets it.
    pub async fn mark_verified(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET is_verified = TRUE WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Set the message-acceptance flag; returns the updated account, or
    /// None when the id no longer resolves.
    pub async fn set_accepting(
        db: &PgPool,
        id: Uuid,
        accepting: bool,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_accepting_messages = $2 WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(accepting)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}
