use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Anonymous message owned by exactly one account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
}

impl Message {
    /// Append a message to the recipient's inbox.
    pub async fn append(db: &PgPool, user_id: Uuid, content: &str) -> anyhow::Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (user_id, content)
            VALUES ($1, $2)
            RETURNING id, user_id, content, created_at
            "#,
        )
        .bind(user_id)
        .bind(content)
        .fetch_one(db)
        .await?;
        Ok(message)
    }

    /// All messages for an owner, newest first.
    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, user_id, content, created_at
            FROM messages
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Delete one message scoped to its owner. The owner check lives in the
    /// WHERE clause so a guessed id belonging to someone else removes nothing.
    pub async fn delete_owned(db: &PgPool, user_id: Uuid, message_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM messages
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }
}
