//! SQLite-Implementierung des ConversationRepository

use async_trait::async_trait;
use callroom_core::types::{ConversationId, UserId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row as _;

use crate::models::KonversationsMitglied;
use crate::repository::{ConversationRepository, DbResult};
use crate::sqlite::id_aus;
use crate::sqlite::pool::SqliteDb;

#[async_trait]
impl ConversationRepository for SqliteDb {
    async fn members(&self, conversation_id: ConversationId) -> DbResult<Vec<KonversationsMitglied>> {
        let rows = sqlx::query(
            "SELECT conversation_id, user_id, display_name FROM conversation_members
             WHERE conversation_id = ?
             ORDER BY display_name ASC",
        )
        .bind(conversation_id.inner().to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_mitglied).collect()
    }

    async fn add_member(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        display_name: &str,
    ) -> DbResult<KonversationsMitglied> {
        let row = sqlx::query(
            "INSERT INTO conversation_members (conversation_id, user_id, display_name)
             VALUES (?, ?, ?)
             ON CONFLICT (conversation_id, user_id)
             DO UPDATE SET display_name = excluded.display_name
             RETURNING conversation_id, user_id, display_name",
        )
        .bind(conversation_id.inner().to_string())
        .bind(user_id.inner().to_string())
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;

        row_to_mitglied(&row)
    }

    async fn remove_member(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "DELETE FROM conversation_members WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id.inner().to_string())
        .bind(user_id.inner().to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_mitglied(row: &SqliteRow) -> DbResult<KonversationsMitglied> {
    Ok(KonversationsMitglied {
        conversation_id: id_aus(row, "conversation_id")?,
        user_id: id_aus(row, "user_id")?,
        display_name: row.try_get("display_name")?,
    })
}
