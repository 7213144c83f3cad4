//! SQLite-Implementierung des RoomRepository

use async_trait::async_trait;
use callroom_core::types::{RaumStatus, RoomId, TeilnehmerStatus};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row as _;

use crate::error::DbError;
use crate::models::{NeuerRaum, RaumEnde, RaumRecord};
use crate::repository::{DbResult, RoomRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{enum_aus, id_aus, opt_zeit_aus, zeit_aus, zeit_str};

const RAUM_SPALTEN: &str = "id, conversation_id, call_kind, provider_meeting_id, participant_url,
     host_url, status, created_by, created_at, ended_at, end_reason, expires_at";

#[async_trait]
impl RoomRepository for SqliteDb {
    async fn create_room(&self, data: NeuerRaum<'_>) -> DbResult<RaumRecord> {
        let id_str = data.id.inner().to_string();
        let ersteller_str = data.created_by.inner().to_string();
        let erstellt_str = zeit_str(data.created_at);

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "INSERT INTO rooms
             (id, conversation_id, call_kind, provider_meeting_id, participant_url,
              host_url, status, created_by, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?, ?)
             RETURNING {RAUM_SPALTEN}"
        ))
        .bind(&id_str)
        .bind(data.conversation_id.inner().to_string())
        .bind(data.call_kind.als_str())
        .bind(data.provider_meeting_id)
        .bind(data.participant_url)
        .bind(data.host_url)
        .bind(&ersteller_str)
        .bind(&erstellt_str)
        .bind(data.expires_at.map(zeit_str))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(d) if d.is_unique_violation() => {
                DbError::Eindeutigkeit(format!("Raum {} existiert bereits", data.id))
            }
            _ => DbError::Sqlx(e),
        })?;

        sqlx::query(
            "INSERT INTO room_participants (room_id, user_id, status, invited_at, joined_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id_str)
        .bind(&ersteller_str)
        .bind(TeilnehmerStatus::Joined.als_str())
        .bind(&erstellt_str)
        .bind(&erstellt_str)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        row_to_raum(&row)
    }

    async fn get_room(&self, id: RoomId) -> DbResult<Option<RaumRecord>> {
        let row = sqlx::query(&format!("SELECT {RAUM_SPALTEN} FROM rooms WHERE id = ?"))
            .bind(id.inner().to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_raum(&r)).transpose()
    }

    async fn end_room(&self, id: RoomId, grund: &str, jetzt: DateTime<Utc>) -> DbResult<RaumEnde> {
        let id_str = id.inner().to_string();
        let jetzt_str = zeit_str(jetzt);

        let mut tx = self.pool.begin().await?;

        let beendet = sqlx::query(&format!(
            "UPDATE rooms SET status = 'ended', ended_at = ?, end_reason = ?
             WHERE id = ? AND status = 'active'
             RETURNING {RAUM_SPALTEN}"
        ))
        .bind(&jetzt_str)
        .bind(grund)
        .bind(&id_str)
        .fetch_optional(&mut *tx)
        .await?;

        let ergebnis = match beendet {
            Some(row) => {
                sqlx::query(
                    "UPDATE room_participants SET status = 'left', left_at = ?
                     WHERE room_id = ? AND status = 'joined'",
                )
                .bind(&jetzt_str)
                .bind(&id_str)
                .execute(&mut *tx)
                .await?;
                RaumEnde::Beendet(row_to_raum(&row)?)
            }
            None => {
                let row = sqlx::query(&format!("SELECT {RAUM_SPALTEN} FROM rooms WHERE id = ?"))
                    .bind(&id_str)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| DbError::nicht_gefunden(format!("Raum {id}")))?;
                RaumEnde::BereitsBeendet(row_to_raum(&row)?)
            }
        };

        tx.commit().await?;
        Ok(ergebnis)
    }

    async fn expired_rooms(&self, jetzt: DateTime<Utc>, limit: i64) -> DbResult<Vec<RaumRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RAUM_SPALTEN} FROM rooms
             WHERE status = ? AND expires_at IS NOT NULL AND expires_at < ?
             ORDER BY expires_at ASC
             LIMIT ?"
        ))
        .bind(RaumStatus::Active.als_str())
        .bind(zeit_str(jetzt))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_raum).collect()
    }
}

pub(crate) fn row_to_raum(row: &SqliteRow) -> DbResult<RaumRecord> {
    Ok(RaumRecord {
        id: id_aus(row, "id")?,
        conversation_id: id_aus(row, "conversation_id")?,
        call_kind: enum_aus(row, "call_kind")?,
        provider_meeting_id: row.try_get("provider_meeting_id")?,
        participant_url: row.try_get("participant_url")?,
        host_url: row.try_get("host_url")?,
        status: enum_aus(row, "status")?,
        created_by: id_aus(row, "created_by")?,
        created_at: zeit_aus(row, "created_at")?,
        ended_at: opt_zeit_aus(row, "ended_at")?,
        end_reason: row.try_get("end_reason")?,
        expires_at: opt_zeit_aus(row, "expires_at")?,
    })
}
