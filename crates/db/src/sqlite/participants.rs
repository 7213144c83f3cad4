//! SQLite-Implementierung des ParticipantRepository

use async_trait::async_trait;
use callroom_core::types::{RoomId, TeilnehmerStatus, UserId};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;

use crate::models::TeilnehmerRecord;
use crate::repository::{DbResult, ParticipantRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{enum_aus, id_aus, opt_zeit_aus, platzhalter, zeit_aus, zeit_str};

const TEILNEHMER_SPALTEN: &str = "room_id, user_id, status, invited_at, joined_at, left_at";

#[async_trait]
impl ParticipantRepository for SqliteDb {
    async fn add_invited(
        &self,
        room_id: RoomId,
        user_id: UserId,
        jetzt: DateTime<Utc>,
    ) -> DbResult<bool> {
        let room_str = room_id.inner().to_string();

        let result = sqlx::query(
            "INSERT INTO room_participants (room_id, user_id, status, invited_at)
             SELECT ?, ?, 'invited', ?
             WHERE EXISTS (SELECT 1 FROM rooms WHERE id = ? AND status = 'active')
             ON CONFLICT (room_id, user_id) DO NOTHING",
        )
        .bind(&room_str)
        .bind(user_id.inner().to_string())
        .bind(zeit_str(jetzt))
        .bind(&room_str)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> DbResult<Option<TeilnehmerRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TEILNEHMER_SPALTEN} FROM room_participants
             WHERE room_id = ? AND user_id = ?"
        ))
        .bind(room_id.inner().to_string())
        .bind(user_id.inner().to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_teilnehmer(&r)).transpose()
    }

    async fn list_participants(&self, room_id: RoomId) -> DbResult<Vec<TeilnehmerRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {TEILNEHMER_SPALTEN} FROM room_participants
             WHERE room_id = ?
             ORDER BY invited_at ASC, user_id ASC"
        ))
        .bind(room_id.inner().to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_teilnehmer).collect()
    }

    async fn transition_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
        von: &[TeilnehmerStatus],
        nach: TeilnehmerStatus,
        jetzt: DateTime<Utc>,
    ) -> DbResult<Option<TeilnehmerRecord>> {
        if von.is_empty() {
            return Ok(None);
        }

        let setzen = match nach {
            TeilnehmerStatus::Invited => "status = 'invited'",
            TeilnehmerStatus::Joined => "status = 'joined', joined_at = ?",
            TeilnehmerStatus::Left => "status = 'left', left_at = ?",
        };
        // Beitreten nur solange der Raum aktiv ist
        let raum_bedingung = if nach == TeilnehmerStatus::Joined {
            " AND EXISTS (SELECT 1 FROM rooms WHERE rooms.id = room_participants.room_id
                          AND rooms.status = 'active')"
        } else {
            ""
        };

        let sql = format!(
            "UPDATE room_participants SET {setzen}
             WHERE room_id = ? AND user_id = ? AND status IN ({}){raum_bedingung}
             RETURNING {TEILNEHMER_SPALTEN}",
            platzhalter(von.len())
        );

        let mut query = sqlx::query(&sql);
        if nach != TeilnehmerStatus::Invited {
            query = query.bind(zeit_str(jetzt));
        }
        query = query
            .bind(room_id.inner().to_string())
            .bind(user_id.inner().to_string());
        for status in von {
            query = query.bind(status.als_str());
        }

        let row = query.fetch_optional(&self.pool).await?;
        row.map(|r| row_to_teilnehmer(&r)).transpose()
    }

    async fn count_joined(&self, room_id: RoomId) -> DbResult<i64> {
        let anzahl: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM room_participants WHERE room_id = ? AND status = 'joined'",
        )
        .bind(room_id.inner().to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(anzahl)
    }
}

pub(crate) fn row_to_teilnehmer(row: &SqliteRow) -> DbResult<TeilnehmerRecord> {
    Ok(TeilnehmerRecord {
        room_id: id_aus(row, "room_id")?,
        user_id: id_aus(row, "user_id")?,
        status: enum_aus(row, "status")?,
        invited_at: zeit_aus(row, "invited_at")?,
        joined_at: opt_zeit_aus(row, "joined_at")?,
        left_at: opt_zeit_aus(row, "left_at")?,
    })
}
