//! SQLite-Implementierung des CallRepository
//!
//! Alle Uebergaenge sind ein einzelnes bedingtes `UPDATE ... RETURNING`.
//! Zwei parallele Uebergaenge vom selben Ausgangszustand koennen daher
//! nicht beide gewinnen.

use async_trait::async_trait;
use callroom_core::types::{AnrufStatus, CallId, ConversationId, RoomId};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row as _;

use crate::error::DbError;
use crate::models::{AnrufRecord, AnrufUebergang, NeuerAnruf};
use crate::repository::{CallRepository, DbResult};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{enum_aus, id_aus, opt_id_aus, opt_zeit_aus, platzhalter, zeit_aus, zeit_str};

const ANRUF_SPALTEN: &str = "id, room_id, conversation_id, call_kind, status, initiated_by,
     accepted_by, accepted_at, rejected_by, rejected_at, reject_reason,
     ended_by, ended_at, end_reason, duration_seconds, metadata, created_at";

const AKTIV_BEDINGUNG: &str = "status IN ('initiated', 'ringing', 'accepted')";

#[async_trait]
impl CallRepository for SqliteDb {
    async fn create_call(&self, data: NeuerAnruf<'_>) -> DbResult<AnrufRecord> {
        let metadata = data.metadata.map(serde_json::to_string).transpose()?;

        let row = sqlx::query(&format!(
            "INSERT INTO calls
             (id, room_id, conversation_id, call_kind, status, initiated_by, metadata, created_at)
             VALUES (?, ?, ?, ?, 'initiated', ?, ?, ?)
             RETURNING {ANRUF_SPALTEN}"
        ))
        .bind(data.id.inner().to_string())
        .bind(data.room_id.inner().to_string())
        .bind(data.conversation_id.inner().to_string())
        .bind(data.call_kind.als_str())
        .bind(data.initiated_by.inner().to_string())
        .bind(metadata)
        .bind(zeit_str(data.created_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(d) if d.is_unique_violation() => DbError::Eindeutigkeit(format!(
                "Aktiver Anruf existiert bereits fuer {} / {}",
                data.room_id, data.conversation_id
            )),
            _ => DbError::Sqlx(e),
        })?;

        row_to_anruf(&row)
    }

    async fn get_call(&self, id: CallId) -> DbResult<Option<AnrufRecord>> {
        let row = sqlx::query(&format!("SELECT {ANRUF_SPALTEN} FROM calls WHERE id = ?"))
            .bind(id.inner().to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_anruf(&r)).transpose()
    }

    async fn transition_call(
        &self,
        id: CallId,
        von: &[AnrufStatus],
        uebergang: &AnrufUebergang,
        jetzt: DateTime<Utc>,
    ) -> DbResult<Option<AnrufRecord>> {
        if von.is_empty() {
            return Ok(None);
        }

        let setzen = match uebergang {
            AnrufUebergang::Klingeln => "status = 'ringing'",
            AnrufUebergang::Annehmen { .. } => {
                "status = 'accepted', accepted_by = ?, accepted_at = ?"
            }
            AnrufUebergang::Ablehnen { .. } => {
                "status = 'rejected', rejected_by = ?, rejected_at = ?, reject_reason = ?"
            }
            AnrufUebergang::Beenden { .. } => {
                "status = 'ended', ended_by = ?, ended_at = ?, end_reason = ?, duration_seconds = ?"
            }
            AnrufUebergang::Verpassen { .. } => "status = 'missed', ended_at = ?, end_reason = ?",
        };

        let sql = format!(
            "UPDATE calls SET {setzen}
             WHERE id = ? AND status IN ({})
             RETURNING {ANRUF_SPALTEN}",
            platzhalter(von.len())
        );
        let jetzt_str = zeit_str(jetzt);

        let mut query = sqlx::query(&sql);
        query = match uebergang {
            AnrufUebergang::Klingeln => query,
            AnrufUebergang::Annehmen { von: akteur } => {
                query.bind(akteur.inner().to_string()).bind(jetzt_str)
            }
            AnrufUebergang::Ablehnen { von: akteur, grund } => query
                .bind(akteur.inner().to_string())
                .bind(jetzt_str)
                .bind(grund.map(|g| g.als_str())),
            AnrufUebergang::Beenden {
                von: akteur,
                grund,
                dauer_sekunden,
            } => query
                .bind(akteur.map(|u| u.inner().to_string()))
                .bind(jetzt_str)
                .bind(grund.clone())
                .bind(*dauer_sekunden),
            AnrufUebergang::Verpassen { grund } => query.bind(jetzt_str).bind(grund.clone()),
        };
        query = query.bind(id.inner().to_string());
        for status in von {
            query = query.bind(status.als_str());
        }

        let row = query.fetch_optional(&self.pool).await?;
        row.map(|r| row_to_anruf(&r)).transpose()
    }

    async fn active_calls_for_room(&self, room_id: RoomId) -> DbResult<Vec<AnrufRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ANRUF_SPALTEN} FROM calls
             WHERE room_id = ? AND {AKTIV_BEDINGUNG}
             ORDER BY created_at ASC"
        ))
        .bind(room_id.inner().to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_anruf).collect()
    }

    async fn active_call_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> DbResult<Option<AnrufRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {ANRUF_SPALTEN} FROM calls
             WHERE conversation_id = ? AND {AKTIV_BEDINGUNG}
             LIMIT 1"
        ))
        .bind(conversation_id.inner().to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_anruf(&r)).transpose()
    }

    async fn unanswered_calls_before(
        &self,
        stichtag: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<AnrufRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ANRUF_SPALTEN} FROM calls
             WHERE status IN ('initiated', 'ringing') AND created_at < ?
             ORDER BY created_at ASC
             LIMIT ?"
        ))
        .bind(zeit_str(stichtag))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_anruf).collect()
    }
}

pub(crate) fn row_to_anruf(row: &SqliteRow) -> DbResult<AnrufRecord> {
    let reject_reason: Option<String> = row.try_get("reject_reason")?;
    let metadata: Option<String> = row.try_get("metadata")?;

    Ok(AnrufRecord {
        id: id_aus(row, "id")?,
        room_id: id_aus(row, "room_id")?,
        conversation_id: id_aus(row, "conversation_id")?,
        call_kind: enum_aus(row, "call_kind")?,
        status: enum_aus(row, "status")?,
        initiated_by: id_aus(row, "initiated_by")?,
        accepted_by: opt_id_aus(row, "accepted_by")?,
        accepted_at: opt_zeit_aus(row, "accepted_at")?,
        rejected_by: opt_id_aus(row, "rejected_by")?,
        rejected_at: opt_zeit_aus(row, "rejected_at")?,
        reject_reason: reject_reason
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(DbError::UngueltigeDaten)?,
        ended_by: opt_id_aus(row, "ended_by")?,
        ended_at: opt_zeit_aus(row, "ended_at")?,
        end_reason: row.try_get("end_reason")?,
        duration_seconds: row.try_get("duration_seconds")?,
        metadata: metadata.as_deref().map(serde_json::from_str).transpose()?,
        created_at: zeit_aus(row, "created_at")?,
    })
}
