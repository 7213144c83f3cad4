//! Repository-Trait-Definitionen (Speicher-Port)
//!
//! Das Repository-Pattern entkoppelt die Geschaeftslogik von der konkreten
//! Datenbank-Implementierung. Jeder Zustandsuebergang ist ein bedingtes
//! Update: liefert es `None`, hat ein paralleler Uebergang gewonnen.

use async_trait::async_trait;
use callroom_core::types::{
    AnrufStatus, CallId, ConversationId, RoomId, TeilnehmerStatus, UserId,
};
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{
    AnrufRecord, AnrufUebergang, KonversationsMitglied, NeuerAnruf, NeuerRaum, RaumEnde,
    RaumRecord, TeilnehmerRecord,
};

/// Result-Typ fuer alle Repository-Operationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://callroom.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://callroom.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Lesender Zugriff auf das externe Konversations-Verzeichnis
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Alle Mitglieder einer Konversation
    async fn members(&self, conversation_id: ConversationId) -> DbResult<Vec<KonversationsMitglied>>;

    /// Mitglied anlegen oder Anzeigenamen aktualisieren
    async fn add_member(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        display_name: &str,
    ) -> DbResult<KonversationsMitglied>;

    /// Mitglied entfernen
    async fn remove_member(&self, conversation_id: ConversationId, user_id: UserId)
        -> DbResult<bool>;
}

/// Repository fuer Raeume
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Raum anlegen; der Ersteller wird als `joined` eingetragen
    async fn create_room(&self, data: NeuerRaum<'_>) -> DbResult<RaumRecord>;

    async fn get_room(&self, id: RoomId) -> DbResult<Option<RaumRecord>>;

    /// Raum beenden und alle `joined`-Teilnehmer auf `left` setzen
    ///
    /// Idempotent: ein bereits beendeter Raum ergibt `RaumEnde::BereitsBeendet`.
    async fn end_room(&self, id: RoomId, grund: &str, jetzt: DateTime<Utc>) -> DbResult<RaumEnde>;

    /// Aktive Raeume deren `expires_at` vor `jetzt` liegt
    async fn expired_rooms(&self, jetzt: DateTime<Utc>, limit: i64) -> DbResult<Vec<RaumRecord>>;
}

/// Repository fuer Raum-Teilnehmer
#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// Als `invited` eintragen, falls noch nicht vorhanden und der Raum aktiv ist
    ///
    /// Gibt `true` zurueck wenn eine Zeile angelegt wurde.
    async fn add_invited(&self, room_id: RoomId, user_id: UserId, jetzt: DateTime<Utc>)
        -> DbResult<bool>;

    async fn get_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> DbResult<Option<TeilnehmerRecord>>;

    async fn list_participants(&self, room_id: RoomId) -> DbResult<Vec<TeilnehmerRecord>>;

    /// Bedingter Statuswechsel; `None` wenn der aktuelle Status nicht in `von` liegt
    ///
    /// Ein Wechsel nach `joined` gelingt nur solange der Raum aktiv ist.
    async fn transition_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
        von: &[TeilnehmerStatus],
        nach: TeilnehmerStatus,
        jetzt: DateTime<Utc>,
    ) -> DbResult<Option<TeilnehmerRecord>>;

    async fn count_joined(&self, room_id: RoomId) -> DbResult<i64>;
}

/// Repository fuer Anrufe
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Anruf im Status `initiated` anlegen
    ///
    /// Schlaegt mit `DbError::Eindeutigkeit` fehl, wenn Raum oder Konversation
    /// bereits einen aktiven Anruf haben.
    async fn create_call(&self, data: NeuerAnruf<'_>) -> DbResult<AnrufRecord>;

    async fn get_call(&self, id: CallId) -> DbResult<Option<AnrufRecord>>;

    /// Bedingter Uebergang; `None` wenn der aktuelle Status nicht in `von` liegt
    async fn transition_call(
        &self,
        id: CallId,
        von: &[AnrufStatus],
        uebergang: &AnrufUebergang,
        jetzt: DateTime<Utc>,
    ) -> DbResult<Option<AnrufRecord>>;

    async fn active_calls_for_room(&self, room_id: RoomId) -> DbResult<Vec<AnrufRecord>>;

    async fn active_call_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> DbResult<Option<AnrufRecord>>;

    /// Anrufe in `initiated`/`ringing` die vor `stichtag` angelegt wurden
    async fn unanswered_calls_before(
        &self,
        stichtag: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<AnrufRecord>>;
}
