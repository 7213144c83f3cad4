//! Datenbankmodelle fuer Callroom
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind von den oeffentlichen Ereignis-Typen getrennt und dienen als
//! reine Datenuebertragungsobjekte. Geschaeftsregeln leben im Signaling-Crate.

use callroom_core::types::{
    AblehnGrund, AnrufArt, AnrufStatus, CallId, ConversationId, RaumStatus, RoomId,
    TeilnehmerStatus, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Konversationen
// ---------------------------------------------------------------------------

/// Mitglied einer Konversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KonversationsMitglied {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Raeume
// ---------------------------------------------------------------------------

/// Raum-Datensatz aus der Datenbank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaumRecord {
    pub id: RoomId,
    pub conversation_id: ConversationId,
    pub call_kind: AnrufArt,
    pub provider_meeting_id: Option<String>,
    pub participant_url: String,
    pub host_url: Option<String>,
    pub status: RaumStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RaumRecord {
    /// `expires_at` gesetzt und vor `jetzt`
    pub fn ist_abgelaufen(&self, jetzt: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|ablauf| ablauf < jetzt)
    }

    pub fn ist_aktiv(&self) -> bool {
        self.status == RaumStatus::Active
    }
}

/// Daten zum Anlegen eines Raums
///
/// Der Ersteller wird in derselben Transaktion als `joined` eingetragen.
#[derive(Debug, Clone)]
pub struct NeuerRaum<'a> {
    pub id: RoomId,
    pub conversation_id: ConversationId,
    pub call_kind: AnrufArt,
    pub provider_meeting_id: Option<&'a str>,
    pub participant_url: &'a str,
    pub host_url: Option<&'a str>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Ergebnis von `end_room`
#[derive(Debug, Clone, PartialEq)]
pub enum RaumEnde {
    /// Dieser Aufruf hat den Raum beendet
    Beendet(RaumRecord),
    /// Der Raum war bereits beendet, nichts geaendert
    BereitsBeendet(RaumRecord),
}

impl RaumEnde {
    pub fn raum(&self) -> &RaumRecord {
        match self {
            Self::Beendet(r) | Self::BereitsBeendet(r) => r,
        }
    }

    pub fn into_raum(self) -> RaumRecord {
        match self {
            Self::Beendet(r) | Self::BereitsBeendet(r) => r,
        }
    }

    pub fn hat_beendet(&self) -> bool {
        matches!(self, Self::Beendet(_))
    }
}

// ---------------------------------------------------------------------------
// Teilnehmer
// ---------------------------------------------------------------------------

/// Teilnehmer-Datensatz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeilnehmerRecord {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub status: TeilnehmerStatus,
    pub invited_at: DateTime<Utc>,
    pub joined_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Anrufe
// ---------------------------------------------------------------------------

/// Anruf-Datensatz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnrufRecord {
    pub id: CallId,
    pub room_id: RoomId,
    pub conversation_id: ConversationId,
    pub call_kind: AnrufArt,
    pub status: AnrufStatus,
    pub initiated_by: UserId,
    pub accepted_by: Option<UserId>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<UserId>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub reject_reason: Option<AblehnGrund>,
    pub ended_by: Option<UserId>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
    pub duration_seconds: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Anlegen eines Anrufs (Status `initiated`)
#[derive(Debug, Clone)]
pub struct NeuerAnruf<'a> {
    pub id: CallId,
    pub room_id: RoomId,
    pub conversation_id: ConversationId,
    pub call_kind: AnrufArt,
    pub initiated_by: UserId,
    pub metadata: Option<&'a serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Ein bedingter Zustandsuebergang eines Anrufs
///
/// Wird nur angewendet, wenn der aktuelle Status in der vom Aufrufer
/// uebergebenen Menge liegt.
#[derive(Debug, Clone, PartialEq)]
pub enum AnrufUebergang {
    Klingeln,
    Annehmen {
        von: UserId,
    },
    Ablehnen {
        von: UserId,
        grund: Option<AblehnGrund>,
    },
    Beenden {
        von: Option<UserId>,
        grund: String,
        dauer_sekunden: Option<i64>,
    },
    Verpassen {
        grund: String,
    },
}

impl AnrufUebergang {
    /// Zielzustand des Uebergangs
    pub fn ziel(&self) -> AnrufStatus {
        match self {
            Self::Klingeln => AnrufStatus::Ringing,
            Self::Annehmen { .. } => AnrufStatus::Accepted,
            Self::Ablehnen { .. } => AnrufStatus::Rejected,
            Self::Beenden { .. } => AnrufStatus::Ended,
            Self::Verpassen { .. } => AnrufStatus::Missed,
        }
    }
}
