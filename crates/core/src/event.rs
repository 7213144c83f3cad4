//! Signal-Ereignisse und Fanout-Trait
//!
//! Jedes Ereignis traegt den vollstaendigen aktuellen Zustand von Anruf,
//! Raum und Teilnehmern. Ein Client der fruehere Ereignisse verpasst hat,
//! kann sich allein aus dem letzten Ereignis resynchronisieren; doppelte
//! Zustellung ist damit unschaedlich.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::types::{
    AblehnGrund, AnrufArt, AnrufStatus, CallId, ConversationId, RaumStatus, RoomId,
    TeilnehmerStatus, UserId,
};

/// Art eines Signal-Ereignisses (Name auf dem Draht)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EreignisArt {
    #[serde(rename = "call.initiated")]
    AnrufGestartet,
    #[serde(rename = "call.ringing")]
    AnrufKlingelt,
    #[serde(rename = "call.accepted")]
    AnrufAngenommen,
    #[serde(rename = "call.rejected")]
    AnrufAbgelehnt,
    #[serde(rename = "call.ended")]
    AnrufBeendet,
    #[serde(rename = "call.missed")]
    AnrufVerpasst,
    #[serde(rename = "room.participant_joined")]
    TeilnehmerBeigetreten,
    #[serde(rename = "room.participant_left")]
    TeilnehmerGegangen,
    #[serde(rename = "room.ended")]
    RaumBeendet,
}

impl EreignisArt {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::AnrufGestartet => "call.initiated",
            Self::AnrufKlingelt => "call.ringing",
            Self::AnrufAngenommen => "call.accepted",
            Self::AnrufAbgelehnt => "call.rejected",
            Self::AnrufBeendet => "call.ended",
            Self::AnrufVerpasst => "call.missed",
            Self::TeilnehmerBeigetreten => "room.participant_joined",
            Self::TeilnehmerGegangen => "room.participant_left",
            Self::RaumBeendet => "room.ended",
        }
    }
}

impl std::fmt::Display for EreignisArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Oeffentliche Sicht auf einen Anruf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnrufAnsicht {
    pub id: CallId,
    pub room_id: RoomId,
    pub conversation_id: ConversationId,
    pub call_kind: AnrufArt,
    pub status: AnrufStatus,
    pub initiated_by: UserId,
    pub accepted_by: Option<UserId>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub reject_reason: Option<AblehnGrund>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
    pub duration_seconds: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Oeffentliche Sicht auf einen Raum (ohne privilegierte Host-URL)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaumAnsicht {
    pub id: RoomId,
    pub conversation_id: ConversationId,
    pub call_kind: AnrufArt,
    pub status: RaumStatus,
    pub participant_url: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Ein Teilnehmer mit Anzeigenamen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeilnehmerAnsicht {
    pub user_id: UserId,
    pub display_name: String,
    pub status: TeilnehmerStatus,
    pub joined_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
}

/// Vollstaendiges, selbsttragendes Signal-Ereignis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEreignis {
    pub event: EreignisArt,
    pub occurred_at: DateTime<Utc>,
    /// `None` wenn das System (Reaper) den Uebergang ausgeloest hat
    pub actor_id: Option<UserId>,
    /// Fehlt nur bei reinen Raum-Ereignissen ohne zugehoerigen Anruf
    pub call: Option<AnrufAnsicht>,
    pub room: RaumAnsicht,
    pub participants: Vec<TeilnehmerAnsicht>,
}

/// Ein an genau einen Beobachter adressiertes Ereignis
#[derive(Debug, Clone)]
pub struct ZugestelltesEreignis {
    pub empfaenger: UserId,
    pub ereignis: Arc<SignalEreignis>,
}

/// Trait fuer die Zustellung von Signal-Ereignissen
///
/// Wird synchron innerhalb des Uebergangs aufgerufen, der den Zustand
/// geaendert hat. Pro Beobachter muss die Reihenfolge der Aufrufe erhalten
/// bleiben. Gibt die Anzahl erfolgreich eingereihter Zustellungen zurueck.
pub trait NotificationFanout: Send + Sync + 'static {
    fn ankuendigen(&self, ereignis: SignalEreignis, beobachter: &[UserId]) -> usize;
}
