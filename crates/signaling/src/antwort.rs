//! Anfrage- und Antwort-Typen der Engine-Operationen
//!
//! Auf dem Draht in camelCase, passend zu den Ereignis-Payloads.

use callroom_core::event::{AnrufAnsicht, RaumAnsicht, TeilnehmerAnsicht};
use callroom_core::types::{AblehnGrund, AnrufArt, CallId, ConversationId, RoomId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnfrage {
    pub conversation_id: ConversationId,
    pub call_kind: AnrufArt,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AblehnAnfrage {
    #[serde(default)]
    pub reason: Option<AblehnGrund>,
}

/// Beenden eines Anrufs oder Raums
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndAnfrage {
    /// Vom Client gemessene Dauer in Sekunden
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnrufGestartet {
    pub call_id: CallId,
    pub room_id: RoomId,
    #[serde(rename = "participantURL")]
    pub participant_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnrufAngenommen {
    pub call_id: CallId,
    pub room_id: RoomId,
    #[serde(rename = "roomURL")]
    pub room_url: String,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnrufAbgelehnt {
    pub call_id: CallId,
    pub rejected_at: DateTime<Utc>,
    pub reason: Option<AblehnGrund>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnrufBeendet {
    pub call_id: CallId,
    pub ended_at: DateTime<Utc>,
    pub duration: Option<i64>,
}

/// Anruf mit Raum und Teilnehmern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnrufUebersicht {
    pub call: AnrufAnsicht,
    pub room: RaumAnsicht,
    /// Nur fuer den Ersteller des Raums gesetzt
    #[serde(rename = "hostURL", skip_serializing_if = "Option::is_none", default)]
    pub host_url: Option<String>,
    pub participants: Vec<TeilnehmerAnsicht>,
}

/// Ergebnis von Beitreten/Verlassen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaumAktion {
    pub timestamp: DateTime<Utc>,
    pub participant_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaumBeendet {
    pub room_id: RoomId,
    pub ended_at: DateTime<Utc>,
    /// Dauer des dabei beendeten Anrufs, falls einer aktiv war
    pub duration: Option<i64>,
}
