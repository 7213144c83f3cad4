//! Gemeinsame Identifikations- und Zustandstypen fuer Callroom
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_typ {
    ($(#[$meta:meta])* $name:ident, $praefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Erstellt eine neue zufaellige ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Gibt die innere UUID zurueck
            pub fn inner(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($praefix, ":{}"), self.0)
            }
        }
    };
}

id_typ!(
    /// Eindeutige Benutzer-ID
    UserId,
    "user"
);
id_typ!(
    /// Eindeutige Konversations-ID (gehoert dem externen Chat-System)
    ConversationId,
    "conversation"
);
id_typ!(
    /// Eindeutige Raum-ID
    RoomId,
    "room"
);
id_typ!(
    /// Eindeutige Anruf-ID
    CallId,
    "call"
);

// ---------------------------------------------------------------------------
// Anruf-Art
// ---------------------------------------------------------------------------

/// Art eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnrufArt {
    Video,
    Voice,
}

impl AnrufArt {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Voice => "voice",
        }
    }
}

impl std::str::FromStr for AnrufArt {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "voice" => Ok(Self::Voice),
            other => Err(format!("Unbekannte Anruf-Art: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Anruf-Status
// ---------------------------------------------------------------------------

/// Zustand eines Anrufs
///
/// `initiated -> ringing -> accepted -> ended`, dazu die Endzustaende
/// `rejected` und `missed`. Endzustaende sind unveraenderlich.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnrufStatus {
    Initiated,
    Ringing,
    Accepted,
    Rejected,
    Ended,
    Missed,
}

impl AnrufStatus {
    /// Alle Zustaende in denen ein Anruf als aktiv gilt
    pub const AKTIV: [AnrufStatus; 3] = [Self::Initiated, Self::Ringing, Self::Accepted];

    /// Zustaende in denen noch niemand abgenommen hat
    pub const KLINGELND: [AnrufStatus; 2] = [Self::Initiated, Self::Ringing];

    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Ringing => "ringing",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Ended => "ended",
            Self::Missed => "missed",
        }
    }

    /// Gibt true zurueck solange der Anruf nicht in einem Endzustand ist
    pub fn ist_aktiv(&self) -> bool {
        Self::AKTIV.contains(self)
    }

    /// Gibt true zurueck fuer `rejected`, `ended` und `missed`
    pub fn ist_terminal(&self) -> bool {
        !self.ist_aktiv()
    }
}

impl std::fmt::Display for AnrufStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

impl std::str::FromStr for AnrufStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "ringing" => Ok(Self::Ringing),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "ended" => Ok(Self::Ended),
            "missed" => Ok(Self::Missed),
            other => Err(format!("Unbekannter Anruf-Status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Raum-Status
// ---------------------------------------------------------------------------

/// Lebenszyklus eines Raums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaumStatus {
    Active,
    Ended,
}

impl RaumStatus {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }
}

impl std::fmt::Display for RaumStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

impl std::str::FromStr for RaumStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "ended" => Ok(Self::Ended),
            other => Err(format!("Unbekannter Raum-Status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Teilnehmer-Status
// ---------------------------------------------------------------------------

/// Mitgliedschaft eines Benutzers in einem Raum
///
/// Nur vorwaerts: `invited -> joined -> left` (oder direkt `invited -> left`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeilnehmerStatus {
    Invited,
    Joined,
    Left,
}

impl TeilnehmerStatus {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Invited => "invited",
            Self::Joined => "joined",
            Self::Left => "left",
        }
    }

    /// Position im Lebenszyklus, fuer den Rueckwaerts-Check
    pub fn rang(&self) -> u8 {
        match self {
            Self::Invited => 0,
            Self::Joined => 1,
            Self::Left => 2,
        }
    }
}

impl std::fmt::Display for TeilnehmerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

impl std::str::FromStr for TeilnehmerStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invited" => Ok(Self::Invited),
            "joined" => Ok(Self::Joined),
            "left" => Ok(Self::Left),
            other => Err(format!("Unbekannter Teilnehmer-Status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Ablehnungsgrund
// ---------------------------------------------------------------------------

/// Grund fuer das Ablehnen eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AblehnGrund {
    Declined,
    Busy,
    Unavailable,
}

impl AblehnGrund {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Declined => "declined",
            Self::Busy => "busy",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::str::FromStr for AblehnGrund {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "declined" => Ok(Self::Declined),
            "busy" => Ok(Self::Busy),
            "unavailable" => Ok(Self::Unavailable),
            other => Err(format!("Unbekannter Ablehnungsgrund: {other}")),
        }
    }
}

/// Bekannte Werte fuer `end_reason` an Anrufen und Raeumen
pub mod ende_grund {
    /// Explizit aufgelegt
    pub const AUFGELEGT: &str = "hangup";
    /// Vom Reaper wegen Zeitueberschreitung beendet
    pub const ABGELAUFEN: &str = "expired";
    /// Raum wurde explizit beendet
    pub const RAUM_BEENDET: &str = "room_ended";
    /// Anruf wurde abgelehnt
    pub const ABGELEHNT: &str = "rejected";
    /// Anruf konnte nicht angelegt werden
    pub const FEHLGESCHLAGEN: &str = "failed";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_eindeutig() {
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(CallId::new(), CallId::new());
    }

    #[test]
    fn id_display_mit_praefix() {
        let id = RoomId(Uuid::nil());
        assert_eq!(id.to_string(), format!("room:{}", Uuid::nil()));
        assert!(CallId::new().to_string().starts_with("call:"));
    }

    #[test]
    fn ids_serialisieren_als_nackte_uuid() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&ConversationId(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn aktive_und_terminale_zustaende() {
        assert!(AnrufStatus::Initiated.ist_aktiv());
        assert!(AnrufStatus::Ringing.ist_aktiv());
        assert!(AnrufStatus::Accepted.ist_aktiv());
        assert!(AnrufStatus::Rejected.ist_terminal());
        assert!(AnrufStatus::Ended.ist_terminal());
        assert!(AnrufStatus::Missed.ist_terminal());
    }

    #[test]
    fn status_string_hin_und_zurueck() {
        for status in [
            AnrufStatus::Initiated,
            AnrufStatus::Ringing,
            AnrufStatus::Accepted,
            AnrufStatus::Rejected,
            AnrufStatus::Ended,
            AnrufStatus::Missed,
        ] {
            assert_eq!(status.als_str().parse::<AnrufStatus>().unwrap(), status);
        }
        assert!("klingelt".parse::<AnrufStatus>().is_err());
    }

    #[test]
    fn teilnehmer_rang_nur_vorwaerts() {
        assert!(TeilnehmerStatus::Invited.rang() < TeilnehmerStatus::Joined.rang());
        assert!(TeilnehmerStatus::Joined.rang() < TeilnehmerStatus::Left.rang());
    }

    #[test]
    fn anruf_art_serde_kleingeschrieben() {
        assert_eq!(serde_json::to_string(&AnrufArt::Video).unwrap(), "\"video\"");
        let art: AnrufArt = serde_json::from_str("\"voice\"").unwrap();
        assert_eq!(art, AnrufArt::Voice);
    }
}
