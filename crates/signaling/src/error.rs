//! Fehlertypen fuer die Signalisierung
//!
//! Provider-Ausfaelle tauchen hier nicht auf: sie werden im
//! `MeetingAdapter` in einen lokalen Ersatz-Raum umgewandelt.

use callroom_core::types::CallId;
use callroom_db::DbError;
use thiserror::Error;

/// Fehlertyp fuer die Signalisierung
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Operation aus einem unpassenden Zustand (z.B. Annehmen eines beendeten Anrufs)
    #[error("Veralteter Uebergang: {entitaet} ist bereits '{aktuell}'")]
    VeralteterUebergang {
        entitaet: &'static str,
        aktuell: String,
    },

    /// Akteur darf in dieser Konversation nicht handeln
    #[error("Zugriff verweigert: {0}")]
    ZugriffVerweigert(String),

    /// Akteur ist kein Teilnehmer des Raums
    #[error("Kein Teilnehmer: {0}")]
    KeinTeilnehmer(String),

    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Persistenz-Fehler; der Aufrufer darf es erneut versuchen
    #[error("Speicherfehler: {0}")]
    Speicher(#[from] DbError),

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    /// Die Konversation hat bereits einen aktiven Anruf
    #[error("Anruf bereits aktiv: {call_id}")]
    AnrufBereitsAktiv { call_id: CallId },

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    pub fn veraltet(entitaet: &'static str, aktuell: impl Into<String>) -> Self {
        Self::VeralteterUebergang {
            entitaet,
            aktuell: aktuell.into(),
        }
    }

    pub fn zugriff_verweigert(msg: impl Into<String>) -> Self {
        Self::ZugriffVerweigert(msg.into())
    }

    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Maschinenlesbarer Fehler-Code fuer API-Antworten
    pub fn code(&self) -> &'static str {
        match self {
            Self::VeralteterUebergang { .. } => "stale_transition",
            Self::ZugriffVerweigert(_) => "access_denied",
            Self::KeinTeilnehmer(_) => "not_a_participant",
            Self::NichtGefunden(_) => "not_found",
            Self::Speicher(_) => "storage_failure",
            Self::UngueltigeEingabe(_) => "invalid_input",
            Self::AnrufBereitsAktiv { .. } => "call_already_active",
            Self::Intern(_) => "internal",
        }
    }

    /// HTTP-Statuscode fuer REST-Fehler
    pub fn http_status(&self) -> u16 {
        match self {
            Self::VeralteterUebergang { .. } | Self::AnrufBereitsAktiv { .. } => 409,
            Self::ZugriffVerweigert(_) | Self::KeinTeilnehmer(_) => 403,
            Self::NichtGefunden(_) => 404,
            Self::Speicher(_) => 503,
            Self::UngueltigeEingabe(_) => 400,
            Self::Intern(_) => 500,
        }
    }

    /// Nur Speicherfehler duerfen automatisch wiederholt werden
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::Speicher(_))
    }
}

/// Result-Typ fuer die Signalisierung
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn veraltet_ist_409_und_nicht_wiederholbar() {
        let e = SignalingError::veraltet("call", "ended");
        assert_eq!(e.http_status(), 409);
        assert_eq!(e.code(), "stale_transition");
        assert!(!e.ist_wiederholbar());
        assert_eq!(e.to_string(), "Veralteter Uebergang: call ist bereits 'ended'");
    }

    #[test]
    fn speicherfehler_ist_wiederholbar() {
        let e = SignalingError::from(DbError::intern("platte voll"));
        assert_eq!(e.http_status(), 503);
        assert!(e.ist_wiederholbar());
    }

    #[test]
    fn statuscodes() {
        assert_eq!(SignalingError::zugriff_verweigert("x").http_status(), 403);
        assert_eq!(SignalingError::KeinTeilnehmer("x".into()).http_status(), 403);
        assert_eq!(SignalingError::nicht_gefunden("x").http_status(), 404);
        assert_eq!(SignalingError::UngueltigeEingabe("x".into()).http_status(), 400);
        assert_eq!(
            SignalingError::AnrufBereitsAktiv { call_id: CallId::new() }.http_status(),
            409
        );
        assert_eq!(SignalingError::intern("x").http_status(), 500);
    }
}
