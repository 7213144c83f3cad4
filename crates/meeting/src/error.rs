//! Fehlertypen des Meeting-Providers
//!
//! Diese Fehler verlassen das Crate nie ueber den [`crate::MeetingAdapter`];
//! sie werden dort geloggt und in einen Fallback-Raum umgewandelt.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider nicht konfiguriert: {0}")]
    NichtKonfiguriert(String),

    #[error("Zeitlimit nach {0} ms ueberschritten")]
    Zeitlimit(u64),

    #[error("HTTP-Fehler: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider antwortete mit Status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Ungueltige Provider-Antwort: {0}")]
    UngueltigeAntwort(String),
}

impl ProviderError {
    /// Kurzer Bezeichner fuer Logs und Metriken
    pub fn art(&self) -> &'static str {
        match self {
            Self::NichtKonfiguriert(_) => "nicht_konfiguriert",
            Self::Zeitlimit(_) => "zeitlimit",
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::UngueltigeAntwort(_) => "ungueltige_antwort",
        }
    }
}
