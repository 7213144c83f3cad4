//! Provider-Trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ProviderResult;

/// Vom Provider angelegter Raum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRaum {
    pub meeting_id: String,
    pub teilnehmer_url: String,
    pub host_url: Option<String>,
}

/// Externer Anbieter zeitlich begrenzter Meeting-Raeume
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    /// Legt einen Raum an, der spaetestens zu `ablauf` verfaellt
    async fn raum_erstellen(&self, ablauf: DateTime<Utc>) -> ProviderResult<ProviderRaum>;

    /// Loescht einen Raum; ein bereits geloeschter Raum gilt als Erfolg
    async fn raum_loeschen(&self, meeting_id: &str) -> ProviderResult<()>;
}
