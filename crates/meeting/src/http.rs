//! HTTP-Provider fuer eine Whereby-kompatible REST-API
//!
//! `POST {api_url}/meetings` legt einen Raum an, `DELETE
//! {api_url}/meetings/{id}` entfernt ihn. Authentifiziert wird per
//! Bearer-Token.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{MeetingProvider, ProviderRaum};

/// Verbindungsaufbau-Zeitlimit unabhaengig vom Gesamtzeitlimit
const VERBINDUNGS_ZEITLIMIT: Duration = Duration::from_secs(2);

/// Maximale Laenge eines Fehler-Bodys im Log
const MAX_BODY_LOG: usize = 256;

/// Konfiguration des HTTP-Providers
#[derive(Debug, Clone)]
pub struct HttpProviderKonfig {
    /// Basis-URL der API (z.B. "https://api.whereby.dev/v1")
    pub api_url: String,
    pub api_key: String,
    /// Gesamtzeitlimit pro Anfrage
    pub zeitlimit: Duration,
    /// "normal" oder "group"
    pub raum_modus: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeetingAnfrage<'a> {
    end_date: String,
    fields: [&'a str; 1],
    room_mode: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingAntwort {
    meeting_id: String,
    room_url: String,
    host_room_url: Option<String>,
}

/// HTTP-Client fuer den Meeting-Provider
#[derive(Clone)]
pub struct HttpMeetingProvider {
    client: Client,
    api_url: String,
    api_key: String,
    raum_modus: String,
}

impl HttpMeetingProvider {
    /// Erstellt den Provider; schlaegt fehl wenn kein API-Key gesetzt ist
    pub fn neu(konfig: HttpProviderKonfig) -> ProviderResult<Self> {
        if konfig.api_key.trim().is_empty() {
            return Err(ProviderError::NichtKonfiguriert("api_key fehlt".into()));
        }
        if konfig.api_url.trim().is_empty() {
            return Err(ProviderError::NichtKonfiguriert("api_url fehlt".into()));
        }

        let client = Client::builder()
            .timeout(konfig.zeitlimit)
            .connect_timeout(VERBINDUNGS_ZEITLIMIT.min(konfig.zeitlimit))
            .build()?;

        Ok(Self {
            client,
            api_url: konfig.api_url.trim_end_matches('/').to_string(),
            api_key: konfig.api_key,
            raum_modus: konfig.raum_modus,
        })
    }

    async fn fehler_aus_antwort(antwort: reqwest::Response) -> ProviderError {
        let status = antwort.status().as_u16();
        let mut body = antwort.text().await.unwrap_or_default();
        if body.len() > MAX_BODY_LOG {
            let mut ende = MAX_BODY_LOG;
            while !body.is_char_boundary(ende) {
                ende -= 1;
            }
            body.truncate(ende);
        }
        ProviderError::Status { status, body }
    }
}

#[async_trait]
impl MeetingProvider for HttpMeetingProvider {
    #[instrument(skip(self), fields(api = %self.api_url))]
    async fn raum_erstellen(&self, ablauf: DateTime<Utc>) -> ProviderResult<ProviderRaum> {
        let anfrage = MeetingAnfrage {
            end_date: ablauf.to_rfc3339_opts(SecondsFormat::Secs, true),
            fields: ["hostRoomUrl"],
            room_mode: &self.raum_modus,
        };

        let antwort = self
            .client
            .post(format!("{}/meetings", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&anfrage)
            .send()
            .await?;

        if !antwort.status().is_success() {
            return Err(Self::fehler_aus_antwort(antwort).await);
        }

        let daten: MeetingAntwort = antwort
            .json()
            .await
            .map_err(|e| ProviderError::UngueltigeAntwort(e.to_string()))?;

        if daten.room_url.is_empty() {
            return Err(ProviderError::UngueltigeAntwort("roomUrl ist leer".into()));
        }

        debug!(meeting_id = %daten.meeting_id, "Provider-Raum angelegt");

        Ok(ProviderRaum {
            meeting_id: daten.meeting_id,
            teilnehmer_url: daten.room_url,
            host_url: daten.host_room_url,
        })
    }

    #[instrument(skip(self), fields(api = %self.api_url))]
    async fn raum_loeschen(&self, meeting_id: &str) -> ProviderResult<()> {
        let antwort = self
            .client
            .delete(format!("{}/meetings/{}", self.api_url, meeting_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        match antwort.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                warn!(meeting_id, "Provider-Raum existierte nicht mehr");
                Ok(())
            }
            _ => Err(Self::fehler_aus_antwort(antwort).await),
        }
    }
}
