//! MeetingAdapter: Provider-Aufruf mit Zeitlimit und lokalem Fallback

use callroom_core::types::RoomId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::fallback;
use crate::provider::{MeetingProvider, ProviderRaum};

/// Koordinaten eines angelegten Raums
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaumKoordinaten {
    pub provider_meeting_id: Option<String>,
    pub teilnehmer_url: String,
    pub host_url: Option<String>,
    /// `false` wenn der lokale Fallback verwendet wurde
    pub ok: bool,
}

/// Kapselt den externen Provider
///
/// Provider-Fehler verlassen diesen Typ nie: `raum_erstellen` liefert immer
/// nutzbare Koordinaten, `raum_loeschen` loggt nur.
#[derive(Clone)]
pub struct MeetingAdapter {
    provider: Option<Arc<dyn MeetingProvider>>,
    fallback_basis_url: String,
    zeitlimit: Duration,
}

impl MeetingAdapter {
    pub fn neu(
        provider: Option<Arc<dyn MeetingProvider>>,
        fallback_basis_url: impl Into<String>,
        zeitlimit: Duration,
    ) -> Self {
        Self {
            provider,
            fallback_basis_url: fallback_basis_url.into(),
            zeitlimit,
        }
    }

    /// Adapter ohne Provider, erzeugt ausschliesslich lokale Raeume
    pub fn nur_fallback(fallback_basis_url: impl Into<String>) -> Self {
        Self::neu(None, fallback_basis_url, Duration::from_secs(1))
    }

    pub fn hat_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Legt einen Raum beim Provider an, sonst lokal
    pub async fn raum_erstellen(&self, raum_id: RoomId, ablauf: DateTime<Utc>) -> RaumKoordinaten {
        match self.beim_provider_erstellen(ablauf).await {
            Ok(raum) => {
                info!(room_id = %raum_id, meeting_id = %raum.meeting_id, "Provider-Raum erstellt");
                RaumKoordinaten {
                    provider_meeting_id: Some(raum.meeting_id),
                    teilnehmer_url: raum.teilnehmer_url,
                    host_url: raum.host_url,
                    ok: true,
                }
            }
            Err(e) => {
                match &e {
                    ProviderError::NichtKonfiguriert(_) => {
                        debug!(room_id = %raum_id, "Kein Provider konfiguriert, lokaler Raum")
                    }
                    _ => warn!(
                        room_id = %raum_id,
                        fehler = %e,
                        art = e.art(),
                        "Provider nicht verfuegbar, verwende lokalen Raum"
                    ),
                }
                RaumKoordinaten {
                    provider_meeting_id: None,
                    teilnehmer_url: fallback::teilnehmer_url(&self.fallback_basis_url, raum_id),
                    host_url: None,
                    ok: false,
                }
            }
        }
    }

    /// Loescht einen Provider-Raum, best effort
    ///
    /// Gibt `true` zurueck wenn der Provider die Loeschung bestaetigt hat.
    pub async fn raum_loeschen(&self, meeting_id: &str) -> bool {
        let Some(provider) = &self.provider else {
            debug!(meeting_id, "Kein Provider konfiguriert, nichts zu loeschen");
            return false;
        };

        match tokio::time::timeout(self.zeitlimit, provider.raum_loeschen(meeting_id)).await {
            Ok(Ok(())) => {
                debug!(meeting_id, "Provider-Raum geloescht");
                true
            }
            Ok(Err(e)) => {
                warn!(meeting_id, fehler = %e, "Provider-Raum konnte nicht geloescht werden");
                false
            }
            Err(_) => {
                warn!(
                    meeting_id,
                    zeitlimit_ms = self.zeitlimit.as_millis() as u64,
                    "Zeitlimit beim Loeschen des Provider-Raums"
                );
                false
            }
        }
    }

    async fn beim_provider_erstellen(
        &self,
        ablauf: DateTime<Utc>,
    ) -> Result<ProviderRaum, ProviderError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| ProviderError::NichtKonfiguriert("kein Provider".into()))?;

        tokio::time::timeout(self.zeitlimit, provider.raum_erstellen(ablauf))
            .await
            .map_err(|_| ProviderError::Zeitlimit(self.zeitlimit.as_millis() as u64))?
    }
}

impl std::fmt::Debug for MeetingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeetingAdapter")
            .field("provider", &self.provider.is_some())
            .field("fallback_basis_url", &self.fallback_basis_url)
            .field("zeitlimit", &self.zeitlimit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderResult;
    use crate::http::{HttpMeetingProvider, HttpProviderKonfig};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Haengend;

    #[async_trait]
    impl MeetingProvider for Haengend {
        async fn raum_erstellen(&self, _ablauf: DateTime<Utc>) -> ProviderResult<ProviderRaum> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(ProviderError::UngueltigeAntwort("unerreichbar".into()))
        }

        async fn raum_loeschen(&self, _meeting_id: &str) -> ProviderResult<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Zaehlend {
        loeschungen: AtomicUsize,
    }

    #[async_trait]
    impl MeetingProvider for Zaehlend {
        async fn raum_erstellen(&self, _ablauf: DateTime<Utc>) -> ProviderResult<ProviderRaum> {
            Ok(ProviderRaum {
                meeting_id: "m-1".into(),
                teilnehmer_url: "https://provider.example/m-1".into(),
                host_url: Some("https://provider.example/m-1?host".into()),
            })
        }

        async fn raum_loeschen(&self, _meeting_id: &str) -> ProviderResult<()> {
            self.loeschungen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn ohne_provider_lokaler_raum() {
        let adapter = MeetingAdapter::nur_fallback("https://meet.local");
        let id = RoomId::new();
        let k = adapter.raum_erstellen(id, Utc::now()).await;

        assert!(!k.ok);
        assert!(k.provider_meeting_id.is_none());
        assert!(k.host_url.is_none());
        assert_eq!(k.teilnehmer_url, fallback::teilnehmer_url("https://meet.local", id));
        assert!(!adapter.raum_loeschen("egal").await);
    }

    #[tokio::test(start_paused = true)]
    async fn zeitlimit_fuehrt_zu_fallback() {
        let adapter =
            MeetingAdapter::neu(Some(Arc::new(Haengend)), "https://meet.local", Duration::from_millis(200));
        let k = adapter.raum_erstellen(RoomId::new(), Utc::now()).await;
        assert!(!k.ok);
        assert!(k.teilnehmer_url.starts_with("https://meet.local/"));

        assert!(!adapter.raum_loeschen("m-1").await);
    }

    #[tokio::test]
    async fn erfolgreicher_provider_wird_durchgereicht() {
        let provider = Arc::new(Zaehlend::default());
        let adapter = MeetingAdapter::neu(
            Some(provider.clone() as Arc<dyn MeetingProvider>),
            "https://meet.local",
            Duration::from_secs(1),
        );

        let k = adapter.raum_erstellen(RoomId::new(), Utc::now()).await;
        assert!(k.ok);
        assert_eq!(k.provider_meeting_id.as_deref(), Some("m-1"));
        assert_eq!(k.host_url.as_deref(), Some("https://provider.example/m-1?host"));

        assert!(adapter.raum_loeschen("m-1").await);
        assert_eq!(provider.loeschungen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn http_serverfehler_fuehrt_zu_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/meetings"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = HttpMeetingProvider::neu(HttpProviderKonfig {
            api_url: server.uri(),
            api_key: "geheim".into(),
            zeitlimit: Duration::from_secs(1),
            raum_modus: "normal".into(),
        })
        .unwrap();
        let adapter =
            MeetingAdapter::neu(Some(Arc::new(provider)), "https://meet.local", Duration::from_secs(1));

        let k = adapter.raum_erstellen(RoomId::new(), Utc::now()).await;
        assert!(!k.ok);
        assert!(k.provider_meeting_id.is_none());
    }
}
