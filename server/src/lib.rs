//! callroom-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod api;
pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::{middleware, Router};
use callroom_db::SqliteDb;
use callroom_meeting::{HttpMeetingProvider, MeetingAdapter, MeetingProvider};
use callroom_observability::{
    http_metriken_middleware, observability_server_starten, request_timing_layer, CallroomMetrics,
    HealthState,
};
use callroom_signaling::{CallEngine, ChannelFanout, ExpiryReaper};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use api::ApiState;
use config::ServerConfig;

/// Baut den REST-Router mit Metriken-, Trace- und CORS-Layern
pub fn api_router(state: ApiState, metriken: CallroomMetrics, cors_origins: &[String]) -> Router {
    // CORS konfigurieren: entweder spezifische Origins oder Any
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers(tower_http::cors::Any)
    };

    api::v1_router()
        .layer(middleware::from_fn_with_state(metriken, http_metriken_middleware))
        .layer(request_timing_layer())
        .layer(cors)
        .with_state(state)
}

/// Waehlt den Meeting-Provider: HTTP wenn konfiguriert, sonst nur Fallback
pub fn meeting_adapter(config: &ServerConfig) -> MeetingAdapter {
    let provider: Option<Arc<dyn MeetingProvider>> = match config.provider_konfig() {
        Some(konfig) => match HttpMeetingProvider::neu(konfig) {
            Ok(p) => Some(Arc::new(p)),
            Err(e) => {
                tracing::warn!(fehler = %e, "Meeting-Provider nicht nutzbar, nur lokale Raeume");
                None
            }
        },
        None => {
            if config.provider.aktiviert {
                tracing::warn!("Meeting-Provider aktiviert aber ohne api_key, nur lokale Raeume");
            }
            None
        }
    };

    MeetingAdapter::neu(
        provider,
        config.provider.fallback_url.clone(),
        config.provider_zeitlimit(),
    )
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbankverbindung herstellen (inkl. Migrationen)
    /// 2. Meeting-Adapter, Fanout und CallEngine aufbauen
    /// 3. Reaper starten
    /// 4. Observability- und REST-Server starten
    /// 5. Auf Ctrl-C warten, dann geordnet herunterfahren
    pub async fn starten(self) -> Result<()> {
        let config = self.config;
        tracing::info!(
            server_name = %config.server.name,
            api = %config.api_bind_adresse(),
            "Server startet"
        );

        let db = Arc::new(
            SqliteDb::oeffnen(&config.datenbank_konfig())
                .await
                .context("Datenbank konnte nicht geoeffnet werden")?,
        );

        let metriken = CallroomMetrics::neu().context("Metriken konnten nicht registriert werden")?;
        let health = HealthState::neu();
        let adapter = meeting_adapter(&config);
        tracing::info!(provider = adapter.hat_provider(), "Meeting-Adapter bereit");

        let fanout = ChannelFanout::neu();
        let engine = CallEngine::neu(
            Arc::clone(&db),
            adapter,
            Arc::new(fanout),
            metriken.clone(),
            config.signaling_konfig(),
        );

        let abbruch = CancellationToken::new();
        let reaper = Arc::new(ExpiryReaper::neu(Arc::clone(&engine)).mit_health(health.clone()));
        let reaper_handle = reaper.starten(abbruch.clone());

        let observability_handle = if config.observability.aktiviert {
            let addr: SocketAddr = config
                .observability_bind_adresse()
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let token = abbruch.clone();
            let m = metriken.clone();
            let h = health.clone();
            Some(tokio::spawn(async move {
                if let Err(e) =
                    observability_server_starten(addr, m, h, async move { token.cancelled().await }).await
                {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            }))
        } else {
            None
        };

        let app = api_router(
            ApiState::neu(Arc::clone(&engine), Arc::clone(&db)),
            metriken,
            &config.netzwerk.cors_origins,
        );
        let listener = tokio::net::TcpListener::bind(config.api_bind_adresse())
            .await
            .with_context(|| format!("REST-API kann nicht binden: {}", config.api_bind_adresse()))?;
        tracing::info!(adresse = %config.api_bind_adresse(), "REST-API bereit");

        let token = abbruch.clone();
        let rest_handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        });

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        abbruch.cancel();

        match rest_handle.await {
            Ok(Err(e)) => tracing::error!(fehler = %e, "REST-API mit Fehler beendet"),
            Err(e) => tracing::error!(fehler = %e, "REST-Task abgebrochen"),
            Ok(Ok(())) => {}
        }
        if let Err(e) = reaper_handle.await {
            tracing::error!(fehler = %e, "Reaper-Task abgebrochen");
        }
        if let Some(handle) = observability_handle {
            let _ = handle.await;
        }

        tracing::info!("Server gestoppt");
        Ok(())
    }
}
