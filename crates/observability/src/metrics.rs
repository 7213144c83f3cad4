//! Prometheus-kompatible Metriken fuer Callroom
//!
//! Registrierte Metriken:
//! - `callroom_calls_initiated_total` – Counter: Gestartete Anrufe
//! - `callroom_call_transitions_total` – Counter: Anruf-Uebergaenge (status)
//! - `callroom_provider_fallbacks_total` – Counter: Lokale Ersatz-Raeume
//! - `callroom_reaper_transitions_total` – Counter: Reaper-Korrekturen (kind)
//! - `callroom_events_delivered_total` – Counter: Eingereihte Ereignisse
//! - `callroom_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `callroom_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Callroom-Prometheus-Metriken
///
/// Jede Instanz hat ihre eigene Registry, Tests koennen daher beliebig
/// viele Instanzen erzeugen.
#[derive(Clone)]
pub struct CallroomMetrics {
    pub registry: Arc<Registry>,

    // Signalisierung
    pub anrufe_gestartet: IntCounter,
    pub anruf_uebergaenge: IntCounterVec,
    pub provider_fallbacks: IntCounter,
    pub reaper_uebergaenge: IntCounterVec,
    pub ereignisse_zugestellt: IntCounter,

    // HTTP
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl CallroomMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let anrufe_gestartet = IntCounter::with_opts(Opts::new(
            "callroom_calls_initiated_total",
            "Anzahl gestarteter Anrufe",
        ))?;
        registry.register(Box::new(anrufe_gestartet.clone()))?;

        let anruf_uebergaenge = IntCounterVec::new(
            Opts::new(
                "callroom_call_transitions_total",
                "Anruf-Zustandsuebergaenge nach Zielzustand",
            ),
            &["status"],
        )?;
        registry.register(Box::new(anruf_uebergaenge.clone()))?;

        let provider_fallbacks = IntCounter::with_opts(Opts::new(
            "callroom_provider_fallbacks_total",
            "Raeume die lokal statt beim Provider angelegt wurden",
        ))?;
        registry.register(Box::new(provider_fallbacks.clone()))?;

        let reaper_uebergaenge = IntCounterVec::new(
            Opts::new(
                "callroom_reaper_transitions_total",
                "Vom Reaper erzwungene Uebergaenge",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(reaper_uebergaenge.clone()))?;

        let ereignisse_zugestellt = IntCounter::with_opts(Opts::new(
            "callroom_events_delivered_total",
            "An Beobachter eingereihte Signal-Ereignisse",
        ))?;
        registry.register(Box::new(ereignisse_zugestellt.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("callroom_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "callroom_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            anrufe_gestartet,
            anruf_uebergaenge,
            provider_fallbacks,
            reaper_uebergaenge,
            ereignisse_zugestellt,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Zaehlt einen Anruf-Uebergang in den Zustand `status`
    pub fn uebergang(&self, status: &str) {
        self.anruf_uebergaenge.with_label_values(&[status]).inc();
    }

    /// Zaehlt eine Reaper-Korrektur (`missed` oder `room_expired`)
    pub fn reaper(&self, art: &str, anzahl: u64) {
        if anzahl > 0 {
            self.reaper_uebergaenge.with_label_values(&[art]).inc_by(anzahl);
        }
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: CallroomMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<CallroomMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
