//! ExpiryReaper – periodische Korrektur zeitgesteuerter Zustaende
//!
//! Pro Durchlauf zwei Sweeps:
//! 1. Anrufe die laenger als das Klingel-Zeitfenster unbeantwortet sind
//!    werden `missed`.
//! 2. Aktive Raeume deren `expires_at` verstrichen ist werden beendet.
//!
//! Beide Uebergaenge laufen ueber dieselben bedingten Updates wie die
//! Benutzer-Operationen. Ein paralleles Annehmen gewinnt oder verliert
//! sauber, nie beides.
//!
//! # Graceful Shutdown
//!
//! Der Task beendet sich wenn das CancellationToken ausgeloest wird; ein
//! laufender Durchlauf wird noch abgeschlossen.

use callroom_observability::HealthState;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::CallEngine;
use crate::error::SignalingResult;
use crate::Speicher;

/// Ergebnis eines Reaper-Durchlaufs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaperBericht {
    pub verpasste_anrufe: u64,
    pub beendete_raeume: u64,
}

pub struct ExpiryReaper<D> {
    engine: Arc<CallEngine<D>>,
    health: Option<HealthState>,
}

impl<D: Speicher> ExpiryReaper<D> {
    pub fn neu(engine: Arc<CallEngine<D>>) -> Self {
        Self {
            engine,
            health: None,
        }
    }

    /// Meldet den Datenbank-Zustand jedes Durchlaufs an den Health-Endpunkt
    pub fn mit_health(mut self, health: HealthState) -> Self {
        self.health = Some(health);
        self
    }

    /// Ein vollstaendiger Durchlauf zum Zeitpunkt `jetzt`
    ///
    /// Fehler einzelner Eintraege werden geloggt und uebersprungen; nur ein
    /// Fehler beim Auflisten bricht den jeweiligen Sweep ab.
    pub async fn durchlauf(&self, jetzt: DateTime<Utc>) -> SignalingResult<ReaperBericht> {
        let konfig = self.engine.konfig();
        let mut bericht = ReaperBericht::default();

        // Sweep 1: unbeantwortete Anrufe
        let unbeantwortet = match konfig.klingel_stichtag(jetzt) {
            Some(stichtag) => {
                self.engine
                    .db()
                    .unanswered_calls_before(stichtag, konfig.reaper_batch)
                    .await
            }
            None => {
                debug!("Klingel-Zeitfenster reicht vor jeden Anruf zurueck");
                Ok(Vec::new())
            }
        };
        match unbeantwortet {
            Ok(anrufe) => {
                for anruf in anrufe {
                    match self.engine.anruf_verpassen(anruf.id, jetzt).await {
                        Ok(true) => bericht.verpasste_anrufe += 1,
                        Ok(false) => {}
                        Err(e) => warn!(
                            call_id = %anruf.id,
                            error = %e,
                            "Anruf konnte nicht als verpasst markiert werden"
                        ),
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Unbeantwortete Anrufe nicht ladbar");
                self.db_status(false);
                return Err(e.into());
            }
        }

        // Sweep 2: abgelaufene Raeume
        let abgelaufen = self
            .engine
            .db()
            .expired_rooms(jetzt, konfig.reaper_batch)
            .await;
        match abgelaufen {
            Ok(raeume) => {
                for raum in raeume {
                    match self.engine.raum_ablaufen(raum.id, jetzt).await {
                        Ok(true) => bericht.beendete_raeume += 1,
                        Ok(false) => {}
                        Err(e) => warn!(
                            room_id = %raum.id,
                            error = %e,
                            "Abgelaufener Raum konnte nicht beendet werden"
                        ),
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Abgelaufene Raeume nicht ladbar");
                self.db_status(false);
                return Err(e.into());
            }
        }

        self.db_status(true);
        let metriken = self.engine.metriken();
        metriken.reaper("missed", bericht.verpasste_anrufe);
        metriken.reaper("room_expired", bericht.beendete_raeume);

        if bericht != ReaperBericht::default() {
            info!(
                verpasst = bericht.verpasste_anrufe,
                raeume = bericht.beendete_raeume,
                "Reaper-Durchlauf"
            );
        } else {
            debug!("Reaper-Durchlauf ohne Aenderungen");
        }
        Ok(bericht)
    }

    /// Startet den periodischen Task
    pub fn starten(self: Arc<Self>, abbruch: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.schleife(abbruch).await })
    }

    #[instrument(skip_all, name = "callroom.reaper")]
    async fn schleife(&self, abbruch: CancellationToken) {
        let konfig = self.engine.konfig();
        info!(
            intervall_ms = konfig.reaper_intervall.as_millis() as u64,
            klingel_s = konfig.klingel_zeitfenster.as_secs(),
            "Reaper gestartet"
        );

        let mut intervall = tokio::time::interval(konfig.reaper_intervall);
        intervall.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = intervall.tick() => {
                    // Fehler sind bereits geloggt; der naechste Tick versucht es erneut
                    let _ = self.durchlauf(Utc::now()).await;
                }
                _ = abbruch.cancelled() => {
                    info!("Reaper erhielt Shutdown-Signal");
                    break;
                }
            }
        }

        info!("Reaper gestoppt");
    }

    fn db_status(&self, verbunden: bool) {
        if let Some(health) = &self.health {
            health.db_status_setzen(verbunden);
        }
    }
}
