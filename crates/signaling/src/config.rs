//! Konfiguration der Signalisierung
//!
//! Die Zeitfenster sind beratende Fristen: der Reaper setzt sie per Polling
//! durch, ein Anruf kann daher etwas laenger klingeln als konfiguriert.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Standard-Zeitfenster bis ein unbeantworteter Anruf als verpasst gilt
pub const STANDARD_KLINGEL_ZEITFENSTER: Duration = Duration::from_secs(60);

/// Standard-Lebensdauer eines Raums
pub const STANDARD_RAUM_TTL: Duration = Duration::from_secs(60 * 60);

/// Standard-Intervall des Reapers
pub const STANDARD_REAPER_INTERVALL: Duration = Duration::from_secs(15);

/// Maximale Anzahl Eintraege pro Reaper-Durchlauf und Sweep
pub const STANDARD_REAPER_BATCH: i64 = 100;

#[derive(Debug, Clone)]
pub struct SignalingKonfig {
    pub klingel_zeitfenster: Duration,
    pub raum_ttl: Duration,
    pub reaper_intervall: Duration,
    pub reaper_batch: i64,
}

impl Default for SignalingKonfig {
    fn default() -> Self {
        Self {
            klingel_zeitfenster: STANDARD_KLINGEL_ZEITFENSTER,
            raum_ttl: STANDARD_RAUM_TTL,
            reaper_intervall: STANDARD_REAPER_INTERVALL,
            reaper_batch: STANDARD_REAPER_BATCH,
        }
    }
}

impl SignalingKonfig {
    pub fn klingel_zeitfenster_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.klingel_zeitfenster).unwrap_or(chrono::Duration::MAX)
    }

    /// Anrufe die vor diesem Zeitpunkt gestartet wurden gelten als verpasst
    ///
    /// `None` wenn das Zeitfenster weiter zurueckreicht als darstellbar.
    pub fn klingel_stichtag(&self, jetzt: DateTime<Utc>) -> Option<DateTime<Utc>> {
        jetzt.checked_sub_signed(self.klingel_zeitfenster_chrono())
    }
}
