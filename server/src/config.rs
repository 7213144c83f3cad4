//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist (dann nur mit lokalen Ersatz-Raeumen).

use std::time::Duration;

use callroom_db::DatabaseConfig;
use callroom_meeting::HttpProviderKonfig;
use callroom_observability::logging::{log_format_gueltig, log_level_gueltig};
use callroom_signaling::SignalingKonfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Zeitfenster fuer Anrufe und Raeume
    pub anrufe: AnrufEinstellungen,
    /// Hintergrund-Reaper
    pub reaper: ReaperEinstellungen,
    /// Externer Meeting-Provider
    pub provider: ProviderEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Callroom".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// Port fuer die REST-API
    pub api_port: u16,
    /// CORS-Origins fuer REST (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            api_port: 8080,
            cors_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// SQLite im WAL-Modus betreiben
    pub sqlite_wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        let db = DatabaseConfig::default();
        Self {
            url: db.url,
            max_verbindungen: db.max_verbindungen,
            sqlite_wal: db.sqlite_wal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Obergrenze fuer `klingel_zeitfenster_s` (ein Tag)
pub const MAX_KLINGEL_ZEITFENSTER_S: u64 = 24 * 60 * 60;

/// Obergrenze fuer `raum_ttl_min` (30 Tage)
pub const MAX_RAUM_TTL_MIN: u64 = 30 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnrufEinstellungen {
    /// Sekunden bis ein unbeantworteter Anruf als verpasst gilt
    pub klingel_zeitfenster_s: u64,
    /// Lebensdauer eines Raums in Minuten
    pub raum_ttl_min: u64,
}

impl Default for AnrufEinstellungen {
    fn default() -> Self {
        Self {
            klingel_zeitfenster_s: 60,
            raum_ttl_min: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperEinstellungen {
    pub intervall_s: u64,
    /// Maximale Eintraege pro Sweep
    pub batch: i64,
}

impl Default for ReaperEinstellungen {
    fn default() -> Self {
        Self {
            intervall_s: 15,
            batch: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEinstellungen {
    /// Ohne Provider werden ausschliesslich lokale Raeume erzeugt
    pub aktiviert: bool,
    pub api_url: String,
    pub api_key: Option<String>,
    /// Zeitlimit pro Provider-Aufruf
    pub zeitlimit_ms: u64,
    /// Basis-URL der lokalen Ersatz-Raeume
    pub fallback_url: String,
    /// "normal" oder "group"
    pub raum_modus: String,
}

impl Default for ProviderEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: false,
            api_url: "https://api.whereby.dev/v1".into(),
            api_key: None,
            zeitlimit_ms: 3000,
            fallback_url: "https://meet.callroom.local".into(),
            raum_modus: "normal".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte die serde allein nicht abdeckt
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Unbekanntes Log-Format '{}' (text|json)", self.logging.format);
        }
        // Filter-Direktiven wie "callroom_signaling=debug" sind ebenfalls erlaubt
        let level = &self.logging.level;
        if !log_level_gueltig(level) && !level.contains('=') {
            anyhow::bail!("Unbekanntes Log-Level '{level}'");
        }
        if self.anrufe.klingel_zeitfenster_s == 0 || self.anrufe.raum_ttl_min == 0 {
            anyhow::bail!("Zeitfenster in [anrufe] muessen groesser als 0 sein");
        }
        if self.anrufe.klingel_zeitfenster_s > MAX_KLINGEL_ZEITFENSTER_S {
            anyhow::bail!(
                "klingel_zeitfenster_s darf hoechstens {MAX_KLINGEL_ZEITFENSTER_S} sein"
            );
        }
        if self.anrufe.raum_ttl_min > MAX_RAUM_TTL_MIN {
            anyhow::bail!("raum_ttl_min darf hoechstens {MAX_RAUM_TTL_MIN} sein");
        }
        Ok(())
    }

    pub fn api_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.api_port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }

    pub fn datenbank_konfig(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: self.datenbank.sqlite_wal,
        }
    }

    /// Zeitfenster der Engine; die einzige Stelle an der sie festgelegt werden
    pub fn signaling_konfig(&self) -> SignalingKonfig {
        SignalingKonfig {
            klingel_zeitfenster: Duration::from_secs(self.anrufe.klingel_zeitfenster_s),
            raum_ttl: Duration::from_secs(self.anrufe.raum_ttl_min.saturating_mul(60)),
            reaper_intervall: Duration::from_secs(self.reaper.intervall_s.max(1)),
            reaper_batch: self.reaper.batch.max(1),
        }
    }

    /// HTTP-Provider-Konfiguration, `None` wenn deaktiviert oder ohne Schluessel
    pub fn provider_konfig(&self) -> Option<HttpProviderKonfig> {
        let p = &self.provider;
        let api_key = p.api_key.as_deref().filter(|k| !k.trim().is_empty())?;
        if !p.aktiviert {
            return None;
        }
        Some(HttpProviderKonfig {
            api_url: p.api_url.clone(),
            api_key: api_key.to_string(),
            zeitlimit: self.provider_zeitlimit(),
            raum_modus: p.raum_modus.clone(),
        })
    }

    pub fn provider_zeitlimit(&self) -> Duration {
        Duration::from_millis(self.provider.zeitlimit_ms.max(1))
    }
}
