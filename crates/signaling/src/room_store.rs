//! RoomStore – Raeume und Teilnehmer
//!
//! Legt Raeume ueber den [`MeetingAdapter`] an, verwaltet die Mitgliedschaft
//! und beendet Raeume genau einmal. Teilnehmer bewegen sich nur vorwaerts:
//! `invited -> joined -> left`.

use callroom_core::types::{AnrufArt, ConversationId, RoomId, TeilnehmerStatus, UserId};
use callroom_db::models::{NeuerRaum, RaumEnde, RaumRecord, TeilnehmerRecord};
use callroom_meeting::MeetingAdapter;
use callroom_observability::CallroomMetrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SignalingError, SignalingResult};
use crate::Speicher;

/// Ergebnis eines Teilnehmer-Statuswechsels
#[derive(Debug, Clone, PartialEq)]
pub enum TeilnehmerUebergang {
    /// Status wurde geaendert
    Uebergegangen(TeilnehmerRecord),
    /// Teilnehmer war bereits im Zielzustand
    Unveraendert(TeilnehmerRecord),
    /// Benutzer wurde nie eingeladen
    KeinTeilnehmer,
    /// Wechsel waere rueckwaerts oder der Raum ist beendet
    Unzulaessig(TeilnehmerRecord),
}

impl TeilnehmerUebergang {
    pub fn hat_geaendert(&self) -> bool {
        matches!(self, Self::Uebergegangen(_))
    }
}

pub struct RoomStore<D> {
    db: Arc<D>,
    adapter: MeetingAdapter,
    metriken: CallroomMetrics,
}

impl<D: Speicher> RoomStore<D> {
    pub fn neu(db: Arc<D>, adapter: MeetingAdapter, metriken: CallroomMetrics) -> Self {
        Self {
            db,
            adapter,
            metriken,
        }
    }

    /// Legt einen aktiven Raum an; der Ersteller ist sofort `joined`
    ///
    /// Scheitert nie am Provider: ohne Provider-Raum wird lokal ein
    /// Ersatz-Raum erzeugt.
    pub async fn raum_erstellen(
        &self,
        conversation_id: ConversationId,
        art: AnrufArt,
        ersteller: UserId,
        ttl: Duration,
        jetzt: DateTime<Utc>,
    ) -> SignalingResult<RaumRecord> {
        let id = RoomId::new();
        let ablauf = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| jetzt.checked_add_signed(ttl));

        // Der Provider braucht ein Ablaufdatum; ohne TTL gilt ein Tag
        let provider_ablauf = ablauf.unwrap_or(jetzt + chrono::Duration::days(1));
        let koordinaten = self.adapter.raum_erstellen(id, provider_ablauf).await;
        if !koordinaten.ok {
            self.metriken.provider_fallbacks.inc();
        }

        let ergebnis = self
            .db
            .create_room(NeuerRaum {
                id,
                conversation_id,
                call_kind: art,
                provider_meeting_id: koordinaten.provider_meeting_id.as_deref(),
                participant_url: &koordinaten.teilnehmer_url,
                host_url: koordinaten.host_url.as_deref(),
                created_by: ersteller,
                created_at: jetzt,
                expires_at: ablauf,
            })
            .await;

        match ergebnis {
            Ok(raum) => {
                info!(
                    room_id = %raum.id,
                    conversation_id = %conversation_id,
                    provider = koordinaten.ok,
                    "Raum erstellt"
                );
                Ok(raum)
            }
            Err(e) => {
                // Provider-Raum nicht verwaist zuruecklassen
                if let Some(meeting_id) = &koordinaten.provider_meeting_id {
                    self.adapter.raum_loeschen(meeting_id).await;
                }
                Err(e.into())
            }
        }
    }

    pub async fn raum_laden(&self, raum_id: RoomId) -> SignalingResult<RaumRecord> {
        self.db
            .get_room(raum_id)
            .await?
            .ok_or_else(|| SignalingError::nicht_gefunden(format!("Raum {raum_id}")))
    }

    /// Laedt einen Raum, `None` wenn unbekannt
    pub async fn raum_suchen(&self, raum_id: RoomId) -> SignalingResult<Option<RaumRecord>> {
        Ok(self.db.get_room(raum_id).await?)
    }

    /// Laedt einen Teilnehmer, `None` wenn nie eingeladen
    pub async fn teilnehmer_suchen(
        &self,
        raum_id: RoomId,
        user_id: UserId,
    ) -> SignalingResult<Option<TeilnehmerRecord>> {
        Ok(self.db.get_participant(raum_id, user_id).await?)
    }

    /// Laedt alle Teilnehmer eines Raums
    pub async fn teilnehmer(&self, raum_id: RoomId) -> SignalingResult<Vec<TeilnehmerRecord>> {
        Ok(self.db.list_participants(raum_id).await?)
    }

    pub async fn beigetretene_anzahl(&self, raum_id: RoomId) -> SignalingResult<i64> {
        Ok(self.db.count_joined(raum_id).await?)
    }

    /// Laedt als `invited` ein; No-op wenn bereits vorhanden oder Raum beendet
    pub async fn teilnehmer_hinzufuegen(
        &self,
        raum_id: RoomId,
        user_id: UserId,
        jetzt: DateTime<Utc>,
    ) -> SignalingResult<bool> {
        let neu = self.db.add_invited(raum_id, user_id, jetzt).await?;
        if neu {
            debug!(room_id = %raum_id, user_id = %user_id, "Teilnehmer eingeladen");
        }
        Ok(neu)
    }

    /// `invited -> joined`
    pub async fn als_beigetreten_markieren(
        &self,
        raum_id: RoomId,
        user_id: UserId,
        jetzt: DateTime<Utc>,
    ) -> SignalingResult<TeilnehmerUebergang> {
        let geaendert = self
            .db
            .transition_participant(
                raum_id,
                user_id,
                &[TeilnehmerStatus::Invited],
                TeilnehmerStatus::Joined,
                jetzt,
            )
            .await?;
        if let Some(t) = geaendert {
            return Ok(TeilnehmerUebergang::Uebergegangen(t));
        }

        Ok(match self.db.get_participant(raum_id, user_id).await? {
            None => TeilnehmerUebergang::KeinTeilnehmer,
            Some(t) if t.status == TeilnehmerStatus::Joined => TeilnehmerUebergang::Unveraendert(t),
            // `left`, oder `invited` in einem beendeten Raum
            Some(t) => TeilnehmerUebergang::Unzulaessig(t),
        })
    }

    /// `invited | joined -> left`
    pub async fn als_gegangen_markieren(
        &self,
        raum_id: RoomId,
        user_id: UserId,
        jetzt: DateTime<Utc>,
    ) -> SignalingResult<TeilnehmerUebergang> {
        let geaendert = self
            .db
            .transition_participant(
                raum_id,
                user_id,
                &[TeilnehmerStatus::Invited, TeilnehmerStatus::Joined],
                TeilnehmerStatus::Left,
                jetzt,
            )
            .await?;
        if let Some(t) = geaendert {
            return Ok(TeilnehmerUebergang::Uebergegangen(t));
        }

        Ok(match self.db.get_participant(raum_id, user_id).await? {
            None => TeilnehmerUebergang::KeinTeilnehmer,
            Some(t) => TeilnehmerUebergang::Unveraendert(t),
        })
    }

    /// Beendet den Raum genau einmal und raeumt den Provider-Raum ab
    ///
    /// Ein bereits beendeter Raum ist kein Fehler.
    pub async fn raum_beenden(
        &self,
        raum_id: RoomId,
        grund: &str,
        jetzt: DateTime<Utc>,
    ) -> SignalingResult<RaumEnde> {
        let ende = self.db.end_room(raum_id, grund, jetzt).await.map_err(|e| match e {
            callroom_db::DbError::NichtGefunden(_) => {
                SignalingError::nicht_gefunden(format!("Raum {raum_id}"))
            }
            andere => andere.into(),
        })?;

        if ende.hat_beendet() {
            info!(room_id = %raum_id, grund, "Raum beendet");
            if let Some(meeting_id) = &ende.raum().provider_meeting_id {
                if !self.adapter.raum_loeschen(meeting_id).await {
                    warn!(room_id = %raum_id, meeting_id = %meeting_id, "Provider-Raum bleibt bestehen");
                }
            }
        } else {
            debug!(room_id = %raum_id, "Raum war bereits beendet");
        }
        Ok(ende)
    }

    /// `expires_at` gesetzt und vor `jetzt`
    pub async fn ist_abgelaufen(&self, raum_id: RoomId, jetzt: DateTime<Utc>) -> SignalingResult<bool> {
        Ok(self.raum_laden(raum_id).await?.ist_abgelaufen(jetzt))
    }
}
