//! CallEngine – Anruf-Zustandsmaschine
//!
//! `initiated -> ringing -> accepted -> ended`, dazu `initiated|ringing ->
//! rejected|missed`. Jeder Uebergang ist ein bedingtes Update im Speicher;
//! verliert er gegen einen parallelen Uebergang, erhaelt der Aufrufer
//! `VeralteterUebergang`.
//!
//! Alle Mutationen eines Raums laufen unter einer prozessweiten Sperre pro
//! Raum. Das Fanout geschieht innerhalb derselben Sperre, sodass jeder
//! Beobachter die Ereignisse eines Raums in kausaler Reihenfolge erhaelt.

use callroom_core::event::{AnrufAnsicht, EreignisArt, NotificationFanout, SignalEreignis};
use callroom_core::types::{
    ende_grund, AnrufStatus, CallId, ConversationId, RoomId, TeilnehmerStatus, UserId,
};
use callroom_db::models::{
    AnrufRecord, AnrufUebergang, KonversationsMitglied, NeuerAnruf, RaumRecord, TeilnehmerRecord,
};
use callroom_db::DbResult;
use callroom_meeting::MeetingAdapter;
use callroom_observability::CallroomMetrics;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn};

use crate::ansicht;
use crate::antwort::{
    AblehnAnfrage, AnrufAbgelehnt, AnrufAngenommen, AnrufBeendet, AnrufGestartet, AnrufUebersicht,
    EndAnfrage, RaumAktion, RaumBeendet, StartAnfrage,
};
use crate::config::SignalingKonfig;
use crate::error::{SignalingError, SignalingResult};
use crate::room_store::{RoomStore, TeilnehmerUebergang};
use crate::Speicher;

pub struct CallEngine<D> {
    db: Arc<D>,
    raeume: RoomStore<D>,
    fanout: Arc<dyn NotificationFanout>,
    metriken: CallroomMetrics,
    konfig: SignalingKonfig,
    /// Sperre pro Raum; nur Raeume mit laufenden Operationen haben einen Eintrag
    sperren: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl<D: Speicher> CallEngine<D> {
    pub fn neu(
        db: Arc<D>,
        adapter: MeetingAdapter,
        fanout: Arc<dyn NotificationFanout>,
        metriken: CallroomMetrics,
        konfig: SignalingKonfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            raeume: RoomStore::neu(Arc::clone(&db), adapter, metriken.clone()),
            db,
            fanout,
            metriken,
            konfig,
            sperren: DashMap::new(),
        })
    }

    pub fn konfig(&self) -> &SignalingKonfig {
        &self.konfig
    }

    pub fn raeume(&self) -> &RoomStore<D> {
        &self.raeume
    }

    pub fn metriken(&self) -> &CallroomMetrics {
        &self.metriken
    }

    pub(crate) fn db(&self) -> &D {
        &self.db
    }

    // -----------------------------------------------------------------------
    // Anruf-Operationen
    // -----------------------------------------------------------------------

    /// Startet einen Anruf: Raum anlegen, Anruf anlegen, Mitglieder einladen
    #[instrument(skip(self, anfrage), fields(conversation_id = %anfrage.conversation_id, akteur = %akteur))]
    pub async fn anruf_starten(
        &self,
        akteur: UserId,
        anfrage: StartAnfrage,
    ) -> SignalingResult<AnrufGestartet> {
        let jetzt = Utc::now();
        let konversation = anfrage.conversation_id;
        let mitglieder = self.mitglieder_pruefen(konversation, akteur).await?;
        if !mitglieder.iter().any(|m| m.user_id != akteur) {
            return Err(SignalingError::UngueltigeEingabe(
                "Konversation hat keine weiteren Mitglieder".into(),
            ));
        }
        if let Some(aktiv) = self.db.active_call_for_conversation(konversation).await? {
            return Err(SignalingError::AnrufBereitsAktiv { call_id: aktiv.id });
        }

        let raum = self
            .raeume
            .raum_erstellen(konversation, anfrage.call_kind, akteur, self.konfig.raum_ttl, jetzt)
            .await?;

        let _sperre = self.raum_sperre(raum.id).await;

        let erstellt = self
            .db
            .create_call(NeuerAnruf {
                id: CallId::new(),
                room_id: raum.id,
                conversation_id: konversation,
                call_kind: anfrage.call_kind,
                initiated_by: akteur,
                metadata: anfrage.metadata.as_ref(),
                created_at: jetzt,
            })
            .await;

        let anruf = match erstellt {
            Ok(anruf) => anruf,
            Err(e) => {
                // Der frisch angelegte Raum hat keinen Anruf und wird nicht gebraucht
                if let Err(ende_fehler) = self
                    .raeume
                    .raum_beenden(raum.id, ende_grund::FEHLGESCHLAGEN, jetzt)
                    .await
                {
                    warn!(room_id = %raum.id, fehler = %ende_fehler, "Verwaisten Raum nicht beendet");
                }

                if !e.ist_eindeutigkeit() {
                    return Err(e.into());
                }
                warn!(room_id = %raum.id, "Paralleler Anruf in derselben Konversation gewonnen");
                return Err(match self.db.active_call_for_conversation(konversation).await? {
                    Some(aktiv) => SignalingError::AnrufBereitsAktiv { call_id: aktiv.id },
                    None => SignalingError::veraltet("conversation", "busy"),
                });
            }
        };

        for mitglied in mitglieder.iter().filter(|m| m.user_id != akteur) {
            self.raeume
                .teilnehmer_hinzufuegen(raum.id, mitglied.user_id, jetzt)
                .await?;
        }

        self.metriken.anrufe_gestartet.inc();
        self.metriken.uebergang(AnrufStatus::Initiated.als_str());
        info!(call_id = %anruf.id, room_id = %raum.id, "Anruf gestartet");

        self.ankuendigen(EreignisArt::AnrufGestartet, Some(akteur), Some(&anruf), &raum, jetzt)
            .await;

        Ok(AnrufGestartet {
            call_id: anruf.id,
            room_id: raum.id,
            participant_url: raum.participant_url.clone(),
            expires_at: raum.expires_at,
        })
    }

    /// Ein Endgeraet des Angerufenen meldet, dass es klingelt
    ///
    /// Wiederholte Meldungen waehrend `ringing` sind idempotent.
    #[instrument(skip(self), fields(akteur = %akteur))]
    pub async fn klingeln(&self, akteur: UserId, call_id: CallId) -> SignalingResult<AnrufAnsicht> {
        let anruf = self.anruf_laden(call_id).await?;
        self.mitglieder_pruefen(anruf.conversation_id, akteur).await?;
        if anruf.initiated_by == akteur {
            return Err(SignalingError::zugriff_verweigert(
                "Der Anrufer kann den eigenen Anruf nicht klingeln lassen",
            ));
        }

        let _sperre = self.raum_sperre(anruf.room_id).await;
        let jetzt = Utc::now();

        let Some(klingelt) = self
            .db
            .transition_call(call_id, &[AnrufStatus::Initiated], &AnrufUebergang::Klingeln, jetzt)
            .await?
        else {
            let aktuell = self.anruf_laden(call_id).await?;
            return if aktuell.status == AnrufStatus::Ringing {
                Ok(ansicht::anruf(&aktuell))
            } else {
                Err(SignalingError::veraltet("call", aktuell.status.als_str()))
            };
        };

        self.metriken.uebergang(klingelt.status.als_str());
        debug!(call_id = %call_id, "Anruf klingelt");

        let raum = self.raeume.raum_laden(klingelt.room_id).await?;
        self.ankuendigen(EreignisArt::AnrufKlingelt, Some(akteur), Some(&klingelt), &raum, jetzt)
            .await;
        Ok(ansicht::anruf(&klingelt))
    }

    #[instrument(skip(self), fields(akteur = %akteur))]
    pub async fn annehmen(&self, akteur: UserId, call_id: CallId) -> SignalingResult<AnrufAngenommen> {
        let anruf = self.anruf_laden(call_id).await?;
        self.mitglieder_pruefen(anruf.conversation_id, akteur).await?;
        if anruf.initiated_by == akteur {
            return Err(SignalingError::zugriff_verweigert(
                "Der Anrufer kann den eigenen Anruf nicht annehmen",
            ));
        }

        let _sperre = self.raum_sperre(anruf.room_id).await;
        let jetzt = Utc::now();

        // Dieselben Raum-Bedingungen wie beim Beitreten, vor dem Uebergang
        let raum = self.raeume.raum_laden(anruf.room_id).await?;
        if !raum.ist_aktiv() {
            return Err(SignalingError::veraltet("room", raum.status.als_str()));
        }
        if raum.ist_abgelaufen(jetzt) {
            return Err(SignalingError::veraltet("room", ende_grund::ABGELAUFEN));
        }
        if let Some(t) = self.raeume.teilnehmer_suchen(anruf.room_id, akteur).await? {
            if t.status == TeilnehmerStatus::Left {
                return Err(SignalingError::veraltet("participant", t.status.als_str()));
            }
        }

        let angenommen = self
            .uebergang_anwenden(
                &anruf,
                &AnrufStatus::KLINGELND,
                AnrufUebergang::Annehmen { von: akteur },
                jetzt,
            )
            .await?;

        // Mitglieder die erst nach dem Start dazukamen, sind noch nicht eingeladen
        self.raeume
            .teilnehmer_hinzufuegen(anruf.room_id, akteur, jetzt)
            .await?;
        match self
            .raeume
            .als_beigetreten_markieren(anruf.room_id, akteur, jetzt)
            .await?
        {
            TeilnehmerUebergang::Uebergegangen(_) | TeilnehmerUebergang::Unveraendert(_) => {}
            andere => warn!(
                call_id = %call_id,
                ergebnis = ?andere,
                "Annehmender konnte dem Raum nicht beitreten"
            ),
        }

        let raum = self.raeume.raum_laden(anruf.room_id).await?;
        self.ankuendigen(EreignisArt::AnrufAngenommen, Some(akteur), Some(&angenommen), &raum, jetzt)
            .await;

        Ok(AnrufAngenommen {
            call_id,
            room_id: raum.id,
            room_url: raum.participant_url.clone(),
            accepted_at: angenommen.accepted_at.unwrap_or(jetzt),
        })
    }

    /// Lehnt ab und beendet den Raum, sofern kein anderer Anruf ihn nutzt
    #[instrument(skip(self, anfrage), fields(akteur = %akteur))]
    pub async fn ablehnen(
        &self,
        akteur: UserId,
        call_id: CallId,
        anfrage: AblehnAnfrage,
    ) -> SignalingResult<AnrufAbgelehnt> {
        let anruf = self.anruf_laden(call_id).await?;
        self.mitglieder_pruefen(anruf.conversation_id, akteur).await?;
        if anruf.initiated_by == akteur {
            return Err(SignalingError::zugriff_verweigert(
                "Der Anrufer kann den eigenen Anruf nicht ablehnen, nur beenden",
            ));
        }

        let _sperre = self.raum_sperre(anruf.room_id).await;
        let jetzt = Utc::now();

        let abgelehnt = self
            .uebergang_anwenden(
                &anruf,
                &AnrufStatus::KLINGELND,
                AnrufUebergang::Ablehnen {
                    von: akteur,
                    grund: anfrage.reason,
                },
                jetzt,
            )
            .await?;

        if let TeilnehmerUebergang::KeinTeilnehmer = self
            .raeume
            .als_gegangen_markieren(anruf.room_id, akteur, jetzt)
            .await?
        {
            debug!(call_id = %call_id, "Ablehnender war nicht eingeladen");
        }

        let raum = self
            .raum_beenden_falls_frei(anruf.room_id, ende_grund::ABGELEHNT, jetzt)
            .await?;
        self.ankuendigen(EreignisArt::AnrufAbgelehnt, Some(akteur), Some(&abgelehnt), &raum, jetzt)
            .await;

        Ok(AnrufAbgelehnt {
            call_id,
            rejected_at: abgelehnt.rejected_at.unwrap_or(jetzt),
            reason: abgelehnt.reject_reason,
        })
    }

    /// Beendet einen aktiven Anruf und seinen Raum
    #[instrument(skip(self, anfrage), fields(akteur = %akteur))]
    pub async fn beenden(
        &self,
        akteur: UserId,
        call_id: CallId,
        anfrage: EndAnfrage,
    ) -> SignalingResult<AnrufBeendet> {
        dauer_pruefen(anfrage.duration)?;
        let anruf = self.anruf_laden(call_id).await?;
        self.mitglieder_pruefen(anruf.conversation_id, akteur).await?;

        let _sperre = self.raum_sperre(anruf.room_id).await;
        let jetzt = Utc::now();
        let grund = grund_oder(anfrage.reason, ende_grund::AUFGELEGT);

        let beendet = self
            .anruf_beenden_intern(call_id, Some(akteur), &grund, anfrage.duration, jetzt)
            .await?;
        let ende = self.raeume.raum_beenden(anruf.room_id, &grund, jetzt).await?;

        self.ankuendigen(EreignisArt::AnrufBeendet, Some(akteur), Some(&beendet), ende.raum(), jetzt)
            .await;

        Ok(AnrufBeendet {
            call_id,
            ended_at: beendet.ended_at.unwrap_or(jetzt),
            duration: beendet.duration_seconds,
        })
    }

    /// Anruf mit Raum und Teilnehmern; die Host-URL nur fuer den Raum-Ersteller
    pub async fn anruf_uebersicht(
        &self,
        akteur: UserId,
        call_id: CallId,
    ) -> SignalingResult<AnrufUebersicht> {
        let anruf = self.anruf_laden(call_id).await?;
        let mitglieder = self.mitglieder_pruefen(anruf.conversation_id, akteur).await?;
        let raum = self.raeume.raum_laden(anruf.room_id).await?;
        let teilnehmer = self.raeume.teilnehmer(anruf.room_id).await?;

        Ok(AnrufUebersicht {
            call: ansicht::anruf(&anruf),
            host_url: if raum.created_by == akteur {
                raum.host_url.clone()
            } else {
                None
            },
            room: ansicht::raum(&raum),
            participants: ansicht::teilnehmer(&teilnehmer, &mitglieder),
        })
    }

    // -----------------------------------------------------------------------
    // Raum-Operationen
    // -----------------------------------------------------------------------

    /// Tritt einem aktiven Raum bei, unabhaengig vom Zustand des Anrufs
    #[instrument(skip(self), fields(akteur = %akteur))]
    pub async fn raum_beitreten(&self, akteur: UserId, room_id: RoomId) -> SignalingResult<RaumAktion> {
        let raum = self.raeume.raum_laden(room_id).await?;
        self.mitglieder_pruefen(raum.conversation_id, akteur).await?;

        let _sperre = self.raum_sperre(room_id).await;
        let jetzt = Utc::now();

        let raum = self.raeume.raum_laden(room_id).await?;
        if !raum.ist_aktiv() {
            return Err(SignalingError::veraltet("room", raum.status.als_str()));
        }
        if raum.ist_abgelaufen(jetzt) {
            return Err(SignalingError::veraltet("room", ende_grund::ABGELAUFEN));
        }

        self.raeume.teilnehmer_hinzufuegen(room_id, akteur, jetzt).await?;
        match self.raeume.als_beigetreten_markieren(room_id, akteur, jetzt).await? {
            TeilnehmerUebergang::Uebergegangen(_) => {
                info!(room_id = %room_id, "Teilnehmer beigetreten");
                let anruf = self.aktiver_anruf(room_id).await?;
                self.ankuendigen(
                    EreignisArt::TeilnehmerBeigetreten,
                    Some(akteur),
                    anruf.as_ref(),
                    &raum,
                    jetzt,
                )
                .await;
            }
            TeilnehmerUebergang::Unveraendert(_) => {
                debug!(room_id = %room_id, "Teilnehmer war bereits beigetreten");
            }
            TeilnehmerUebergang::Unzulaessig(t) => {
                return Err(SignalingError::veraltet("participant", t.status.als_str()));
            }
            // Einladen ist nur in beendeten Raeumen ein No-op
            TeilnehmerUebergang::KeinTeilnehmer => {
                return Err(SignalingError::veraltet("room", "ended"));
            }
        }

        Ok(RaumAktion {
            timestamp: jetzt,
            participant_count: self.raeume.beigetretene_anzahl(room_id).await?,
        })
    }

    #[instrument(skip(self), fields(akteur = %akteur))]
    pub async fn raum_verlassen(&self, akteur: UserId, room_id: RoomId) -> SignalingResult<RaumAktion> {
        let raum = self.raeume.raum_laden(room_id).await?;

        let _sperre = self.raum_sperre(room_id).await;
        let jetzt = Utc::now();

        match self.raeume.als_gegangen_markieren(room_id, akteur, jetzt).await? {
            TeilnehmerUebergang::Uebergegangen(_) => {
                info!(room_id = %room_id, "Teilnehmer gegangen");
                let anruf = self.aktiver_anruf(room_id).await?;
                self.ankuendigen(
                    EreignisArt::TeilnehmerGegangen,
                    Some(akteur),
                    anruf.as_ref(),
                    &raum,
                    jetzt,
                )
                .await;
            }
            TeilnehmerUebergang::Unveraendert(_) | TeilnehmerUebergang::Unzulaessig(_) => {
                debug!(room_id = %room_id, "Teilnehmer war bereits gegangen");
            }
            TeilnehmerUebergang::KeinTeilnehmer => {
                return Err(SignalingError::KeinTeilnehmer(format!(
                    "{akteur} ist kein Teilnehmer von {room_id}"
                )));
            }
        }

        Ok(RaumAktion {
            timestamp: jetzt,
            participant_count: self.raeume.beigetretene_anzahl(room_id).await?,
        })
    }

    /// Beendet einen Raum samt aktivem Anruf; idempotent
    #[instrument(skip(self, anfrage), fields(akteur = %akteur))]
    pub async fn raum_beenden(
        &self,
        akteur: UserId,
        room_id: RoomId,
        anfrage: EndAnfrage,
    ) -> SignalingResult<RaumBeendet> {
        dauer_pruefen(anfrage.duration)?;
        let raum = self.raeume.raum_laden(room_id).await?;
        self.mitglieder_pruefen(raum.conversation_id, akteur).await?;

        let _sperre = self.raum_sperre(room_id).await;
        let jetzt = Utc::now();
        let grund = grund_oder(anfrage.reason, ende_grund::RAUM_BEENDET);

        let (anruf, raum, beendet) = self
            .raum_mit_anrufen_beenden(room_id, Some(akteur), &grund, anfrage.duration, jetzt)
            .await?;

        match (&anruf, beendet) {
            (Some(a), _) => {
                self.ankuendigen(EreignisArt::AnrufBeendet, Some(akteur), Some(a), &raum, jetzt)
                    .await
            }
            (None, true) => {
                self.ankuendigen(EreignisArt::RaumBeendet, Some(akteur), None, &raum, jetzt)
                    .await
            }
            (None, false) => debug!(room_id = %room_id, "Raum war bereits beendet"),
        }

        Ok(RaumBeendet {
            room_id,
            ended_at: raum.ended_at.unwrap_or(jetzt),
            duration: anruf.and_then(|a| a.duration_seconds),
        })
    }

    // -----------------------------------------------------------------------
    // Reaper-Uebergaenge (ohne Akteur)
    // -----------------------------------------------------------------------

    /// Setzt einen unbeantworteten Anruf auf `missed`
    ///
    /// `false` wenn der Anruf inzwischen beantwortet oder beendet wurde.
    pub async fn anruf_verpassen(&self, call_id: CallId, jetzt: DateTime<Utc>) -> SignalingResult<bool> {
        let Some(anruf) = self.db.get_call(call_id).await? else {
            return Ok(false);
        };

        let _sperre = self.raum_sperre(anruf.room_id).await;

        let uebergang = AnrufUebergang::Verpassen {
            grund: ende_grund::ABGELAUFEN.into(),
        };
        let Some(verpasst) = self
            .db
            .transition_call(call_id, &AnrufStatus::KLINGELND, &uebergang, jetzt)
            .await?
        else {
            debug!(call_id = %call_id, "Anruf wurde vor dem Reaper beantwortet");
            return Ok(false);
        };

        self.metriken.uebergang(verpasst.status.als_str());
        info!(call_id = %call_id, room_id = %anruf.room_id, "Anruf verpasst");

        let raum = self
            .raum_beenden_falls_frei(anruf.room_id, ende_grund::ABGELAUFEN, jetzt)
            .await?;
        self.ankuendigen(EreignisArt::AnrufVerpasst, None, Some(&verpasst), &raum, jetzt)
            .await;
        Ok(true)
    }

    /// Beendet einen abgelaufenen Raum, unabhaengig vom Anruf-Zustand
    ///
    /// `false` wenn der Raum bereits beendet oder (noch) nicht abgelaufen ist.
    pub async fn raum_ablaufen(&self, room_id: RoomId, jetzt: DateTime<Utc>) -> SignalingResult<bool> {
        let _sperre = self.raum_sperre(room_id).await;

        let Some(raum) = self.raeume.raum_suchen(room_id).await? else {
            return Ok(false);
        };
        if !raum.ist_aktiv() || !raum.ist_abgelaufen(jetzt) {
            return Ok(false);
        }

        let (anruf, raum, beendet) = self
            .raum_mit_anrufen_beenden(room_id, None, ende_grund::ABGELAUFEN, None, jetzt)
            .await?;

        match &anruf {
            Some(a) => {
                self.ankuendigen(EreignisArt::AnrufBeendet, None, Some(a), &raum, jetzt)
                    .await
            }
            None if beendet => {
                self.ankuendigen(EreignisArt::RaumBeendet, None, None, &raum, jetzt)
                    .await
            }
            None => {}
        }
        Ok(beendet)
    }

    // -----------------------------------------------------------------------
    // Interne Hilfen
    // -----------------------------------------------------------------------

    /// Wartet auf die Sperre des Raums
    async fn raum_sperre(&self, room_id: RoomId) -> RaumSperre<'_> {
        let sperre = Arc::clone(&self.sperren.entry(room_id).or_default());
        RaumSperre {
            sperren: &self.sperren,
            room_id,
            guard: Some(sperre.lock_owned().await),
        }
    }

    #[cfg(test)]
    pub(crate) fn offene_sperren(&self) -> usize {
        self.sperren.len()
    }

    async fn anruf_laden(&self, call_id: CallId) -> SignalingResult<AnrufRecord> {
        self.db
            .get_call(call_id)
            .await?
            .ok_or_else(|| SignalingError::nicht_gefunden(format!("Anruf {call_id}")))
    }

    async fn aktiver_anruf(&self, room_id: RoomId) -> SignalingResult<Option<AnrufRecord>> {
        Ok(self.db.active_calls_for_room(room_id).await?.into_iter().next())
    }

    /// Prueft die Mitgliedschaft und gibt alle Mitglieder zurueck
    async fn mitglieder_pruefen(
        &self,
        konversation: ConversationId,
        akteur: UserId,
    ) -> SignalingResult<Vec<KonversationsMitglied>> {
        let mitglieder = self.db.members(konversation).await?;
        if !mitglieder.iter().any(|m| m.user_id == akteur) {
            return Err(SignalingError::zugriff_verweigert(format!(
                "{akteur} ist kein Mitglied von {konversation}"
            )));
        }
        Ok(mitglieder)
    }

    /// Bedingter Uebergang; ein verlorener Wettlauf wird zu `VeralteterUebergang`
    async fn uebergang_anwenden(
        &self,
        anruf: &AnrufRecord,
        von: &[AnrufStatus],
        uebergang: AnrufUebergang,
        jetzt: DateTime<Utc>,
    ) -> SignalingResult<AnrufRecord> {
        let ziel = uebergang.ziel();
        match self.db.transition_call(anruf.id, von, &uebergang, jetzt).await? {
            Some(neu) => {
                self.metriken.uebergang(neu.status.als_str());
                info!(call_id = %neu.id, status = %neu.status, "Anruf-Uebergang");
                Ok(neu)
            }
            None => {
                let aktuell = self
                    .db
                    .get_call(anruf.id)
                    .await?
                    .map(|a| a.status)
                    .unwrap_or(anruf.status);
                warn!(call_id = %anruf.id, aktuell = %aktuell, ziel = %ziel, "Uebergang verloren");
                Err(SignalingError::veraltet("call", aktuell.als_str()))
            }
        }
    }

    /// Gemeinsamer End-Pfad fuer Auflegen, Raum-Ende und Ablauf
    async fn anruf_beenden_intern(
        &self,
        call_id: CallId,
        akteur: Option<UserId>,
        grund: &str,
        gelieferte_dauer: Option<i64>,
        jetzt: DateTime<Utc>,
    ) -> SignalingResult<AnrufRecord> {
        // Unter der Sperre neu laden, damit `accepted_at` aktuell ist
        let anruf = self.anruf_laden(call_id).await?;
        if anruf.status.ist_terminal() {
            return Err(SignalingError::veraltet("call", anruf.status.als_str()));
        }

        self.uebergang_anwenden(
            &anruf,
            &AnrufStatus::AKTIV,
            AnrufUebergang::Beenden {
                von: akteur,
                grund: grund.to_string(),
                dauer_sekunden: dauer_berechnen(&anruf, gelieferte_dauer, jetzt),
            },
            jetzt,
        )
        .await
    }

    /// Beendet alle aktiven Anrufe des Raums und dann den Raum
    ///
    /// Gibt den zuletzt beendeten Anruf, den aktuellen Raum und ob dieser
    /// Aufruf den Raum beendet hat zurueck.
    async fn raum_mit_anrufen_beenden(
        &self,
        room_id: RoomId,
        akteur: Option<UserId>,
        grund: &str,
        gelieferte_dauer: Option<i64>,
        jetzt: DateTime<Utc>,
    ) -> SignalingResult<(Option<AnrufRecord>, RaumRecord, bool)> {
        let mut letzter = None;
        for aktiv in self.db.active_calls_for_room(room_id).await? {
            match self
                .anruf_beenden_intern(aktiv.id, akteur, grund, gelieferte_dauer, jetzt)
                .await
            {
                Ok(beendet) => letzter = Some(beendet),
                Err(SignalingError::VeralteterUebergang { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let ende = self.raeume.raum_beenden(room_id, grund, jetzt).await?;
        let beendet = ende.hat_beendet();
        Ok((letzter, ende.into_raum(), beendet))
    }

    /// Beendet den Raum, wenn kein anderer aktiver Anruf ihn referenziert
    async fn raum_beenden_falls_frei(
        &self,
        room_id: RoomId,
        grund: &str,
        jetzt: DateTime<Utc>,
    ) -> SignalingResult<RaumRecord> {
        if !self.db.active_calls_for_room(room_id).await?.is_empty() {
            debug!(room_id = %room_id, "Raum hat weiteren aktiven Anruf, bleibt offen");
            return self.raeume.raum_laden(room_id).await;
        }
        let ende = self.raeume.raum_beenden(room_id, grund, jetzt).await?;
        Ok(ende.into_raum())
    }

    /// Verteilt ein vollstaendiges Ereignis an alle Beobachter
    ///
    /// Beobachter sind die Konversations-Mitglieder plus alle Raum-Teilnehmer.
    /// Ein Fehler beim Laden der Beobachter macht den bereits gespeicherten
    /// Uebergang nicht rueckgaengig und wird nur geloggt.
    async fn ankuendigen(
        &self,
        art: EreignisArt,
        akteur: Option<UserId>,
        anruf: Option<&AnrufRecord>,
        raum: &RaumRecord,
        jetzt: DateTime<Utc>,
    ) {
        let (mitglieder, teilnehmer) = match self.beobachter_laden(raum).await {
            Ok(daten) => daten,
            Err(e) => {
                error!(room_id = %raum.id, event = %art, fehler = %e, "Beobachter nicht ladbar, Ereignis entfaellt");
                return;
            }
        };

        let mut beobachter: Vec<UserId> = mitglieder.iter().map(|m| m.user_id).collect();
        for t in &teilnehmer {
            if !beobachter.contains(&t.user_id) {
                beobachter.push(t.user_id);
            }
        }

        let ereignis = SignalEreignis {
            event: art,
            occurred_at: jetzt,
            actor_id: akteur,
            call: anruf.map(ansicht::anruf),
            room: ansicht::raum(raum),
            participants: ansicht::teilnehmer(&teilnehmer, &mitglieder),
        };
        let zugestellt = self.fanout.ankuendigen(ereignis, &beobachter);
        self.metriken.ereignisse_zugestellt.inc_by(zugestellt as u64);
    }

    async fn beobachter_laden(
        &self,
        raum: &RaumRecord,
    ) -> DbResult<(Vec<KonversationsMitglied>, Vec<TeilnehmerRecord>)> {
        let mitglieder = self.db.members(raum.conversation_id).await?;
        let teilnehmer = self.db.list_participants(raum.id).await?;
        Ok((mitglieder, teilnehmer))
    }
}

/// Gehaltene Raum-Sperre
///
/// Beim Drop wird der Map-Eintrag entfernt, sofern niemand sonst die Sperre
/// haelt oder auf sie wartet (Map + eigener Guard = 2).
struct RaumSperre<'a> {
    sperren: &'a DashMap<RoomId, Arc<Mutex<()>>>,
    room_id: RoomId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RaumSperre<'_> {
    fn drop(&mut self) {
        self.sperren
            .remove_if(&self.room_id, |_, sperre| Arc::strong_count(sperre) <= 2);
        drop(self.guard.take());
    }
}

/// Dauer eines endenden Anrufs
///
/// Nur angenommene Anrufe haben eine Dauer: der gelieferte Wert, sonst
/// `jetzt - accepted_at`.
fn dauer_berechnen(
    anruf: &AnrufRecord,
    gelieferte_dauer: Option<i64>,
    jetzt: DateTime<Utc>,
) -> Option<i64> {
    let angenommen = anruf.accepted_at?;
    Some(gelieferte_dauer.unwrap_or_else(|| (jetzt - angenommen).num_seconds().max(0)))
}

fn dauer_pruefen(dauer: Option<i64>) -> SignalingResult<()> {
    match dauer {
        Some(d) if d < 0 => Err(SignalingError::UngueltigeEingabe(format!(
            "Dauer darf nicht negativ sein: {d}"
        ))),
        _ => Ok(()),
    }
}

fn grund_oder(grund: Option<String>, standard: &str) -> String {
    grund
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| standard.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use callroom_core::types::{AnrufArt, ConversationId};
    use chrono::Duration;

    fn anruf(accepted_at: Option<DateTime<Utc>>) -> AnrufRecord {
        AnrufRecord {
            id: CallId::new(),
            room_id: RoomId::new(),
            conversation_id: ConversationId::new(),
            call_kind: AnrufArt::Video,
            status: AnrufStatus::Accepted,
            initiated_by: UserId::new(),
            accepted_by: None,
            accepted_at,
            rejected_by: None,
            rejected_at: None,
            reject_reason: None,
            ended_by: None,
            ended_at: None,
            end_reason: None,
            duration_seconds: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn dauer_aus_annahmezeit() {
        let jetzt = Utc::now();
        let a = anruf(Some(jetzt - Duration::seconds(75)));
        assert_eq!(dauer_berechnen(&a, None, jetzt), Some(75));
    }

    #[test]
    fn gelieferte_dauer_hat_vorrang() {
        let jetzt = Utc::now();
        let a = anruf(Some(jetzt - Duration::seconds(75)));
        assert_eq!(dauer_berechnen(&a, Some(120), jetzt), Some(120));
    }

    #[test]
    fn nie_angenommen_keine_dauer() {
        assert_eq!(dauer_berechnen(&anruf(None), Some(120), Utc::now()), None);
    }

    #[test]
    fn negative_dauer_ist_ungueltig() {
        assert!(dauer_pruefen(Some(-1)).is_err());
        assert!(dauer_pruefen(Some(0)).is_ok());
        assert!(dauer_pruefen(None).is_ok());
    }

    #[test]
    fn leerer_grund_faellt_auf_standard() {
        assert_eq!(grund_oder(Some("  ".into()), "hangup"), "hangup");
        assert_eq!(grund_oder(None, "hangup"), "hangup");
        assert_eq!(grund_oder(Some("network".into()), "hangup"), "network");
    }
}
