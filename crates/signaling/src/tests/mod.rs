//! Szenario-Tests fuer CallEngine, RoomStore und ExpiryReaper
//!
//! Alle Tests laufen gegen In-Memory-SQLite mit einem skriptbaren
//! Meeting-Provider und den Queues des ChannelFanout.

mod anruf_tests;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use callroom_core::event::{EreignisArt, ZugestelltesEreignis};
use callroom_core::types::{AnrufArt, ConversationId, UserId};
use callroom_db::{ConversationRepository, SqliteDb};
use callroom_meeting::{MeetingAdapter, MeetingProvider, ProviderError, ProviderRaum, ProviderResult};
use callroom_observability::CallroomMetrics;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::{CallEngine, ChannelFanout, SignalingKonfig, StartAnfrage};

pub(crate) const FALLBACK_BASIS: &str = "https://meet.callroom.local";

/// Provider der entweder feste Raeume liefert oder immer scheitert
#[derive(Default)]
pub(crate) struct TestProvider {
    pub fehlschlagen: bool,
    pub erstellt: AtomicUsize,
    pub geloescht: Mutex<Vec<String>>,
}

impl TestProvider {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn kaputt() -> Arc<Self> {
        Arc::new(Self {
            fehlschlagen: true,
            ..Self::default()
        })
    }

    pub fn geloeschte(&self) -> Vec<String> {
        self.geloescht.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeetingProvider for TestProvider {
    async fn raum_erstellen(&self, _ablauf: DateTime<Utc>) -> ProviderResult<ProviderRaum> {
        if self.fehlschlagen {
            return Err(ProviderError::Status {
                status: 503,
                body: "wartung".into(),
            });
        }
        let n = self.erstellt.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ProviderRaum {
            meeting_id: format!("m-{n}"),
            teilnehmer_url: format!("https://provider.example/raum-{n}"),
            host_url: Some(format!("https://provider.example/raum-{n}?roomKey=host")),
        })
    }

    async fn raum_loeschen(&self, meeting_id: &str) -> ProviderResult<()> {
        self.geloescht.lock().unwrap().push(meeting_id.to_string());
        Ok(())
    }
}

/// Engine mit Datenbank, Fanout und einer Konversation aus Alice und Bob
pub(crate) struct Umgebung {
    pub engine: Arc<CallEngine<SqliteDb>>,
    pub db: Arc<SqliteDb>,
    pub fanout: ChannelFanout,
    pub metriken: CallroomMetrics,
    pub konversation: ConversationId,
    pub alice: UserId,
    pub bob: UserId,
}

pub(crate) async fn umgebung() -> Umgebung {
    umgebung_mit(MeetingAdapter::nur_fallback(FALLBACK_BASIS)).await
}

pub(crate) async fn umgebung_mit_provider(provider: Arc<TestProvider>) -> Umgebung {
    let provider: Arc<dyn MeetingProvider> = provider;
    umgebung_mit(MeetingAdapter::neu(
        Some(provider),
        FALLBACK_BASIS,
        Duration::from_millis(500),
    ))
    .await
}

pub(crate) async fn umgebung_mit(adapter: MeetingAdapter) -> Umgebung {
    umgebung_aufbauen(adapter, SignalingKonfig::default()).await
}

pub(crate) async fn umgebung_mit_konfig(konfig: SignalingKonfig) -> Umgebung {
    umgebung_aufbauen(MeetingAdapter::nur_fallback(FALLBACK_BASIS), konfig).await
}

async fn umgebung_aufbauen(adapter: MeetingAdapter, konfig: SignalingKonfig) -> Umgebung {
    let db = Arc::new(
        SqliteDb::in_memory()
            .await
            .expect("In-Memory-DB konnte nicht geoeffnet werden"),
    );
    let fanout = ChannelFanout::neu();
    let metriken = CallroomMetrics::neu().expect("Metriken");
    let engine = CallEngine::neu(
        Arc::clone(&db),
        adapter,
        Arc::new(fanout.clone()),
        metriken.clone(),
        konfig,
    );

    let konversation = ConversationId::new();
    let alice = UserId::new();
    let bob = UserId::new();
    mitglied(&db, konversation, alice, "Alice").await;
    mitglied(&db, konversation, bob, "Bob").await;

    Umgebung {
        engine,
        db,
        fanout,
        metriken,
        konversation,
        alice,
        bob,
    }
}

pub(crate) async fn mitglied(db: &SqliteDb, konversation: ConversationId, user: UserId, name: &str) {
    db.add_member(konversation, user, name)
        .await
        .expect("Mitglied anlegen fehlgeschlagen");
}

pub(crate) fn start(konversation: ConversationId, art: AnrufArt) -> StartAnfrage {
    StartAnfrage {
        conversation_id: konversation,
        call_kind: art,
        metadata: None,
    }
}

/// Liest alle bisher zugestellten Ereignisse aus einer Queue
pub(crate) fn ereignisse(rx: &mut mpsc::Receiver<ZugestelltesEreignis>) -> Vec<ZugestelltesEreignis> {
    let mut alle = Vec::new();
    while let Ok(e) = rx.try_recv() {
        alle.push(e);
    }
    alle
}

pub(crate) fn arten(rx: &mut mpsc::Receiver<ZugestelltesEreignis>) -> Vec<EreignisArt> {
    ereignisse(rx).into_iter().map(|e| e.ereignis.event).collect()
}
