//! ChannelFanout – stellt Signal-Ereignisse ueber eine Queue pro Beobachter zu
//!
//! Transport-Schichten (WebSocket, Push) registrieren einen Beobachter und
//! lesen aus der zurueckgegebenen Queue. Die Reihenfolge pro Beobachter
//! entspricht der Reihenfolge der `ankuendigen`-Aufrufe.

use callroom_core::event::{NotificationFanout, SignalEreignis, ZugestelltesEreignis};
use callroom_core::types::UserId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Groesse der Zustell-Queue pro Beobachter
const SEND_QUEUE_GROESSE: usize = 64;

/// Handle auf die Queue eines Beobachters
#[derive(Clone, Debug)]
struct BeobachterSender {
    user_id: UserId,
    tx: mpsc::Sender<ZugestelltesEreignis>,
}

impl BeobachterSender {
    /// Reiht nicht-blockierend ein; `false` wenn die Queue voll oder geschlossen ist
    fn senden(&self, ereignis: ZugestelltesEreignis) -> bool {
        match self.tx.try_send(ereignis) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(e)) => {
                tracing::warn!(
                    user_id = %self.user_id,
                    event = %e.ereignis.event,
                    "Zustell-Queue voll, Ereignis verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(user_id = %self.user_id, "Zustell-Queue geschlossen (Beobachter getrennt)");
                false
            }
        }
    }
}

/// Fanout ueber In-Process-Queues
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ChannelFanout {
    inner: Arc<DashMap<UserId, BeobachterSender>>,
}

impl ChannelFanout {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert einen Beobachter und gibt seine Empfangs-Queue zurueck
    ///
    /// Eine erneute Registrierung ersetzt die vorherige Queue.
    pub fn client_registrieren(&self, user_id: UserId) -> mpsc::Receiver<ZugestelltesEreignis> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        self.inner.insert(user_id, BeobachterSender { user_id, tx });
        tracing::debug!(user_id = %user_id, "Beobachter registriert");
        rx
    }

    pub fn client_entfernen(&self, user_id: &UserId) {
        self.inner.remove(user_id);
        tracing::debug!(user_id = %user_id, "Beobachter entfernt");
    }

    pub fn ist_registriert(&self, user_id: &UserId) -> bool {
        self.inner.contains_key(user_id)
    }

    pub fn client_anzahl(&self) -> usize {
        self.inner.len()
    }
}

impl NotificationFanout for ChannelFanout {
    fn ankuendigen(&self, ereignis: SignalEreignis, beobachter: &[UserId]) -> usize {
        let ereignis = Arc::new(ereignis);
        let mut zugestellt = 0;

        for user_id in beobachter {
            let Some(sender) = self.inner.get(user_id) else {
                // Nicht verbunden: der Client resynchronisiert beim naechsten Ereignis
                continue;
            };
            let adressiert = ZugestelltesEreignis {
                empfaenger: *user_id,
                ereignis: Arc::clone(&ereignis),
            };
            if sender.senden(adressiert) {
                zugestellt += 1;
            }
        }

        tracing::debug!(
            event = %ereignis.event,
            room_id = %ereignis.room.id,
            beobachter = beobachter.len(),
            zugestellt,
            "Ereignis verteilt"
        );
        zugestellt
    }
}
