//! callroom-core – Gemeinsame Typen, Ereignisse und Traits
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Callroom-Crates gemeinsam genutzt werden.

pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use event::{EreignisArt, NotificationFanout, SignalEreignis, ZugestelltesEreignis};
pub use types::{
    AblehnGrund, AnrufArt, AnrufStatus, CallId, ConversationId, RaumStatus, RoomId,
    TeilnehmerStatus, UserId,
};
