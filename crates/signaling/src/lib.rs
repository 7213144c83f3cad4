//! callroom-signaling – Anruf-Zustandsmaschine und Raum-Lebenszyklus
//!
//! Bausteine:
//! - [`RoomStore`]: Raeume und Teilnehmer, Provider-Anbindung
//! - [`CallEngine`]: Anruf-Zustandsmaschine mit Fanout pro Uebergang
//! - [`ExpiryReaper`]: periodische Korrektur abgelaufener Anrufe und Raeume
//! - [`ChannelFanout`]: Zustellung ueber eine Queue pro Beobachter

pub mod ansicht;
pub mod antwort;
pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
pub mod reaper;
pub mod room_store;

pub use antwort::{
    AblehnAnfrage, AnrufAbgelehnt, AnrufAngenommen, AnrufBeendet, AnrufGestartet, AnrufUebersicht,
    EndAnfrage, RaumAktion, RaumBeendet, StartAnfrage,
};
pub use broadcast::ChannelFanout;
pub use config::SignalingKonfig;
pub use engine::CallEngine;
pub use error::{SignalingError, SignalingResult};
pub use reaper::{ExpiryReaper, ReaperBericht};
pub use room_store::{RoomStore, TeilnehmerUebergang};

use callroom_db::{CallRepository, ConversationRepository, ParticipantRepository, RoomRepository};

/// Alle Repository-Traits die Engine und RoomStore benoetigen
pub trait Speicher:
    RoomRepository + ParticipantRepository + CallRepository + ConversationRepository + 'static
{
}

impl<T> Speicher for T where
    T: RoomRepository + ParticipantRepository + CallRepository + ConversationRepository + 'static
{
}

#[cfg(test)]
mod tests;
