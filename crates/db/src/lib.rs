//! callroom-db – Speicher-Port
//!
//! Dieses Crate stellt das Repository-Pattern bereit: Traits fuer Raeume,
//! Teilnehmer, Anrufe und das Konversations-Verzeichnis sowie eine
//! SQLite-Implementierung mit eingebetteten Migrationen.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    CallRepository, ConversationRepository, DatabaseConfig, DbResult, ParticipantRepository,
    RoomRepository,
};
pub use sqlite::SqliteDb;
