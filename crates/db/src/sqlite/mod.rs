//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod calls;
pub mod conversations;
pub mod participants;
pub mod pool;
pub mod rooms;

pub use pool::SqliteDb;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row as _;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::DbResult;

/// Zeitformat mit fester Breite, damit Strings lexikografisch vergleichbar sind
const ZEITFORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub(crate) fn zeit_str(zeit: DateTime<Utc>) -> String {
    zeit.format(ZEITFORMAT).to_string()
}

pub(crate) fn parse_zeit(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Fallback fuer SQLite datetime()-Format ohne 'T' und 'Z'
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| DbError::intern(format!("Ungueltige Zeitangabe '{s}': {e}")))
}

pub(crate) fn zeit_aus(row: &SqliteRow, spalte: &str) -> DbResult<DateTime<Utc>> {
    let s: String = row.try_get(spalte)?;
    parse_zeit(&s)
}

pub(crate) fn opt_zeit_aus(row: &SqliteRow, spalte: &str) -> DbResult<Option<DateTime<Utc>>> {
    let s: Option<String> = row.try_get(spalte)?;
    s.as_deref().map(parse_zeit).transpose()
}

pub(crate) fn id_aus<T: From<Uuid>>(row: &SqliteRow, spalte: &str) -> DbResult<T> {
    let s: String = row.try_get(spalte)?;
    Uuid::parse_str(&s)
        .map(T::from)
        .map_err(|e| DbError::intern(format!("Ungueltige UUID in {spalte} '{s}': {e}")))
}

pub(crate) fn opt_id_aus<T: From<Uuid>>(row: &SqliteRow, spalte: &str) -> DbResult<Option<T>> {
    let s: Option<String> = row.try_get(spalte)?;
    s.as_deref()
        .map(|s| {
            Uuid::parse_str(s)
                .map(T::from)
                .map_err(|e| DbError::intern(format!("Ungueltige UUID in {spalte} '{s}': {e}")))
        })
        .transpose()
}

pub(crate) fn enum_aus<T: FromStr<Err = String>>(row: &SqliteRow, spalte: &str) -> DbResult<T> {
    let s: String = row.try_get(spalte)?;
    s.parse().map_err(DbError::UngueltigeDaten)
}

/// `?, ?, ?` fuer eine IN-Liste der Laenge `n`
pub(crate) fn platzhalter(n: usize) -> String {
    vec!["?"; n].join(", ")
}
