//! REST-Interface ueber der CallEngine (/v1/...)
//!
//! Die Authentifizierung uebernimmt das vorgeschaltete Gateway; es setzt den
//! Header `X-User-Id` mit der UUID des handelnden Benutzers.

pub mod anrufe;
pub mod konversationen;
pub mod raeume;
pub mod routes;

use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use callroom_core::types::UserId;
use callroom_db::SqliteDb;
use callroom_signaling::{CallEngine, SignalingError, SignalingResult};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use uuid::Uuid;

pub use routes::v1_router;

/// Header mit der ID des handelnden Benutzers
pub const AKTEUR_HEADER: &str = "x-user-id";

/// Axum-State fuer die REST-API
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<CallEngine<SqliteDb>>,
    pub db: Arc<SqliteDb>,
}

impl ApiState {
    pub fn neu(engine: Arc<CallEngine<SqliteDb>>, db: Arc<SqliteDb>) -> Self {
        Self { engine, db }
    }
}

/// Fehler-Body: `{ "error": { "code": ..., "message": ... } }`
fn fehler(status: StatusCode, code: &str, nachricht: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": nachricht.into() } })),
    )
        .into_response()
}

/// Bildet einen Engine-Fehler auf Status und Fehler-Body ab
pub fn fehler_antwort(e: &SignalingError) -> Response {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(code = e.code(), fehler = %e, "Anfrage fehlgeschlagen");
    }
    match e {
        SignalingError::AnrufBereitsAktiv { call_id } => (
            status,
            Json(json!({
                "error": { "code": e.code(), "message": e.to_string(), "callId": call_id }
            })),
        )
            .into_response(),
        _ => fehler(status, e.code(), e.to_string()),
    }
}

pub(crate) fn antwort<T: Serialize>(status: StatusCode, ergebnis: SignalingResult<T>) -> Response {
    match ergebnis {
        Ok(wert) => (status, Json(wert)).into_response(),
        Err(e) => fehler_antwort(&e),
    }
}

/// Liest den handelnden Benutzer aus dem `X-User-Id`-Header
pub fn akteur_aus_headers(headers: &HeaderMap) -> Result<UserId, Response> {
    let wert = headers
        .get(AKTEUR_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| fehler(StatusCode::UNAUTHORIZED, "unauthenticated", "X-User-Id-Header fehlt"))?;

    Uuid::parse_str(wert.trim())
        .map(UserId::from)
        .map_err(|_| fehler(StatusCode::BAD_REQUEST, "invalid_input", "X-User-Id ist keine UUID"))
}

/// Optionaler JSON-Body: leer ergibt den Standardwert
pub(crate) fn body_oder_standard<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| fehler(StatusCode::BAD_REQUEST, "invalid_input", format!("Ungueltiger Body: {e}")))
}

pub(crate) fn uuid_aus_pfad(roh: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(roh)
        .map_err(|_| fehler(StatusCode::BAD_REQUEST, "invalid_input", format!("Ungueltige ID: {roh}")))
}
