//! REST-Handler fuer Anruf-Endpunkte

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use callroom_core::types::{CallId, UserId};
use callroom_signaling::{AblehnAnfrage, EndAnfrage, SignalingError, StartAnfrage};

use crate::api::{
    akteur_aus_headers, antwort, body_oder_standard, fehler_antwort, uuid_aus_pfad, ApiState,
};

fn akteur_und_anruf(headers: &HeaderMap, id: &str) -> Result<(UserId, CallId), Response> {
    let akteur = akteur_aus_headers(headers)?;
    let call_id = CallId::from(uuid_aus_pfad(id)?);
    Ok((akteur, call_id))
}

pub async fn anruf_starten(State(state): State<ApiState>, headers: HeaderMap, body: Bytes) -> Response {
    let akteur = match akteur_aus_headers(&headers) { Ok(a) => a, Err(r) => return r };
    let anfrage: StartAnfrage = match serde_json::from_slice(&body) {
        Ok(a) => a,
        Err(e) => return fehler_antwort(&SignalingError::UngueltigeEingabe(format!("Ungueltiger Body: {e}"))),
    };
    antwort(StatusCode::CREATED, state.engine.anruf_starten(akteur, anfrage).await)
}

pub async fn anruf_lesen(State(state): State<ApiState>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let (akteur, call_id) = match akteur_und_anruf(&headers, &id) { Ok(x) => x, Err(r) => return r };
    antwort(StatusCode::OK, state.engine.anruf_uebersicht(akteur, call_id).await)
}

pub async fn klingeln(State(state): State<ApiState>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let (akteur, call_id) = match akteur_und_anruf(&headers, &id) { Ok(x) => x, Err(r) => return r };
    antwort(StatusCode::OK, state.engine.klingeln(akteur, call_id).await)
}

pub async fn annehmen(State(state): State<ApiState>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let (akteur, call_id) = match akteur_und_anruf(&headers, &id) { Ok(x) => x, Err(r) => return r };
    antwort(StatusCode::OK, state.engine.annehmen(akteur, call_id).await)
}

pub async fn ablehnen(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (akteur, call_id) = match akteur_und_anruf(&headers, &id) { Ok(x) => x, Err(r) => return r };
    let anfrage: AblehnAnfrage = match body_oder_standard(&body) { Ok(a) => a, Err(r) => return r };
    antwort(StatusCode::OK, state.engine.ablehnen(akteur, call_id, anfrage).await)
}

pub async fn beenden(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (akteur, call_id) = match akteur_und_anruf(&headers, &id) { Ok(x) => x, Err(r) => return r };
    let anfrage: EndAnfrage = match body_oder_standard(&body) { Ok(a) => a, Err(r) => return r };
    antwort(StatusCode::OK, state.engine.beenden(akteur, call_id, anfrage).await)
}
