//! REST-Handler fuer Raum-Endpunkte

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use callroom_core::types::{RoomId, UserId};
use callroom_signaling::EndAnfrage;

use crate::api::{akteur_aus_headers, antwort, body_oder_standard, uuid_aus_pfad, ApiState};

fn akteur_und_raum(headers: &HeaderMap, id: &str) -> Result<(UserId, RoomId), Response> {
    let akteur = akteur_aus_headers(headers)?;
    let room_id = RoomId::from(uuid_aus_pfad(id)?);
    Ok((akteur, room_id))
}

pub async fn beitreten(State(state): State<ApiState>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let (akteur, room_id) = match akteur_und_raum(&headers, &id) { Ok(x) => x, Err(r) => return r };
    antwort(StatusCode::OK, state.engine.raum_beitreten(akteur, room_id).await)
}

pub async fn verlassen(State(state): State<ApiState>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let (akteur, room_id) = match akteur_und_raum(&headers, &id) { Ok(x) => x, Err(r) => return r };
    antwort(StatusCode::OK, state.engine.raum_verlassen(akteur, room_id).await)
}

pub async fn beenden(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (akteur, room_id) = match akteur_und_raum(&headers, &id) { Ok(x) => x, Err(r) => return r };
    let anfrage: EndAnfrage = match body_oder_standard(&body) { Ok(a) => a, Err(r) => return r };
    antwort(StatusCode::OK, state.engine.raum_beenden(akteur, room_id, anfrage).await)
}
