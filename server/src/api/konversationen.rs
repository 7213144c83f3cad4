//! REST-Handler fuer das Konversations-Verzeichnis
//!
//! Stellvertretend fuer den externen Konversations-Dienst: pflegt die
//! Mitglieder und Anzeigenamen, aus denen Engine-Berechtigungen und
//! Ereignis-Empfaenger abgeleitet werden.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use callroom_core::types::{ConversationId, UserId};
use callroom_db::{models::KonversationsMitglied, ConversationRepository};
use callroom_signaling::SignalingError;
use serde::{Deserialize, Serialize};

use crate::api::{akteur_aus_headers, antwort, body_oder_standard, fehler_antwort, uuid_aus_pfad, ApiState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MitgliedAnsicht {
    pub user_id: UserId,
    pub display_name: String,
}

impl From<KonversationsMitglied> for MitgliedAnsicht {
    fn from(m: KonversationsMitglied) -> Self {
        Self {
            user_id: m.user_id,
            display_name: m.display_name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MitgliedBody {
    #[serde(default)]
    pub display_name: Option<String>,
}

pub async fn mitglieder_auflisten(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(r) = akteur_aus_headers(&headers) {
        return r;
    }
    let konversation = match uuid_aus_pfad(&id) { Ok(u) => ConversationId::from(u), Err(r) => return r };
    let ergebnis = state
        .db
        .members(konversation)
        .await
        .map(|liste| liste.into_iter().map(MitgliedAnsicht::from).collect::<Vec<_>>())
        .map_err(SignalingError::from);
    antwort(StatusCode::OK, ergebnis)
}

pub async fn mitglied_setzen(
    State(state): State<ApiState>,
    Path((id, user)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(r) = akteur_aus_headers(&headers) {
        return r;
    }
    let konversation = match uuid_aus_pfad(&id) { Ok(u) => ConversationId::from(u), Err(r) => return r };
    let user_id = match uuid_aus_pfad(&user) { Ok(u) => UserId::from(u), Err(r) => return r };
    let body: MitgliedBody = match body_oder_standard(&body) { Ok(b) => b, Err(r) => return r };

    // Ohne Anzeigenamen erscheint die Benutzer-ID
    let name = body
        .display_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| user_id.to_string());

    let ergebnis = state
        .db
        .add_member(konversation, user_id, &name)
        .await
        .map(MitgliedAnsicht::from)
        .map_err(SignalingError::from);
    antwort(StatusCode::OK, ergebnis)
}

pub async fn mitglied_entfernen(
    State(state): State<ApiState>,
    Path((id, user)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(r) = akteur_aus_headers(&headers) {
        return r;
    }
    let konversation = match uuid_aus_pfad(&id) { Ok(u) => ConversationId::from(u), Err(r) => return r };
    let user_id = match uuid_aus_pfad(&user) { Ok(u) => UserId::from(u), Err(r) => return r };

    match state.db.remove_member(konversation, user_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => fehler_antwort(&SignalingError::nicht_gefunden(format!(
            "{user_id} ist kein Mitglied von {konversation}"
        ))),
        Err(e) => fehler_antwort(&SignalingError::from(e)),
    }
}
