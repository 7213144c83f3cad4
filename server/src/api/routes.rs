//! Route-Definitionen fuer die REST-API (/v1/...)

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::api::{anrufe, konversationen, raeume, ApiState};

/// Erstellt den vollstaendigen /v1/-Router
pub fn v1_router() -> Router<ApiState> {
    Router::new()
        // Anrufe
        .route("/v1/calls", post(anrufe::anruf_starten))
        .route("/v1/calls/:id", get(anrufe::anruf_lesen))
        .route("/v1/calls/:id/ring", post(anrufe::klingeln))
        .route("/v1/calls/:id/accept", post(anrufe::annehmen))
        .route("/v1/calls/:id/reject", post(anrufe::ablehnen))
        .route("/v1/calls/:id/end", post(anrufe::beenden))
        // Raeume
        .route("/v1/rooms/:id/join", post(raeume::beitreten))
        .route("/v1/rooms/:id/leave", post(raeume::verlassen))
        .route("/v1/rooms/:id/end", post(raeume::beenden))
        // Konversations-Verzeichnis
        .route(
            "/v1/conversations/:id/members",
            get(konversationen::mitglieder_auflisten),
        )
        .route(
            "/v1/conversations/:id/members/:user_id",
            put(konversationen::mitglied_setzen).delete(konversationen::mitglied_entfernen),
        )
}
