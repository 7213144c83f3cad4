//! Umwandlung von Datensaetzen in oeffentliche Ansichten

use callroom_core::event::{AnrufAnsicht, RaumAnsicht, TeilnehmerAnsicht};
use callroom_db::models::{AnrufRecord, KonversationsMitglied, RaumRecord, TeilnehmerRecord};

pub fn anruf(a: &AnrufRecord) -> AnrufAnsicht {
    AnrufAnsicht {
        id: a.id,
        room_id: a.room_id,
        conversation_id: a.conversation_id,
        call_kind: a.call_kind,
        status: a.status,
        initiated_by: a.initiated_by,
        accepted_by: a.accepted_by,
        accepted_at: a.accepted_at,
        rejected_at: a.rejected_at,
        reject_reason: a.reject_reason,
        ended_at: a.ended_at,
        end_reason: a.end_reason.clone(),
        duration_seconds: a.duration_seconds,
        metadata: a.metadata.clone(),
        created_at: a.created_at,
    }
}

/// Raum ohne Host-URL
pub fn raum(r: &RaumRecord) -> RaumAnsicht {
    RaumAnsicht {
        id: r.id,
        conversation_id: r.conversation_id,
        call_kind: r.call_kind,
        status: r.status,
        participant_url: r.participant_url.clone(),
        created_by: r.created_by,
        created_at: r.created_at,
        ended_at: r.ended_at,
        expires_at: r.expires_at,
    }
}

/// Teilnehmer mit Anzeigenamen aus dem Konversations-Verzeichnis
///
/// Unbekannte Benutzer (z.B. inzwischen aus der Konversation entfernt)
/// erscheinen mit ihrer ID als Namen.
pub fn teilnehmer(
    liste: &[TeilnehmerRecord],
    mitglieder: &[KonversationsMitglied],
) -> Vec<TeilnehmerAnsicht> {
    liste
        .iter()
        .map(|t| TeilnehmerAnsicht {
            user_id: t.user_id,
            display_name: mitglieder
                .iter()
                .find(|m| m.user_id == t.user_id)
                .map(|m| m.display_name.clone())
                .unwrap_or_else(|| t.user_id.to_string()),
            status: t.status,
            joined_at: t.joined_at,
            left_at: t.left_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use callroom_core::types::{ConversationId, RoomId, TeilnehmerStatus, UserId};
    use chrono::Utc;

    #[test]
    fn anzeigename_mit_fallback() {
        let raum_id = RoomId::new();
        let bekannt = UserId::new();
        let unbekannt = UserId::new();
        let t = |user_id| TeilnehmerRecord {
            room_id: raum_id,
            user_id,
            status: TeilnehmerStatus::Invited,
            invited_at: Utc::now(),
            joined_at: None,
            left_at: None,
        };
        let mitglieder = vec![KonversationsMitglied {
            conversation_id: ConversationId::new(),
            user_id: bekannt,
            display_name: "Alice".into(),
        }];

        let ansichten = teilnehmer(&[t(bekannt), t(unbekannt)], &mitglieder);
        assert_eq!(ansichten[0].display_name, "Alice");
        assert_eq!(ansichten[1].display_name, unbekannt.to_string());
    }
}
