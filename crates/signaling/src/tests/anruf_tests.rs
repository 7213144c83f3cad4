//! Tests fuer den Anruf-Lebenszyklus

use std::sync::Arc;

use callroom_core::event::EreignisArt;
use callroom_core::types::{
    AblehnGrund, AnrufArt, AnrufStatus, RaumStatus, TeilnehmerStatus, UserId,
};
use callroom_db::{CallRepository, ParticipantRepository, RoomRepository};
use serde_json::json;

use super::*;
use crate::{AblehnAnfrage, EndAnfrage, SignalingError};

fn ist_veraltet(e: &SignalingError) -> bool {
    matches!(e, SignalingError::VeralteterUebergang { .. })
}

#[tokio::test]
async fn test_anruf_starten_legt_raum_und_teilnehmer_an() {
    let u = umgebung().await;
    let mut rx_alice = u.fanout.client_registrieren(u.alice);
    let mut rx_bob = u.fanout.client_registrieren(u.bob);

    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Video))
        .await
        .expect("Anruf starten fehlgeschlagen");

    let anruf = u.db.get_call(gestartet.call_id).await.unwrap().unwrap();
    assert_eq!(anruf.status, AnrufStatus::Initiated);
    assert_eq!(anruf.initiated_by, u.alice);

    let raum = u.db.get_room(gestartet.room_id).await.unwrap().unwrap();
    assert_eq!(raum.status, RaumStatus::Active);
    assert_eq!(raum.participant_url, gestartet.participant_url);
    assert!(gestartet.participant_url.starts_with(FALLBACK_BASIS));
    assert!(gestartet.expires_at.is_some());

    let teilnehmer = u.db.list_participants(gestartet.room_id).await.unwrap();
    assert_eq!(teilnehmer.len(), 2);
    let status_von = |user: UserId| teilnehmer.iter().find(|t| t.user_id == user).unwrap().status;
    assert_eq!(status_von(u.alice), TeilnehmerStatus::Joined);
    assert_eq!(status_von(u.bob), TeilnehmerStatus::Invited);

    // Beide Mitglieder erhalten genau ein vollstaendiges Ereignis
    let bei_alice = ereignisse(&mut rx_alice);
    let bei_bob = ereignisse(&mut rx_bob);
    assert_eq!(bei_alice.len(), 1);
    assert_eq!(bei_bob.len(), 1);

    let e = &bei_bob[0].ereignis;
    assert_eq!(e.event, EreignisArt::AnrufGestartet);
    assert_eq!(e.actor_id, Some(u.alice));
    assert_eq!(e.call.as_ref().unwrap().id, gestartet.call_id);
    assert_eq!(e.room.id, gestartet.room_id);
    assert_eq!(e.participants.len(), 2);
    assert!(e.participants.iter().any(|t| t.display_name == "Alice"));

    assert_eq!(u.metriken.anrufe_gestartet.get(), 1);
}

#[tokio::test]
async fn test_annehmen_und_beenden_mit_dauer() {
    let u = umgebung().await;
    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Video))
        .await
        .unwrap();

    let angenommen = u.engine.annehmen(u.bob, gestartet.call_id).await.unwrap();
    assert_eq!(angenommen.room_id, gestartet.room_id);
    assert_eq!(angenommen.room_url, gestartet.participant_url);

    let anruf = u.db.get_call(gestartet.call_id).await.unwrap().unwrap();
    assert_eq!(anruf.status, AnrufStatus::Accepted);
    assert_eq!(anruf.accepted_by, Some(u.bob));
    let bob = u.db.get_participant(gestartet.room_id, u.bob).await.unwrap().unwrap();
    assert_eq!(bob.status, TeilnehmerStatus::Joined);

    let beendet = u
        .engine
        .beenden(
            u.alice,
            gestartet.call_id,
            EndAnfrage {
                duration: Some(120),
                reason: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(beendet.duration, Some(120));

    let anruf = u.db.get_call(gestartet.call_id).await.unwrap().unwrap();
    assert_eq!(anruf.status, AnrufStatus::Ended);
    assert_eq!(anruf.duration_seconds, Some(120));
    assert_eq!(anruf.end_reason.as_deref(), Some("hangup"));
    assert_eq!(anruf.ended_by, Some(u.alice));

    let raum = u.db.get_room(gestartet.room_id).await.unwrap().unwrap();
    assert_eq!(raum.status, RaumStatus::Ended);
    let teilnehmer = u.db.list_participants(gestartet.room_id).await.unwrap();
    assert!(teilnehmer.iter().all(|t| t.status == TeilnehmerStatus::Left));
}

#[tokio::test]
async fn test_ereignisse_in_kausaler_reihenfolge() {
    let u = umgebung().await;
    let mut rx = u.fanout.client_registrieren(u.alice);

    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Voice))
        .await
        .unwrap();
    u.engine.klingeln(u.bob, gestartet.call_id).await.unwrap();
    u.engine.annehmen(u.bob, gestartet.call_id).await.unwrap();
    u.engine
        .beenden(u.bob, gestartet.call_id, EndAnfrage::default())
        .await
        .unwrap();

    assert_eq!(
        arten(&mut rx),
        vec![
            EreignisArt::AnrufGestartet,
            EreignisArt::AnrufKlingelt,
            EreignisArt::AnrufAngenommen,
            EreignisArt::AnrufBeendet,
        ]
    );
}

#[tokio::test]
async fn test_klingeln_ist_idempotent() {
    let u = umgebung().await;
    let mut rx = u.fanout.client_registrieren(u.bob);
    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Voice))
        .await
        .unwrap();

    let erste = u.engine.klingeln(u.bob, gestartet.call_id).await.unwrap();
    let zweite = u.engine.klingeln(u.bob, gestartet.call_id).await.unwrap();
    assert_eq!(erste.status, AnrufStatus::Ringing);
    assert_eq!(zweite.status, AnrufStatus::Ringing);

    assert_eq!(
        arten(&mut rx),
        vec![EreignisArt::AnrufGestartet, EreignisArt::AnrufKlingelt]
    );

    // Der Anrufer selbst kann nicht klingeln
    let err = u.engine.klingeln(u.alice, gestartet.call_id).await.unwrap_err();
    assert!(matches!(err, SignalingError::ZugriffVerweigert(_)));
}

#[tokio::test]
async fn test_ablehnen_beendet_raum() {
    let u = umgebung().await;
    let mut rx = u.fanout.client_registrieren(u.alice);
    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Video))
        .await
        .unwrap();

    let abgelehnt = u
        .engine
        .ablehnen(
            u.bob,
            gestartet.call_id,
            AblehnAnfrage {
                reason: Some(AblehnGrund::Busy),
            },
        )
        .await
        .unwrap();
    assert_eq!(abgelehnt.reason, Some(AblehnGrund::Busy));

    let anruf = u.db.get_call(gestartet.call_id).await.unwrap().unwrap();
    assert_eq!(anruf.status, AnrufStatus::Rejected);
    assert_eq!(anruf.rejected_by, Some(u.bob));
    assert!(anruf.accepted_at.is_none());

    let raum = u.db.get_room(gestartet.room_id).await.unwrap().unwrap();
    assert_eq!(raum.status, RaumStatus::Ended);
    assert_eq!(raum.end_reason.as_deref(), Some("rejected"));

    // Ein einziges Ereignis mit dem Endzustand von Anruf und Raum
    let alle = ereignisse(&mut rx);
    assert_eq!(alle.len(), 2);
    let letztes = &alle[1].ereignis;
    assert_eq!(letztes.event, EreignisArt::AnrufAbgelehnt);
    assert_eq!(letztes.room.status, RaumStatus::Ended);
}

#[tokio::test]
async fn test_terminaler_anruf_ist_unveraenderlich() {
    let u = umgebung().await;
    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Voice))
        .await
        .unwrap();
    u.engine
        .beenden(u.alice, gestartet.call_id, EndAnfrage::default())
        .await
        .unwrap();

    let annehmen = u.engine.annehmen(u.bob, gestartet.call_id).await.unwrap_err();
    let ablehnen = u
        .engine
        .ablehnen(u.bob, gestartet.call_id, AblehnAnfrage::default())
        .await
        .unwrap_err();
    let beenden = u
        .engine
        .beenden(u.bob, gestartet.call_id, EndAnfrage::default())
        .await
        .unwrap_err();
    let klingeln = u.engine.klingeln(u.bob, gestartet.call_id).await.unwrap_err();

    for e in [&annehmen, &ablehnen, &beenden, &klingeln] {
        assert!(ist_veraltet(e), "erwartet VeralteterUebergang, war {e:?}");
        assert_eq!(e.http_status(), 409);
    }

    let anruf = u.db.get_call(gestartet.call_id).await.unwrap().unwrap();
    assert_eq!(anruf.status, AnrufStatus::Ended);
    assert!(anruf.duration_seconds.is_none(), "nie angenommen, keine Dauer");
}

#[tokio::test]
async fn test_paralleles_annehmen_und_ablehnen() {
    let u = umgebung().await;
    let carol = UserId::new();
    mitglied(&u.db, u.konversation, carol, "Carol").await;

    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Video))
        .await
        .unwrap();

    let (annehmen, ablehnen) = tokio::join!(
        u.engine.annehmen(u.bob, gestartet.call_id),
        u.engine.ablehnen(carol, gestartet.call_id, AblehnAnfrage::default()),
    );

    assert!(
        annehmen.is_ok() ^ ablehnen.is_ok(),
        "genau ein Uebergang darf gewinnen"
    );
    if let Err(e) = &annehmen {
        assert!(ist_veraltet(e));
    }
    if let Err(e) = &ablehnen {
        assert!(ist_veraltet(e));
    }

    let anruf = u.db.get_call(gestartet.call_id).await.unwrap().unwrap();
    assert!(!(anruf.accepted_at.is_some() && anruf.rejected_at.is_some()));
}

#[tokio::test]
async fn test_viele_parallele_annahmen_genau_eine_gewinnt() {
    let u = umgebung().await;
    let mut angerufene = vec![u.bob];
    for i in 0..4 {
        let user = UserId::new();
        mitglied(&u.db, u.konversation, user, &format!("Gast {i}")).await;
        angerufene.push(user);
    }
    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Voice))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for user in angerufene {
        let engine = Arc::clone(&u.engine);
        let call_id = gestartet.call_id;
        handles.push(tokio::spawn(async move { engine.annehmen(user, call_id).await }));
    }

    let mut gewonnen = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => gewonnen += 1,
            Err(e) => assert!(ist_veraltet(&e)),
        }
    }
    assert_eq!(gewonnen, 1);
}

#[tokio::test]
async fn test_anrufer_kann_nicht_selbst_annehmen() {
    let u = umgebung().await;
    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Voice))
        .await
        .unwrap();

    let err = u.engine.annehmen(u.alice, gestartet.call_id).await.unwrap_err();
    assert!(matches!(err, SignalingError::ZugriffVerweigert(_)));
    let err = u
        .engine
        .ablehnen(u.alice, gestartet.call_id, AblehnAnfrage::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SignalingError::ZugriffVerweigert(_)));
}

#[tokio::test]
async fn test_fremde_duerfen_nicht_handeln() {
    let u = umgebung().await;
    let fremder = UserId::new();

    let err = u
        .engine
        .anruf_starten(fremder, start(u.konversation, AnrufArt::Voice))
        .await
        .unwrap_err();
    assert!(matches!(err, SignalingError::ZugriffVerweigert(_)));
    assert_eq!(err.http_status(), 403);

    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Voice))
        .await
        .unwrap();
    let err = u.engine.annehmen(fremder, gestartet.call_id).await.unwrap_err();
    assert!(matches!(err, SignalingError::ZugriffVerweigert(_)));
    let err = u.engine.anruf_uebersicht(fremder, gestartet.call_id).await.unwrap_err();
    assert!(matches!(err, SignalingError::ZugriffVerweigert(_)));
}

#[tokio::test]
async fn test_unbekannter_anruf_nicht_gefunden() {
    let u = umgebung().await;
    let err = u
        .engine
        .annehmen(u.bob, callroom_core::types::CallId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SignalingError::NichtGefunden(_)));
}

#[tokio::test]
async fn test_konversation_ohne_weitere_mitglieder() {
    let u = umgebung().await;
    let allein = callroom_core::types::ConversationId::new();
    mitglied(&u.db, allein, u.alice, "Alice").await;

    let err = u
        .engine
        .anruf_starten(u.alice, start(allein, AnrufArt::Voice))
        .await
        .unwrap_err();
    assert!(matches!(err, SignalingError::UngueltigeEingabe(_)));
}

#[tokio::test]
async fn test_nur_ein_aktiver_anruf_pro_konversation() {
    let u = umgebung().await;
    let erster = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Voice))
        .await
        .unwrap();

    let err = u
        .engine
        .anruf_starten(u.bob, start(u.konversation, AnrufArt::Video))
        .await
        .unwrap_err();
    match err {
        SignalingError::AnrufBereitsAktiv { call_id } => assert_eq!(call_id, erster.call_id),
        andere => panic!("Unerwarteter Fehler: {andere:?}"),
    }

    // Nach dem Ende ist ein neuer Anruf moeglich
    u.engine
        .beenden(u.alice, erster.call_id, EndAnfrage::default())
        .await
        .unwrap();
    u.engine
        .anruf_starten(u.bob, start(u.konversation, AnrufArt::Video))
        .await
        .expect("zweiter Anruf nach Ende");
}

#[tokio::test]
async fn test_parallele_starts_genau_einer_aktiv() {
    let u = umgebung().await;
    let (a, b) = tokio::join!(
        u.engine.anruf_starten(u.alice, start(u.konversation, AnrufArt::Voice)),
        u.engine.anruf_starten(u.bob, start(u.konversation, AnrufArt::Voice)),
    );
    assert!(a.is_ok() ^ b.is_ok());

    let aktiv = u
        .db
        .active_call_for_conversation(u.konversation)
        .await
        .unwrap()
        .expect("ein aktiver Anruf");
    let gewinner = a.or(b).unwrap();
    assert_eq!(aktiv.id, gewinner.call_id);
}

#[tokio::test]
async fn test_metadaten_werden_gespeichert() {
    let u = umgebung().await;
    let mut anfrage = start(u.konversation, AnrufArt::Video);
    anfrage.metadata = Some(json!({ "client": "desktop", "version": 3 }));

    let gestartet = u.engine.anruf_starten(u.alice, anfrage).await.unwrap();
    let uebersicht = u
        .engine
        .anruf_uebersicht(u.bob, gestartet.call_id)
        .await
        .unwrap();
    assert_eq!(
        uebersicht.call.metadata,
        Some(json!({ "client": "desktop", "version": 3 }))
    );
}

#[tokio::test]
async fn test_host_url_nur_fuer_ersteller() {
    let provider = TestProvider::ok();
    let u = umgebung_mit_provider(Arc::clone(&provider)).await;
    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Video))
        .await
        .unwrap();
    assert_eq!(gestartet.participant_url, "https://provider.example/raum-1");

    let fuer_alice = u.engine.anruf_uebersicht(u.alice, gestartet.call_id).await.unwrap();
    let fuer_bob = u.engine.anruf_uebersicht(u.bob, gestartet.call_id).await.unwrap();
    assert_eq!(
        fuer_alice.host_url.as_deref(),
        Some("https://provider.example/raum-1?roomKey=host")
    );
    assert!(fuer_bob.host_url.is_none());
    assert_eq!(fuer_bob.participants.len(), 2);

    // Der Provider-Raum wird beim Ende entfernt
    u.engine
        .beenden(u.alice, gestartet.call_id, EndAnfrage::default())
        .await
        .unwrap();
    assert_eq!(provider.geloeschte(), vec!["m-1".to_string()]);
}

#[tokio::test]
async fn test_provider_ausfall_ist_transparent() {
    let u = umgebung_mit_provider(TestProvider::kaputt()).await;
    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Video))
        .await
        .expect("Start muss trotz Provider-Ausfall gelingen");

    assert!(gestartet.participant_url.starts_with(FALLBACK_BASIS));
    let raum = u.db.get_room(gestartet.room_id).await.unwrap().unwrap();
    assert!(raum.provider_meeting_id.is_none());
    assert!(raum.host_url.is_none());
    assert_eq!(u.metriken.provider_fallbacks.get(), 1);

    // Der Rest des Lebenszyklus laeuft normal
    u.engine.annehmen(u.bob, gestartet.call_id).await.unwrap();
    u.engine
        .beenden(u.bob, gestartet.call_id, EndAnfrage::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_negative_dauer_abgelehnt() {
    let u = umgebung().await;
    let gestartet = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Voice))
        .await
        .unwrap();
    let err = u
        .engine
        .beenden(
            u.alice,
            gestartet.call_id,
            EndAnfrage {
                duration: Some(-5),
                reason: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SignalingError::UngueltigeEingabe(_)));

    let anruf = u.db.get_call(gestartet.call_id).await.unwrap().unwrap();
    assert_eq!(anruf.status, AnrufStatus::Initiated);
}

#[tokio::test]
async fn test_veraltete_operationen_hinterlassen_keine_sperren() {
    let u = umgebung().await;
    let mut beendete = Vec::new();
    for _ in 0..5 {
        let g = u
            .engine
            .anruf_starten(u.alice, start(u.konversation, AnrufArt::Voice))
            .await
            .unwrap();
        u.engine
            .beenden(u.alice, g.call_id, EndAnfrage::default())
            .await
            .unwrap();
        beendete.push(g);
    }
    assert_eq!(u.engine.offene_sperren(), 0);

    for g in &beendete {
        assert!(ist_veraltet(&u.engine.annehmen(u.bob, g.call_id).await.unwrap_err()));
        assert!(ist_veraltet(&u.engine.klingeln(u.bob, g.call_id).await.unwrap_err()));
        assert!(ist_veraltet(
            &u.engine
                .ablehnen(u.bob, g.call_id, AblehnAnfrage::default())
                .await
                .unwrap_err()
        ));
        assert!(ist_veraltet(
            &u.engine
                .beenden(u.alice, g.call_id, EndAnfrage::default())
                .await
                .unwrap_err()
        ));
        assert!(ist_veraltet(&u.engine.raum_beitreten(u.bob, g.room_id).await.unwrap_err()));
        u.engine.raum_verlassen(u.bob, g.room_id).await.unwrap();
        u.engine
            .raum_beenden(u.alice, g.room_id, EndAnfrage::default())
            .await
            .unwrap();
        let spaeter = chrono::Utc::now() + chrono::Duration::hours(2);
        assert!(!u.engine.raum_ablaufen(g.room_id, spaeter).await.unwrap());
    }
    assert_eq!(u.engine.offene_sperren(), 0);
}

#[tokio::test]
async fn test_sperren_nach_parallelen_annahmen_freigegeben() {
    let u = umgebung().await;
    let g = u
        .engine
        .anruf_starten(u.alice, start(u.konversation, AnrufArt::Video))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        u.engine.annehmen(u.bob, g.call_id),
        u.engine.annehmen(u.bob, g.call_id),
    );
    assert!(a.is_ok() != b.is_ok());
    // Der Raum ist noch aktiv, trotzdem haelt niemand mehr die Sperre
    assert_eq!(u.engine.offene_sperren(), 0);
}
