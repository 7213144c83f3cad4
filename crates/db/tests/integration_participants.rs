//! Integration-Tests fuer ParticipantRepository und ConversationRepository

use callroom_core::types::{AnrufArt, ConversationId, RoomId, TeilnehmerStatus, UserId};
use callroom_db::{
    models::{NeuerRaum, RaumRecord},
    ConversationRepository, ParticipantRepository, RoomRepository, SqliteDb,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

async fn db() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

fn basis() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

async fn raum(db: &SqliteDb, ersteller: UserId) -> RaumRecord {
    RoomRepository::create_room(
        db,
        NeuerRaum {
            id: RoomId::new(),
            conversation_id: ConversationId::new(),
            call_kind: AnrufArt::Video,
            provider_meeting_id: None,
            participant_url: "https://meet.example/x",
            host_url: None,
            created_by: ersteller,
            created_at: basis(),
            expires_at: None,
        },
    )
    .await
    .expect("Raum erstellen fehlgeschlagen")
}

#[tokio::test]
async fn einladen_ist_idempotent() {
    let db = db().await;
    let r = raum(&db, UserId::new()).await;
    let bob = UserId::new();

    assert!(ParticipantRepository::add_invited(&db, r.id, bob, basis()).await.unwrap());
    assert!(!ParticipantRepository::add_invited(&db, r.id, bob, basis()).await.unwrap());

    let liste = ParticipantRepository::list_participants(&db, r.id).await.unwrap();
    assert_eq!(liste.len(), 2);
}

#[tokio::test]
async fn einladen_aendert_bestehenden_status_nicht() {
    let db = db().await;
    let alice = UserId::new();
    let r = raum(&db, alice).await;

    // Ersteller ist joined und bleibt es
    assert!(!ParticipantRepository::add_invited(&db, r.id, alice, basis()).await.unwrap());
    let t = ParticipantRepository::get_participant(&db, r.id, alice).await.unwrap().unwrap();
    assert_eq!(t.status, TeilnehmerStatus::Joined);
}

#[tokio::test]
async fn einladen_in_beendeten_raum_wird_ignoriert() {
    let db = db().await;
    let r = raum(&db, UserId::new()).await;
    RoomRepository::end_room(&db, r.id, "hangup", basis()).await.unwrap();

    let bob = UserId::new();
    assert!(!ParticipantRepository::add_invited(&db, r.id, bob, basis()).await.unwrap());
    assert!(ParticipantRepository::get_participant(&db, r.id, bob).await.unwrap().is_none());
}

#[tokio::test]
async fn beitreten_und_verlassen_nur_vorwaerts() {
    let db = db().await;
    let r = raum(&db, UserId::new()).await;
    let bob = UserId::new();
    ParticipantRepository::add_invited(&db, r.id, bob, basis()).await.unwrap();

    let beitritt = basis() + Duration::seconds(10);
    let t = ParticipantRepository::transition_participant(
        &db,
        r.id,
        bob,
        &[TeilnehmerStatus::Invited],
        TeilnehmerStatus::Joined,
        beitritt,
    )
    .await
    .unwrap()
    .expect("Beitreten sollte gelingen");
    assert_eq!(t.status, TeilnehmerStatus::Joined);
    assert_eq!(t.joined_at, Some(beitritt));
    assert_eq!(ParticipantRepository::count_joined(&db, r.id).await.unwrap(), 2);

    let gehen = basis() + Duration::seconds(20);
    let t = ParticipantRepository::transition_participant(
        &db,
        r.id,
        bob,
        &[TeilnehmerStatus::Invited, TeilnehmerStatus::Joined],
        TeilnehmerStatus::Left,
        gehen,
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(t.status, TeilnehmerStatus::Left);
    assert_eq!(t.left_at, Some(gehen));
    assert_eq!(t.joined_at, Some(beitritt));

    // left -> joined ist kein erlaubter Ausgangszustand
    let zurueck = ParticipantRepository::transition_participant(
        &db,
        r.id,
        bob,
        &[TeilnehmerStatus::Invited],
        TeilnehmerStatus::Joined,
        gehen,
    )
    .await
    .unwrap();
    assert!(zurueck.is_none());
}

#[tokio::test]
async fn beitreten_in_beendeten_raum_scheitert() {
    let db = db().await;
    let r = raum(&db, UserId::new()).await;
    let bob = UserId::new();
    ParticipantRepository::add_invited(&db, r.id, bob, basis()).await.unwrap();
    RoomRepository::end_room(&db, r.id, "hangup", basis()).await.unwrap();

    let t = ParticipantRepository::transition_participant(
        &db,
        r.id,
        bob,
        &[TeilnehmerStatus::Invited],
        TeilnehmerStatus::Joined,
        basis(),
    )
    .await
    .unwrap();
    assert!(t.is_none());
}

#[tokio::test]
async fn konversations_mitglieder_verwalten() {
    let db = db().await;
    let konversation = ConversationId::new();
    let alice = UserId::new();
    let bob = UserId::new();

    ConversationRepository::add_member(&db, konversation, bob, "Bob").await.unwrap();
    ConversationRepository::add_member(&db, konversation, alice, "Alice").await.unwrap();
    let umbenannt = ConversationRepository::add_member(&db, konversation, bob, "Robert")
        .await
        .unwrap();
    assert_eq!(umbenannt.display_name, "Robert");

    let mitglieder = ConversationRepository::members(&db, konversation).await.unwrap();
    let namen: Vec<&str> = mitglieder.iter().map(|m| m.display_name.as_str()).collect();
    assert_eq!(namen, vec!["Alice", "Robert"]);

    assert!(ConversationRepository::remove_member(&db, konversation, bob).await.unwrap());
    assert!(!ConversationRepository::remove_member(&db, konversation, bob).await.unwrap());
    assert_eq!(ConversationRepository::members(&db, konversation).await.unwrap().len(), 1);
    assert!(ConversationRepository::members(&db, ConversationId::new())
        .await
        .unwrap()
        .is_empty());
}
