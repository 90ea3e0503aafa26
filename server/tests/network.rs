use tokio::net::TcpListener;
use tokio::sync::mpsc;

use common::network::{Connection, Packet, Request, Response};
use common::{Outcome, ParticipantStatus, WagerError, WagerStatus};
use server::connection_manager::handle_listen_server;
use server::database::{DatabaseConnection, DbUser};
use server::database_manager::DatabaseManager;
use server::lifecycle::LifecycleController;
use server::notifier::{NotificationDispatcher, Notifier};
use server::wager_manager::WagerManager;

/// Spins up the full actor stack against an in-memory store and returns the
/// address the listener is accepting on.
async fn spawn_server(users: &[&str]) -> String {
    let mut db = DatabaseConnection::connect_mem().await.unwrap();
    for name in users {
        db.add_user(&DbUser::new(*name)).await.unwrap();
    }

    let (event_tx, event_rx) = mpsc::channel(64);
    let notifier = Notifier::new(event_tx);
    let mut dispatcher = NotificationDispatcher::new(event_rx);
    tokio::spawn(async move { dispatcher.dispatch().await });

    let (db_tx, db_rx) = mpsc::channel(32);
    let mut db_manager = DatabaseManager::new(db.clone(), db_rx);
    tokio::spawn(async move { db_manager.manage().await });

    let (wager_tx, wager_rx) = mpsc::channel(32);
    let controller = LifecycleController::new(db, notifier);
    let mut wager_manager = WagerManager::new(wager_rx, controller);
    tokio::spawn(async move { wager_manager.manage().await });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move { handle_listen_server(listener, db_tx, wager_tx).await });
    address
}

async fn login(address: &str, user: &str) -> Connection {
    let mut connection = Connection::connect(address).await.unwrap();
    connection
        .send(Packet::RequestPacket(Request::Login { user: user.into() }))
        .await
        .unwrap();
    let packet = connection.read().await.unwrap();
    assert_eq!(
        packet,
        Packet::ResponsePacket(Response::SuccessfulLogin {
            username: user.into()
        })
    );
    connection
}

async fn roundtrip(connection: &mut Connection, request: Request) -> Response {
    connection
        .send(Packet::RequestPacket(request))
        .await
        .unwrap();
    match connection.read().await.unwrap() {
        Packet::ResponsePacket(response) => response,
        other => panic!("unexpected packet: {other:?}"),
    }
}

#[tokio::test]
async fn a_wager_settles_end_to_end_over_the_wire() {
    let address = spawn_server(&["alice", "bob"]).await;
    let mut alice = login(&address, "alice").await;
    let mut bob = login(&address, "bob").await;

    let proposed = roundtrip(
        &mut alice,
        Request::ProposeWager {
            description: "first to the summit".into(),
            stake: 5,
            due_date: None,
            responders: vec!["bob".into()],
        },
    )
    .await;
    let Response::WagerProposed { wager_id } = proposed else {
        panic!("unexpected response: {proposed:?}");
    };

    let detail = roundtrip(
        &mut bob,
        Request::WagerDetail {
            wager_id: wager_id.clone(),
        },
    )
    .await;
    let Response::WagerDetail(Some(wager)) = detail else {
        panic!("unexpected response: {detail:?}");
    };
    assert_eq!(wager.status, WagerStatus::Proposed);
    let bob_row = wager
        .participants
        .iter()
        .find(|row| row.responder == "bob")
        .unwrap();
    assert_eq!(bob_row.status, ParticipantStatus::Invited);

    let answered = roundtrip(
        &mut bob,
        Request::RespondToInvitation {
            participant_id: bob_row.id.clone(),
            accept: true,
        },
    )
    .await;
    let Response::InvitationAnswered(result) = answered else {
        panic!("unexpected response: {answered:?}");
    };
    assert_eq!(result.wager_status, WagerStatus::Active);

    let declared = roundtrip(
        &mut bob,
        Request::DeclareOutcome {
            participant_id: bob_row.id.clone(),
            outcome: Outcome::Lost,
        },
    )
    .await;
    let Response::OutcomeDeclared(result) = declared else {
        panic!("unexpected response: {declared:?}");
    };
    assert!(!result.requires_confirmation);
    assert_eq!(result.wager_status, WagerStatus::Completed);

    let listing = roundtrip(&mut alice, Request::WagerData).await;
    let Response::WagerData(wagers) = listing else {
        panic!("unexpected response: {listing:?}");
    };
    assert_eq!(wagers.len(), 1);
    assert_eq!(wagers[0].status, WagerStatus::Completed);
    let alice_row = wagers[0]
        .participants
        .iter()
        .find(|row| row.responder == "alice")
        .unwrap();
    assert_eq!(alice_row.status, ParticipantStatus::Won);
}

#[tokio::test]
async fn lifecycle_failures_come_back_as_failed_responses() {
    let address = spawn_server(&["alice", "bob"]).await;
    let mut alice = login(&address, "alice").await;
    let mut bob = login(&address, "bob").await;

    let proposed = roundtrip(
        &mut alice,
        Request::ProposeWager {
            description: "rainy weekend".into(),
            stake: 1,
            due_date: None,
            responders: vec!["bob".into()],
        },
    )
    .await;
    let Response::WagerProposed { wager_id } = proposed else {
        panic!("unexpected response: {proposed:?}");
    };

    let blocked = roundtrip(&mut bob, Request::CancelWager { wager_id }).await;
    assert!(matches!(
        blocked,
        Response::Failed(WagerError::Authorization(_))
    ));
}
