use std::time::Duration;

use crate::{AW_SPECIES, TestClient, TestServer, aw_config};

use birdquiz::model::client_message::ClientMessage;
use birdquiz::model::server_message::ServerMessage;

/// Only the host can start a rematch; a refused request creates nothing.
#[tokio::test]
async fn rematch_is_refused_for_non_hosts() {
    let server = TestServer::start().await;

    let mut host = TestClient::connect(&server.ws_url()).await;
    let host_player = host.register("Host").await;
    let game = host
        .create_game(&host_player.token, aw_config(3, true))
        .await;

    let mut guest = TestClient::connect(&server.ws_url()).await;
    let guest_player = guest.register("Guest").await;
    guest.join_game(&game.token, &guest_player.token).await;

    guest.send_json(&ClientMessage::Rematch).await;
    let message = guest.expect_error().await;
    assert!(
        message.contains("Only the host"),
        "error must name the host requirement, got: {message}"
    );

    // Nobody got invited anywhere.
    host.recv_until("PlayersUpdate", |m| {
        matches!(m, ServerMessage::PlayersUpdate { .. })
    })
    .await;
    host.assert_no_message(Duration::from_millis(200)).await;
}

/// A host rematch clones the configuration into a fresh game and invites
/// the whole group; the old game keeps running independently.
#[tokio::test]
async fn host_rematch_invites_the_group_to_a_fresh_game() {
    let server = TestServer::start().await;

    let mut host = TestClient::connect(&server.ws_url()).await;
    let host_player = host.register("Host").await;
    let game = host
        .create_game(&host_player.token, aw_config(3, true))
        .await;

    let mut guest = TestClient::connect(&server.ws_url()).await;
    let guest_player = guest.register("Guest").await;
    guest.join_game(&game.token, &guest_player.token).await;

    // Play one question in the old game before the rematch.
    let q1 = host.start_game().await;
    guest.expect_question().await;
    host.submit_answer(q1.id, AW_SPECIES).await;

    host.send_json(&ClientMessage::Rematch).await;
    let invite = |m: &ServerMessage| matches!(m, ServerMessage::RematchInvite { .. });
    let host_invite = host.recv_until("RematchInvite", invite).await;
    let guest_invite = guest.recv_until("RematchInvite", invite).await;

    let new_token = match (host_invite, guest_invite) {
        (
            ServerMessage::RematchInvite { game_token: a },
            ServerMessage::RematchInvite { game_token: b },
        ) => {
            assert_eq!(a, b, "the whole group gets the same invite");
            assert_ne!(a, game.token, "rematch must be a different game");
            a
        }
        other => panic!("Expected two invites, got {other:?}"),
    };

    // The new game starts empty, with the old configuration.
    let mut rejoined = TestClient::connect(&server.ws_url()).await;
    let fresh = rejoined.join_game(&new_token, &guest_player.token).await;
    assert!(!fresh.started);
    assert!(!fresh.ended);
    assert_eq!(fresh.progress, 0);
    assert_eq!(fresh.country.code, game.country.code);
    assert_eq!(fresh.length, game.length);
    assert_eq!(fresh.host, "Host");

    // The old game is untouched: the guest can still answer question 1.
    let late_answer = guest.submit_answer(q1.id, AW_SPECIES).await;
    assert!(late_answer.correct);
}
