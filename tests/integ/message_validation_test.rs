use crate::{AW_SPECIES, TestClient, TestServer, aw_config};

use birdquiz::model::client_message::{ClientMessage, ScoreFilter};

#[tokio::test]
async fn invalid_json_in_game_returns_an_error() {
    let server = TestServer::start().await;
    let mut host = TestClient::connect(&server.ws_url()).await;
    let player = host.register("Host").await;
    host.create_game(&player.token, aw_config(3, false)).await;

    host.send_raw_text("{not json").await;
    let message = host.expect_error().await;
    assert!(
        message.contains("Invalid") || message.contains("invalid"),
        "got: {message}"
    );
}

#[tokio::test]
async fn creating_a_game_for_an_unknown_country_fails() {
    let server = TestServer::start().await;
    let mut host = TestClient::connect(&server.ws_url()).await;
    let player = host.register("Host").await;

    let mut config = aw_config(3, false);
    config.country = "XX".to_string();
    host.send_json(&ClientMessage::CreateGame {
        player_token: player.token.clone(),
        config,
    })
    .await;

    let message = host.expect_error().await;
    assert!(message.contains("country"), "got: {message}");
}

#[tokio::test]
async fn answers_naming_unknown_things_are_rejected() {
    let server = TestServer::start().await;
    let mut host = TestClient::connect(&server.ws_url()).await;
    let player = host.register("Host").await;
    host.create_game(&player.token, aw_config(3, false)).await;
    let question = host.start_game().await;

    // Unknown species id.
    host.send_json(&ClientMessage::SubmitAnswer {
        question_id: question.id,
        species_id: 424242,
    })
    .await;
    let message = host.expect_error().await;
    assert!(message.contains("species"), "got: {message}");

    // Unknown question id.
    host.send_json(&ClientMessage::SubmitAnswer {
        question_id: 999_999,
        species_id: AW_SPECIES,
    })
    .await;
    let message = host.expect_error().await;
    assert!(message.contains("not found"), "got: {message}");
}

#[tokio::test]
async fn only_the_host_may_start_or_advance() {
    let server = TestServer::start().await;
    let mut host = TestClient::connect(&server.ws_url()).await;
    let host_player = host.register("Host").await;
    let game = host
        .create_game(&host_player.token, aw_config(3, true))
        .await;

    let mut guest = TestClient::connect(&server.ws_url()).await;
    let guest_player = guest.register("Guest").await;
    guest.join_game(&game.token, &guest_player.token).await;

    guest.send_json(&ClientMessage::StartGame).await;
    let message = guest.expect_error().await;
    assert!(message.contains("Only the host"), "got: {message}");

    host.start_game().await;
    guest.send_json(&ClientMessage::NextQuestion).await;
    let message = guest.expect_error().await;
    assert!(message.contains("Only the host"), "got: {message}");
}

#[tokio::test]
async fn a_bound_connection_cannot_open_a_second_role() {
    let server = TestServer::start().await;
    let mut host = TestClient::connect(&server.ws_url()).await;
    let player = host.register("Host").await;
    host.create_game(&player.token, aw_config(3, false)).await;

    host.send_json(&ClientMessage::CreateGame {
        player_token: player.token.clone(),
        config: aw_config(3, false),
    })
    .await;
    let message = host.expect_error().await;
    assert!(message.contains("Already in a game"), "got: {message}");
}

#[tokio::test]
async fn watchers_are_read_only() {
    let server = TestServer::start().await;
    let mut watcher = TestClient::connect(&server.ws_url()).await;
    watcher
        .send_json(&ClientMessage::Watch {
            filters: ScoreFilter::default(),
        })
        .await;
    // Initial listing.
    watcher.recv_msg().await;

    watcher.send_json(&ClientMessage::StartGame).await;
    let message = watcher.expect_error().await;
    assert!(message.contains("read-only"), "got: {message}");
}

#[tokio::test]
async fn advancing_a_not_started_game_fails() {
    let server = TestServer::start().await;
    let mut host = TestClient::connect(&server.ws_url()).await;
    let player = host.register("Host").await;
    host.create_game(&player.token, aw_config(3, false)).await;

    host.send_json(&ClientMessage::NextQuestion).await;
    let message = host.expect_error().await;
    assert!(message.contains("not started"), "got: {message}");
}
