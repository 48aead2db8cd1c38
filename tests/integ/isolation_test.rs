use std::collections::HashSet;
use std::time::Duration;

use crate::{AW_SPECIES, TestClient, TestServer, aw_config};

/// Two games progressing in an interleaved fashion never touch each other:
/// question ids stay disjoint and an advance in one game is invisible to
/// the other.
#[tokio::test]
async fn interleaved_games_stay_fully_isolated() {
    let server = TestServer::start().await;

    let mut alpha = TestClient::connect(&server.ws_url()).await;
    let alpha_player = alpha.register("Alpha").await;
    alpha
        .create_game(&alpha_player.token, aw_config(3, false))
        .await;

    let mut beta = TestClient::connect(&server.ws_url()).await;
    let beta_player = beta.register("Beta").await;
    beta.create_game(&beta_player.token, aw_config(3, false))
        .await;

    let mut alpha_ids = HashSet::new();
    let mut beta_ids = HashSet::new();

    let mut qa = alpha.start_game().await;
    let mut qb = beta.start_game().await;
    alpha_ids.insert(qa.id);
    beta_ids.insert(qb.id);
    assert_eq!(qa.number, 1);
    assert_eq!(qb.number, 1);

    // Alpha answers; Beta must hear nothing about it.
    alpha.submit_answer(qa.id, AW_SPECIES).await;
    qa = alpha.expect_question().await;
    alpha_ids.insert(qa.id);
    assert_eq!(qa.number, 2);
    beta.assert_no_message(Duration::from_millis(200)).await;

    // Beta catches up; Alpha hears nothing.
    beta.submit_answer(qb.id, AW_SPECIES).await;
    qb = beta.expect_question().await;
    beta_ids.insert(qb.id);
    assert_eq!(qb.number, 2);
    alpha.assert_no_message(Duration::from_millis(200)).await;

    // One more round each, in the opposite order.
    beta.submit_answer(qb.id, AW_SPECIES).await;
    qb = beta.expect_question().await;
    beta_ids.insert(qb.id);
    assert_eq!(qb.number, 3);

    alpha.submit_answer(qa.id, AW_SPECIES).await;
    qa = alpha.expect_question().await;
    alpha_ids.insert(qa.id);
    assert_eq!(qa.number, 3);

    assert!(
        alpha_ids.is_disjoint(&beta_ids),
        "question ids must never be shared across games"
    );
}

/// An answer routed by question id lands in the owning game even when
/// another game is mid-question.
#[tokio::test]
async fn answers_route_to_the_owning_game() {
    let server = TestServer::start().await;

    let mut alpha = TestClient::connect(&server.ws_url()).await;
    let alpha_player = alpha.register("Alpha").await;
    alpha
        .create_game(&alpha_player.token, aw_config(2, false))
        .await;

    let mut beta = TestClient::connect(&server.ws_url()).await;
    let beta_player = beta.register("Beta").await;
    beta.create_game(&beta_player.token, aw_config(2, false))
        .await;

    let qa = alpha.start_game().await;
    let qb = beta.start_game().await;

    // Beta answers Alpha's question id: recorded against Alpha's game, so
    // Beta's own question stays unanswered and open.
    let stray = beta.submit_answer(qa.id, AW_SPECIES).await;
    assert_eq!(stray.question_id, qa.id);

    let own = beta.submit_answer(qb.id, AW_SPECIES).await;
    assert_eq!(own.question_id, qb.id);
    assert!(own.correct);
}
