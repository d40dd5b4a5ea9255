#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    clippy::float_cmp
)]
//! End-to-end tests of the role clients over an in-memory connection.

mod common;

use std::time::Duration;

use quiz_sync_client::protocol::ClientMessage;
use quiz_sync_client::view::{OptionMark, QuestionStatus, Readiness, ScreenPanel, TablePanel};
use quiz_sync_client::{
    AdminClient, ClientUpdate, ConnectionState, Notice, Rejection, ScreenClient, TableClient,
};
use serde_json::{json, Value};
use tokio::time::Instant;

use common::{
    config, error_event, init_tracing, is_tick, loopback, question_json, screen_state,
    simple_question, table_entry, table_event, within, LoopbackServer, ServerEnd,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Start a table client and wait until its first connection is open.
async fn connected_table() -> (TableClient, LoopbackServer, ServerEnd) {
    init_tracing();
    let (connector, mut server) = loopback();
    let mut table = TableClient::start(connector, 3, config());
    let conn = server.accept().await;
    assert_eq!(
        within(table.next_update()).await,
        Some(ClientUpdate::Connected { epoch: 1 })
    );
    (table, server, conn)
}

/// Next update that is not a countdown tick.
async fn next_table_update(table: &mut TableClient) -> ClientUpdate {
    loop {
        let update = within(table.next_update()).await.expect("client stopped");
        if !is_tick(&update) {
            return update;
        }
    }
}

/// Push `snapshot` and wait until the client replaced its state with it.
async fn push_snapshot(table: &mut TableClient, conn: &ServerEnd, snapshot: &Value) {
    conn.push(snapshot);
    assert_eq!(next_table_update(table).await, ClientUpdate::StateReplaced);
}

/// Let the channel task flush anything that is in flight.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// ── Table ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn table_connects_to_its_own_endpoint() {
    init_tracing();
    let (connector, mut server) = loopback();
    let mut table = TableClient::start(connector, 7, config());

    let conn = server.accept().await;
    assert_eq!(conn.url, "ws://quiz.test/ws/table/7");
    assert_eq!(
        within(table.next_update()).await,
        Some(ClientUpdate::Connected { epoch: 1 })
    );
    assert_eq!(table.connection_state(), ConnectionState::Open);
    assert_eq!(table.panel(), TablePanel::Connecting);
}

#[tokio::test(start_paused = true)]
async fn snapshot_with_null_question_clears_the_question() {
    let (mut table, _server, conn) = connected_table().await;

    push_snapshot(
        &mut table,
        &conn,
        &table_event("in_question", "leader", simple_question()),
    )
    .await;
    assert_eq!(table.panel(), TablePanel::Question);
    assert!(table.view().question().is_some());

    push_snapshot(
        &mut table,
        &conn,
        &table_event("waiting_game_start", "leader", Value::Null),
    )
    .await;
    assert_eq!(table.panel(), TablePanel::Join);
    assert!(table.view().question().is_none());
    assert!(table.question_panel().is_none());
    assert!(!table.countdown().is_running());
}

#[tokio::test(start_paused = true)]
async fn observer_cannot_select_or_submit() {
    let (mut table, _server, mut conn) = connected_table().await;

    for state in ["waiting_game_start", "in_question", "in_answers"] {
        push_snapshot(
            &mut table,
            &conn,
            &table_event(state, "observer", simple_question()),
        )
        .await;
        assert_eq!(table.select_answer(0), Err(Rejection::NotLeader));
        assert_eq!(table.submit_answer(), Err(Rejection::NotLeader));
        assert_eq!(table.set_table_name("Owls"), Err(Rejection::NotLeader));
    }

    settle().await;
    assert!(table.selection().selected().is_empty());
    assert!(conn.drain_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn observer_mirrors_the_leaders_broadcast_selection() {
    let (mut table, _server, conn) = connected_table().await;

    let question = question_json(4, "multiple_choice", &["A", "B", "C"], &[0], 20.0, None);
    let mut snapshot = table_event("in_question", "observer", question);
    snapshot["table_answers"] = json!([0, 2]);
    push_snapshot(&mut table, &conn, &snapshot).await;

    let panel = table.question_panel().unwrap();
    let checked: Vec<bool> = panel.options.iter().map(|o| o.checked).collect();
    assert_eq!(checked, vec![true, false, true]);
    assert!(panel.statuses.contains(&QuestionStatus::ObservingLeader));
    assert!(panel.options.iter().all(|o| !o.enabled));
}

#[tokio::test(start_paused = true)]
async fn time_over_blocks_a_pending_answer() {
    let (mut table, _server, mut conn) = connected_table().await;
    push_snapshot(
        &mut table,
        &conn,
        &table_event("in_question", "leader", simple_question()),
    )
    .await;

    assert_eq!(table.select_answer(1).unwrap(), &[1]);
    assert_eq!(
        conn.next_sent().await,
        ClientMessage::SetTableAnswers {
            table_answers: vec![1]
        }
    );

    let started = Instant::now();
    let mut ticks = 0;
    loop {
        match within(table.next_update()).await.unwrap() {
            ClientUpdate::CountdownTick { .. } => ticks += 1,
            ClientUpdate::TimeOver => break,
            other => panic!("unexpected update {other:?}"),
        }
    }
    let elapsed = started.elapsed();
    assert_eq!(ticks, 99);
    assert!(elapsed >= Duration::from_secs(10), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(10_200), "elapsed {elapsed:?}");

    assert!(table.is_time_over());
    assert_eq!(table.countdown().current(), 0.0);
    assert_eq!(table.select_answer(0), Err(Rejection::TimeOver));
    assert_eq!(table.submit_answer(), Err(Rejection::TimeOver));
    assert_eq!(table.selection().selected(), &[1]);

    let panel = table.question_panel().unwrap();
    assert_eq!(panel.statuses, vec![QuestionStatus::TimeOver]);
    assert!(!panel.can_submit);

    settle().await;
    assert!(conn.drain_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn no_time_left_expires_immediately() {
    let (mut table, _server, conn) = connected_table().await;
    let question = question_json(2, "single_choice", &["A", "B"], &[0], 10.0, Some(0.0));
    conn.push(&table_event("in_question", "leader", question));

    assert_eq!(
        within(table.next_update()).await,
        Some(ClientUpdate::StateReplaced)
    );
    assert_eq!(within(table.next_update()).await, Some(ClientUpdate::TimeOver));
    assert_eq!(table.select_answer(0), Err(Rejection::TimeOver));
}

#[tokio::test(start_paused = true)]
async fn first_tick_to_zero_is_time_over() {
    let (mut table, _server, conn) = connected_table().await;
    let question = question_json(2, "single_choice", &["A", "B"], &[0], 10.0, Some(0.14));
    push_snapshot(&mut table, &conn, &table_event("in_question", "leader", question)).await;
    assert!(table.select_answer(0).is_ok());

    assert_eq!(within(table.next_update()).await, Some(ClientUpdate::TimeOver));
    assert!(table.is_time_over());
    assert_eq!(table.select_answer(1), Err(Rejection::TimeOver));
}

#[tokio::test(start_paused = true)]
async fn countdown_only_advances_while_polled() {
    let (mut table, _server, conn) = connected_table().await;
    push_snapshot(
        &mut table,
        &conn,
        &table_event("in_question", "leader", simple_question()),
    )
    .await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(table.countdown().current(), 10.0);
    assert!(!table.is_time_over());
    assert!(table.select_answer(0).is_ok());

    // A late poll processes one delayed tick, not the whole gap.
    assert_eq!(
        within(table.next_update()).await,
        Some(ClientUpdate::CountdownTick { remaining: 9.9 })
    );
}

#[tokio::test(start_paused = true)]
async fn submitted_answer_is_marked_on_reveal() {
    let (mut table, _server, mut conn) = connected_table().await;
    push_snapshot(
        &mut table,
        &conn,
        &table_event("in_question", "leader", simple_question()),
    )
    .await;

    table.select_answer(1).unwrap();
    table.submit_answer().unwrap();
    assert_eq!(
        conn.next_sent().await,
        ClientMessage::SetTableAnswers {
            table_answers: vec![1]
        }
    );
    assert_eq!(
        conn.next_sent().await,
        ClientMessage::AnswerQuestion {
            table_answers: vec![1]
        }
    );
    assert_eq!(table.submit_answer(), Err(Rejection::AlreadySubmitted));
    assert!(table.question_panel().unwrap().countdown.is_none());

    let mut revealed = table_event("in_answers", "leader", simple_question());
    revealed["table_answers"] = json!([1]);
    revealed["answered"] = json!(true);
    push_snapshot(&mut table, &conn, &revealed).await;

    let panel = table.question_panel().unwrap();
    let marks: Vec<OptionMark> = panel.options.iter().map(|o| o.mark).collect();
    assert_eq!(marks, vec![OptionMark::Correct, OptionMark::Incorrect]);
    assert!(panel.statuses.contains(&QuestionStatus::AnswerSent));
    assert!(panel.statuses.contains(&QuestionStatus::AnswersRevealed));
    assert_eq!(panel.images, vec!["a1.png".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn leader_role_comes_from_the_server() {
    let (mut table, _server, mut conn) = connected_table().await;
    push_snapshot(
        &mut table,
        &conn,
        &table_event("in_question", "observer", simple_question()),
    )
    .await;
    assert_eq!(table.select_answer(0), Err(Rejection::NotLeader));

    push_snapshot(
        &mut table,
        &conn,
        &table_event("in_question", "leader", simple_question()),
    )
    .await;
    assert_eq!(table.select_answer(0).unwrap(), &[0]);
    assert_eq!(
        conn.next_sent().await,
        ClientMessage::SetTableAnswers {
            table_answers: vec![0]
        }
    );
}

#[tokio::test(start_paused = true)]
async fn leader_names_the_table_before_the_game() {
    let (mut table, _server, mut conn) = connected_table().await;
    push_snapshot(
        &mut table,
        &conn,
        &table_event("waiting_game_start", "leader", Value::Null),
    )
    .await;

    assert!(table.join_panel().unwrap().can_edit_name);
    assert_eq!(table.set_table_name("   "), Err(Rejection::BlankName));
    assert_eq!(table.set_table_name("  Night Owls ").unwrap(), "Night Owls");
    assert_eq!(
        conn.next_sent().await,
        ClientMessage::SetTableName {
            table_name: "Night Owls".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn malformed_messages_are_dropped() {
    let (mut table, _server, conn) = connected_table().await;

    conn.push_raw("{not json");
    conn.push(&json!({"event_type": "confetti", "amount": 3}));
    conn.push(&table_event("waiting_leader", "observer", Value::Null));

    assert_eq!(next_table_update(&mut table).await, ClientUpdate::StateReplaced);
    assert_eq!(table.panel(), TablePanel::WaitingLeader);
}

#[tokio::test(start_paused = true)]
async fn server_errors_are_shown_verbatim() {
    let (mut table, _server, conn) = connected_table().await;
    push_snapshot(
        &mut table,
        &conn,
        &table_event("in_question", "leader", simple_question()),
    )
    .await;

    conn.push(&error_event("answer rejected"));
    assert_eq!(
        next_table_update(&mut table).await,
        ClientUpdate::Notice(Notice::ServerError("answer rejected".into()))
    );
    assert!(table.view().question().is_some());
}

#[tokio::test(start_paused = true)]
async fn reconnect_reseeds_the_countdown_from_the_new_snapshot() {
    let (mut table, mut server, conn) = connected_table().await;
    push_snapshot(
        &mut table,
        &conn,
        &table_event("in_question", "leader", simple_question()),
    )
    .await;

    // Let some local time pass.
    for _ in 0..5 {
        assert!(is_tick(&within(table.next_update()).await.unwrap()));
    }
    assert_eq!(table.countdown().current(), 9.5);

    drop(conn);
    assert_eq!(
        next_table_update(&mut table).await,
        ClientUpdate::Notice(Notice::Reconnecting)
    );
    assert_eq!(table.connection_state(), ConnectionState::ClosedPendingRetry);
    assert_eq!(table.select_answer(0), Err(Rejection::Disconnected));

    let conn = server.accept().await;
    assert_eq!(
        next_table_update(&mut table).await,
        ClientUpdate::Connected { epoch: 2 }
    );

    let question = question_json(1, "single_choice", &["A", "B"], &[0], 10.0, Some(4.0));
    push_snapshot(&mut table, &conn, &table_event("in_question", "leader", question)).await;
    assert_eq!(table.countdown().current(), 4.0);
    assert_eq!(table.countdown().total(), 10.0);
}

#[tokio::test(start_paused = true)]
async fn close_releases_the_connection() {
    let (table, server, conn) = connected_table().await;

    table.close().await;
    settle().await;
    assert!(conn.is_closed_by_client());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(server.attempts().len(), 1);
}

// ── Reconnection ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reconnect_attempts_repeat_until_close() {
    init_tracing();
    let (connector, server) = loopback();
    server.set_down(true);
    let mut admin = AdminClient::start(connector, config());

    for _ in 0..3 {
        assert_eq!(
            within(admin.next_update()).await,
            Some(ClientUpdate::Notice(Notice::Reconnecting))
        );
    }

    let attempts = server.attempts();
    assert_eq!(attempts.len(), 3);
    for pair in attempts.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(3000), "gap {gap:?}");
        assert!(gap < Duration::from_millis(3050), "gap {gap:?}");
    }

    admin.close().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(server.attempts().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn commands_while_disconnected_are_dropped_not_queued() {
    init_tracing();
    let (connector, mut server) = loopback();
    let mut admin = AdminClient::start(connector, config());

    let conn = server.accept().await;
    assert_eq!(
        within(admin.next_update()).await,
        Some(ClientUpdate::Connected { epoch: 1 })
    );

    drop(conn);
    assert_eq!(
        within(admin.next_update()).await,
        Some(ClientUpdate::Notice(Notice::Reconnecting))
    );
    assert!(!admin.start_game());

    let mut conn = server.accept().await;
    assert_eq!(
        within(admin.next_update()).await,
        Some(ClientUpdate::Connected { epoch: 2 })
    );
    assert!(admin.next_step());
    assert_eq!(conn.next_sent().await, ClientMessage::NextStep);

    settle().await;
    assert!(conn.drain_sent().is_empty());
}

// ── Screen ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn screen_lobby_and_answer_notices() {
    init_tracing();
    let (connector, mut server) = loopback();
    let mut screen = ScreenClient::start(connector, config());

    let conn = server.accept().await;
    assert_eq!(conn.url, "ws://quiz.test/ws/screen");
    assert_eq!(
        within(screen.next_update()).await,
        Some(ClientUpdate::Connected { epoch: 1 })
    );

    conn.push(&screen_state(
        "waiting",
        vec![
            table_entry(1, None, "waiting_leader"),
            table_entry(2, None, "waiting_game_start"),
            table_entry(3, Some("Owls"), "waiting_game_start"),
        ],
        Value::Null,
    ));
    assert_eq!(
        within(screen.next_update()).await,
        Some(ClientUpdate::StateReplaced)
    );
    assert_eq!(screen.panel(), ScreenPanel::Lobby);
    let lobby = screen.lobby();
    let colors: Vec<Readiness> = lobby.rows.iter().map(|r| r.readiness).collect();
    assert_eq!(
        colors,
        vec![Readiness::Red, Readiness::Yellow, Readiness::Green]
    );
    assert_eq!((lobby.ready, lobby.total), (1, 3));

    let before = screen.view().clone();
    conn.push(&json!({
        "event_type": "screen_table_answered",
        "table_id": 3,
        "table_name": "Owls",
        "last": true,
    }));
    assert_eq!(
        within(screen.next_update()).await,
        Some(ClientUpdate::Notice(Notice::TableAnswered {
            table_id: 3,
            table_name: Some("Owls".into())
        }))
    );
    assert_eq!(
        within(screen.next_update()).await,
        Some(ClientUpdate::Notice(Notice::AllTablesAnswered))
    );
    assert_eq!(screen.view(), &before);
}

#[tokio::test(start_paused = true)]
async fn screen_runs_its_own_countdown_during_questions() {
    init_tracing();
    let (connector, mut server) = loopback();
    let mut screen = ScreenClient::start(connector, config());
    let conn = server.accept().await;
    within(screen.next_update()).await;

    let question = question_json(9, "single_choice", &["A", "B"], &[1], 1.0, Some(0.3));
    conn.push(&screen_state(
        "in_question",
        vec![table_entry(1, Some("Owls"), "in_question")],
        question.clone(),
    ));
    assert_eq!(
        within(screen.next_update()).await,
        Some(ClientUpdate::StateReplaced)
    );
    assert_eq!(screen.panel(), ScreenPanel::Question);

    let mut updates = Vec::new();
    for _ in 0..3 {
        updates.push(within(screen.next_update()).await.unwrap());
    }
    assert_eq!(
        updates,
        vec![
            ClientUpdate::CountdownTick { remaining: 0.2 },
            ClientUpdate::CountdownTick { remaining: 0.1 },
            ClientUpdate::TimeOver,
        ]
    );

    conn.push(&screen_state(
        "in_answers",
        vec![table_entry(1, Some("Owls"), "in_answers")],
        question,
    ));
    assert_eq!(
        within(screen.next_update()).await,
        Some(ClientUpdate::StateReplaced)
    );
    let panel = screen.question_panel().unwrap();
    assert!(panel.revealed);
    assert!(panel.options[1].correct);
    assert!(panel.countdown.is_none());
}

#[tokio::test(start_paused = true)]
async fn screen_leaderboard_from_results() {
    init_tracing();
    let (connector, mut server) = loopback();
    let mut screen = ScreenClient::start(connector, config());
    let conn = server.accept().await;
    within(screen.next_update()).await;

    let mut state = screen_state("in_results", vec![], Value::Null);
    state["results"] = json!({
        "winers": [
            {"table_id": 2, "table_name": "Owls", "score": 7,
             "categories": {"art": 2, "math": 5}, "answers": {}},
            {"table_id": 1, "table_name": null, "score": 4,
             "categories": {}, "answers": {}}
        ],
        "category_winners": {"art": null}
    });
    conn.push(&state);
    assert_eq!(
        within(screen.next_update()).await,
        Some(ClientUpdate::StateReplaced)
    );

    assert_eq!(screen.panel(), ScreenPanel::Leaderboard);
    let board = screen.leaderboard().unwrap();
    assert_eq!(board.winners[0].label, "Owls");
    assert_eq!(board.winners[0].categories[0], ("math".to_owned(), 5.0));
    assert_eq!(board.winners[1].label, "Table 1");
    assert_eq!(board.category_winners[0].label(), "no winner");
}

// ── Admin ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn admin_sends_every_command() {
    init_tracing();
    let (connector, mut server) = loopback();
    let mut admin = AdminClient::start(connector, config());

    let mut conn = server.accept().await;
    assert_eq!(conn.url, "ws://quiz.test/ws/admin");
    within(admin.next_update()).await;

    assert!(admin.resize_tables(12));
    assert!(admin.change_leader(4));
    assert!(admin.start_game());
    assert!(admin.show_answers());
    assert!(admin.previous_question());
    assert!(admin.next_question());
    assert!(admin.show_results());
    assert!(admin.reset_game());
    assert!(admin.next_step());

    let expected = vec![
        ClientMessage::ResizeTables { count: 12 },
        ClientMessage::ChangeLeader { table_id: 4 },
        ClientMessage::StartGame,
        ClientMessage::ShowAnswers,
        ClientMessage::PreviousQuestion,
        ClientMessage::NextQuestion,
        ClientMessage::ShowResults,
        ClientMessage::ResetGame,
        ClientMessage::NextStep,
    ];
    for message in expected {
        assert_eq!(conn.next_sent().await, message);
    }

    conn.push(&error_event("game already started"));
    conn.push(&table_event("in_question", "leader", simple_question()));
    assert_eq!(
        within(admin.next_update()).await,
        Some(ClientUpdate::Notice(Notice::ServerError(
            "game already started".into()
        )))
    );
}
