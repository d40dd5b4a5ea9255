#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    clippy::float_cmp
)]
//! Wire format tests: JSON fixtures shaped like real quiz server output, and
//! the exact JSON of every outbound command.

use quiz_sync_client::dispatcher::{decode, try_decode};
use quiz_sync_client::protocol::{
    ClientMessage, GamePhase, QuestionType, Role, ServerMessage, TablePhase,
};
use serde_json::json;

// ════════════════════════════════════════════════════════════════════
// Outbound commands
// ════════════════════════════════════════════════════════════════════

#[test]
fn table_commands_serialize_to_server_format() {
    let cases = [
        (
            ClientMessage::SetTableName {
                table_name: "Owls".into(),
            },
            json!({"event_type": "from_set_table_name", "table_name": "Owls"}),
        ),
        (
            ClientMessage::SetTableAnswers {
                table_answers: vec![0, 2],
            },
            json!({"event_type": "from_set_table_answers", "table_answers": [0, 2]}),
        ),
        (
            ClientMessage::AnswerQuestion {
                table_answers: vec![1],
            },
            json!({"event_type": "from_answer_question", "table_answers": [1]}),
        ),
    ];
    for (message, expected) in cases {
        assert_eq!(serde_json::to_value(&message).unwrap(), expected);
    }
}

#[test]
fn admin_commands_serialize_to_server_format() {
    let cases = [
        (
            ClientMessage::ResizeTables { count: 8 },
            json!({"event_type": "from_admin_resize_tables", "count": 8}),
        ),
        (
            ClientMessage::ChangeLeader { table_id: 3 },
            json!({"event_type": "from_admin_change_leader", "table_id": 3}),
        ),
        (
            ClientMessage::StartGame,
            json!({"event_type": "from_admin_start_game"}),
        ),
        (
            ClientMessage::ShowAnswers,
            json!({"event_type": "from_admin_show_answers"}),
        ),
        (
            ClientMessage::PreviousQuestion,
            json!({"event_type": "from_admin_previous_question"}),
        ),
        (
            ClientMessage::NextQuestion,
            json!({"event_type": "from_admin_next_question"}),
        ),
        (
            ClientMessage::ShowResults,
            json!({"event_type": "from_admin_show_results"}),
        ),
        (
            ClientMessage::ResetGame,
            json!({"event_type": "from_admin_reset_game"}),
        ),
        (
            ClientMessage::NextStep,
            json!({"event_type": "from_admin_next_step"}),
        ),
    ];
    for (message, expected) in cases {
        assert_eq!(serde_json::to_value(&message).unwrap(), expected);
    }
}

// ════════════════════════════════════════════════════════════════════
// Inbound fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn table_event_with_question_fixture() {
    let raw = r#"{
        "event_type": "table",
        "table_id": 5,
        "table_name": "Quizzly Bears",
        "table_state": "in_question",
        "clients": 4,
        "table_answers": [0, 3],
        "answered": false,
        "role": "leader",
        "question": {
            "id": 42,
            "categories": ["history", "art"],
            "question_type": "multiple_choice",
            "question": "Which of these were painters?",
            "images": ["/media/q42.jpg"],
            "answer_images": ["/media/a42.jpg"],
            "answers": ["Monet", "Napoleon", "Newton", "Frida Kahlo"],
            "correct_answers": [0, 3],
            "score": 2.5,
            "timer": 45,
            "time_left": 31.7
        },
        "result": null
    }"#;

    let ServerMessage::Table(payload) = decode(raw).unwrap() else {
        panic!("expected a table event");
    };
    assert_eq!(payload.table.table_id, 5);
    assert_eq!(payload.table.display_name(), Some("Quizzly Bears"));
    assert_eq!(payload.table.table_state, TablePhase::InQuestion);
    assert_eq!(payload.table.clients, 4);
    assert_eq!(payload.table.table_answers, Some(vec![0, 3]));
    assert_eq!(payload.role, Role::Leader);

    let question = payload.question.unwrap();
    assert_eq!(question.question_type, QuestionType::MultipleChoice);
    assert!(question.is_multiple());
    assert_eq!(question.timer, 45.0);
    assert_eq!(question.time_left, Some(31.7));
    assert_eq!(question.score, Some(2.5));
    assert!(question.is_correct(3));
    assert!(!question.is_correct(1));
}

#[test]
fn table_event_with_result_fixture() {
    let raw = json!({
        "event_type": "table",
        "table_id": 5,
        "table_name": "Owls",
        "table_state": "in_results",
        "clients": 2,
        "role": "observer",
        "question": null,
        "result": {
            "score": 3.5,
            "question_score": {"42": 2.5, "43": 1},
            "categories": {"history": 2.5, "art": 1},
            "answers": {"42": [0, 3], "43": [1]},
            "questions": [],
            "place": 2,
            "place_categories": {"history": 1, "art": null},
            "place_amount": 9
        }
    })
    .to_string();

    let ServerMessage::Table(payload) = decode(&raw).unwrap() else {
        panic!("expected a table event");
    };
    let result = payload.result.unwrap();
    assert_eq!(result.score, 3.5);
    assert_eq!(result.answers_for(42), &[0, 3]);
    assert!(result.answers_for(99).is_empty());
    assert_eq!(result.score_for(43), 1.0);
    assert_eq!(result.place, Some(2));
    assert_eq!(result.place_in("history"), Some(1));
    assert_eq!(result.place_in("art"), None);
    assert_eq!(result.place_amount, 9);
}

#[test]
fn screen_state_fixture() {
    let raw = json!({
        "event_type": "screen_tables_state",
        "game_state": "in_answers",
        "tables": [
            {"table_id": 1, "table_name": "Owls", "table_state": "in_answers",
             "clients": 3, "answered": true},
            {"table_id": 2, "table_name": null, "table_state": "waiting_leader", "clients": 0}
        ],
        "question": {
            "id": 7, "categories": [], "question_type": "single_choice",
            "question": "2 + 2?", "answers": ["3", "4"], "correct_answers": [1],
            "score": null, "timer": 20
        },
        "results": null
    })
    .to_string();

    let ServerMessage::ScreenTablesState(state) = decode(&raw).unwrap() else {
        panic!("expected a screen state event");
    };
    assert_eq!(state.game_state, GamePhase::InAnswers);
    assert_eq!(state.tables.len(), 2);
    assert!(state.tables[0].answered);
    assert_eq!(state.tables[1].table_name, None);
    let question = state.question.unwrap();
    assert_eq!(question.time_left, None);
    assert_eq!(question.score, None);
    assert!(question.images.is_empty());
}

#[test]
fn screen_results_use_the_servers_winers_key() {
    let raw = json!({
        "event_type": "screen_tables_state",
        "game_state": "in_results",
        "tables": [],
        "question": null,
        "results": {
            "winers": [{"table_id": 1, "table_name": "Owls", "score": 9,
                        "categories": {"math": 9}, "answers": {"1": [0]}}],
            "category_winners": {"math": {"table_id": 1, "table_name": "Owls", "score": 9,
                                          "categories": {}, "answers": {}},
                                 "art": null}
        }
    })
    .to_string();

    let ServerMessage::ScreenTablesState(state) = decode(&raw).unwrap() else {
        panic!("expected a screen state event");
    };
    let results = state.results.unwrap();
    assert_eq!(results.winners.len(), 1);
    assert_eq!(results.winners[0].answers_for(1), Some(&[0][..]));
    assert!(results.category_winners["math"].is_some());
    assert!(results.category_winners["art"].is_none());

    let out = serde_json::to_value(&results).unwrap();
    assert!(out.get("winers").is_some());
}

#[test]
fn table_answered_and_error_fixtures() {
    let answered = decode(r#"{"event_type":"screen_table_answered","table_id":4,"last":true}"#);
    assert_eq!(
        answered,
        Some(ServerMessage::ScreenTableAnswered {
            table_id: 4,
            table_name: None,
            last: true
        })
    );

    let error = decode(r#"{"event_type":"error","error":"Table name is taken"}"#);
    assert_eq!(
        error,
        Some(ServerMessage::Error {
            error: "Table name is taken".into()
        })
    );
}

#[test]
fn unknown_event_types_are_forward_compatible() {
    let msg = decode(r#"{"event_type":"screen_confetti","colors":["red"]}"#).unwrap();
    assert_eq!(msg, ServerMessage::Unknown);
    assert_eq!(msg.event_type(), "unknown");
}

#[test]
fn malformed_payloads_are_errors_not_panics() {
    for raw in [
        "",
        "[]",
        "null",
        r#"{"table_id": 1}"#,
        r#"{"event_type": "table", "table_state": "dancing"}"#,
        r#"{"event_type": "screen_table_answered", "table_id": -1}"#,
    ] {
        assert!(try_decode(raw).is_err(), "input {raw:?}");
        assert!(decode(raw).is_none(), "input {raw:?}");
    }
}
