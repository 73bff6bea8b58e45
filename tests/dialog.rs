mod common;

use common::{accept_task, directive, event, eventually, memory_client, Record, Recorder};
use dashscope_realtime::transport::memory::MemoryConnector;
use dashscope_realtime::transport::WireMessage;
use dashscope_realtime::types::dialog::DialogState;
use dashscope_realtime::{
    CancellationToken, Client, CloseCode, Config, Error, NoopCallback, SessionState, StopOutcome,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const MODEL: &str = "multimodal-dialog";

#[tokio::test]
async fn full_turn_then_graceful_stop() {
    // --- Arrange ---
    let (client, mut listener) = memory_client(Duration::from_secs(10));
    let recorder = Recorder::default();
    let dialog = client
        .dialog(MODEL, "app-1")
        .with_workspace_id("ws-1")
        .start(recorder.clone())
        .await
        .unwrap();
    let mut peer = listener.accept().await.unwrap();
    let (task_id, start) = accept_task(&mut peer).await;
    peer.send_json(&directive("Started", &task_id, json!({"dialog_id": "d-1"})));
    dialog.wait_started(None).await.unwrap();

    // --- Act ---
    dialog.start_speech().await.unwrap();
    dialog.send_audio(&[1; 640]).await.unwrap();
    dialog.stop_speech().await.unwrap();
    peer.send_json(&directive("SpeechStarted", &task_id, json!({})));
    peer.send_json(&directive("SpeechContent", &task_id, json!({"text": "what time"})));
    peer.send_json(&directive("SpeechEnded", &task_id, json!({})));
    peer.send_json(&directive("DialogStateChanged", &task_id, json!({"state": "Thinking"})));
    peer.send_json(&directive("RespondingStarted", &task_id, json!({})));
    peer.send_binary(vec![9; 960]);
    peer.send_json(&directive("RespondingContent", &task_id, json!({"text": "noon"})));
    peer.send_json(&directive("RespondingEnded", &task_id, json!({})));
    dialog.interrupt().await.unwrap();

    let server = async {
        let mut actions = Vec::new();
        while let Some(message) = peer.recv_json().await {
            let action = message["header"]["action"].as_str().unwrap().to_string();
            if action == "Stop" {
                peer.send_json(&directive("Stopped", &task_id, json!({})));
                actions.push((action, message));
                break;
            }
            actions.push((action, message));
        }
        actions
    };
    let (outcome, actions) = tokio::join!(dialog.stop(), server);

    // --- Assert ---
    assert_eq!(outcome.unwrap(), StopOutcome::Finished);
    assert_eq!(dialog.dialog_id().as_deref(), Some("d-1"));

    assert_eq!(start["header"]["action"], "Start");
    assert_eq!(start["payload"]["task_group"], "aigc");
    assert_eq!(start["payload"]["task"], "multimodal-generation");
    assert_eq!(start["payload"]["function"], "generation");
    assert_eq!(start["payload"]["parameters"]["upstream"]["mode"], "tap2talk");
    assert_eq!(start["payload"]["parameters"]["downstream"]["volume"], 50);
    assert_eq!(
        start["payload"]["input"],
        json!({"workspace_id": "ws-1", "app_id": "app-1", "directive": "Start"})
    );

    let names: Vec<&str> = actions.iter().map(|(action, _)| action.as_str()).collect();
    assert_eq!(names, vec!["SendSpeech", "StopSpeech", "RequestToSpeak", "Stop"]);
    assert_eq!(actions[1].1["payload"]["input"]["dialog_id"], "d-1");
    assert_eq!(actions[1].1["payload"]["input"]["directive"], "StopSpeech");

    assert_eq!(
        recorder.records(),
        vec![
            Record::Connected,
            Record::Started(Some("d-1".to_string())),
            Record::SpeechStarted,
            Record::SpeechContent("what time".to_string()),
            Record::SpeechEnded,
            Record::StateChanged(DialogState::Thinking),
            Record::RespondingStarted,
            Record::Audio(vec![9; 960]),
            Record::RespondingContent("noon".to_string()),
            Record::RespondingEnded,
            Record::Stopped,
            Record::Close(CloseCode::Finished),
        ]
    );
}

#[tokio::test]
async fn error_event_ends_dispatch() {
    let (client, mut listener) = memory_client(Duration::from_secs(10));
    let recorder = Recorder::default();
    let dialog = client.dialog(MODEL, "app-1").start(recorder.clone()).await.unwrap();
    let mut peer = listener.accept().await.unwrap();
    let (task_id, _) = accept_task(&mut peer).await;
    peer.send_json(&directive("Started", &task_id, json!({"dialog_id": "d-2"})));
    peer.send_json(&json!({
        "header": {"task_id": task_id, "error_code": "X", "error_message": "Y"},
        "payload": {"output": {"directive": "Error"}}
    }));
    peer.send_json(&directive("RespondingContent", &task_id, json!({"text": "late"})));

    let end = dialog.wait_closed().await.unwrap();

    assert_eq!(end.code(), CloseCode::Failed);
    assert_eq!(end.failure().map(|details| details.code()), Some("X"));
    assert_eq!(
        recorder.records(),
        vec![
            Record::Connected,
            Record::Started(Some("d-2".to_string())),
            Record::Error("X/Y".to_string()),
            Record::Close(CloseCode::Failed),
        ]
    );
    assert!(matches!(dialog.send_audio(&[0; 10]).await, Err(Error::Closed)));
}

#[tokio::test]
async fn error_before_started_ends_session() {
    let (client, mut listener) = memory_client(Duration::from_secs(10));
    let recorder = Recorder::default();
    let dialog = client.dialog(MODEL, "app-1").start(recorder.clone()).await.unwrap();
    let mut peer = listener.accept().await.unwrap();
    let (task_id, _) = accept_task(&mut peer).await;
    peer.send_json(&json!({
        "header": {"task_id": task_id, "error_code": "X", "error_message": "Y"},
        "payload": {"output": {"directive": "Error"}}
    }));
    peer.send_json(&directive("Started", &task_id, json!({"dialog_id": "d-3"})));

    let started = dialog.wait_started(None).await;

    assert!(matches!(started, Err(Error::TaskFailed(details)) if details.message() == "Y"));
    assert_eq!(dialog.state(), SessionState::Closed);
    assert_eq!(dialog.dialog_id(), None);
    assert_eq!(
        recorder.records(),
        vec![
            Record::Connected,
            Record::Error("X/Y".to_string()),
            Record::Close(CloseCode::Failed),
        ]
    );
}

#[tokio::test]
async fn dialog_outlives_task_finished() {
    let (client, mut listener) = memory_client(Duration::from_secs(10));
    let recorder = Recorder::default();
    let dialog = client.dialog(MODEL, "app-1").start(recorder.clone()).await.unwrap();
    let mut peer = listener.accept().await.unwrap();
    let (task_id, _) = accept_task(&mut peer).await;
    peer.send_json(&directive("Started", &task_id, json!({"dialog_id": "d-4"})));
    dialog.wait_started(None).await.unwrap();

    peer.send_json(&event("task-finished", &task_id, json!({"output": {}})));
    peer.send_json(&directive("SpeechStarted", &task_id, json!({})));
    eventually(|| recorder.records().last() == Some(&Record::SpeechStarted)).await;

    assert_eq!(dialog.state(), SessionState::Started);
    dialog.send_audio(&[3; 320]).await.unwrap();
    assert_eq!(peer.recv().await, Some(WireMessage::Binary(vec![3; 320])));
    assert_eq!(
        recorder.records(),
        vec![
            Record::Connected,
            Record::Started(Some("d-4".to_string())),
            Record::Complete,
            Record::SpeechStarted,
        ]
    );
    dialog.close().await;
}

#[tokio::test]
async fn cancelled_stop_closes_once() {
    // --- Arrange ---
    let (client, mut listener) = memory_client(Duration::from_secs(10));
    let recorder = Recorder::default();
    let dialog = client.dialog(MODEL, "app-1").start(recorder.clone()).await.unwrap();
    let mut peer = listener.accept().await.unwrap();
    let (task_id, _) = accept_task(&mut peer).await;
    peer.send_json(&directive("Started", &task_id, json!({"dialog_id": "d-5"})));
    dialog.wait_started(None).await.unwrap();
    let cancel = CancellationToken::new();

    // --- Act ---
    let server = async {
        let stop = peer.recv_json().await.unwrap();
        cancel.cancel();
        (stop, peer.recv().await)
    };
    let (outcome, (stop, closing)) = tokio::join!(dialog.stop_with_cancel(&cancel), server);

    // --- Assert ---
    assert!(matches!(outcome, Err(Error::Cancelled)));
    assert_eq!(stop["header"]["action"], "Stop");
    assert_eq!(stop["payload"]["input"]["dialog_id"], "d-5");
    assert_eq!(closing, Some(WireMessage::Close(Some((4009, "cancelled".to_string())))));
    assert_eq!(recorder.count(|record| matches!(record, Record::Close(_))), 1);
    assert_eq!(recorder.records().last(), Some(&Record::Close(CloseCode::Cancelled)));
}

#[tokio::test]
async fn malformed_message_is_skipped() {
    let (client, mut listener) = memory_client(Duration::from_secs(10));
    let recorder = Recorder::default();
    let dialog = client.dialog(MODEL, "app-1").start(recorder.clone()).await.unwrap();
    let mut peer = listener.accept().await.unwrap();
    let (task_id, _) = accept_task(&mut peer).await;
    peer.send_text("{not json");
    peer.send_json(&directive("Started", &task_id, json!({})));
    dialog.wait_started(None).await.unwrap();
    dialog.close().await;

    let records = recorder.records();
    assert!(matches!(&records[1], Record::Error(message) if message.starts_with("protocol error")));
    assert_eq!(records[2], Record::Started(None));
    assert_eq!(records.last(), Some(&Record::Close(CloseCode::ClosedByClient)));
}

#[tokio::test]
async fn close_is_reported_once() {
    let (client, mut listener) = memory_client(Duration::from_secs(10));
    let recorder = Recorder::default();
    let dialog = client.dialog(MODEL, "app-1").start(recorder.clone()).await.unwrap();
    let mut peer = listener.accept().await.unwrap();
    accept_task(&mut peer).await;

    dialog.close().await;
    dialog.close().await;
    peer.hang_up();
    assert_eq!(
        dialog.stop().await.unwrap(),
        StopOutcome::AlreadyFinished(CloseCode::ClosedByClient)
    );

    assert_eq!(recorder.count(|record| matches!(record, Record::Close(_))), 1);
    assert_eq!(
        peer.recv().await,
        Some(WireMessage::Close(Some((1000, "closed by client".to_string()))))
    );
    assert_eq!(peer.recv().await, None);
}

#[tokio::test]
async fn dropping_the_session_closes_it() {
    let (client, mut listener) = memory_client(Duration::from_secs(10));
    let recorder = Recorder::default();
    let dialog = client.dialog(MODEL, "app-1").start(recorder.clone()).await.unwrap();
    let mut peer = listener.accept().await.unwrap();
    accept_task(&mut peer).await;

    drop(dialog);
    while peer.recv().await.is_some() {}

    eventually(|| recorder.records().last() == Some(&Record::Close(CloseCode::ClosedByClient))).await;
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    let config = Config::builder().with_api_key("sk-test").build();
    let client = Client::with_connector(config, Arc::new(MemoryConnector::refusing())).unwrap();
    let result = client.dialog(MODEL, "app-1").start(NoopCallback).await;
    assert!(matches!(result, Err(Error::Connect(_))));
}
