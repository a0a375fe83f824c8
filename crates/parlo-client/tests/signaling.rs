//! Signaling channel tests against an in-process relay.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};

use parlo_client::SignalingChannel;
use parlo_core::SignalMessage;

type Relay = WebSocketStream<TcpStream>;

/// Accept one WebSocket connection and hand it to the test script.
async fn spawn_relay<F, Fut>(script: F) -> String
where
    F: FnOnce(Relay) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        script(ws).await;
    });
    format!("ws://{addr}")
}

#[tokio::test]
async fn sent_messages_arrive_as_tagged_json_text() {
    let (frame_tx, mut frames) = mpsc::channel::<String>(4);
    let url = spawn_relay(move |mut ws| async move {
        while let Some(Ok(WsMessage::Text(text))) = ws.next().await {
            if frame_tx.send(text).await.is_err() {
                break;
            }
        }
    })
    .await;

    let channel = SignalingChannel::connect(&url).await.unwrap();
    let (sender, _receiver) = channel.start();

    sender
        .send(SignalMessage::Offer {
            sdp: "v=0\r\n".to_string(),
        })
        .await
        .unwrap();
    sender
        .send(SignalMessage::Candidate {
            label: "0".to_string(),
            candidate: "candidate:1 1 udp 1 127.0.0.1 9 typ host".to_string(),
        })
        .await
        .unwrap();

    let offer: serde_json::Value = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
    assert_eq!(offer["type"], "offer");
    assert_eq!(offer["sdp"], "v=0\r\n");

    let candidate: serde_json::Value = serde_json::from_str(&frames.recv().await.unwrap()).unwrap();
    assert_eq!(candidate["type"], "candidate");
    assert_eq!(candidate["label"], "0");
    assert_eq!(candidate["candidate"], "candidate:1 1 udp 1 127.0.0.1 9 typ host");
}

#[tokio::test]
async fn receiver_parses_answer_and_candidate_frames() {
    let url = spawn_relay(|mut ws| async move {
        ws.send(WsMessage::Text(
            r#"{"type":"answer","sdp":"v=0"}"#.to_string(),
        ))
        .await
        .unwrap();
        ws.send(WsMessage::Text(
            r#"{"type":"candidate","label":"0","candidate":"candidate:9"}"#.to_string(),
        ))
        .await
        .unwrap();
        // Keep the connection open until the client is done reading.
        let _ = ws.next().await;
    })
    .await;

    let channel = SignalingChannel::connect(&url).await.unwrap();
    let (_sender, mut receiver) = channel.start();

    assert_eq!(
        receiver.recv().await,
        Some(SignalMessage::Answer {
            sdp: "v=0".to_string()
        })
    );
    assert_eq!(
        receiver.recv().await,
        Some(SignalMessage::Candidate {
            label: "0".to_string(),
            candidate: "candidate:9".to_string()
        })
    );
}

#[tokio::test]
async fn non_text_and_unparseable_frames_are_skipped() {
    let url = spawn_relay(|mut ws| async move {
        ws.send(WsMessage::Binary(vec![0xde, 0xad])).await.unwrap();
        ws.send(WsMessage::Text("not json".to_string()))
            .await
            .unwrap();
        ws.send(WsMessage::Text(r#"{"type":"bye"}"#.to_string()))
            .await
            .unwrap();
        let _ = ws.next().await;
    })
    .await;

    let channel = SignalingChannel::connect(&url).await.unwrap();
    let (_sender, mut receiver) = channel.start();

    assert_eq!(receiver.recv().await, Some(SignalMessage::Bye));
}

#[tokio::test]
async fn unknown_tags_surface_as_unknown() {
    let url = spawn_relay(|mut ws| async move {
        ws.send(WsMessage::Text(
            r#"{"type":"renegotiate","sdp":"v=0"}"#.to_string(),
        ))
        .await
        .unwrap();
        let _ = ws.next().await;
    })
    .await;

    let channel = SignalingChannel::connect(&url).await.unwrap();
    let (_sender, mut receiver) = channel.start();

    assert_eq!(receiver.recv().await, Some(SignalMessage::Unknown));
}

#[tokio::test]
async fn relay_close_ends_the_stream() {
    let url = spawn_relay(|mut ws| async move {
        ws.close(None).await.unwrap();
    })
    .await;

    let channel = SignalingChannel::connect(&url).await.unwrap();
    let (_sender, mut receiver) = channel.start();

    assert_eq!(receiver.recv().await, None);
}
