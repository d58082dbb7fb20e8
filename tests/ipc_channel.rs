#![cfg(unix)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;

use tanglecast::player::ipc::{self, IpcError, connect_with_retry};
use tanglecast::player::{PlayerCommand, Property};

/// Answer `replies` requests on the first connection, each preceded by an
/// unsolicited event line, then hang up. Returns the request lines seen.
async fn fake_renderer(listener: UnixListener, replies: Vec<&'static str>) -> Vec<String> {
    let (stream, _) = listener.accept().await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut seen = Vec::new();

    for reply in replies {
        let Some(line) = lines.next_line().await.unwrap() else {
            break;
        };
        seen.push(line);
        writer
            .write_all(b"{\"event\":\"playback-restart\"}\n")
            .await
            .unwrap();
        writer.write_all(reply.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
    }

    seen
}

#[tokio::test]
async fn test_connects_once_socket_appears() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("mpv.sock");
    let cancel = CancellationToken::new();

    let bind_path = socket.clone();
    let renderer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        let listener = UnixListener::bind(&bind_path).unwrap();
        fake_renderer(listener, vec![r#"{"data":null,"error":"success"}"#]).await
    });

    let stream = tokio::time::timeout(
        Duration::from_secs(5),
        connect_with_retry(&socket, &cancel),
    )
    .await
    .unwrap()
    .expect("should connect after the socket is bound");

    let (client, server) = ipc::channel();
    let serving = tokio::spawn(server.serve(stream));

    client.send(&PlayerCommand::SetPause(true)).await.unwrap();

    let seen = renderer.await.unwrap();
    assert_eq!(seen, vec![r#"{"command":["set_property","pause",true]}"#]);

    drop(client);
    assert_eq!(serving.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_connect_gives_up_when_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("never.sock");
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        connect_with_retry(&socket, &cancel),
    )
    .await
    .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_events_are_skipped_and_hangup_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("mpv.sock");
    let listener = UnixListener::bind(&socket).unwrap();

    let renderer = tokio::spawn(fake_renderer(
        listener,
        vec![
            r#"{"data":5400.5,"error":"success"}"#,
            r#"{"data":61.25,"error":"success","request_id":0}"#,
        ],
    ));

    let cancel = CancellationToken::new();
    let stream = connect_with_retry(&socket, &cancel).await.unwrap();
    let (client, server) = ipc::channel();
    let serving = tokio::spawn(server.serve(stream));

    let duration = client
        .send(&PlayerCommand::GetProperty(Property::Duration))
        .await
        .unwrap();
    assert_eq!(duration.as_f64(), Some(5400.5));

    let position = client
        .send(&PlayerCommand::GetProperty(Property::TimePos))
        .await
        .unwrap();
    assert_eq!(position.as_f64(), Some(61.25));

    let seen = renderer.await.unwrap();
    assert_eq!(
        seen,
        vec![
            r#"{"command":["get_property","duration"]}"#,
            r#"{"command":["get_property","time-pos"]}"#,
        ]
    );

    // The renderer hung up: the next request fails and the channel stops
    let err = client
        .send(&PlayerCommand::GetProperty(Property::Duration))
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        serving.await.unwrap(),
        Err(IpcError::Closed) | Err(IpcError::Transport(_))
    ));

    assert_eq!(
        client.send(&PlayerCommand::SetPause(false)).await,
        Err(IpcError::ChannelClosed)
    );
}
