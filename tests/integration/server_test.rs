// tests/integration/server_test.rs

//! Tests that drive a live server over loopback TCP.

use super::test_helpers::{Call, TestServer, mock_services, test_config};
use nexron::Server;
use nexron::config::{Framing, NO_IDLE_TIMEOUT_WARNING, SHELL_FALLBACK_WARNING};
use nexron::core::NexronError;
use nexron::core::events::ServerStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends one command and reads back exactly the expected acknowledgement.
async fn send_and_expect(stream: &mut TcpStream, command: &str, expected: &str) {
    stream.write_all(command.as_bytes()).await.unwrap();
    let mut buf = vec![0u8; expected.len()];
    tokio::time::timeout(READ_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for acknowledgement")
        .unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), expected);
}

/// Reads until the peer closes the connection.
async fn expect_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(READ_TIMEOUT, stream.read(&mut buf))
        .await
        .expect("connection was not closed");
    match read {
        Ok(0) | Err(_) => {}
        Ok(n) => panic!("unexpected {n} bytes before close"),
    }
}

#[tokio::test]
async fn test_command_round_trip() {
    let mut ts = TestServer::start().await;
    let mut client = TcpStream::connect(ts.addr).await.unwrap();

    send_and_expect(&mut client, "notepad", "Command processed: notepad").await;

    ts.logs
        .wait_for(|m| m == "Received command: notepad")
        .await;
    ts.logs
        .wait_for(|m| m == "Command processed: notepad")
        .await;
    assert!(ts.recorder.calls().contains(&Call::Speak("Opening notepad".into())));
    ts.server.stop().await;
}

#[tokio::test]
async fn test_sequential_commands_on_one_connection() {
    let ts = TestServer::start().await;
    let mut client = TcpStream::connect(ts.addr).await.unwrap();

    send_and_expect(&mut client, "volume up", "Command processed: volume up").await;
    send_and_expect(&mut client, "volume down", "Command processed: volume down").await;
    send_and_expect(&mut client, "Xyzzy", "Command processed: Xyzzy").await;

    assert_eq!(
        ts.recorder.actions(),
        vec![
            Call::VolumeUp(5),
            Call::VolumeDown(5),
            Call::Shell("Xyzzy".into())
        ]
    );
    assert_eq!(ts.server.stats().get_total_commands(), 3);
    ts.server.stop().await;
}

#[tokio::test]
async fn test_whitespace_only_command_gets_no_reply() {
    let ts = TestServer::start().await;
    let mut client = TcpStream::connect(ts.addr).await.unwrap();

    client.write_all(b"   \r\n").await.unwrap();
    // Give the server time to process the blank chunk before the next one.
    tokio::time::sleep(Duration::from_millis(100)).await;
    send_and_expect(&mut client, "kapat", "Command processed: kapat").await;

    assert_eq!(ts.server.stats().get_total_commands(), 1);
    ts.server.stop().await;
}

#[tokio::test]
async fn test_connect_and_close_without_sending() {
    let mut ts = TestServer::start().await;

    let client = TcpStream::connect(ts.addr).await.unwrap();
    let client_addr = client.local_addr().unwrap();
    drop(client);

    ts.logs
        .wait_for(|m| m == format!("Client connected: {client_addr}"))
        .await;
    ts.logs
        .wait_for(|m| m == format!("Client disconnected: {client_addr}"))
        .await;
    assert_eq!(ts.server.stats().get_total_commands(), 0);
    assert!(ts.recorder.calls().is_empty());
    ts.server.stop().await;
}

#[tokio::test]
async fn test_invalid_utf8_closes_only_that_connection() {
    let mut ts = TestServer::start().await;
    let mut bad = TcpStream::connect(ts.addr).await.unwrap();
    let mut good = TcpStream::connect(ts.addr).await.unwrap();

    bad.write_all(&[0xff, 0xfe]).await.unwrap();
    expect_closed(&mut bad).await;

    ts.logs
        .wait_for(|m| m.starts_with("Client handling error: Invalid UTF-8"))
        .await;
    send_and_expect(&mut good, "calculator", "Command processed: calculator").await;
    assert!(ts.server.is_running().await);
    ts.server.stop().await;
}

#[tokio::test]
async fn test_concurrent_clients_are_independent() {
    let ts = TestServer::start().await;
    let addr = ts.addr;

    let mut tasks = Vec::new();
    for i in 0..8 {
        tasks.push(tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let command = format!("unknown-{i}");
            send_and_expect(&mut client, &command, &format!("Command processed: {command}")).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(ts.recorder.shell_calls().len(), 8);
    assert_eq!(ts.server.stats().get_total_connections(), 8);
    ts.server.stop().await;
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let ts = TestServer::start().await;
    let mut status = ts.server.subscribe_status();

    // A second start keeps the existing listener.
    ts.server.start(0).await.unwrap();
    assert_eq!(ts.server.local_addr().await, Some(ts.addr));

    ts.server.stop().await;
    ts.server.stop().await;
    assert!(!ts.server.is_running().await);
    assert!(ts.server.local_addr().await.is_none());

    ts.server.events().flush().await;
    assert_eq!(*status.borrow_and_update(), ServerStatus::Stopped);
    assert!(TcpStream::connect(ts.addr).await.is_err());
}

#[tokio::test]
async fn test_server_can_restart_after_stop() {
    let ts = TestServer::start().await;
    ts.server.stop().await;

    ts.server.start(0).await.unwrap();
    let addr = ts.server.local_addr().await.unwrap();
    let mut client = TcpStream::connect(addr).await.unwrap();
    send_and_expect(&mut client, "notepad", "Command processed: notepad").await;
    ts.server.stop().await;
}

#[tokio::test]
async fn test_bind_failure_reports_error_status() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let recorder = Arc::new(super::test_helpers::Recorder::default());
    let server = Server::new(test_config(), mock_services(recorder, 5));
    let mut logs = super::test_helpers::LogCollector::new(server.events());

    let err = server.start(port).await.unwrap_err();
    assert!(matches!(err, NexronError::Bind { port: p, .. } if p == port));
    assert!(!server.is_running().await);

    logs.wait_for(|m| m.starts_with("Server start error:")).await;
    server.events().flush().await;
    assert_eq!(*server.subscribe_status().borrow(), ServerStatus::Error);
}

#[tokio::test]
async fn test_stop_keeps_open_connections_alive() {
    let ts = TestServer::start().await;
    let mut client = TcpStream::connect(ts.addr).await.unwrap();
    send_and_expect(&mut client, "notepad", "Command processed: notepad").await;

    ts.server.stop().await;

    send_and_expect(&mut client, "volume up", "Command processed: volume up").await;
    assert!(TcpStream::connect(ts.addr).await.is_err());
}

#[tokio::test]
async fn test_start_logs_port_banner() {
    let mut ts = TestServer::start().await;
    let port = ts.addr.port();

    ts.logs
        .wait_for(|m| m == format!("TCP Server started on port {port}"))
        .await;
    ts.logs
        .wait_for(|m| m == format!("=== Server Started on Port {port} ==="))
        .await;
    ts.logs.wait_for(|m| m.starts_with("Local IP: ")).await;
    ts.server.stop().await;
    ts.logs.wait_for(|m| m == "Server stopped").await;
}

#[tokio::test]
async fn test_line_framing_splits_commands() {
    let mut config = test_config();
    config.connection.framing = Framing::Line;
    let ts = TestServer::start_with_config(config).await;
    let mut client = TcpStream::connect(ts.addr).await.unwrap();

    send_and_expect(
        &mut client,
        "notepad\r\nvolume up\n",
        "Command processed: notepad\nCommand processed: volume up\n",
    )
    .await;

    assert_eq!(ts.server.stats().get_total_commands(), 2);
    ts.server.stop().await;
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let mut config = test_config();
    config.connection.idle_timeout_secs = 1;
    let mut ts = TestServer::start_with_config(config).await;
    let mut client = TcpStream::connect(ts.addr).await.unwrap();

    expect_closed(&mut client).await;
    ts.logs
        .wait_for(|m| m == "Client handling error: Connection idle for more than 1 seconds")
        .await;
    ts.server.stop().await;
}

#[tokio::test]
async fn test_lifecycle_announcements_are_spoken() {
    let mut config = test_config();
    config.dispatch.announce_lifecycle = true;
    let ts = TestServer::start_with_config(config).await;
    ts.server.stop().await;

    let started = Call::Speak(nexron::server::STARTED_SPEECH.into());
    let stopped = Call::Speak(nexron::server::STOPPED_SPEECH.into());
    tokio::time::timeout(READ_TIMEOUT, async {
        loop {
            let calls = ts.recorder.calls();
            if calls.contains(&started) && calls.contains(&stopped) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("announcements were not spoken");
}

#[tokio::test]
async fn test_concurrent_stop_and_start_on_same_port() {
    let port = {
        let scratch = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        scratch.local_addr().unwrap().port()
    };
    let recorder = Arc::new(super::test_helpers::Recorder::default());
    let server = Server::new(test_config(), mock_services(recorder, 5));
    server.start(port).await.unwrap();

    let ((), restarted) = tokio::join!(server.stop(), server.start(port));

    restarted.expect("start racing with stop must rebind the port");
    assert!(server.is_running().await);
    assert_eq!(server.local_addr().await.map(|a| a.port()), Some(port));
    server.events().flush().await;
    assert_eq!(*server.subscribe_status().borrow(), ServerStatus::Running);

    let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    send_and_expect(&mut client, "notepad", "Command processed: notepad").await;
    server.stop().await;
}

#[tokio::test]
async fn test_risky_settings_are_reported_on_start() {
    let mut ts = TestServer::start().await;

    ts.logs
        .wait_for(|m| m == format!("Warning: {SHELL_FALLBACK_WARNING}"))
        .await;
    ts.logs
        .wait_for(|m| m == format!("Warning: {NO_IDLE_TIMEOUT_WARNING}"))
        .await;
    ts.server.stop().await;
}

#[tokio::test]
async fn test_safe_settings_start_without_warnings() {
    let mut config = test_config();
    config.dispatch.shell_fallback = false;
    config.connection.idle_timeout_secs = 30;
    let mut ts = TestServer::start_with_config(config).await;

    let logs = ts.logs.drain(ts.server.events()).await;

    assert!(logs.iter().any(|l| l.starts_with("Local IP: ")));
    assert!(!logs.iter().any(|l| l.starts_with("Warning:")));
    ts.server.stop().await;
}
