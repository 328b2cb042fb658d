use std::time::Duration;

use letitup_client::ReconnectPolicy;
use letitup_daemon::{Pulse, PulseSettings};
use letitup_hub::{HubServer, HubSettings};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;

#[tokio::test]
async fn test_pulse_triggers_reach_subscriber() {
    let server = HubServer::new(HubSettings {
        listen_addr: "127.0.0.1:0".to_string(),
        ..HubSettings::default()
    });
    let addr = server.start().await.unwrap();
    let hub = server.hub();

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    write_half
        .write_all(b"{\"event\":\"identify\",\"data\":{\"type\":\"subscriber\"}}\n")
        .await
        .unwrap();
    let mut reader = BufReader::new(read_half);
    for _ in 0..200 {
        if hub.snapshot().await.subscriber_count == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let pulse = Pulse::new(PulseSettings {
        server_address: addr.to_string(),
        interval: Duration::from_millis(50),
        intensity: 0.7,
        reconnect: ReconnectPolicy::default(),
    });
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(pulse.run(shutdown_rx));

    for _ in 0..2 {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
            .await
            .expect("flash in time")
            .unwrap();
        let event: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(event["event"], "flash");
        assert_eq!(event["data"]["intensity"], 0.7);
    }
    assert!(hub.snapshot().await.producer_connected);

    shutdown_tx.send(true).unwrap();
    let sent = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("pulse stops on shutdown")
        .unwrap();
    assert!(sent >= 2);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_pulse_stops_while_hub_unreachable() {
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let pulse = Pulse::new(PulseSettings {
        server_address: addr.to_string(),
        interval: Duration::from_millis(50),
        intensity: 1.0,
        reconnect: ReconnectPolicy::default(),
    });
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(pulse.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();
    let sent = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("shutdown interrupts the backoff")
        .unwrap();
    assert_eq!(sent, 0);
}
