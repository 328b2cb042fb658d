use std::time::Duration;

use letitup_client::{
    ClientEvent, ColorMode, ConnectionStatus, EffectTiming, HubClient, RecordingSink,
    ReconnectPolicy, SinkCall, Subscriber, SubscriberSettings,
};
use letitup_hub::{HubServer, HubSettings};
use letitup_protocol::{FlashPayload, HubEvent};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

fn fast_policy(max_retries: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        max_retries,
        backoff: Duration::from_millis(20),
        backoff_ceiling: Duration::from_millis(50),
    }
}

async fn next_event(rx: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("client event in time")
        .expect("client still running")
}

/// Skip connection status updates until a hub event arrives
async fn next_hub_event(rx: &mut mpsc::Receiver<ClientEvent>) -> HubEvent {
    loop {
        if let ClientEvent::Hub(event) = next_event(rx).await {
            return event;
        }
    }
}

/// Poll until `check` holds on the recorded calls
async fn wait_for_calls(sink: &RecordingSink, check: impl Fn(&[SinkCall]) -> bool) {
    for _ in 0..200 {
        if check(&sink.calls()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("sink never reached expected state: {:?}", sink.calls());
}

#[tokio::test]
async fn test_identifies_again_after_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (tx, mut rx) = mpsc::channel(32);
    let (client, handle) = HubClient::new(addr.to_string(), fast_policy(5), tx);
    let task = tokio::spawn(client.run());

    for round in 0..2 {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let identify: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(identify["event"], "identify", "round {}", round);
        assert_eq!(identify["data"]["type"], "subscriber");

        let flash = HubEvent::Flash(FlashPayload::manual(round as f64));
        write_half
            .write_all(flash.to_json_line().unwrap().as_bytes())
            .await
            .unwrap();

        match next_hub_event(&mut rx).await {
            HubEvent::Flash(payload) => assert_eq!(payload.timestamp, round as f64),
            other => panic!("expected flash, got {:?}", other),
        }
        // Dropping both halves closes the connection
    }

    assert_ok!(handle.shutdown().await);
    assert_ok!(task.await.unwrap());
}

#[tokio::test]
async fn test_reports_exhausted_but_keeps_retrying() {
    // Bind then drop to get a port nobody listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let (tx, mut rx) = mpsc::channel(32);
    let (client, handle) = HubClient::new(addr.to_string(), fast_policy(2), tx);
    let task = tokio::spawn(client.run());

    let mut failures = Vec::new();
    while failures.len() < 4 {
        if let ClientEvent::Connection(ConnectionStatus::Disconnected { attempts, exhausted }) =
            next_event(&mut rx).await
        {
            failures.push((attempts, exhausted));
        }
    }
    assert_eq!(failures, vec![(1, false), (2, false), (3, true), (4, true)]);

    assert_ok!(handle.shutdown().await);
    assert_ok!(task.await.unwrap());
}

#[tokio::test]
async fn test_dropping_handles_does_not_stop_client() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let (tx, mut rx) = mpsc::channel(32);
    let (client, handle) = HubClient::new(addr.to_string(), fast_policy(1), tx);
    drop(handle);
    let task = tokio::spawn(client.run());

    let mut attempts_seen = 0;
    while attempts_seen < 3 {
        if let ClientEvent::Connection(ConnectionStatus::Disconnected { .. }) =
            next_event(&mut rx).await
        {
            attempts_seen += 1;
        }
    }

    // Closing the event queue is what ends it
    drop(rx);
    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("client stops once the runner is gone")
        .unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_producer_trigger_drives_subscriber_effect() {
    let server = HubServer::new(HubSettings {
        listen_addr: "127.0.0.1:0".to_string(),
        ..HubSettings::default()
    });
    let addr = server.start().await.unwrap();
    let hub = server.hub();

    let sink = RecordingSink::new();
    let subscriber = Subscriber::spawn(
        SubscriberSettings {
            server_address: addr.to_string(),
            reconnect: fast_policy(5),
            timing: EffectTiming::default(),
            color_mode: ColorMode::White,
        },
        sink.clone(),
    );

    wait_for_calls(&sink, |calls| {
        calls.contains(&SinkCall::Status(ConnectionStatus::Connected))
    })
    .await;
    for _ in 0..200 {
        if hub.snapshot().await.subscriber_count == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(hub.manual_trigger().await.unwrap(), 1);
    wait_for_calls(&sink, |calls| calls.contains(&SinkCall::Clear)).await;

    let calls = sink.calls();
    assert_eq!(calls.iter().filter(|c| **c == SinkCall::TorchOn).count(), 1);
    assert!(!sink.torch_engaged());

    let machine = subscriber.shutdown().await.expect("runner finished");
    assert_eq!(machine.completed_cycles(), 1);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_manual_trigger_from_handle_flashes_self() {
    let server = HubServer::new(HubSettings {
        listen_addr: "127.0.0.1:0".to_string(),
        ..HubSettings::default()
    });
    let addr = server.start().await.unwrap();

    let sink = RecordingSink::new();
    let subscriber = Subscriber::spawn(
        SubscriberSettings {
            server_address: addr.to_string(),
            reconnect: fast_policy(5),
            ..SubscriberSettings::default()
        },
        sink.clone(),
    );
    wait_for_calls(&sink, |calls| {
        calls.contains(&SinkCall::Status(ConnectionStatus::Connected))
    })
    .await;

    subscriber.handle().manual_trigger().await.unwrap();
    wait_for_calls(&sink, |calls| calls.contains(&SinkCall::TorchOn)).await;

    subscriber.shutdown().await;
    assert!(!sink.torch_engaged());
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_hub_stop_releases_torch() {
    let server = HubServer::new(HubSettings {
        listen_addr: "127.0.0.1:0".to_string(),
        ..HubSettings::default()
    });
    let addr = server.start().await.unwrap();

    let sink = RecordingSink::new();
    let subscriber = Subscriber::spawn(
        SubscriberSettings {
            server_address: addr.to_string(),
            reconnect: fast_policy(5),
            // Long engage so the hub goes away mid-effect
            timing: EffectTiming {
                engage: Duration::from_secs(30),
                fade: Duration::from_millis(150),
            },
            color_mode: ColorMode::Random,
        },
        sink.clone(),
    );
    wait_for_calls(&sink, |calls| {
        calls.contains(&SinkCall::Status(ConnectionStatus::Connected))
    })
    .await;

    subscriber.handle().manual_trigger().await.unwrap();
    wait_for_calls(&sink, |calls| calls.contains(&SinkCall::TorchOn)).await;

    server.stop().await.unwrap();
    wait_for_calls(&sink, |calls| {
        calls
            .iter()
            .any(|c| matches!(c, SinkCall::Status(ConnectionStatus::Disconnected { .. })))
    })
    .await;
    assert!(!sink.torch_engaged());

    subscriber.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_connect_gives_up_at_ceiling() {
    // Reserved TEST-NET address: nothing answers the SYN
    let (tx, mut rx) = mpsc::channel(32);
    let policy = ReconnectPolicy {
        max_retries: 5,
        backoff: Duration::from_secs(1),
        backoff_ceiling: Duration::from_secs(3),
    };
    let (client, handle) = HubClient::new("192.0.2.1:3000", policy, tx);
    let task = tokio::spawn(client.run());

    let started = tokio::time::Instant::now();
    let failure = loop {
        let event = tokio::time::timeout(Duration::from_secs(60), rx.recv())
            .await
            .expect("connect attempt bounded")
            .expect("client still running");
        if let ClientEvent::Connection(status @ ConnectionStatus::Disconnected { .. }) = event {
            break status;
        }
    };
    assert_eq!(
        failure,
        ConnectionStatus::Disconnected {
            attempts: 1,
            exhausted: false
        }
    );
    assert!(started.elapsed() <= Duration::from_secs(3));

    assert_ok!(handle.shutdown().await);
    assert_ok!(task.await.unwrap());
}
