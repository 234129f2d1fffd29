use o11y_client::app::{ForwardOutcome, forward_lines};
use o11y_client::clock::VirtualClock;
use o11y_client::{Action, Client, ClientConfig, Envelope};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

async fn client_for(server: &MockServer) -> Client {
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(server)
        .await;
    let clock = Arc::new(VirtualClock::parse("2023-04-21T00:00:00Z").unwrap());
    let config = ClientConfig::new(format!("{}/emit", server.uri()))
        .with_identifier("emit")
        .with_clock(clock)
        .without_check_connect();
    Client::new(config).await.unwrap()
}

async fn sent_data(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .flat_map(|request| {
            std::str::from_utf8(&request.body)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str::<Envelope>(line).unwrap())
                .collect::<Vec<_>>()
        })
        .filter(|e| e.action == Some(Action::Data))
        .filter_map(|e| e.data)
        .collect()
}

#[tokio::test]
async fn test_forwards_until_end_of_input() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;
    let input: &[u8] = b"{\"n\":1}\n\n   \nplain text\n";

    let outcome = forward_lines(input, &client, 0, std::future::pending())
        .await
        .unwrap();
    assert_eq!(outcome, ForwardOutcome::EndOfInput);

    client.close().await.unwrap();
    assert_eq!(
        sent_data(&server).await,
        vec![json!({"n": 1}), json!("plain text")]
    );
}

#[tokio::test]
async fn test_shutdown_signal_between_reads_is_not_lost() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;
    let (mut writer, reader) = tokio::io::duplex(64);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    // Keeps the writer open so only the signal can end the loop
    let feeder = tokio::spawn(async move {
        writer.write_all(b"\"first\"\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.write_all(b"\"second\"\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send(()).unwrap();
        writer
    });
    let shutdown = async {
        let _ = stop_rx.await;
    };

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        forward_lines(BufReader::new(reader), &client, 0, shutdown),
    )
    .await
    .expect("shutdown should end forwarding")
    .unwrap();
    assert_eq!(outcome, ForwardOutcome::Interrupted);
    let _writer = feeder.await.unwrap();

    client.close().await.unwrap();
    assert_eq!(sent_data(&server).await, vec![json!("first"), json!("second")]);
}

#[tokio::test]
async fn test_stops_when_client_is_closed() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;
    client.close().await.unwrap();

    let input: &[u8] = b"\"late\"\n\"later\"\n";
    let outcome = forward_lines(input, &client, 0, std::future::pending())
        .await
        .unwrap();
    assert_eq!(outcome, ForwardOutcome::ClientStopped);
}
