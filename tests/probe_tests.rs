use agent_sentinel::sentinel::probe::ProbeClient;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn spawn_http(status_line: &'static str, body: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn successful_probe_returns_body_and_latency() {
    let endpoint = spawn_http("200 OK", r#"{"status":"ok"}"#).await;
    let client = ProbeClient::new();

    let result = client.probe(&endpoint).await;
    assert!(result.success);
    assert_eq!(result.body.as_deref(), Some(r#"{"status":"ok"}"#));
    // Local round trip: the wall time is filled in and sane.
    assert!(result.response_time_ms < 5_000);
}

#[tokio::test]
async fn non_2xx_is_a_failure_with_no_body() {
    let endpoint = spawn_http("500 Internal Server Error", "boom").await;
    let client = ProbeClient::new();

    let result = client.probe(&endpoint).await;
    assert!(!result.success);
    assert!(result.body.is_none());
}

#[tokio::test]
async fn redirect_status_is_not_success() {
    // 3xx is outside [200, 300).
    let endpoint = spawn_http("304 Not Modified", "").await;
    let client = ProbeClient::new();

    let result = client.probe(&endpoint).await;
    assert!(!result.success);
}

#[tokio::test]
async fn connection_refused_never_panics() {
    // Bind then immediately drop to obtain a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ProbeClient::new();
    let result = client.probe(&format!("http://{}", addr)).await;
    assert!(!result.success);
    assert!(result.body.is_none());
}

#[tokio::test]
async fn malformed_endpoint_is_a_failed_probe() {
    let client = ProbeClient::new();
    let result = client.probe("not a url").await;
    assert!(!result.success);
    assert!(result.body.is_none());
}
