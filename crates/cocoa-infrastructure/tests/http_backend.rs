//! HTTP transport against a local NDJSON server.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use cocoa_core::config::ClientConfig;
use cocoa_core::search::{SearchRequest, StageEvent};
use cocoa_core::stream::{LineReassembler, StreamMessage, StreamSignal, StreamSink, decode_lines};
use cocoa_core::{Generation, SearchBackend};
use cocoa_infrastructure::HttpSearchBackend;

/// Reads one request and returns its body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|value| value.trim().parse::<usize>().unwrap())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0);
        buffer.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8(buffer[header_end..header_end + content_length].to_vec()).unwrap()
}

async fn serve_once<F, Fut>(handler: F) -> (ClientConfig, tokio::task::JoinHandle<String>)
where
    F: FnOnce(TcpStream, String) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let body = read_request(&mut socket).await;
        handler(socket, body.clone()).await;
        body
    });
    let config = ClientConfig {
        backend_url: format!("http://{}", addr),
        ..ClientConfig::default()
    };
    (config, server)
}

async fn write_ndjson_head(socket: &mut TcpStream) {
    socket
        .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\nconnection: close\r\n\r\n")
        .await
        .unwrap();
}

async fn collect_until_end(rx: &mut mpsc::UnboundedReceiver<StreamMessage>) -> (String, StreamSignal) {
    let mut text = String::new();
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("stream did not finish")
            .expect("sink dropped");
        match message.signal {
            StreamSignal::Data(fragment) => text.push_str(&fragment),
            end => return (text, end),
        }
    }
}

#[tokio::test]
async fn test_fragmented_stage_stream_is_delivered_in_order() {
    let (config, server) = serve_once(|mut socket, _| async move {
        write_ndjson_head(&mut socket).await;
        let fragments: [&[u8]; 4] = [
            b"{\"stage\":\"filename\",\"hits\":[{\"fileId\":\"f1\"}],\"done\":false,\"latencyMs\":10}\n{\"stage\":\"sum",
            b"mary\",\"hits\":[{\"fileId\":\"f2\",\"metadata\":{\"path\":\"/notes/caf\xc3",
            b"\xa9.md\"}}],\"done\":false,\"latencyMs\":30}\n",
            b"{\"stage\":\"complete\",\"hits\":[],\"done\":true,\"latencyMs\":45}\n",
        ];
        for fragment in fragments {
            socket.write_all(fragment).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    let backend = HttpSearchBackend::new(config).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = StreamSink::new(Generation::new(1), tx);
    let _handle = backend
        .stream_search(
            SearchRequest {
                query: "café".to_string(),
                limit: 15,
            },
            sink,
        )
        .unwrap();

    let (text, end) = collect_until_end(&mut rx).await;
    assert_eq!(end, StreamSignal::Done);

    let mut reassembler = LineReassembler::new();
    let events: Vec<StageEvent> = decode_lines::<StageEvent, _>(reassembler.feed(&text))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].hits[0].label(), "/notes/café.md");
    assert!(events[2].done);

    let request: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(request, serde_json::json!({"query": "café", "limit": 15}));
}

#[tokio::test]
async fn test_http_error_becomes_error_signal() {
    let (config, _server) = serve_once(|mut socket, _| async move {
        let body = r#"{"detail":"index offline"}"#;
        let response = format!(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
    })
    .await;

    let backend = HttpSearchBackend::new(config).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = backend
        .stream_answer(
            cocoa_core::qa::QaRequest::new("q"),
            StreamSink::new(Generation::new(2), tx),
        )
        .unwrap();

    let (text, end) = collect_until_end(&mut rx).await;
    assert!(text.is_empty());
    match end {
        StreamSignal::Error(message) => assert_eq!(message, "index offline"),
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_stops_delivery() {
    let (config, _server) = serve_once(|mut socket, _| async move {
        write_ndjson_head(&mut socket).await;
        socket
            .write_all(b"{\"type\":\"token\",\"data\":\"Hel\"}\n")
            .await
            .unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = socket
            .write_all(b"{\"type\":\"token\",\"data\":\"lo\"}\n")
            .await;
    })
    .await;

    let backend = HttpSearchBackend::new(config).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = backend
        .stream_answer(
            cocoa_core::qa::QaRequest::new("q"),
            StreamSink::new(Generation::new(3), tx),
        )
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first.signal, StreamSignal::Data(_)));

    assert!(handle.cancel());
    assert!(!handle.cancel());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_one_shot_search() {
    let (config, _server) = serve_once(|mut socket, _| async move {
        let body = r#"{"hits":[{"fileId":"f1"},{"fileId":"f2"}],"rewrittenQuery":"q2","strategy":"hybrid","latencyMs":12,"queryVariants":["q"]}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
    })
    .await;

    let backend = HttpSearchBackend::new(config).unwrap();
    let response = backend
        .search(SearchRequest {
            query: "q".to_string(),
            limit: 5,
        })
        .await
        .unwrap();

    assert_eq!(response.hits.len(), 2);
    assert_eq!(response.rewritten_query.as_deref(), Some("q2"));
    assert_eq!(response.latency_ms, Some(12));
}

#[tokio::test]
async fn test_unreachable_backend_reports_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpSearchBackend::new(ClientConfig {
        backend_url: format!("http://{}", addr),
        ..ClientConfig::default()
    })
    .unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = backend
        .stream_search(
            SearchRequest {
                query: "q".to_string(),
                limit: 5,
            },
            StreamSink::new(Generation::new(4), tx),
        )
        .unwrap();

    let (_, end) = collect_until_end(&mut rx).await;
    match end {
        StreamSignal::Error(message) => {
            assert!(!message.starts_with("Transport error"), "{}", message)
        }
        other => panic!("expected error, got {:?}", other),
    }
}
