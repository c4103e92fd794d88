//! End-to-end tests for the composed client stack: base client over a real
//! socket, with caching and retrying decorators layered in both orders.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;

use restack_core::{
    Error, Headers, HttpRestClient, InMemoryCacheStore, MediaType, RequestBuilder, RestClient,
    RestClientExt, RetryPolicy, UrlBuilder,
};

/// One scripted HTTP exchange: status code and body to serve.
struct Exchange {
    status: u16,
    body: &'static str,
}

fn exchange(status: u16, body: &'static str) -> Exchange {
    Exchange { status, body }
}

/// Serve the scripted exchanges on an ephemeral port, one connection each.
/// Returns the base URL and a handle yielding the captured request heads.
fn serve(script: Vec<Exchange>) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for step in script {
            let (mut stream, _) = listener.accept().expect("accept");
            seen.push(read_request(&mut stream));
            let reason = match step.status {
                200 => "OK",
                201 => "Created",
                404 => "Not Found",
                429 => "Too Many Requests",
                500 => "Internal Server Error",
                _ => "Status",
            };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                step.status,
                reason,
                step.body.len(),
                step.body
            );
            stream.write_all(response.as_bytes()).expect("write response");
        }
        seen
    });

    (format!("http://{}", addr), handle)
}

/// Read the request head (and drain any body) from the stream.
fn read_request(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => head.push(byte[0]),
            Err(_) => break,
        }
    }
    let head = String::from_utf8_lossy(&head).into_owned();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    if content_length > 0 {
        let mut body = vec![0u8; content_length];
        let _ = stream.read_exact(&mut body);
    }
    head
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct Status {
    state: String,
}

#[test]
fn test_base_client_sends_media_defaults() {
    let (base, server) = serve(vec![exchange(200, r#"{"state":"up"}"#)]);

    let client = HttpRestClient::json().expect("client");
    let decoded: Option<Status> = client
        .request()
        .to_url(format!("{}/status", base))
        .get_json()
        .expect("get_json");

    assert_eq!(decoded, Some(Status { state: "up".to_string() }));

    let requests = server.join().expect("server");
    assert!(requests[0].starts_with("GET /status HTTP/1.1"));
    assert!(requests[0].contains("accept: application/json;charset=utf-8"));
    assert!(requests[0].contains("accept-charset: utf-8"));
}

#[test]
fn test_caller_header_overrides_flavor_default() {
    let (base, server) = serve(vec![exchange(200, "plain")]);

    let client = HttpRestClient::json().expect("client");
    client
        .request()
        .to_url(format!("{}/raw", base))
        .accepting(MediaType::TextPlain)
        .get_text()
        .expect("get_text");

    let requests = server.join().expect("server");
    assert!(requests[0].contains("accept: text/plain"));
    assert!(!requests[0].contains("application/json"));
}

#[test]
fn test_retry_then_cache_recovers_and_memoizes() {
    let (base, server) = serve(vec![
        exchange(500, "boom"),
        exchange(200, r#"{"state":"recovered"}"#),
    ]);
    let url = format!("{}/flaky", base);

    // Cache outermost: a miss runs through the retrying layer.
    let client = HttpRestClient::json()
        .expect("client")
        .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
        .with_cache(InMemoryCacheStore::new());

    let first: Option<Status> = client.get_json(&url, &Headers::new()).expect("first");
    assert_eq!(first, Some(Status { state: "recovered".to_string() }));

    // Served from cache; the server script is already exhausted.
    let second: Option<Status> = client.get_json(&url, &Headers::new()).expect("second");
    assert_eq!(second, first);

    assert_eq!(server.join().expect("server").len(), 2);
}

#[test]
fn test_cached_404_is_negative_and_never_retried() {
    let (base, server) = serve(vec![exchange(404, "missing")]);
    let url = format!("{}/absent", base);

    let client = HttpRestClient::json()
        .expect("client")
        .with_cache(InMemoryCacheStore::new())
        .with_retry(RetryPolicy::new(5, Duration::from_millis(10)));

    assert_eq!(client.get(&url, &Headers::new()).expect("first"), None);
    assert_eq!(client.get(&url, &Headers::new()).expect("second"), None);

    // One request in total: 404 went straight to the negative cache.
    assert_eq!(server.join().expect("server").len(), 1);
}

#[test]
fn test_deferred_holder_with_status_override() {
    let (base, server) = serve(vec![exchange(404, "missing")]);

    let client = HttpRestClient::json().expect("client");
    let mut holder = client
        .get_and(&format!("{}/absent", base), &Headers::new())
        .expect("get_and")
        .handle_status_code(404, |_| Some(Bytes::from_static(b"fallback")));

    assert_eq!(holder.status(), 404);
    assert_eq!(holder.get().expect("get"), Some(Bytes::from_static(b"fallback")));

    server.join().expect("server");
}

#[test]
fn test_deferred_holder_raises_on_unhandled_status() {
    let (base, server) = serve(vec![exchange(500, "boom")]);

    let client = HttpRestClient::json().expect("client");
    let mut holder = client
        .get_and(&format!("{}/broken", base), &Headers::new())
        .expect("get_and");

    assert_eq!(holder.status(), 500);
    match holder.get().expect_err("status failure") {
        Error::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }

    server.join().expect("server");
}

#[test]
fn test_throttled_get_succeeds_on_final_attempt() {
    let (base, server) = serve(vec![
        exchange(429, "slow down"),
        exchange(429, "slow down"),
        exchange(429, "slow down"),
        exchange(429, "slow down"),
        exchange(200, r#""value""#),
    ]);

    let client = HttpRestClient::json()
        .expect("client")
        .with_retry(RetryPolicy::new(5, Duration::from_millis(100)));

    let started = std::time::Instant::now();
    let decoded: Option<String> = client
        .get_json(&format!("{}/throttled", base), &Headers::new())
        .expect("get_json");

    assert_eq!(decoded, Some("value".to_string()));
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert_eq!(server.join().expect("server").len(), 5);
}

#[test]
fn test_post_json_round_trip() {
    let (base, server) = serve(vec![exchange(201, r#"{"state":"created"}"#)]);

    let client = HttpRestClient::json().expect("client");
    let created: Status = client
        .request()
        .to_url(format!("{}/items", base))
        .post_json(&serde_json::json!({"name": "widget"}))
        .expect("post_json");

    assert_eq!(created.state, "created");

    let requests = server.join().expect("server");
    assert!(requests[0].starts_with("POST /items HTTP/1.1"));
    assert!(requests[0].contains("content-type: application/json"));
}

#[test]
fn test_built_url_reaches_the_right_path() {
    let (base, server) = serve(vec![exchange(200, r#""ok""#)]);

    let client = HttpRestClient::json().expect("client");
    RequestBuilder::new(&client)
        .to_built_url(
            UrlBuilder::from_base_url(&base)
                .add_path_token("users")
                .add_path_token("id with space")
                .add_query_parameter("expand", "all"),
        )
        .expect("build url")
        .get_bytes()
        .expect("get");

    let requests = server.join().expect("server");
    assert!(requests[0].starts_with("GET /users/id%20with%20space?expand=all HTTP/1.1"));
}

#[test]
fn test_stack_behind_trait_object() {
    let (base, server) = serve(vec![exchange(200, r#""behind dyn""#)]);
    let url = format!("{}/dyn", base);

    let client: Box<dyn RestClient> = Box::new(
        HttpRestClient::json()
            .expect("client")
            .with_retry(RetryPolicy::default())
            .with_cache(InMemoryCacheStore::new()),
    );

    let decoded: Option<String> = client.get_json(&url, &Headers::new()).expect("get_json");
    assert_eq!(decoded, Some("behind dyn".to_string()));

    server.join().expect("server");
}
