use std::time::Duration;

use resolutions::{http::HttpLimits, server::ConnectionSettings};
use tokio::{io::AsyncWriteExt, time::timeout};

use crate::support::{TestServer, read_until_closed, status_line};

fn small_limits() -> ConnectionSettings {
    ConnectionSettings {
        limits: HttpLimits {
            max_header_bytes: 1024,
            max_body_bytes: 32,
        },
        ..ConnectionSettings::default()
    }
}

#[tokio::test]
async fn oversized_body_is_rejected_with_413() {
    let server = TestServer::start_with(small_limits()).await;

    let body = format!(r#"{{"title":"{}"}}"#, "x".repeat(64));
    let request = format!(
        "POST /resolutions HTTP/1.1\r\nHost: test\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let response = server.send_raw(request.as_bytes()).await;

    assert_eq!(status_line(&response), "HTTP/1.1 413 Payload Too Large");
    assert!(response.contains("Connection: close"));
    assert!(response.contains(r#""error":"PayloadTooLarge""#));
    assert!(response.contains(r#""message":"Request body too large.""#));

    let list = server
        .client
        .get(server.url("/resolutions"))
        .send()
        .await
        .expect("list request should succeed");
    let list: serde_json::Value = list.json().await.expect("body should be json");
    assert_eq!(list["items"].as_array().map(Vec::len), Some(2));

    server.stop().await;
}

#[tokio::test]
async fn oversized_head_is_rejected_with_431() {
    let server = TestServer::start_with(small_limits()).await;

    let request = format!(
        "GET /resolutions HTTP/1.1\r\nX-Padding: {}\r\n\r\n",
        "a".repeat(2048)
    );
    let response = server.send_raw(request.as_bytes()).await;
    assert_eq!(
        status_line(&response),
        "HTTP/1.1 431 Request Header Fields Too Large"
    );

    server.stop().await;
}

#[tokio::test]
async fn chunked_bodies_are_not_implemented() {
    let server = TestServer::start().await;

    let response = server
        .send_raw(
            b"POST /resolutions HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
        )
        .await;
    assert_eq!(status_line(&response), "HTTP/1.1 501 Not Implemented");
    assert!(response.contains(r#""error":"NotImplemented""#));

    server.stop().await;
}

#[tokio::test]
async fn malformed_request_line_is_bad_request() {
    let server = TestServer::start().await;

    let response = server.send_raw(b"NOT-HTTP\r\n\r\n").await;
    assert_eq!(status_line(&response), "HTTP/1.1 400 Bad Request");
    assert!(response.contains(r#""error":"BadRequest""#));

    server.stop().await;
}

#[tokio::test]
async fn keep_alive_serves_pipelined_requests_until_close() {
    let server = TestServer::start().await;

    let response = server
        .send_raw(
            b"GET /resolutions/1 HTTP/1.1\r\nHost: test\r\n\r\nGET /resolutions/2 HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n",
        )
        .await;

    assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 2);
    assert!(response.contains("Connection: keep-alive"));
    assert!(response.contains("Connection: close"));
    assert!(response.contains("Walk 20 minutes daily"));
    assert!(response.contains("Run 20 minutes daily"));

    server.stop().await;
}

#[tokio::test]
async fn http10_request_closes_after_response() {
    let server = TestServer::start().await;

    let response = server.send_raw(b"GET /resolutions HTTP/1.0\r\n\r\n").await;
    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert!(response.contains("Connection: close"));
    assert!(response.contains(r#""items""#));

    server.stop().await;
}

#[tokio::test]
async fn no_content_response_has_no_body() {
    let server = TestServer::start().await;

    let response = server
        .send_raw(b"DELETE /resolutions/1 HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await;
    assert_eq!(status_line(&response), "HTTP/1.1 204 No Content");
    assert!(response.ends_with("\r\n\r\n"));
    assert!(!response.contains("Content-Length"));

    server.stop().await;
}

#[tokio::test]
async fn control_bytes_in_host_are_rejected_before_routing() {
    let server = TestServer::start().await;

    let response = server
        .send_raw(
            b"POST /resolutions HTTP/1.1\r\nHost: a\rSet-Cookie: pwned=1\r\nContent-Length: 13\r\n\r\n{\"title\":\"x\"}",
        )
        .await;
    assert_eq!(status_line(&response), "HTTP/1.1 400 Bad Request");
    assert!(!response.contains("Set-Cookie"));
    assert!(!response.contains("Location"));

    server.stop().await;
}

#[tokio::test]
async fn stalled_request_is_closed_after_read_timeout() {
    let server = TestServer::start_with(ConnectionSettings {
        read_timeout: Duration::from_millis(200),
        ..ConnectionSettings::default()
    })
    .await;

    let mut stream = server.connect().await;
    stream
        .write_all(b"GET /resolutions HTTP/1.1\r\nHost: x")
        .await
        .expect("partial request should be written");
    let response = timeout(Duration::from_secs(5), read_until_closed(&mut stream))
        .await
        .expect("server should close a stalled connection");
    assert!(response.is_empty(), "unexpected response: {response}");

    let mut idle = server.connect().await;
    let response = timeout(Duration::from_secs(5), read_until_closed(&mut idle))
        .await
        .expect("server should close an idle connection");
    assert!(response.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn connections_over_the_cap_get_service_unavailable() {
    let server = TestServer::start_with(ConnectionSettings {
        max_connections: 1,
        ..ConnectionSettings::default()
    })
    .await;

    let held = server.connect().await;
    let mut rejected = server.connect().await;
    let response = timeout(Duration::from_secs(5), read_until_closed(&mut rejected))
        .await
        .expect("server should answer the extra connection");
    assert_eq!(status_line(&response), "HTTP/1.1 503 Service Unavailable");
    assert!(response.contains(r#""error":"ServiceUnavailable""#));

    drop(held);
    let mut served = false;
    for _ in 0..50 {
        let response = server
            .send_raw(b"GET /resolutions HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await;
        if status_line(&response) == "HTTP/1.1 200 OK" {
            served = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(served, "slot should be released once the held connection closes");

    server.stop().await;
}
