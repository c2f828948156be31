//! Shared helpers for tests that run a real tool server

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use polymcp::{ServerInfo, ToolRegistry, ToolServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Start a tool server on a free local port and wait until it answers
///
/// Returns the server's base URL.
pub async fn spawn_server(registry: ToolRegistry, info: ServerInfo) -> String {
    let addr = free_addr();
    tokio::spawn(ToolServer::new(registry, info).run(addr));

    let base_url = format!("http://{}", addr);
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client.get(&base_url).send().await.is_ok() {
            return base_url;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("tool server at {} did not start", base_url);
}

/// Send a hand-written HTTP/1.1 request and return the whole raw response
///
/// The request should carry `Connection: close` so the server ends the
/// response by closing the socket.
pub async fn raw_request(base_url: &str, request: &str) -> String {
    let addr = base_url.trim_start_matches("http://");
    let mut stream = TcpStream::connect(addr).await.expect("connect to tool server");
    stream
        .write_all(request.as_bytes())
        .await
        .expect("write request");

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("read response");
    String::from_utf8_lossy(&response).into_owned()
}

fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local address")
}
