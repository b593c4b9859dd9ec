//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use edge_gateway::config::{GatewayConfig, RouteConfig};
use edge_gateway::http::HttpServer;
use edge_gateway::lifecycle::Shutdown;

/// Read one HTTP/1.1 request from the socket and return its head (request
/// line + headers). Drains the body using Content-Length so the client
/// never sees a reset mid-write.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];

    loop {
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);

        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();

            let mut content_length = 0usize;
            for line in head.lines() {
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }

            let already = buf.len() - (pos + 4);
            let mut remaining = content_length.saturating_sub(already);
            while remaining > 0 {
                let n = socket.read(&mut tmp).await.ok()?;
                if n == 0 {
                    break;
                }
                remaining -= n.min(remaining);
            }

            return Some(head);
        }
    }
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a simple mock backend that returns a fixed 200 response.
#[allow(dead_code)]
pub async fn start_mock_backend(addr: SocketAddr, response: &'static str) {
    start_programmable_backend(addr, move |_head| async move { (200, response.to_string()) })
        .await;
}

/// Start a programmable mock backend. The closure receives the raw
/// request head (request line + headers) and returns (status, body).
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(head) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(head).await;
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a backend that answers with a verbatim raw HTTP response. Used
/// to test header stripping on the relay path.
#[allow(dead_code)]
pub async fn start_raw_backend(addr: SocketAddr, raw_response: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        if read_request(&mut socket).await.is_none() {
                            return;
                        }
                        let _ = socket.write_all(raw_response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Build a route with test-friendly policies.
#[allow(dead_code)]
pub fn test_route(name: &str, template: &str, methods: &[&str], backend: SocketAddr) -> RouteConfig {
    let mut route = RouteConfig {
        name: name.into(),
        upstream_path_template: template.into(),
        methods: methods.iter().map(|m| m.to_string()).collect(),
        downstream_base_url: format!("http://{}", backend),
        auth_required: true,
        idempotent: false,
        rate_limit: Default::default(),
        resilience: Default::default(),
    };
    // Keep tests fast and deterministic: no retries unless a test opts in.
    route.resilience.max_retries = 0;
    route.resilience.timeout_ms = 2000;
    route.rate_limit.limit = 1000;
    route.rate_limit.window_secs = 60;
    route
}

/// Start the gateway and return its shutdown handle.
#[allow(dead_code)]
pub async fn spawn_gateway(mut config: GatewayConfig, addr: SocketAddr) -> Shutdown {
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config);
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown
}

/// Non-pooled client so each request opens a fresh connection.
#[allow(dead_code)]
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
