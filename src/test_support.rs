//! Loopback HTTP server for unit tests.

use std::collections::HashMap;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Canned response for one path.
#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Route {
    pub fn html(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn bytes(body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: "image/jpeg",
            body: body.to_vec(),
        }
    }
}

/// Serves a fixed number of requests, one connection each, then stops.
pub struct MockServer {
    listener: TcpListener,
    base: String,
}

impl MockServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        Self { listener, base }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Answer `requests` requests from `routes` (unknown paths get a 404) and
    /// return the raw requests in arrival order.
    pub fn serve(self, routes: HashMap<String, Route>, requests: usize) -> JoinHandle<Vec<String>> {
        self.serve_with_fallback(routes, Route::html(404, "not found"), requests)
    }

    /// Like `serve`, answering unknown paths with `fallback`.
    pub fn serve_with_fallback(
        self,
        routes: HashMap<String, Route>,
        fallback: Route,
        requests: usize,
    ) -> JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut seen = Vec::with_capacity(requests);
            for _ in 0..requests {
                let (mut socket, _) = self.listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();
                let route = routes.get(&path).unwrap_or(&fallback);

                let head = format!(
                    "HTTP/1.1 {} Mock\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    route.status,
                    route.content_type,
                    route.body.len()
                );
                socket.write_all(head.as_bytes()).await.unwrap();
                socket.write_all(&route.body).await.unwrap();
                let _ = socket.shutdown().await;
                seen.push(request);
            }
            seen
        })
    }
}

/// Serve a single response on any path.
pub async fn serve_once(route: Route) -> (String, JoinHandle<Vec<String>>) {
    let server = MockServer::bind().await;
    let url = server.url("/");
    (url, server.serve_with_fallback(HashMap::new(), route, 1))
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
