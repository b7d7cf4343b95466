//! Shared utilities for relay integration tests.
//!
//! The mock upstream speaks hand-written HTTP/1.1 over raw TCP so tests can
//! control chunk boundaries, cut a chunked body mid-way, and observe the
//! relay closing its side of the connection.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use event_relay::config::RelayConfig;
use event_relay::relay::SessionTracker;
use event_relay::{HttpServer, Shutdown};

/// How the mock upstream ends a stream after its scripted chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// Terminating zero-length chunk, then close.
    Clean,
    /// Close the socket without the terminating chunk.
    Reset,
    /// Keep the connection open until the relay closes it.
    Hold,
}

/// What the mock upstream answers to one request.
#[derive(Debug, Clone)]
pub struct Script {
    pub status: u16,
    pub chunks: Vec<String>,
    pub delay: Duration,
    pub ending: Ending,
}

impl Script {
    pub fn stream<S: Into<String>>(chunks: impl IntoIterator<Item = S>) -> Self {
        Self {
            status: 200,
            chunks: chunks.into_iter().map(Into::into).collect(),
            delay: Duration::from_millis(5),
            ending: Ending::Clean,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            chunks: Vec::new(),
            delay: Duration::ZERO,
            ending: Ending::Clean,
        }
    }

    pub fn ending(mut self, ending: Ending) -> Self {
        self.ending = ending;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Handle on a running mock upstream.
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
    peer_closed: Arc<Notify>,
}

impl MockUpstream {
    /// Number of TCP connections the upstream accepted.
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    /// Raw request heads received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Wait until a held stream sees the relay close its connection.
    pub async fn wait_peer_closed(&self, within: Duration) -> bool {
        tokio::time::timeout(within, self.peer_closed.notified())
            .await
            .is_ok()
    }
}

/// Value of `name` in a raw request head, matched case-insensitively.
pub fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim_start())
    })
}

/// Start a mock upstream whose answer depends on the request head.
pub async fn start_upstream<F>(script: F) -> MockUpstream
where
    F: Fn(&str) -> Script + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = MockUpstream {
        addr: listener.local_addr().unwrap(),
        accepts: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
        peer_closed: Arc::new(Notify::new()),
    };

    let script = Arc::new(script);
    let handle = upstream.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            handle.accepts.fetch_add(1, Ordering::SeqCst);
            let script = script.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                serve_one(socket, script.as_ref(), &handle).await;
            });
        }
    });

    upstream
}

async fn serve_one<F>(mut socket: TcpStream, script: &F, handle: &MockUpstream)
where
    F: Fn(&str) -> Script,
{
    let Some(head) = read_head(&mut socket).await else {
        return;
    };
    handle.requests.lock().unwrap().push(head.clone());
    let script = script(&head);

    if script.status != 200 {
        let response = format!(
            "HTTP/1.1 {} Rejected\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            script.status
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
        return;
    }

    let head = "HTTP/1.1 200 OK\r\n\
                Content-Type: text/event-stream\r\n\
                Cache-Control: no-cache\r\n\
                Transfer-Encoding: chunked\r\n\r\n";
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }

    for chunk in &script.chunks {
        tokio::time::sleep(script.delay).await;
        let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
        if socket.write_all(frame.as_bytes()).await.is_err() {
            handle.peer_closed.notify_one();
            return;
        }
        let _ = socket.flush().await;
    }

    match script.ending {
        Ending::Clean => {
            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
        Ending::Reset => {
            tokio::time::sleep(script.delay).await;
            drop(socket);
        }
        Ending::Hold => {
            // The relay never sends more after the request head, so any read
            // completing means it closed the connection.
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await;
            handle.peer_closed.notify_one();
        }
    }
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut byte).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&byte[..n]);
    }
    String::from_utf8(buf).ok()
}

/// A relay running on an ephemeral port.
pub struct RelayHandle {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub sessions: SessionTracker,
    pub server: tokio::task::JoinHandle<()>,
}

impl RelayHandle {
    pub fn url(&self) -> String {
        format!("http://{}/events", self.addr)
    }

    /// Wait until no relay session holds an upstream.
    pub async fn wait_idle(&self, within: Duration) -> bool {
        tokio::time::timeout(within, async {
            while self.sessions.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }
}

/// Start a relay pointed at `upstream`.
pub async fn start_relay(upstream: SocketAddr, configure: impl FnOnce(&mut RelayConfig)) -> RelayHandle {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.base_url = format!("http://{upstream}");
    config.upstream.connect_timeout_secs = 1;
    config.upstream.response_timeout_secs = 2;
    configure(&mut config);

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, &shutdown).unwrap();
    let sessions = server.sessions();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RelayHandle {
        addr,
        shutdown,
        sessions,
        server,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Read a response body chunk by chunk. Returns the bytes received and
/// whether the body ended with an error instead of a clean terminator.
pub async fn drain(mut response: reqwest::Response) -> (Vec<u8>, bool) {
    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) => return (body, false),
            Err(_) => return (body, true),
        }
    }
}
