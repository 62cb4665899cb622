//! A minimal HTTP/1.1 server answering every request with one response.
//!
//! The response can be swapped while the server runs, which lets tests
//! observe how a polling client reacts to changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
struct Reply {
    status: u16,
    body: Vec<u8>,
    delay: Duration,
}

#[derive(Debug, Default)]
struct State {
    reply: Mutex<Option<Reply>>,
    requests: AtomicUsize,
    last_request: Mutex<String>,
}

/// Stub server bound to an ephemeral localhost port.
#[derive(Debug)]
pub struct StubServer {
    port: u16,
    state: Arc<State>,
    task: JoinHandle<()>,
}

impl StubServer {
    /// Bind and start serving `200` with `body`.
    ///
    /// # Errors
    ///
    /// Fails when no local port can be bound.
    pub async fn start(body: impl Into<Vec<u8>>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind stub server")?;
        let port = listener.local_addr().context("stub server address")?.port();
        let state = Arc::new(State::default());
        *state.reply.lock() = Some(Reply {
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        });
        let serving = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(answer(stream, Arc::clone(&serving)));
            }
        });
        Ok(Self { port, state, task })
    }

    /// Port the server listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Answer future requests with `status` and `body`.
    pub fn respond(&self, status: u16, body: impl Into<Vec<u8>>) {
        let mut reply = self.state.reply.lock();
        let delay = reply.as_ref().map_or(Duration::ZERO, |r| r.delay);
        *reply = Some(Reply {
            status,
            body: body.into(),
            delay,
        });
    }

    /// Wait `delay` before answering future requests.
    pub fn delay(&self, delay: Duration) {
        if let Some(reply) = self.state.reply.lock().as_mut() {
            reply.delay = delay;
        }
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Head of the most recent request, request line and headers.
    #[must_use]
    pub fn last_request(&self) -> String {
        self.state.last_request.lock().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer(mut stream: TcpStream, state: Arc<State>) {
    let mut head = Vec::new();
    let mut chunk = [0_u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(read) => head.extend(chunk.iter().take(read)),
        }
    }
    state.requests.fetch_add(1, Ordering::SeqCst);
    *state.last_request.lock() = String::from_utf8_lossy(&head).into_owned();

    let Some(reply) = state.reply.lock().clone() else {
        return;
    };
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    let status_line = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reason(reply.status),
        reply.body.len()
    );
    if stream.write_all(status_line.as_bytes()).await.is_ok() {
        stream.write_all(&reply.body).await.ok();
    }
    stream.shutdown().await.ok();
}

const fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
