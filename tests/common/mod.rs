//! Shared utilities for integration tests.
//!
//! Provides an in-process word server speaking the `<STOP>`-framed protocol:
//! - Finite or endless word streams with global indices
//! - Adjustable buffer-level gauge
//! - Fault modes: bad session id, rejected link, reset on `getword`

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use wordpool::protocol::{END_OF_STREAM, LINKED_REPLY};
use wordpool::transport::read_frame;
use wordpool::{Connection, ExchangeBuffer, FrameCodec, WorkItem};

// ============================================================================
// Logging
// ============================================================================

/// Initialize tracing for a test run. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wordpool=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Configuration
// ============================================================================

/// Behaviour of a [`MockServer`].
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Words to hand out, then `<EOF>`. `None` hands out words forever.
    pub words: Option<Vec<String>>,
    /// Initial gauge reported with every item.
    pub gauge: f64,
    /// Reply to `id` with something that is not a UUID.
    pub bad_id: bool,
    /// Reply to `linkto` with this instead of the link confirmation.
    pub link_reply: Option<String>,
    /// Reset the socket instead of answering `getword`.
    pub reset_on_getword: bool,
    /// Pause before answering each `getword`.
    pub word_delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            words: None,
            gauge: 50.0,
            bad_id: false,
            link_reply: None,
            reset_on_getword: false,
            word_delay: Duration::from_millis(1),
        }
    }
}

impl MockConfig {
    /// Hands out `words` in order, then `<EOF>`.
    pub fn finite(words: &[&str]) -> Self {
        Self {
            words: Some(words.iter().map(|w| (*w).to_string()).collect()),
            ..Self::default()
        }
    }
}

// ============================================================================
// MockServer
// ============================================================================

struct ServerState {
    config: MockConfig,
    session: Uuid,
    codec: FrameCodec,
    next_index: AtomicU64,
    gauge: Mutex<f64>,
    links: AtomicUsize,
    unlinks: AtomicUsize,
}

/// A word server bound to an ephemeral localhost port.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    accept_task: JoinHandle<()>,
}

impl MockServer {
    /// Binds and starts accepting.
    pub async fn start(config: MockConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(ServerState {
            gauge: Mutex::new(config.gauge),
            config,
            session: Uuid::new_v4(),
            codec: FrameCodec::default(),
            next_index: AtomicU64::new(0),
            links: AtomicUsize::new(0),
            unlinks: AtomicUsize::new(0),
        });

        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept_state)));
            }
        });

        Self {
            addr,
            state,
            accept_task,
        }
    }

    /// Returns the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the session id handed out for `id`.
    pub fn session(&self) -> Uuid {
        self.state.session
    }

    /// Changes the gauge reported with subsequent items.
    pub fn set_gauge(&self, level: f64) {
        *self.state.gauge.lock() = level;
    }

    /// Returns how many `linkto` commands were answered.
    pub fn links(&self) -> usize {
        self.state.links.load(Ordering::SeqCst)
    }

    /// Returns how many `unlinkfrom` commands were answered.
    pub fn unlinks(&self) -> usize {
        self.state.unlinks.load(Ordering::SeqCst)
    }

    /// Opens a primary connection to this server.
    pub async fn connect_primary(&self) -> Connection {
        Connection::open("127.0.0.1", self.addr.port(), FrameCodec::default())
            .await
            .unwrap()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

// ============================================================================
// Connection Handler
// ============================================================================

async fn serve(mut stream: TcpStream, state: Arc<ServerState>) {
    let mut buffer = ExchangeBuffer::for_codec(&state.codec);

    loop {
        buffer.reset();
        let Ok(command) = read_frame(&mut stream, &state.codec, &mut buffer).await else {
            return;
        };

        let reply = match command.split_once(' ') {
            None if command == "id" => session_reply(&state),
            None if command == "getword" => {
                if state.config.reset_on_getword {
                    reset(stream);
                    return;
                }
                tokio::time::sleep(state.config.word_delay).await;
                next_item(&state)
            }
            None if command == "disconnect" => {
                let _ = stream.write_all(&state.codec.encode_frame("BYE")).await;
                return;
            }
            Some(("linkto", _)) => {
                state.links.fetch_add(1, Ordering::SeqCst);
                state
                    .config
                    .link_reply
                    .clone()
                    .unwrap_or_else(|| LINKED_REPLY.to_string())
            }
            Some(("unlinkfrom", _)) => {
                state.unlinks.fetch_add(1, Ordering::SeqCst);
                "UNLINKED".to_string()
            }
            _ => "UNKNOWN COMMAND".to_string(),
        };

        if stream
            .write_all(&state.codec.encode_frame(&reply))
            .await
            .is_err()
        {
            return;
        }
    }
}

fn session_reply(state: &ServerState) -> String {
    if state.config.bad_id {
        "NOT A SESSION".to_string()
    } else {
        state.session.to_string()
    }
}

fn next_item(state: &ServerState) -> String {
    let index = state.next_index.fetch_add(1, Ordering::SeqCst);
    let gauge = *state.gauge.lock();

    let text = match &state.config.words {
        None => format!("word{index}"),
        Some(words) => match usize::try_from(index).ok().and_then(|i| words.get(i)) {
            Some(word) => word.clone(),
            None => END_OF_STREAM.to_string(),
        },
    };

    serde_json::to_string(&WorkItem::new(text, index, gauge)).unwrap()
}

/// Drops the socket with SO_LINGER 0 so the peer sees a reset.
#[allow(deprecated)]
fn reset(stream: TcpStream) {
    let _ = stream.set_linger(Some(Duration::ZERO));
    drop(stream);
}

// ============================================================================
// Polling
// ============================================================================

/// Polls `check` every 10ms until it returns `true` or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
