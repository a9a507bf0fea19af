//! Connection lifecycle.
//!
//! One background task per connection drives the whole lifecycle:
//!
//! ```text
//! Idle ──connect()──▶ Connecting ──open──▶ Authenticating ──authenticated──▶ Subscribed
//!  ▲                      │                      │                              │
//!  │                      └──────── close / open failure / keepalive expiry ────┘
//!  │                                             │
//!  └──────────── reconnect interval ◀── Closing ─┘
//! ```
//!
//! The task owns the transport and both timers (keepalive deadline and
//! reconnect backoff), so neither can overlap with another of its kind. The
//! client handle only shares a small status record with it, guarded by one
//! mutex, and talks to it through a command channel. `disconnect()` detaches
//! the task from that record and tells it to close; a detached task never
//! touches the record again, so a later `connect()` can start a fresh task
//! without racing the old one.
//!
//! `connect()` resolves once the transport is open and the `auth` frame has
//! been sent, not once the relay confirms the credentials. Rejected
//! credentials show up later as an `unauthorized` status frame.

use crate::client::config::Credentials;
use crate::client::dispatch::{Action, Dispatcher};
use crate::client::transport::{Connector, Transport};
use crate::error::{RelayError, Result};
use crate::protocol::ClientFrame;
use parking_lot::Mutex;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::Instrument;
use url::Url;

/// Lifecycle phase of the client's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No transport. Either never connected, waiting to reconnect, or
    /// manually disconnected.
    Idle,
    /// Opening a transport.
    Connecting,
    /// Transport open, `auth` sent.
    Authenticating,
    /// Subscription requested; keepalive monitoring active.
    Subscribed,
    /// Tearing down a dead transport.
    Closing,
}

#[derive(Debug)]
enum Command {
    Close,
}

struct TaskHandle {
    generation: u64,
    commands: mpsc::UnboundedSender<Command>,
}

struct Status {
    phase: ConnectionPhase,
    connecting: bool,
    connected: bool,
    manual_disconnect: bool,
    generation: u64,
    task: Option<TaskHandle>,
    waiters: Vec<oneshot::Sender<()>>,
}

pub(crate) struct ConnectionSettings {
    pub(crate) credentials: Credentials,
    pub(crate) socket_url: Url,
    pub(crate) reconnect_interval: Duration,
    pub(crate) keepalive_timeout: Duration,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) span: tracing::Span,
}

struct Inner {
    settings: ConnectionSettings,
    status: Mutex<Status>,
}

impl Inner {
    /// Apply `f` if task `generation` is still the attached one.
    fn update(&self, generation: u64, f: impl FnOnce(&mut Status)) -> bool {
        let mut status = self.status.lock();
        let attached = status
            .task
            .as_ref()
            .is_some_and(|task| task.generation == generation);
        if attached {
            f(&mut status);
        }
        attached
    }

    fn notify_open(&self, generation: u64) {
        self.update(generation, |status| {
            for waiter in status.waiters.drain(..) {
                let _ = waiter.send(());
            }
        });
    }
}

/// Handle to the connection shared by all clones of a client.
#[derive(Clone)]
pub(crate) struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub(crate) fn new(settings: ConnectionSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                status: Mutex::new(Status {
                    phase: ConnectionPhase::Idle,
                    connecting: false,
                    connected: false,
                    manual_disconnect: false,
                    generation: 0,
                    task: None,
                    waiters: Vec::new(),
                }),
            }),
        }
    }

    pub(crate) async fn connect(&self) -> Result<()> {
        let opened = {
            let mut status = self.inner.status.lock();
            if status.connected {
                return Ok(());
            }
            status.manual_disconnect = false;

            let (waiter, opened) = oneshot::channel();
            status.waiters.push(waiter);

            if status.task.is_none() {
                status.generation += 1;
                let generation = status.generation;
                let (commands, receiver) = mpsc::unbounded_channel();
                status.task = Some(TaskHandle {
                    generation,
                    commands,
                });
                status.phase = ConnectionPhase::Connecting;
                status.connecting = true;

                let task = run(self.inner.clone(), generation, receiver);
                tokio::spawn(task.instrument(self.inner.settings.span.clone()));
            }
            opened
        };
        opened.await.map_err(|_| RelayError::Disconnected)
    }

    pub(crate) fn disconnect(&self) {
        let mut status = self.inner.status.lock();
        status.manual_disconnect = true;
        status.connected = false;
        status.connecting = false;
        status.phase = ConnectionPhase::Idle;
        // pending connect() calls resolve with Disconnected
        status.waiters.clear();
        if let Some(task) = status.task.take() {
            let _ = task.commands.send(Command::Close);
        }
    }

    pub(crate) fn is_connecting(&self) -> bool {
        self.inner.status.lock().connecting
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.inner.status.lock().connected
    }

    pub(crate) fn is_manually_disconnected(&self) -> bool {
        self.inner.status.lock().manual_disconnect
    }

    pub(crate) fn phase(&self) -> ConnectionPhase {
        self.inner.status.lock().phase
    }
}

async fn run(inner: Arc<Inner>, generation: u64, mut commands: mpsc::UnboundedReceiver<Command>) {
    let settings = &inner.settings;
    loop {
        inner.update(generation, |status| {
            status.phase = ConnectionPhase::Connecting;
            status.connecting = true;
        });

        let opened = tokio::select! {
            opened = settings.connector.connect(&settings.socket_url) => opened,
            _ = commands.recv() => {
                tracing::info!("manual disconnect");
                return;
            }
        };

        match opened {
            Ok(transport) => {
                let session = Session {
                    inner: &inner,
                    generation,
                    transport,
                    subscribed: false,
                    deadline: None,
                };
                if session.run(&mut commands).await == SessionEnd::Manual {
                    tracing::info!("manual disconnect");
                    return;
                }
            }
            Err(e) => tracing::error!(error = %e, url = %settings.socket_url, "failed to open connection"),
        }

        let attached = inner.update(generation, |status| {
            status.phase = ConnectionPhase::Idle;
            status.connected = false;
            status.connecting = false;
        });
        if !attached {
            return;
        }

        tracing::info!(
            delay_ms = settings.reconnect_interval.as_millis() as u64,
            "connection closed, reconnecting.."
        );
        tokio::select! {
            _ = sleep(settings.reconnect_interval) => {}
            _ = commands.recv() => {
                tracing::info!("manual disconnect");
                return;
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// `disconnect()` was called.
    Manual,
    /// The transport closed.
    Closed,
    /// Nothing arrived before the keepalive deadline.
    Expired,
}

/// One open transport. Dropped and replaced on every reconnect.
struct Session<'a> {
    inner: &'a Inner,
    generation: u64,
    transport: Box<dyn Transport>,
    subscribed: bool,
    deadline: Option<Instant>,
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

impl Session<'_> {
    async fn run(mut self, commands: &mut mpsc::UnboundedReceiver<Command>) -> SessionEnd {
        let generation = self.generation;
        self.inner.update(generation, |status| {
            status.phase = ConnectionPhase::Authenticating;
            status.connected = true;
            status.connecting = false;
        });

        let auth = {
            let credentials = &self.inner.settings.credentials;
            ClientFrame::Auth {
                key: credentials.key().to_owned(),
                secret: credentials.secret().to_owned(),
            }
        };
        self.send(auth).await;
        self.inner.notify_open(generation);

        loop {
            tokio::select! {
                _ = commands.recv() => {
                    self.close().await;
                    return SessionEnd::Manual;
                }
                _ = expire(self.deadline) => {
                    tracing::warn!("pings are missing, reconnecting...");
                    self.inner.update(generation, |status| {
                        status.phase = ConnectionPhase::Closing;
                        status.connected = false;
                    });
                    self.close().await;
                    return SessionEnd::Expired;
                }
                frame = self.transport.recv() => match frame {
                    Some(Ok(raw)) => self.receive(&raw).await,
                    Some(Err(e)) => tracing::error!(error = %e, "websocket error"),
                    None => return SessionEnd::Closed,
                },
            }
        }
    }

    async fn receive(&mut self, raw: &str) {
        match self.inner.settings.dispatcher.dispatch_raw(raw) {
            Action::Reply(frame @ ClientFrame::Subscribe { .. }) => {
                self.subscribed = true;
                self.inner.update(self.generation, |status| {
                    status.phase = ConnectionPhase::Subscribed;
                });
                self.send(frame).await;
                return;
            }
            Action::Reply(frame) => self.send(frame).await,
            Action::Forwarded | Action::Dropped => {}
        }

        if self.subscribed {
            self.deadline = Some(Instant::now() + self.inner.settings.keepalive_timeout);
        }
    }

    async fn send(&mut self, frame: ClientFrame) {
        let action = frame.action();
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(action = action, error = %e, "failed to encode message");
                return;
            }
        };
        if let Err(e) = self.transport.send(text).await {
            tracing::error!(action = action, error = %e, "error while sending message");
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.transport.close().await {
            tracing::debug!(error = %e, "error while closing transport");
        }
    }
}
