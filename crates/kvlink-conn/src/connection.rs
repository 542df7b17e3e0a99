use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use kvlink_frame::{Frame, ReadState, Request};
use kvlink_transport::{SecureChannel, TlsChannel, TlsConfig};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::assembler::ResponseAssembler;
use crate::config::ConnectionConfig;
use crate::dispatcher::RequestDispatcher;
use crate::error::{ConnectionError, Result};
use crate::lifecycle::{Lifecycle, LifecycleState};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identity, displayed as `conn-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A blocking request/response connection over a [`SecureChannel`].
///
/// Callers alternate [`Connection::send`] and [`Connection::receive`]; one
/// write and one read are outstanding at most. [`Connection::dispose`] may be
/// called from any thread and wakes a blocked call with
/// [`ConnectionError::Disposed`].
pub struct Connection<C: SecureChannel = TlsChannel> {
    id: ConnectionId,
    channel: Arc<C>,
    dispatcher: RequestDispatcher<C>,
    assembler: ResponseAssembler<C>,
    lifecycle: Arc<Lifecycle>,
    authenticated: AtomicBool,
    dead: AtomicBool,
    last_activity: Mutex<Instant>,
    config: ConnectionConfig,
}

impl Connection<TlsChannel> {
    /// Open a TCP connection to `addr`. Call [`Connection::authenticate`]
    /// before sending.
    pub fn connect(
        addr: SocketAddr,
        tls: &TlsConfig,
        config: ConnectionConfig,
        runtime: Handle,
    ) -> Result<Self> {
        let channel = TlsChannel::connect(addr, tls, runtime)?;
        Ok(Self::new(channel, config))
    }

    /// The raw socket, for pool health checks.
    pub fn socket(&self) -> &TcpStream {
        self.channel.socket()
    }
}

impl<C: SecureChannel> Connection<C> {
    pub fn new(channel: C, config: ConnectionConfig) -> Self {
        let channel = Arc::new(channel);
        let lifecycle = Arc::new(Lifecycle::new());
        let id = ConnectionId::next();
        debug!(%id, peer_addr = ?channel.peer_addr(), "connection opened");

        Self {
            id,
            dispatcher: RequestDispatcher::new(Arc::clone(&channel), Arc::clone(&lifecycle)),
            assembler: ResponseAssembler::new(Arc::clone(&channel), Arc::clone(&lifecycle)),
            channel,
            lifecycle,
            authenticated: AtomicBool::new(false),
            dead: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            config,
        }
    }

    /// Run the TLS handshake against `target_host`.
    pub fn authenticate(&self, target_host: &str) -> Result<()> {
        self.ensure_open()?;
        match self.channel.authenticate(target_host) {
            Ok(()) => {
                self.authenticated.store(true, Ordering::Release);
                self.touch();
                info!(id = %self.id, host = target_host, "connection authenticated");
                Ok(())
            }
            Err(err) => {
                let err = ConnectionError::from(err);
                self.mark_dead(&err);
                Err(err)
            }
        }
    }

    /// Send `buffer[offset..offset + length]`, blocking until written.
    pub fn send(&self, buffer: &[u8], offset: usize, length: usize) -> Result<usize> {
        self.ensure_ready()?;
        let result = self.dispatcher.send(buffer, offset, length);
        self.observe(result)
    }

    /// Send the whole of `bytes`.
    pub fn send_all(&self, bytes: &[u8]) -> Result<usize> {
        self.send(bytes, 0, bytes.len())
    }

    /// Block until one complete response frame has arrived.
    ///
    /// The connection's body size limit overrides the one in `state`.
    pub fn receive(&self, state: &mut ReadState) -> Result<Frame> {
        self.ensure_ready()?;
        state.set_max_body_size(self.config.max_body_size);
        let result = self.assembler.receive(state);
        self.observe(result)
    }

    /// Encode `request`, send it and wait for its response.
    pub fn execute(&self, request: &Request, state: &mut ReadState) -> Result<Frame> {
        let wire = request.to_bytes()?;
        self.send_all(&wire)?;
        self.receive(state)
    }

    /// A read state using this connection's frame settings.
    pub fn read_state(&self) -> ReadState {
        ReadState::with_config(self.config.frame_config())
    }

    /// Gracefully close the connection. Idempotent and infallible.
    ///
    /// Blocked callers are woken first, then the TLS session is shut down
    /// (bounded by `shutdown_timeout`) and the socket is closed.
    pub fn dispose(&self) {
        if !self.lifecycle.begin_shutdown() {
            debug!(id = %self.id, state = ?self.lifecycle.state(), "dispose ignored");
            return;
        }

        debug!(id = %self.id, "connection shutting down");
        self.dispatcher.cancel();
        self.assembler.cancel();

        if self.channel.is_connected() {
            if let Err(err) = self.channel.shutdown(self.config.shutdown_timeout) {
                warn!(id = %self.id, error = %err, "graceful shutdown failed");
            }
        }
        self.channel.close();
        self.lifecycle.finish();
        debug!(id = %self.id, "connection disposed");
    }

    pub fn identity(&self) -> ConnectionId {
        self.id
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle.state() == LifecycleState::Disposed
    }

    /// Whether a transport or protocol failure made this connection unusable.
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.lifecycle.is_open() && self.channel.is_connected()
    }

    /// When the connection last completed an operation.
    pub fn last_activity(&self) -> Instant {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn ensure_open(&self) -> Result<()> {
        if self.lifecycle.is_open() {
            Ok(())
        } else {
            Err(ConnectionError::Disposed)
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        self.ensure_open()?;
        if self.config.require_authentication && !self.is_authenticated() {
            return Err(ConnectionError::NotAuthenticated);
        }
        Ok(())
    }

    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.touch(),
            Err(err) => self.mark_dead(err),
        }
        result
    }

    fn mark_dead(&self, err: &ConnectionError) {
        if err.invalidates_connection() && !self.dead.swap(true, Ordering::AcqRel) {
            debug!(id = %self.id, error = %err, "connection marked dead");
        }
    }

    fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }
}

impl<C: SecureChannel> Drop for Connection<C> {
    fn drop(&mut self) {
        if !self.lifecycle.begin_shutdown() {
            return;
        }
        warn!(id = %self.id, "connection dropped without dispose; closing");
        self.dispatcher.cancel();
        self.assembler.cancel();
        self.channel.close();
        self.lifecycle.finish();
    }
}

impl<C: SecureChannel> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.lifecycle.state())
            .field("authenticated", &self.is_authenticated())
            .field("dead", &self.is_dead())
            .finish()
    }
}
