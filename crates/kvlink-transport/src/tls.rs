use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::runtime::Handle;
use tokio::sync::Mutex as AsyncMutex;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, trace};

use crate::channel::{ReadCompletion, SecureChannel, WriteCompletion};
use crate::config::TlsConfig;
use crate::error::{Result, TransportError};

type ClientStream = tokio_rustls::client::TlsStream<tokio::net::TcpStream>;

/// TLS over TCP, driven by a tokio runtime.
///
/// Completions are delivered on the runtime's worker threads. The runtime
/// must have both the I/O and time drivers enabled, and the blocking calls
/// (`authenticate`, `shutdown`) must be made from outside of it.
pub struct TlsChannel {
    runtime: Handle,
    connector: TlsConnector,
    socket: TcpStream,
    peer_addr: SocketAddr,
    pending: Mutex<Option<TcpStream>>,
    reader: Arc<AsyncMutex<Option<ReadHalf<ClientStream>>>>,
    writer: Arc<AsyncMutex<Option<WriteHalf<ClientStream>>>>,
    authenticated: AtomicBool,
    closed: AtomicBool,
}

impl TlsChannel {
    /// Open a TCP connection to `addr`. The TLS handshake happens in
    /// [`SecureChannel::authenticate`].
    pub fn connect(addr: SocketAddr, config: &TlsConfig, runtime: Handle) -> Result<Self> {
        let client_config = config.client_config()?;
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)
            .map_err(|source| TransportError::Connect { addr, source })?;
        Self::from_tcp(stream, client_config, runtime)
    }

    /// Wrap an already connected TCP stream.
    pub fn from_tcp(
        stream: TcpStream,
        client_config: Arc<rustls::ClientConfig>,
        runtime: Handle,
    ) -> Result<Self> {
        stream.set_nodelay(true)?;
        // tokio requires non-blocking sockets; the cloned handle shares the flag.
        stream.set_nonblocking(true)?;
        let peer_addr = stream.peer_addr()?;
        let socket = stream.try_clone()?;

        debug!(%peer_addr, "tcp connection established");

        Ok(Self {
            runtime,
            connector: TlsConnector::from(client_config),
            socket,
            peer_addr,
            pending: Mutex::new(Some(stream)),
            reader: Arc::new(AsyncMutex::new(None)),
            writer: Arc::new(AsyncMutex::new(None)),
            authenticated: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// The raw socket handle, for pool health checks.
    pub fn socket(&self) -> &TcpStream {
        &self.socket
    }

    /// Runtime delivering this channel's completions.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl SecureChannel for TlsChannel {
    fn authenticate(&self, target_host: &str) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let server_name = ServerName::try_from(target_host.to_string())
            .map_err(|_| TransportError::InvalidServerName(target_host.to_string()))?;

        let stream = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(stream) = stream else {
            return Err(if self.is_authenticated() {
                TransportError::AlreadyAuthenticated
            } else {
                TransportError::Closed
            });
        };

        let connector = self.connector.clone();
        let tls = self
            .runtime
            .block_on(async move {
                let tcp = tokio::net::TcpStream::from_std(stream)?;
                connector.connect(server_name, tcp).await
            })
            .map_err(|source| TransportError::Handshake {
                host: target_host.to_string(),
                source,
            })?;

        let protocol = tls.get_ref().1.protocol_version();
        let (read_half, write_half) = tokio::io::split(tls);
        *self.reader.blocking_lock() = Some(read_half);
        *self.writer.blocking_lock() = Some(write_half);
        self.authenticated.store(true, Ordering::Release);

        info!(peer_addr = %self.peer_addr, host = target_host, ?protocol, "TLS session established");
        Ok(())
    }

    fn begin_write(&self, data: Bytes, on_complete: WriteCompletion) {
        let writer = Arc::clone(&self.writer);
        self.runtime.spawn(async move {
            let result: std::io::Result<usize> = async {
                let mut guard = writer.lock().await;
                let half = guard.as_mut().ok_or_else(not_open)?;
                half.write_all(&data).await?;
                half.flush().await?;
                Ok(data.len())
            }
            .await;
            on_complete(result);
        });
    }

    fn begin_read(&self, max_len: usize, on_complete: ReadCompletion) {
        let reader = Arc::clone(&self.reader);
        self.runtime.spawn(async move {
            let result: std::io::Result<Bytes> = async {
                let mut guard = reader.lock().await;
                let half = guard.as_mut().ok_or_else(not_open)?;
                let mut buf = BytesMut::zeroed(max_len);
                let read = half.read(&mut buf).await?;
                buf.truncate(read);
                Ok(buf.freeze())
            }
            .await;
            on_complete(result);
        });
    }

    fn is_connected(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut peeked = [0u8; 1];
        match self.socket.peek(&mut peeked) {
            Ok(0) => false,
            Ok(_) => true,
            Err(err) if err.kind() == ErrorKind::WouldBlock => true,
            Err(_) => false,
        }
    }

    fn shutdown(&self, timeout: Duration) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }

        if Handle::try_current().is_ok() {
            debug!(peer_addr = %self.peer_addr, "shutdown from async context; skipping close_notify");
        } else {
            let writer = Arc::clone(&self.writer);
            let notified = self.runtime.block_on(async move {
                tokio::time::timeout(timeout, async move {
                    match writer.lock().await.as_mut() {
                        Some(half) => half.shutdown().await,
                        None => Ok(()),
                    }
                })
                .await
            });
            match notified {
                Ok(Ok(())) => trace!(peer_addr = %self.peer_addr, "sent close_notify"),
                Ok(Err(err)) => debug!(peer_addr = %self.peer_addr, error = %err, "close_notify failed"),
                Err(_) => debug!(peer_addr = %self.peer_addr, ?timeout, "close_notify timed out"),
            }
        }

        match self.socket.shutdown(Shutdown::Both) {
            Err(err) if err.kind() != ErrorKind::NotConnected => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Err(err) = self.socket.shutdown(Shutdown::Both) {
            trace!(peer_addr = %self.peer_addr, error = %err, "socket shutdown during close");
        }
        // In-flight operations hold the lock; they fail on the shut-down socket instead.
        if let Ok(mut half) = self.reader.try_lock() {
            half.take();
        }
        if let Ok(mut half) = self.writer.try_lock() {
            half.take();
        }

        debug!(peer_addr = %self.peer_addr, "secure channel closed");
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer_addr)
    }
}

impl Drop for TlsChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TlsChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsChannel")
            .field("peer_addr", &self.peer_addr)
            .field("authenticated", &self.is_authenticated())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn not_open() -> std::io::Error {
    std::io::Error::new(ErrorKind::NotConnected, TransportError::NotConnected)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use rustls::crypto::ring;
    use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};

    use super::*;
    use crate::signal::CompletionSignal;

    struct TestServer {
        addr: SocketAddr,
        root: CertificateDer<'static>,
        handle: thread::JoinHandle<()>,
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    /// Accept one TLS client, echo `echo_len` bytes, then wait for the client to hang up.
    fn spawn_echo_server(echo_len: usize) -> TestServer {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let root = cert.cert.der().clone();
        let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
        let config = rustls::ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![root.clone()], key.into())
            .unwrap();
        let config = Arc::new(config);

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (tcp, _) = listener.accept().unwrap();
            let conn = rustls::ServerConnection::new(config).unwrap();
            let mut tls = rustls::StreamOwned::new(conn, tcp);
            let mut buf = vec![0u8; echo_len];
            if tls.read_exact(&mut buf).is_err() {
                return;
            }
            tls.write_all(&buf).unwrap();
            tls.flush().unwrap();
            let mut rest = [0u8; 16];
            let _ = tls.read(&mut rest);
        });

        TestServer { addr, root, handle }
    }

    fn client_config(root: CertificateDer<'static>) -> TlsConfig {
        let mut config = TlsConfig::new();
        config.add_root_certificate(root).unwrap();
        config
    }

    #[test]
    fn authenticate_then_echo() {
        let rt = runtime();
        let server = spawn_echo_server(5);
        let channel =
            TlsChannel::connect(server.addr, &client_config(server.root), rt.handle().clone())
                .unwrap();

        channel.authenticate("localhost").unwrap();
        assert!(channel.is_authenticated());
        assert!(channel.is_connected());

        let written = Arc::new(CompletionSignal::new());
        written.reset();
        let signal = Arc::clone(&written);
        channel.begin_write(
            Bytes::from_static(b"hello"),
            Box::new(move |result| {
                signal.release(result.map_err(|e| e.kind()));
            }),
        );
        assert_eq!(written.wait().unwrap(), Ok(5));

        let mut echoed = Vec::new();
        while echoed.len() < 5 {
            let read = Arc::new(CompletionSignal::new());
            read.reset();
            let signal = Arc::clone(&read);
            channel.begin_read(
                64,
                Box::new(move |result| {
                    signal.release(result.map_err(|e| e.kind()));
                }),
            );
            let chunk = read.wait().unwrap().unwrap();
            assert!(!chunk.is_empty());
            echoed.extend_from_slice(&chunk);
        }
        assert_eq!(echoed, b"hello");

        channel.close();
        assert!(!channel.is_connected());
        server.handle.join().unwrap();
    }

    #[test]
    fn handshake_fails_for_wrong_host() {
        let rt = runtime();
        let server = spawn_echo_server(1);
        let channel =
            TlsChannel::connect(server.addr, &client_config(server.root), rt.handle().clone())
                .unwrap();

        let err = channel.authenticate("not-localhost.example").unwrap_err();
        assert!(matches!(err, TransportError::Handshake { .. }));
        assert!(!channel.is_authenticated());

        channel.close();
        server.handle.join().unwrap();
    }

    #[test]
    fn handshake_fails_for_untrusted_certificate() {
        let rt = runtime();
        let server = spawn_echo_server(1);
        let channel =
            TlsChannel::connect(server.addr, &TlsConfig::new(), rt.handle().clone()).unwrap();

        let err = channel.authenticate("localhost").unwrap_err();
        assert!(matches!(err, TransportError::Handshake { .. }));

        channel.close();
        server.handle.join().unwrap();
    }

    #[test]
    fn invalid_server_name_is_rejected() {
        let rt = runtime();
        let server = spawn_echo_server(1);
        let channel =
            TlsChannel::connect(server.addr, &client_config(server.root), rt.handle().clone())
                .unwrap();

        let err = channel.authenticate("not a host name").unwrap_err();
        assert!(matches!(err, TransportError::InvalidServerName(_)));

        channel.close();
        server.handle.join().unwrap();
    }

    #[test]
    fn second_authenticate_is_rejected() {
        let rt = runtime();
        let server = spawn_echo_server(1);
        let channel =
            TlsChannel::connect(server.addr, &client_config(server.root), rt.handle().clone())
                .unwrap();

        channel.authenticate("localhost").unwrap();
        let err = channel.authenticate("localhost").unwrap_err();
        assert!(matches!(err, TransportError::AlreadyAuthenticated));

        channel.close();
        server.handle.join().unwrap();
    }

    #[test]
    fn read_before_handshake_reports_not_connected() {
        let rt = runtime();
        let server = spawn_echo_server(1);
        let channel =
            TlsChannel::connect(server.addr, &client_config(server.root), rt.handle().clone())
                .unwrap();

        let read = Arc::new(CompletionSignal::new());
        read.reset();
        let signal = Arc::clone(&read);
        channel.begin_read(
            16,
            Box::new(move |result| {
                signal.release(result.map_err(|err| {
                    let inner = err
                        .get_ref()
                        .and_then(|inner| inner.downcast_ref::<TransportError>())
                        .map(|inner| matches!(inner, TransportError::NotConnected));
                    (err.kind(), inner)
                }));
            }),
        );
        assert_eq!(
            read.wait().unwrap(),
            Err((ErrorKind::NotConnected, Some(true)))
        );

        channel.close();
        server.handle.join().unwrap();
    }

    #[test]
    fn connect_refused_reports_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let rt = runtime();
        let err = TlsChannel::connect(addr, &TlsConfig::new(), rt.handle().clone()).unwrap_err();
        assert!(matches!(err, TransportError::Connect { addr: a, .. } if a == addr));
    }

    #[test]
    fn close_is_idempotent_and_fails_later_io() {
        let rt = runtime();
        let server = spawn_echo_server(1);
        let channel =
            TlsChannel::connect(server.addr, &client_config(server.root), rt.handle().clone())
                .unwrap();
        channel.authenticate("localhost").unwrap();

        channel.close();
        channel.close();
        assert!(channel.is_closed());
        assert!(matches!(
            channel.authenticate("localhost"),
            Err(TransportError::Closed)
        ));

        let read = Arc::new(CompletionSignal::new());
        read.reset();
        let signal = Arc::clone(&read);
        channel.begin_read(
            16,
            Box::new(move |result| {
                signal.release(result.map_err(|e| e.kind()));
            }),
        );
        assert_eq!(read.wait().unwrap(), Err(ErrorKind::NotConnected));

        server.handle.join().unwrap();
    }

    #[test]
    fn graceful_shutdown_then_close() {
        let rt = runtime();
        let server = spawn_echo_server(1);
        let channel =
            TlsChannel::connect(server.addr, &client_config(server.root), rt.handle().clone())
                .unwrap();
        channel.authenticate("localhost").unwrap();

        channel.shutdown(Duration::from_secs(1)).unwrap();
        channel.close();
        assert!(!channel.is_connected());

        server.handle.join().unwrap();
    }
}
