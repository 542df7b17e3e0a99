use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use kvlink_conn::{Connection, ConnectionConfig, ConnectionError};
use kvlink_frame::{Frame, Request};
use kvlink_transport::TlsConfig;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::cmd::{parse_duration, resolve, split_address, TlsArgs};
use crate::exit::{
    connection_error, io_error, transport_error, CliError, CliResult, INTERNAL, INTERRUPTED,
    TIMEOUT,
};

/// One authenticated connection plus the runtime driving it.
///
/// Each blocking call is bounded by `--timeout`: a watchdog disposes the
/// connection when it expires, which wakes the call with `Disposed`.
pub struct Session {
    conn: Arc<Connection>,
    server: String,
    timeout: Duration,
    interrupted: Arc<AtomicBool>,
    // Dropped last so completions can still run while the connection closes.
    _runtime: Runtime,
}

impl Session {
    pub fn open(addr: &str, tls_args: &TlsArgs) -> CliResult<Self> {
        let timeout = parse_duration(&tls_args.timeout)?;
        let (host, endpoint) = split_address(addr)?;
        let server_name = tls_args.host.clone().unwrap_or(host);
        let socket_addr = resolve(&endpoint)?;

        let mut tls = TlsConfig::new();
        tls.danger_accept_invalid_certs = tls_args.insecure;
        tls.connect_timeout = timeout;
        for path in &tls_args.ca_cert {
            let loaded = tls.add_pem_file(path).map_err(|err| {
                transport_error(&format!("failed loading {}", path.display()), err)
            })?;
            debug!(path = %path.display(), certificates = loaded, "trust roots loaded");
        }
        if tls.root_count() == 0 && !tls.danger_accept_invalid_certs {
            warn!("no trust roots configured; pass --ca-cert or --insecure");
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("kvlink-io")
            .enable_all()
            .build()
            .map_err(|err| io_error("failed to start I/O runtime", err))?;

        let config = ConnectionConfig {
            shutdown_timeout: timeout,
            ..ConnectionConfig::default()
        };
        let conn = Connection::connect(socket_addr, &tls, config, runtime.handle().clone())
            .map_err(|err| connection_error("connect failed", err))?;

        let session = Self {
            conn: Arc::new(conn),
            server: endpoint,
            timeout,
            interrupted: Arc::new(AtomicBool::new(false)),
            _runtime: runtime,
        };
        session.install_interrupt_handler()?;
        session.bounded("authenticate failed", |conn| conn.authenticate(&server_name))?;
        Ok(session)
    }

    /// Send `request` and wait for its response.
    pub fn execute(&self, request: &Request) -> CliResult<(Frame, Duration)> {
        let started = Instant::now();
        let frame = self.bounded("request failed", |conn| {
            let mut state = conn.read_state();
            conn.execute(request, &mut state)
        })?;
        Ok((frame, started.elapsed()))
    }

    pub fn identity(&self) -> String {
        self.conn.identity().to_string()
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn bounded<T>(
        &self,
        context: &str,
        op: impl FnOnce(&Connection) -> kvlink_conn::Result<T>,
    ) -> CliResult<T> {
        let (done, finished) = mpsc::channel::<()>();
        let timed_out = Arc::new(AtomicBool::new(false));
        let watchdog = {
            let conn = Arc::clone(&self.conn);
            let timed_out = Arc::clone(&timed_out);
            let timeout = self.timeout;
            thread::spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = finished.recv_timeout(timeout) {
                    timed_out.store(true, Ordering::SeqCst);
                    warn!(id = %conn.identity(), ?timeout, "operation timed out; disposing");
                    conn.dispose();
                }
            })
        };

        let result = op(&self.conn);
        drop(done);
        let _ = watchdog.join();

        match result {
            Ok(value) => Ok(value),
            Err(ConnectionError::Disposed) if timed_out.load(Ordering::SeqCst) => Err(
                CliError::new(TIMEOUT, format!("{context}: timed out after {:?}", self.timeout)),
            ),
            Err(ConnectionError::Disposed) if self.interrupted.load(Ordering::SeqCst) => {
                Err(CliError::new(INTERRUPTED, format!("{context}: interrupted")))
            }
            Err(err) => Err(connection_error(context, err)),
        }
    }

    fn install_interrupt_handler(&self) -> CliResult<()> {
        let conn: Weak<Connection> = Arc::downgrade(&self.conn);
        let interrupted = Arc::clone(&self.interrupted);
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
            if let Some(conn) = conn.upgrade() {
                conn.dispose();
            }
        })
        .map_err(|err| CliError::new(INTERNAL, format!("failed to install Ctrl-C handler: {err}")))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.conn.dispose();
    }
}
