use std::io::{self, ErrorKind};
use std::mem;
use std::sync::Arc;

use bytes::Bytes;
use kvlink_frame::{Frame, Progress, ReadState};
use kvlink_transport::{CompletionSignal, SecureChannel};
use tracing::{debug, trace};

use crate::error::{ConnectionError, Result};
use crate::lifecycle::Lifecycle;

type Outcome = (ReadState, Result<()>);

/// Assembles one response frame per call from a chain of read completions.
///
/// The caller's [`ReadState`] travels with the chain of reads and is handed
/// back through the signal once the frame is complete or the cycle fails.
pub struct ResponseAssembler<C> {
    channel: Arc<C>,
    lifecycle: Arc<Lifecycle>,
    signal: Arc<CompletionSignal<Outcome>>,
}

impl<C: SecureChannel> ResponseAssembler<C> {
    pub fn new(channel: Arc<C>, lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            channel,
            lifecycle,
            signal: Arc::new(CompletionSignal::new()),
        }
    }

    /// Read one complete response frame, blocking until it has arrived.
    ///
    /// `state` is reset first. A failed cycle leaves in it whatever arrived
    /// before the error; after `Disposed` it is empty.
    pub fn receive(&self, state: &mut ReadState) -> Result<Frame> {
        state.reset();
        self.signal.reset();
        if !self.lifecycle.is_open() {
            self.signal.cancel();
            return Err(ConnectionError::Disposed);
        }

        let placeholder = ReadState::with_config(state.config().clone());
        let cycle = ReadCycle {
            channel: Arc::clone(&self.channel),
            lifecycle: Arc::clone(&self.lifecycle),
            signal: Arc::clone(&self.signal),
            state: mem::replace(state, placeholder),
        };
        cycle.arm();

        let (returned, outcome) = self
            .signal
            .wait()
            .map_err(|_| ConnectionError::Disposed)?;
        *state = returned;
        outcome?;

        // The state keeps its copy until the next cycle resets it.
        let frame = state
            .frame()
            .cloned()
            .ok_or(ConnectionError::ConnectionClosed)?;
        debug!(
            opcode = frame.header().opcode,
            status = frame.header().status,
            reads = state.reads(),
            size = frame.wire_size(),
            "response assembled"
        );
        Ok(frame)
    }

    /// Wake a caller blocked in [`ResponseAssembler::receive`].
    pub fn cancel(&self) {
        self.signal.cancel();
    }
}

impl<C> std::fmt::Debug for ResponseAssembler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseAssembler")
            .field("signal", &self.signal)
            .finish()
    }
}

/// Everything one outstanding read needs; moved into each completion.
struct ReadCycle<C> {
    channel: Arc<C>,
    lifecycle: Arc<Lifecycle>,
    signal: Arc<CompletionSignal<Outcome>>,
    state: ReadState,
}

impl<C: SecureChannel> ReadCycle<C> {
    fn arm(self) {
        let channel = Arc::clone(&self.channel);
        let max_len = self.state.next_read_len();
        trace!(max_len, received = self.state.received(), "read issued");
        channel.begin_read(max_len, Box::new(move |result| self.on_read(result)));
    }

    fn on_read(mut self, result: io::Result<Bytes>) {
        if !self.lifecycle.is_open() {
            self.signal.cancel();
            return;
        }

        let progress = match result {
            Ok(chunk) => self.state.ingest(&chunk).map_err(ConnectionError::from),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                Err(ConnectionError::ConnectionClosed)
            }
            Err(err) => Err(ConnectionError::Io(err)),
        };

        match progress {
            Ok(Progress::NeedMore) => self.arm(),
            Ok(Progress::Complete) => self.finish(Ok(())),
            Err(err) => {
                debug!(error = %err, received = self.state.received(), "read cycle failed");
                self.finish(Err(err));
            }
        }
    }

    fn finish(self, outcome: Result<()>) {
        self.signal.release((self.state, outcome));
    }
}
