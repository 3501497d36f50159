//! The scan-to-play loop: sample a frame per tick, decode it, hand any
//! payload to a handler, and stop once the handler accepts one.

mod decode;
mod frame;
mod ticker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info, trace};

use crate::error::Result;

pub use decode::{Decoded, Decoder, QrDecoder};
pub use frame::{FrameBuffer, FrameSource, ImageSequenceSource};
pub use ticker::{FRAME_PERIOD, IntervalTicker, Ticker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Capturing,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The loop was stopped before or during this tick.
    Stopped,
    NoFrame,
    Miss,
    /// A payload decoded but the handler did not accept it.
    Rejected,
    Accepted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Accepted(String),
    Cancelled,
}

/// Receives every non-empty decoded payload.
///
/// `Ok(true)` ends the scan, `Ok(false)` keeps scanning, `Err` aborts it.
#[async_trait]
pub trait ScanHandler: Send {
    async fn on_payload(&mut self, payload: &str) -> Result<bool>;
}

struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

/// Cloneable stop switch for a running [`ScanLoop`].
#[derive(Clone)]
pub struct ScanHandle {
    inner: Arc<StopSignal>,
}

impl ScanHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(StopSignal {
                stopped: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Safe from any state, any number of times.
    pub fn stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::SeqCst) {
            debug!("scan stop requested");
        }
        self.inner.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.inner.stopped.store(false, Ordering::SeqCst);
    }

    async fn wait(&self) {
        self.inner.notify.notified().await;
    }
}

pub struct ScanLoop<S, D> {
    source: S,
    decoder: D,
    state: ScanState,
    handle: ScanHandle,
    buffer: Option<FrameBuffer>,
}

impl<S: FrameSource, D: Decoder> ScanLoop<S, D> {
    pub fn new(source: S, decoder: D) -> Self {
        Self {
            source,
            decoder,
            state: ScanState::Idle,
            handle: ScanHandle::new(),
            buffer: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn handle(&self) -> ScanHandle {
        self.handle.clone()
    }

    /// Enters `Capturing`, acquiring the frame source if it is not held.
    pub fn start(&mut self) -> Result<()> {
        if self.state == ScanState::Capturing {
            return Ok(());
        }
        if !self.source.is_acquired() {
            let (width, height) = self.source.acquire()?;
            let reuse = self
                .buffer
                .as_ref()
                .is_some_and(|b| (b.width(), b.height()) == (width, height));
            if !reuse {
                self.buffer = Some(FrameBuffer::new(width, height));
            }
        }
        self.state = ScanState::Capturing;
        info!("scan started");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.handle.stop();
        self.halt();
    }

    // a stop requested before the run began is consumed here, not at start
    fn halt(&mut self) {
        if self.state == ScanState::Capturing {
            info!("scan stopped");
        }
        self.state = ScanState::Stopped;
        self.source.release();
        self.handle.reset();
    }

    /// Runs one scheduling tick. The stop flag is checked first.
    pub async fn tick<H: ScanHandler>(&mut self, handler: &mut H) -> Result<TickOutcome> {
        if self.handle.is_stopped() || self.state != ScanState::Capturing {
            self.halt();
            return Ok(TickOutcome::Stopped);
        }
        if !self.source.frame_ready() {
            trace!("no frame ready");
            return Ok(TickOutcome::NoFrame);
        }
        let Some(buffer) = self.buffer.as_mut() else {
            return Ok(TickOutcome::NoFrame);
        };
        if !self.source.sample(buffer) {
            return Ok(TickOutcome::NoFrame);
        }

        let decoded = self
            .decoder
            .decode(buffer.pixels(), buffer.width(), buffer.height());
        let payload = match decoded {
            Some(d) if !d.payload.is_empty() => d.payload,
            _ => {
                trace!("decode miss");
                return Ok(TickOutcome::Miss);
            }
        };

        debug!(%payload, "decoded payload");
        let accepted = match handler.on_payload(&payload).await {
            Ok(accepted) => accepted,
            Err(e) => {
                self.halt();
                return Err(e);
            }
        };
        if accepted {
            self.halt();
            Ok(TickOutcome::Accepted(payload))
        } else if self.handle.is_stopped() {
            // stopped while the handler was suspended
            self.halt();
            Ok(TickOutcome::Stopped)
        } else {
            debug!("payload rejected, continuing scan");
            Ok(TickOutcome::Rejected)
        }
    }

    /// Ticks until a payload is accepted, the loop is stopped, or the handler fails.
    pub async fn run<T, H>(&mut self, ticker: &mut T, handler: &mut H) -> Result<ScanOutcome>
    where
        T: Ticker + ?Sized,
        H: ScanHandler,
    {
        self.start()?;
        let signal = self.handle.clone();
        loop {
            let woken_by_stop = tokio::select! {
                biased;
                _ = signal.wait() => true,
                _ = ticker.tick() => false,
            };
            if woken_by_stop && !signal.is_stopped() {
                // stale wakeup from an earlier run
                continue;
            }
            match self.tick(handler).await? {
                TickOutcome::Stopped => return Ok(ScanOutcome::Cancelled),
                TickOutcome::Accepted(payload) => return Ok(ScanOutcome::Accepted(payload)),
                TickOutcome::NoFrame | TickOutcome::Miss | TickOutcome::Rejected => {}
            }
        }
    }
}
