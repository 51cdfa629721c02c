//! Printer link lifecycle
//!
//! [`PrinterLink`] owns the transport plus the two background loops:
//!
//! ```text
//! submit() ──▶ mpsc queue ──▶ OutboundLoop ──▶ Transport::write_bytes ──▶ device
//!                                                                           │
//! subscribe() ◀── EventHub ◀── StatusTracker ◀── InboundLoop ◀── read_bytes ◀┘
//! ```
//!
//! Each loop has its own cancellation token and its own stop flag. Shutdown
//! cancels both, waits for both flags, then closes the transport.

use crate::config::LinkConfig;
use crate::error::{PrintError, PrintResult};
use crate::event::{EventHub, FaultStage, LinkFault, PrinterEvent};
use crate::inbound::InboundLoop;
use crate::outbound::OutboundLoop;
use crate::status::StatusSnapshot;
use crate::transport::Transport;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Whether `connect` starts the link or re-establishes an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Spawn the background loops
    First,
    /// The transport reconnected underneath; loops keep running
    Reconnect,
}

/// Set when a loop has exited, including by panic
///
/// The flag is raised when this guard is dropped at the end of the loop task.
#[derive(Debug)]
pub(crate) struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    fn new() -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (Self(flag.clone()), flag)
    }
}

impl Drop for StopFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Background loop handles held while the link runs
struct Running {
    outbound_cancel: CancellationToken,
    inbound_cancel: CancellationToken,
    outbound_stopped: Arc<AtomicBool>,
    inbound_stopped: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Running {
    fn cancel(&self) {
        self.outbound_cancel.cancel();
        self.inbound_cancel.cancel();
    }

    fn stopped(&self) -> bool {
        self.outbound_stopped.load(Ordering::Acquire) && self.inbound_stopped.load(Ordering::Acquire)
    }
}

/// Full-duplex connection to a receipt printer
///
/// # Example
///
/// ```ignore
/// use crab_pos_link::{ConnectMode, LinkConfig, PrinterLink, TcpTransport, command};
///
/// let transport = TcpTransport::new("192.168.1.100", 9100)?;
/// let link = PrinterLink::new(transport, LinkConfig::from_env())?;
/// link.connect(ConnectMode::First)?;
///
/// link.submit(command::enable_automatic_status_back());
/// let mut events = link.subscribe();
/// while let Ok(event) = events.recv().await {
///     println!("{:?}", event);
/// }
///
/// link.shutdown().await;
/// ```
pub struct PrinterLink {
    transport: Arc<dyn Transport>,
    config: LinkConfig,
    hub: EventHub,
    queue: mpsc::UnboundedSender<Vec<u8>>,
    /// Receiver half, handed to the outbound loop on first connect
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    running: Mutex<Option<Running>>,
    shut_down: AtomicBool,
}

impl PrinterLink {
    /// Create a link over `transport`; nothing runs until [`PrinterLink::connect`]
    pub fn new<T: Transport + 'static>(transport: T, config: LinkConfig) -> PrintResult<Self> {
        Self::with_shared(Arc::new(transport), config)
    }

    /// Create a link over an already shared transport
    pub fn with_shared(transport: Arc<dyn Transport>, config: LinkConfig) -> PrintResult<Self> {
        config.validate()?;

        let (queue, queue_rx) = mpsc::unbounded_channel();
        Ok(Self {
            transport,
            hub: EventHub::new(config.event_capacity),
            config,
            queue,
            queue_rx: Mutex::new(Some(queue_rx)),
            running: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Start the link, or acknowledge a reconnection
    ///
    /// `First` spawns both loops on the current tokio runtime and is a no-op
    /// if they already run. `Reconnect` never spawns anything.
    #[instrument(skip(self))]
    pub fn connect(&self, mode: ConnectMode) -> PrintResult<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(PrintError::Closed);
        }

        let mut running = self.running.lock();

        if mode == ConnectMode::Reconnect {
            if running.is_none() {
                warn!("Reconnect requested before the link was started");
            } else {
                debug!("Reconnect acknowledged, loops keep running");
            }
            return Ok(());
        }

        if running.is_some() {
            debug!("Link already running");
            return Ok(());
        }

        let runtime = Handle::try_current()
            .map_err(|e| PrintError::Connection(format!("No tokio runtime: {}", e)))?;
        let queue_rx = self.queue_rx.lock().take().ok_or(PrintError::Closed)?;

        let outbound_cancel = CancellationToken::new();
        let inbound_cancel = CancellationToken::new();
        let (outbound_flag, outbound_stopped) = StopFlag::new();
        let (inbound_flag, inbound_stopped) = StopFlag::new();

        let outbound = OutboundLoop::new(
            self.transport.clone(),
            queue_rx,
            self.config.clone(),
            self.hub.clone(),
            outbound_cancel.clone(),
        );
        let inbound = InboundLoop::new(
            self.transport.clone(),
            self.config.clone(),
            self.hub.clone(),
            inbound_cancel.clone(),
        );

        let handles = vec![
            runtime.spawn(outbound.run(outbound_flag)),
            runtime.spawn(inbound.run(inbound_flag)),
        ];

        *running = Some(Running {
            outbound_cancel,
            inbound_cancel,
            outbound_stopped,
            inbound_stopped,
            handles,
        });

        info!("Printer link started");
        Ok(())
    }

    /// Queue bytes for transmission; empty input is ignored
    ///
    /// Never blocks. Frames are written in submission order.
    pub fn submit(&self, data: impl Into<Vec<u8>>) {
        let data = data.into();
        if data.is_empty() {
            return;
        }
        if self.queue.send(data).is_err() {
            warn!("Outbound loop gone, submission dropped");
        }
    }

    /// Queue several command buffers as a single submission
    pub fn submit_all<I, B>(&self, frames: I)
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut data = Vec::new();
        for frame in frames {
            data.extend_from_slice(frame.as_ref());
        }
        self.submit(data);
    }

    /// Latest published status
    pub fn status(&self) -> StatusSnapshot {
        self.hub.current()
    }

    pub fn is_connected(&self) -> bool {
        self.hub.current().is_connected
    }

    /// Receiver that always holds the latest status
    pub fn watch_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.hub.watch()
    }

    /// Connection and status change events
    pub fn subscribe(&self) -> broadcast::Receiver<PrinterEvent> {
        self.hub.subscribe()
    }

    /// Failures swallowed by the background loops
    pub fn subscribe_faults(&self) -> broadcast::Receiver<LinkFault> {
        self.hub.subscribe_faults()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Stop both loops and close the transport
    ///
    /// Queued submissions are written before the outbound loop stops. Waits
    /// without a deadline: a loop stuck inside a transport call holds shutdown
    /// until that call returns. A second call does nothing.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!("Printer link already shut down");
            return;
        }

        let running = self.running.lock().take();
        if let Some(running) = running {
            running.cancel();

            while !running.stopped() {
                tokio::time::sleep(self.config.shutdown_poll).await;
            }

            for handle in running.handles {
                if let Err(e) = handle.await {
                    self.hub.fault(FaultStage::Cancel, e);
                }
            }
        }

        self.on_shutdown().await;
        info!("Printer link shut down");
    }

    async fn on_shutdown(&self) {
        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Transport close failed");
        }
    }
}

impl Drop for PrinterLink {
    fn drop(&mut self) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }

        if let Some(running) = self.running.get_mut().take() {
            running.cancel();
            if !running.outbound_stopped.load(Ordering::Acquire) {
                // The outbound loop drains and flushes on its way out
                return;
            }
        }

        // No outbound loop left to race with; flush directly on the transport
        if let Ok(runtime) = Handle::try_current() {
            let transport = self.transport.clone();
            runtime.spawn(async move {
                if let Err(e) = transport.flush().await {
                    debug!(error = %e, "Final flush failed");
                }
            });
        }
    }
}
