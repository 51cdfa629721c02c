//! # crab-pos-link
//!
//! Full-duplex transport engine for ESC/POS receipt printers.
//!
//! ## Scope
//!
//! This crate keeps a live connection to one printer:
//! - Ordered, chunked, flushed delivery of caller-built command bytes
//! - Idle-time status polling
//! - 4-byte status frame assembly and decoding
//! - Connection liveness inferred from read inactivity
//! - Debounced status/connection events for application code
//!
//! Building receipts (text, images, barcodes) stays with the caller; the link
//! only moves opaque bytes.
//!
//! ## Example
//!
//! ```ignore
//! use crab_pos_link::{ConnectMode, LinkConfig, PrinterEvent, PrinterLink, TcpTransport, command};
//!
//! let link = PrinterLink::new(TcpTransport::new("192.168.1.100", 9100)?, LinkConfig::default())?;
//! link.connect(ConnectMode::First)?;
//!
//! link.submit(command::enable_automatic_status_back());
//!
//! let mut events = link.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let PrinterEvent::StatusChanged(status) = event {
//!         if status.paper_out() {
//!             tracing::warn!("Out of paper");
//!         }
//!     }
//! }
//! ```

mod assembler;
pub mod command;
mod config;
mod error;
mod event;
mod inbound;
mod link;
mod outbound;
mod status;
mod tracker;
pub mod transport;

// Re-exports
pub use assembler::FrameAssembler;
pub use config::LinkConfig;
pub use error::{PrintError, PrintResult};
pub use event::{FaultStage, LinkFault, PrinterEvent};
pub use link::{ConnectMode, PrinterLink};
pub use status::{DeviceStatus, STATUS_FRAME_LEN, StatusFrame, StatusSnapshot};
pub use transport::{FileTransport, MemoryTransport, TcpTransport, Transport};
