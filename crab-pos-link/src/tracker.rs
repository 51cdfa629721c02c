//! Status publish decisions and connection state
//!
//! Owned by the inbound loop. Everything it decides to publish goes out
//! through the [`EventHub`].

use crate::event::{EventHub, PrinterEvent};
use crate::status::{DeviceStatus, StatusFrame, StatusSnapshot, frames_differ};
use tracing::{debug, info, trace};

pub(crate) struct StatusTracker {
    hub: EventHub,
    /// Last frame that was published, kept only for diffing
    last_frame: Option<StatusFrame>,
    /// Inferred connection state
    connected: bool,
    /// Connection flag carried by the last published snapshot
    published_connected: bool,
}

impl StatusTracker {
    pub(crate) fn new(hub: EventHub) -> Self {
        Self {
            hub,
            last_frame: None,
            connected: false,
            published_connected: false,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected
    }

    /// Offer a freshly assembled frame; returns whether it was published
    pub(crate) fn offer_frame(&mut self, frame: StatusFrame) -> bool {
        if frame.has_well_formed_header() {
            // Recognized header, no dedicated handling; the generic diff decides
            trace!(header = frame.0[0], "Well-formed status header");
        }

        let changed = match &self.last_frame {
            None => true,
            Some(old) => {
                self.connected != self.published_connected
                    || frames_differ(old.bytes(), frame.bytes())
            }
        };

        if !changed {
            trace!("Status unchanged, suppressed");
            return false;
        }

        self.last_frame = Some(frame);
        self.publish();
        true
    }

    /// Update the inferred connection state
    ///
    /// A transition raises `Connected`/`Disconnected` and forces a status
    /// publish even when no frame bytes changed. Returns whether the state
    /// actually changed.
    pub(crate) fn set_connected(&mut self, connected: bool) -> bool {
        if self.connected == connected {
            return false;
        }
        self.connected = connected;

        if connected {
            info!("Printer connection established");
            self.hub.emit(PrinterEvent::Connected);
        } else {
            info!("Printer connection lost");
            self.hub.emit(PrinterEvent::Disconnected);
        }
        self.publish();
        true
    }

    fn publish(&mut self) {
        let snapshot = StatusSnapshot {
            is_connected: self.connected,
            device: self.last_frame.as_ref().map(DeviceStatus::decode),
        };
        self.published_connected = snapshot.is_connected;
        debug!(?snapshot, "Publishing printer status");
        self.hub.publish_status(snapshot);
    }
}
