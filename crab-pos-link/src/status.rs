//! Status frame decoding
//!
//! The device reports status as 4-byte frames, either in answer to a status
//! request or pushed unsolicited when automatic status back is enabled.
//! Bytes 0..=2 carry flags, byte 3 is ignored.

use serde::{Deserialize, Serialize};

/// Length of a status frame in bytes
pub const STATUS_FRAME_LEN: usize = 4;

/// Raw 4-byte status frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFrame(pub [u8; STATUS_FRAME_LEN]);

impl StatusFrame {
    pub fn bytes(&self) -> &[u8; STATUS_FRAME_LEN] {
        &self.0
    }

    /// Byte 0 has bits 0, 1 and 7 clear and bit 4 set
    pub fn has_well_formed_header(&self) -> bool {
        let b0 = self.0[0];
        b0 & 0b1000_0011 == 0 && b0 & 0b0001_0000 != 0
    }
}

impl From<[u8; STATUS_FRAME_LEN]> for StatusFrame {
    fn from(bytes: [u8; STATUS_FRAME_LEN]) -> Self {
        Self(bytes)
    }
}

#[inline]
fn bit(byte: u8, n: u8) -> bool {
    byte & (1 << n) != 0
}

/// Device flags decoded from a [`StatusFrame`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub cash_drawer_open: bool,
    pub printer_online: bool,
    pub cover_open: bool,
    pub paper_feeding: bool,
    pub waiting_for_recovery: bool,
    pub feed_button_pushed: bool,
    pub recoverable_non_autocutter_error: bool,
    pub autocutter_error: bool,
    pub unrecoverable_error: bool,
    pub recoverable_error: bool,
    pub paper_low: bool,
    pub paper_out: bool,
}

impl DeviceStatus {
    /// Decode the flag bytes of a status frame
    ///
    /// Drawer and online bits are active-low.
    pub fn decode(frame: &StatusFrame) -> Self {
        let [b0, b1, b2, _] = frame.0;
        Self {
            cash_drawer_open: !bit(b0, 2),
            printer_online: !bit(b0, 3),
            cover_open: bit(b0, 5),
            paper_feeding: bit(b0, 6),
            waiting_for_recovery: bit(b1, 0),
            feed_button_pushed: bit(b1, 1),
            recoverable_non_autocutter_error: bit(b1, 2),
            autocutter_error: bit(b1, 3),
            unrecoverable_error: bit(b1, 5),
            recoverable_error: bit(b1, 6),
            paper_low: bit(b2, 0) && bit(b2, 1),
            paper_out: bit(b2, 2) && bit(b2, 3),
        }
    }

    /// Any error flag set
    pub fn has_error(&self) -> bool {
        self.recoverable_non_autocutter_error
            || self.autocutter_error
            || self.unrecoverable_error
            || self.recoverable_error
    }
}

/// Published printer status
///
/// `device` stays `None` until the first frame has been decoded; connection
/// transitions can be published before that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub is_connected: bool,
    pub device: Option<DeviceStatus>,
}

impl StatusSnapshot {
    pub fn paper_out(&self) -> bool {
        self.device.is_some_and(|d| d.paper_out)
    }
}

/// Compare the first `min(old.len(), new.len())` bytes
pub fn frames_differ(old: &[u8], new: &[u8]) -> bool {
    old.iter().zip(new.iter()).any(|(a, b)| a != b)
}
