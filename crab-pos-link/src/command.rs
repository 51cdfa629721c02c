//! Status-related ESC/POS commands
//!
//! Only the commands the link itself depends on live here: the status
//! request injected by the idle poll, automatic status back, and the few
//! control commands usually sent alongside them.

/// Subtype selector for `GS r n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusRequest {
    /// Paper sensor status
    PaperStatus = 0x01,
    /// Drawer kick-out connector status
    DrawerKickStatus = 0x02,
}

/// Cash drawer connector pin for `ESC p`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawerPin {
    Pin2,
    Pin5,
}

/// Transmit status (GS r n)
pub fn request_status(kind: StatusRequest) -> [u8; 3] {
    [0x1D, 0x72, kind as u8]
}

/// The command the outbound pipeline injects when idle
pub const PAPER_STATUS_POLL: [u8; 3] = [0x1D, 0x72, StatusRequest::PaperStatus as u8];

/// Enable automatic status back for every status source (GS a n)
pub fn enable_automatic_status_back() -> [u8; 3] {
    [0x1D, 0x61, 0xFF]
}

/// Disable automatic status back (GS a 0)
pub fn disable_automatic_status_back() -> [u8; 3] {
    [0x1D, 0x61, 0x00]
}

/// Initialize printer (ESC @)
pub fn initialize() -> [u8; 2] {
    [0x1B, 0x40]
}

/// Generate a drawer kick pulse (ESC p m t1 t2)
pub fn cash_drawer_pulse(pin: DrawerPin) -> [u8; 5] {
    let m = match pin {
        DrawerPin::Pin2 => 0x00,
        DrawerPin::Pin5 => 0x01,
    };
    [0x1B, 0x70, m, 25, 250]
}

/// Concatenates commands into one outbound frame
///
/// ```ignore
/// let frame = CommandBuffer::new()
///     .push(&command::initialize())
///     .push(&command::enable_automatic_status_back())
///     .build();
/// link.submit(frame);
/// ```
#[derive(Debug, Default, Clone)]
pub struct CommandBuffer {
    buf: Vec<u8>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw command bytes
    pub fn push(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn build(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}
