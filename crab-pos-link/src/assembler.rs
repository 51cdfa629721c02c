//! Positional status frame assembly
//!
//! Bytes are pushed one at a time. Whenever the pending length is a non-zero
//! multiple of [`STATUS_FRAME_LEN`], exactly one frame is taken off the front.
//! Framing is purely positional: a stray byte shifts every following frame and
//! nothing resynchronizes it.

use crate::status::{STATUS_FRAME_LEN, StatusFrame};
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct FrameAssembler {
    pending: VecDeque<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::with_capacity(STATUS_FRAME_LEN * 4),
        }
    }

    /// Append one byte, returning a frame if it completed one
    pub fn push(&mut self, byte: u8) -> Option<StatusFrame> {
        self.pending.push_back(byte);

        let len = self.pending.len();
        if len == 0 || len % STATUS_FRAME_LEN != 0 {
            return None;
        }

        let mut frame = [0u8; STATUS_FRAME_LEN];
        for slot in frame.iter_mut() {
            *slot = self.pending.pop_front()?;
        }
        Some(StatusFrame(frame))
    }

    /// Bytes waiting for the rest of their frame
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_on_fourth_byte() {
        let mut a = FrameAssembler::new();
        assert!(a.push(0x14).is_none());
        assert!(a.push(0x00).is_none());
        assert!(a.push(0x00).is_none());
        let frame = a.push(0x0F).unwrap();
        assert_eq!(frame.bytes(), &[0x14, 0x00, 0x00, 0x0F]);
        assert_eq!(a.pending(), 0);
    }

    #[test]
    fn test_noise_byte_shifts_framing() {
        let mut a = FrameAssembler::new();
        let mut frames = Vec::new();
        // One noise byte followed by two real frames
        for b in [0xAA, 0x14, 0, 0, 0, 0x14, 0, 0, 0] {
            if let Some(f) = a.push(b) {
                frames.push(f);
            }
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].bytes(), &[0xAA, 0x14, 0, 0]);
        assert_eq!(frames[1].bytes(), &[0, 0x14, 0, 0]);
        assert_eq!(a.pending(), 1);
    }
}
