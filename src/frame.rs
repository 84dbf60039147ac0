//! Decoded sensor frames.
//!
//! - `Frame`: one decoded depth frame (distance + amplitude channels).
//! - `release_frame`: the destructor a `FrameQueue` runs on frames it discards.
//!
//! A frame carries a CRC-32 over its distance channel, sealed when the frame is built.
//! Consumers check it after dequeue and before running any filter that rewrites the
//! distance channel.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use crate::crc::crc32;

/// Distance value marking a pixel with no valid return.
pub const INVALID_DISTANCE: u16 = 0;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One decoded depth frame.
///
/// Not `Clone`: a frame is produced once by the capture thread and handed along by
/// ownership until it is released.
#[derive(Debug)]
pub struct Frame {
    /// Capture sequence number, monotonically increasing per source.
    pub sequence: u64,
    pub width: u32,
    pub height: u32,

    distance: Vec<u16>,
    amplitude: Vec<u16>,

    /// Monotonic capture instant (for latency stats, not exported).
    captured_at: Instant,

    /// CRC-32 over the little-endian distance channel.
    checksum: u32,
}

impl Frame {
    /// Build a frame and seal its checksum.
    ///
    /// Both channels must hold exactly `width * height` samples.
    pub fn new(
        sequence: u64,
        width: u32,
        height: u32,
        distance: Vec<u16>,
        amplitude: Vec<u16>,
    ) -> Result<Self> {
        let pixels = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("frame dimensions {}x{} overflow", width, height))?;
        if pixels == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        if distance.len() != pixels || amplitude.len() != pixels {
            return Err(anyhow!(
                "frame channel length mismatch: expected {}, distance {}, amplitude {}",
                pixels,
                distance.len(),
                amplitude.len()
            ));
        }

        let mut frame = Self {
            sequence,
            width,
            height,
            distance,
            amplitude,
            captured_at: Instant::now(),
            checksum: 0,
        };
        frame.seal();
        Ok(frame)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn distance(&self) -> &[u16] {
        &self.distance
    }

    pub(crate) fn distance_mut(&mut self) -> &mut [u16] {
        &mut self.distance
    }

    pub fn amplitude(&self) -> &[u16] {
        &self.amplitude
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Distance channel serialized little-endian; the bytes the checksum covers.
    pub fn payload_bytes(&self) -> Vec<u8> {
        self.distance.iter().flat_map(|d| d.to_le_bytes()).collect()
    }

    /// True if the distance channel still matches the sealed checksum.
    pub fn verify_checksum(&self) -> bool {
        crc32(&self.payload_bytes()) == self.checksum
    }

    /// Recompute the checksum after an intentional rewrite of the distance channel.
    pub fn seal(&mut self) {
        self.checksum = crc32(&self.payload_bytes());
    }

    /// Time since capture.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// Count of pixels carrying a valid distance.
    pub fn valid_pixels(&self) -> usize {
        self.distance
            .iter()
            .filter(|&&d| d != INVALID_DISTANCE)
            .count()
    }

    /// Internal: memory held by the channels.
    pub(crate) fn byte_len(&self) -> usize {
        (self.distance.len() + self.amplitude.len()) * std::mem::size_of::<u16>()
    }
}

/// Release a frame the queue discarded without handing it to a consumer.
pub fn release_frame(frame: Frame) {
    log::trace!(
        "releasing frame seq={} ({} bytes, age {:?})",
        frame.sequence,
        frame.byte_len(),
        frame.age()
    );
    drop(frame);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_frame(sequence: u64) -> Frame {
        let distance = (0..12).map(|i| 1000 + i as u16).collect();
        let amplitude = vec![50; 12];
        Frame::new(sequence, 4, 3, distance, amplitude).unwrap()
    }

    #[test]
    fn new_frame_has_valid_checksum() {
        let frame = make_test_frame(1);
        assert!(frame.verify_checksum());
        assert_eq!(frame.pixel_count(), 12);
        assert_eq!(frame.payload_bytes().len(), 24);
    }

    #[test]
    fn rewrite_invalidates_until_resealed() {
        let mut frame = make_test_frame(2);
        frame.distance_mut()[5] = 42;
        assert!(!frame.verify_checksum());
        frame.seal();
        assert!(frame.verify_checksum());
    }

    #[test]
    fn channel_mismatch_rejected() {
        assert!(Frame::new(1, 4, 3, vec![0; 11], vec![0; 12]).is_err());
        assert!(Frame::new(1, 4, 3, vec![0; 12], vec![0; 13]).is_err());
        assert!(Frame::new(1, 0, 3, vec![], vec![]).is_err());
    }

    #[test]
    fn counts_valid_pixels() {
        let mut distance = vec![500u16; 6];
        distance[0] = INVALID_DISTANCE;
        distance[4] = INVALID_DISTANCE;
        let frame = Frame::new(3, 3, 2, distance, vec![0; 6]).unwrap();
        assert_eq!(frame.valid_pixels(), 4);
    }
}
