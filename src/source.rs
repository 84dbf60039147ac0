//! Synthetic capture source.
//!
//! `SyntheticSource` stands in for a depth sensor's device I/O thread. It produces:
//! - decoded `Frame`s for the `FrameQueue` path
//! - raw telemetry chunks for the `ByteQueue` path
//!
//! Telemetry chunks are framed as `[SYNC][len][payload..][crc7]` so a consumer can
//! resynchronise after the byte queue overwrites a partial chunk.

use anyhow::Result;
use rand::Rng;
use std::time::Duration;

use crate::crc::crc7;
use crate::frame::{Frame, INVALID_DISTANCE};

/// First byte of every telemetry chunk.
pub const CHUNK_SYNC: u8 = 0xA5;
/// Longest payload a telemetry chunk can carry.
pub const MAX_CHUNK_PAYLOAD: usize = u8::MAX as usize;

/// Configuration for a synthetic source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceConfig {
    pub width: u32,
    pub height: u32,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Peak amplitude of the random distance noise.
    pub noise: u16,
    /// Probability that a pixel reports no return.
    pub dropout: f32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 60,
            target_fps: 30,
            noise: 12,
            dropout: 0.01,
        }
    }
}

/// Statistics for a synthetic source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub chunks_emitted: u64,
}

pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    chunk_count: u64,
    /// Moving offset of the simulated scene, in distance units.
    scene_offset: u16,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        log::info!(
            "SyntheticSource: {}x{} @ {} fps (synthetic)",
            config.width,
            config.height,
            config.target_fps
        );
        Self {
            config,
            frame_count: 0,
            chunk_count: 0,
            scene_offset: 0,
        }
    }

    /// Time between frames at the configured rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.config.target_fps.max(1)
    }

    /// Capture the next frame: a depth ramp drifting over time, plus noise and dropouts.
    pub fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        if self.frame_count.is_multiple_of(10) {
            self.scene_offset = (self.scene_offset + 25) % 1000;
        }

        let width = self.config.width;
        let height = self.config.height;
        let pixels = width as usize * height as usize;
        let noise = i32::from(self.config.noise);
        let mut rng = rand::thread_rng();

        let mut distance = Vec::with_capacity(pixels);
        let mut amplitude = Vec::with_capacity(pixels);
        for i in 0..pixels {
            let x = (i % width as usize) as i32;
            let base = 800 + i32::from(self.scene_offset) + x * 10;
            if rng.gen::<f32>() < self.config.dropout {
                distance.push(INVALID_DISTANCE);
                amplitude.push(0);
                continue;
            }
            let jitter = if noise > 0 {
                rng.gen_range(-noise..=noise)
            } else {
                0
            };
            distance.push((base + jitter).clamp(1, i32::from(u16::MAX)) as u16);
            amplitude.push(rng.gen_range(200..1200));
        }

        Frame::new(self.frame_count, width, height, distance, amplitude)
    }

    /// Emit one framed telemetry chunk summarising the source state.
    pub fn next_chunk(&mut self) -> Vec<u8> {
        self.chunk_count += 1;
        let mut payload = Vec::with_capacity(16);
        payload.extend_from_slice(&self.chunk_count.to_le_bytes());
        payload.extend_from_slice(&self.frame_count.to_le_bytes());
        encode_chunk(&payload)
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            chunks_emitted: self.chunk_count,
        }
    }
}

/// Frame `payload` as a telemetry chunk. Payloads longer than `MAX_CHUNK_PAYLOAD` are
/// truncated.
pub fn encode_chunk(payload: &[u8]) -> Vec<u8> {
    let payload = &payload[..payload.len().min(MAX_CHUNK_PAYLOAD)];
    let mut chunk = Vec::with_capacity(payload.len() + 3);
    chunk.push(CHUNK_SYNC);
    chunk.push(payload.len() as u8);
    chunk.extend_from_slice(payload);
    chunk.push(crc7(&chunk[1..]));
    chunk
}

/// Reassembles telemetry chunks from a byte stream that may have gaps.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: Vec<u8>,
    rejected: u64,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes skipped or chunks dropped because of a bad checksum.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Append `bytes` and return every complete payload that passes its checksum.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        let mut cursor = 0;

        while cursor < self.pending.len() {
            if self.pending[cursor] != CHUNK_SYNC {
                self.rejected += 1;
                cursor += 1;
                continue;
            }
            let Some(&len) = self.pending.get(cursor + 1) else {
                break;
            };
            let end = cursor + 2 + len as usize;
            let Some(&crc) = self.pending.get(end) else {
                break;
            };
            if crc7(&self.pending[cursor + 1..end]) == crc {
                payloads.push(self.pending[cursor + 2..end].to_vec());
                cursor = end + 1;
            } else {
                // Not a real chunk start; resync on the next byte.
                self.rejected += 1;
                cursor += 1;
            }
        }

        self.pending.drain(..cursor);
        payloads
    }
}
