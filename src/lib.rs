//! Sensor Queue
//!
//! Bounded hand-off between a sensor's device I/O thread and application consumers.
//!
//! # Architecture
//!
//! Every queue in this crate follows the same rules:
//!
//! 1. **Bounded**: capacity is fixed at construction and never exceeded.
//! 2. **Producers never block**: `enqueue` stores, rejects, or evicts.
//! 3. **Consumers wait with a deadline**: `dequeue` blocks up to a caller timeout.
//! 4. **Deterministic destruction**: values the queue discards go to a destructor
//!    synchronously, under the queue lock.
//! 5. **Strict FIFO** among retained items.
//!
//! # Module Structure
//!
//! - `ring`: circular index arithmetic shared by both queues
//! - `monitor`: `Timeout` and the condvar wait loop
//! - `byte_queue`: raw byte FIFO, overwrite-oldest
//! - `object_queue`: owned-value FIFO with `AvoidDrop` / `DropOldest` overflow
//! - `frame_queue`: `ObjectQueue<Frame>` bound to `release_frame`
//! - `frame`, `crc`, `denoise`, `probe`, `source`: the pipeline around the queues
//! - `config`: JSON + environment configuration for the `frame_pump` daemon

pub mod byte_queue;
pub mod config;
pub mod crc;
pub mod denoise;
pub mod error;
pub mod frame;
pub mod frame_queue;
pub mod monitor;
pub mod object_queue;
pub mod probe;
pub mod ring;
pub mod source;

pub use byte_queue::ByteQueue;
pub use config::PipelineConfig;
pub use denoise::{apply_denoise, DenoiseParams};
pub use error::{EnqueueError, QueueError};
pub use frame::{release_frame, Frame};
pub use frame_queue::FrameQueue;
pub use monitor::{Timeout, INFINITE_MILLIS};
pub use object_queue::{ObjectQueue, OverflowMode};
pub use probe::is_reachable;
pub use ring::RingBuffer;
pub use source::{ChunkDecoder, SourceConfig, SyntheticSource};
