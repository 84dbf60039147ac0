//! frame_pump - sensor capture-to-consumer daemon
//!
//! This daemon:
//! 1. Optionally probes the configured sensor address before streaming
//! 2. Runs a capture thread that feeds decoded frames into a `FrameQueue` and raw
//!    telemetry chunks into a `ByteQueue` (never blocking on either)
//! 3. Consumes frames on the main thread: checksum check, bilateral denoise, release
//! 4. Reassembles telemetry chunks from the byte queue
//! 5. Closes both queues on Ctrl-C, which also releases a consumer blocked in dequeue

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sensor_queue::{
    apply_denoise, is_reachable, release_frame, source::SourceStats, ByteQueue, ChunkDecoder,
    FrameQueue, PipelineConfig, QueueError, SyntheticSource, Timeout,
};

/// Consecutive rejected frames before back-pressure is reported.
const BACKPRESSURE_WARN_EVERY: u64 = 30;
const TELEMETRY_READ_BYTES: usize = 512;

#[derive(Parser, Debug)]
#[command(
    name = "frame_pump",
    about = "Stream synthetic depth frames through the bounded sensor queues"
)]
struct Args {
    /// Path to a JSON pipeline config (takes precedence over SENSOR_QUEUE_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop after consuming this many frames (0 runs until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    frames: u64,

    /// Skip the device reachability probe
    #[arg(long)]
    skip_probe: bool,

    /// Skip the bilateral denoise stage
    #[arg(long)]
    no_denoise: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = match args.config.as_deref() {
        Some(path) => PipelineConfig::load_from(Some(path))?,
        None => PipelineConfig::load()?,
    };

    if let Some(addr) = cfg.device.addr.as_deref() {
        if args.skip_probe {
            log::info!("skipping reachability probe for {}", addr);
        } else if !is_reachable(
            addr,
            cfg.device.required_successes,
            cfg.device.probe_timeout_ms,
        ) {
            return Err(anyhow!("sensor {} is not reachable", addr));
        }
    }

    let frames = Arc::new(
        FrameQueue::new(cfg.queue.capacity, cfg.queue.mode).context("create frame queue")?,
    );
    let telemetry =
        Arc::new(ByteQueue::new(cfg.queue.byte_capacity).context("create telemetry queue")?);
    log::info!(
        "frame queue: {} slots ({}), telemetry queue: {} bytes, dequeue timeout {:?}",
        frames.capacity(),
        frames.mode(),
        telemetry.capacity(),
        cfg.queue.dequeue_timeout
    );

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let frames = Arc::clone(&frames);
        let telemetry = Arc::clone(&telemetry);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
            // Closing wakes a consumer blocked in dequeue.
            let _ = frames.close();
            let _ = telemetry.close();
        })
        .context("install Ctrl-C handler")?;
    }

    let capture = {
        let running = Arc::clone(&running);
        let frames = Arc::clone(&frames);
        let telemetry = Arc::clone(&telemetry);
        let source = SyntheticSource::new(cfg.source.clone());
        thread::Builder::new()
            .name("capture".into())
            .spawn(move || run_capture(source, &frames, &telemetry, &running))
            .context("spawn capture thread")?
    };

    let consumed = run_consumer(&args, &cfg, &frames, &telemetry, &running);

    running.store(false, Ordering::SeqCst);
    let capture_stats = capture
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))??;

    // Already closed if shutdown came from Ctrl-C.
    let _ = frames.close();
    let _ = telemetry.close();
    let consumed = consumed?;

    log::info!(
        "frame_pump stopped: captured={} consumed={} chunks_emitted={}",
        capture_stats.frames_captured,
        consumed,
        capture_stats.chunks_emitted
    );
    Ok(())
}

fn run_capture(
    mut source: SyntheticSource,
    frames: &FrameQueue,
    telemetry: &ByteQueue,
    running: &AtomicBool,
) -> Result<SourceStats> {
    let interval = source.frame_interval();
    let mut consecutive_rejects = 0u64;

    while running.load(Ordering::SeqCst) {
        let frame = source.next_frame()?;
        match frames.enqueue(frame) {
            Ok(()) => consecutive_rejects = 0,
            Err(e) if e.kind == QueueError::QueueFull => {
                consecutive_rejects += 1;
                if consecutive_rejects % BACKPRESSURE_WARN_EVERY == 0 {
                    log::warn!(
                        "frame queue full: {} consecutive frames dropped at capture",
                        consecutive_rejects
                    );
                }
                release_frame(e.into_inner());
            }
            Err(e) if e.kind == QueueError::InvalidState => break,
            Err(e) => return Err(anyhow!("enqueue frame: {}", e)),
        }

        match telemetry.enqueue(&source.next_chunk()) {
            Ok(()) => {}
            Err(QueueError::InvalidState) => break,
            Err(e) => return Err(anyhow!("enqueue telemetry: {}", e)),
        }

        thread::sleep(interval);
    }

    log::info!("capture thread exiting");
    Ok(source.stats())
}

fn run_consumer(
    args: &Args,
    cfg: &PipelineConfig,
    frames: &FrameQueue,
    telemetry: &ByteQueue,
    running: &AtomicBool,
) -> Result<u64> {
    let mut decoder = ChunkDecoder::new();
    let mut consumed = 0u64;
    let mut checksum_failures = 0u64;
    let mut chunks = 0u64;
    let mut total_latency = Duration::ZERO;
    let mut last_stats_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        if args.frames > 0 && consumed >= args.frames {
            break;
        }

        match frames.dequeue(cfg.queue.dequeue_timeout) {
            Ok(mut frame) => {
                if !frame.verify_checksum() {
                    checksum_failures += 1;
                    log::warn!("frame seq={} failed checksum, dropping", frame.sequence);
                    release_frame(frame);
                    continue;
                }
                if !args.no_denoise {
                    apply_denoise(&mut frame, &cfg.denoise).context("denoise frame")?;
                    frame.seal();
                }
                consumed += 1;
                total_latency += frame.age();
                release_frame(frame);
            }
            Err(QueueError::Timeout) => {
                log::debug!("no frame within {:?}", cfg.queue.dequeue_timeout);
            }
            Err(QueueError::InvalidState) => break,
            Err(e) => return Err(anyhow!("dequeue frame: {}", e)),
        }

        match telemetry.dequeue(TELEMETRY_READ_BYTES, Timeout::Poll) {
            Ok(bytes) => chunks += decoder.push(&bytes).len() as u64,
            Err(QueueError::Timeout) => {}
            Err(QueueError::InvalidState) => break,
            Err(e) => return Err(anyhow!("dequeue telemetry: {}", e)),
        }

        if last_stats_log.elapsed() >= Duration::from_secs(5) {
            let pending = frames.count().unwrap_or(0);
            let mean = mean_latency(total_latency, consumed);
            log::info!(
                "consumed={} pending={} crc_failures={} chunks={} chunk_rejects={} mean_latency={:?}",
                consumed,
                pending,
                checksum_failures,
                chunks,
                decoder.rejected(),
                mean
            );
            last_stats_log = Instant::now();
        }
    }

    Ok(consumed)
}

fn mean_latency(total: Duration, consumed: u64) -> Duration {
    if consumed == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(consumed);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
