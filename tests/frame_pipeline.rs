//! End-to-end capture → queue → consumer tests.

use std::sync::Arc;
use std::thread;

use sensor_queue::{
    apply_denoise, ByteQueue, ChunkDecoder, DenoiseParams, FrameQueue, OverflowMode, QueueError,
    SourceConfig, SyntheticSource, Timeout,
};

fn small_source() -> SyntheticSource {
    SyntheticSource::new(SourceConfig {
        width: 16,
        height: 12,
        target_fps: 1000,
        ..SourceConfig::default()
    })
}

#[test]
fn frames_cross_threads_in_order_and_intact() {
    let queue = Arc::new(FrameQueue::new(4, OverflowMode::AvoidDrop).unwrap());
    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut source = small_source();
            let mut sent = 0;
            while sent < 40 {
                let mut frame = source.next_frame().unwrap();
                loop {
                    match queue.enqueue(frame) {
                        Ok(()) => break,
                        Err(e) => {
                            assert_eq!(e.kind, QueueError::QueueFull);
                            frame = e.into_inner();
                            thread::yield_now();
                        }
                    }
                }
                sent += 1;
            }
        })
    };

    let params = DenoiseParams::default();
    for expected in 1..=40u64 {
        let mut frame = queue.dequeue(Timeout::from_millis(2_000)).unwrap();
        assert_eq!(frame.sequence, expected);
        assert!(frame.verify_checksum());
        apply_denoise(&mut frame, &params).unwrap();
        frame.seal();
        assert!(frame.verify_checksum());
    }
    producer.join().unwrap();
    assert_eq!(queue.count().unwrap(), 0);
}

#[test]
fn drop_oldest_frame_queue_keeps_latest_frames() {
    let queue = FrameQueue::new(3, OverflowMode::DropOldest).unwrap();
    let mut source = small_source();
    for _ in 0..10 {
        queue.enqueue(source.next_frame().unwrap()).unwrap();
    }
    let sequences: Vec<u64> = (0..3)
        .map(|_| queue.dequeue(Timeout::Poll).unwrap().sequence)
        .collect();
    assert_eq!(sequences, vec![8, 9, 10]);
}

#[test]
fn telemetry_survives_byte_queue_overwrite() {
    let mut source = small_source();
    let chunk_len = source.next_chunk().len();
    // Room for three and a half chunks: the oldest chunk is always partly overwritten.
    let queue = ByteQueue::new(chunk_len * 7 / 2).unwrap();
    for _ in 0..10 {
        queue.enqueue(&source.next_chunk()).unwrap();
    }

    let mut decoder = ChunkDecoder::new();
    let bytes = queue.dequeue(queue.capacity(), Timeout::Poll).unwrap();
    let payloads = decoder.push(&bytes);

    assert_eq!(payloads.len(), 3);
    let last_counter = u64::from_le_bytes(payloads[2][..8].try_into().unwrap());
    assert_eq!(last_counter, 11);
}
