// Integration tests for the rotating segment recorder
//
// The recorder must split a live frame stream into sequentially numbered
// pending files with no raw file left behind, notify the consumer for each
// finalized segment, and flush in-flight units on stop.

use callscribe::audio::{AudioFile, RecorderConfig, SegmentRecorder};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

mod support;
use support::ChannelBackend;

fn test_config(chunk_ms: u64) -> RecorderConfig {
    RecorderConfig {
        chunk_duration: Duration::from_millis(chunk_ms),
        overlap: Duration::from_millis(30),
        sample_rate: 16_000,
        channels: 1,
    }
}

#[tokio::test]
async fn test_rotation_produces_sequential_pending_segments() {
    let temp = TempDir::new().unwrap();
    let (frame_tx, frame_rx) = mpsc::channel(64);
    let (notice_tx, mut notice_rx) = mpsc::channel(64);

    let backend = Box::new(ChannelBackend::new(frame_rx));
    let mut recorder = SegmentRecorder::new(backend, test_config(150), notice_tx);
    recorder.start(temp.path()).await.unwrap();

    // ~500ms of frames at 10ms intervals: enough for at least two rotations
    for i in 0..50u64 {
        let frame = support::silent_frame(160, 16_000, i * 10);
        if frame_tx.send(frame).await.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    drop(frame_tx); // capture source ends
    recorder.stop().await.unwrap();

    let files = support::segment_files(temp.path());
    assert!(
        files.len() >= 2,
        "expected at least two rotations, got {files:?}"
    );

    // Names are the pending form with contiguous indices from 1
    for (i, name) in files.iter().enumerate() {
        assert_eq!(
            name,
            &format!("segment_{:06}.pending.wav", i + 1),
            "unexpected file set {files:?}"
        );
    }

    // No raw capture file survives finalization
    assert!(!files.iter().any(|n| n.starts_with("raw_segment_")));

    // One notice per finalized segment, ascending
    let mut notices = Vec::new();
    while let Ok(notice) = notice_rx.try_recv() {
        notices.push(notice.index);
    }
    let expected: Vec<u64> = (1..=files.len() as u64).collect();
    assert_eq!(notices, expected);
    assert_eq!(recorder.segments_finalized(), files.len());
}

#[tokio::test]
async fn test_stop_flushes_the_in_flight_segment() {
    let temp = TempDir::new().unwrap();
    let (frame_tx, frame_rx) = mpsc::channel(64);
    let (notice_tx, mut notice_rx) = mpsc::channel(64);

    let backend = Box::new(ChannelBackend::new(frame_rx));
    // Chunk far longer than the test: no rotation will ever fire
    let mut recorder = SegmentRecorder::new(backend, test_config(60_000), notice_tx);
    recorder.start(temp.path()).await.unwrap();

    for i in 0..5u64 {
        frame_tx
            .send(support::silent_frame(160, 16_000, i * 10))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(frame_tx);
    recorder.stop().await.unwrap();

    assert_eq!(
        support::segment_files(temp.path()),
        vec!["segment_000001.pending.wav"]
    );
    assert_eq!(notice_rx.try_recv().unwrap().index, 1);

    // The flushed segment is a readable WAV in the configured format
    let audio = AudioFile::open(temp.path().join("segment_000001.pending.wav")).unwrap();
    assert_eq!(audio.sample_rate, 16_000);
    assert_eq!(audio.channels, 1);
    assert!(audio.duration_seconds > 0.0);
}

#[tokio::test]
async fn test_segments_cover_the_stream_without_loss() {
    let temp = TempDir::new().unwrap();
    let (frame_tx, frame_rx) = mpsc::channel(64);
    let (notice_tx, _notice_rx) = mpsc::channel(64);

    let backend = Box::new(ChannelBackend::new(frame_rx));
    let mut recorder = SegmentRecorder::new(backend, test_config(150), notice_tx);
    recorder.start(temp.path()).await.unwrap();

    let frames_sent = 40u64;
    let samples_per_frame = 160usize;
    for i in 0..frames_sent {
        let frame = support::silent_frame(samples_per_frame, 16_000, i * 10);
        if frame_tx.send(frame).await.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    drop(frame_tx);
    recorder.stop().await.unwrap();

    // Union of all segments holds every sample sent; overlap may duplicate
    // boundary frames but never drop them
    let mut total_samples = 0u64;
    for name in support::segment_files(temp.path()) {
        let reader = hound::WavReader::open(temp.path().join(name)).unwrap();
        total_samples += reader.duration() as u64;
    }
    assert!(
        total_samples >= frames_sent * samples_per_frame as u64,
        "captured {total_samples} samples, sent {}",
        frames_sent * samples_per_frame as u64
    );
}

#[tokio::test]
async fn test_double_start_is_rejected() {
    let temp = TempDir::new().unwrap();
    let (_frame_tx, frame_rx) = mpsc::channel::<callscribe::AudioFrame>(8);
    let (notice_tx, _notice_rx) = mpsc::channel(8);

    let backend = Box::new(ChannelBackend::new(frame_rx));
    let mut recorder = SegmentRecorder::new(backend, test_config(60_000), notice_tx);
    recorder.start(temp.path()).await.unwrap();

    let again = recorder.start(temp.path()).await;
    assert!(again.is_err(), "second start on a live recorder must fail");
}
