//! Full-stack run against the synthetic stream source: real motion
//! detection, real photo artifacts on disk, exactly as catwatchd wires the
//! pipeline (only the notifier is swapped for a collecting one).

use catwatch::detect::MotionDetector;
use catwatch::mask::RegionMask;
use catwatch::notify::MemoryNotifier;
use catwatch::{
    DiskRecorder, Monitor, PresenceTracker, RecorderMode, RecordingController, StreamConfig,
    StreamSource,
};

#[test]
fn synthetic_visit_produces_one_episode_with_photos() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = MemoryNotifier::new();

    let recorder = DiskRecorder::new(dir.path().join("captures"), 10).unwrap();
    let mut monitor = Monitor::new(
        Box::new(MotionDetector::new()),
        RegionMask::accept_all(),
        0.2,
        PresenceTracker::new(3, 5).unwrap(),
        RecordingController::new(Box::new(recorder), RecorderMode::Photo, 5).unwrap(),
        Box::new(notifier.clone()),
    );

    let mut source = StreamSource::new(StreamConfig {
        url: "stub://test".to_string(),
        target_fps: 10,
        width: 320,
        height: 240,
    })
    .unwrap();
    source.connect().unwrap();

    // The synthetic cat visits for the first 60 frames of every 120; 100
    // frames cover one full visit and its departure.
    for _ in 0..100 {
        let frame = source.next_frame().unwrap();
        monitor.process_frame(&frame).unwrap();
    }

    let closed = notifier.closed();
    assert_eq!(closed.len(), 1, "one visit, one episode");
    let ep = &closed[0];
    assert!(!ep.recording_degraded);
    assert_eq!(ep.artifacts.len(), 1);
    let artifact = &ep.artifacts[0];
    assert_eq!(artifact.mode, RecorderMode::Photo);
    assert!(artifact.frames_written > 0);
    assert!(artifact.path.is_dir());
    assert!(artifact.path.join("cat_0000.jpg").is_file());

    // Visit lasts ~6s of stream time at 10 fps.
    let duration = ep.duration().unwrap().as_secs_f64();
    assert!(
        duration > 4.0 && duration < 9.0,
        "episode duration {}s outside expected envelope",
        duration
    );
}

#[test]
fn shutdown_during_synthetic_visit_closes_episode() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = MemoryNotifier::new();

    let recorder = DiskRecorder::new(dir.path().join("captures"), 10).unwrap();
    let mut monitor = Monitor::new(
        Box::new(MotionDetector::new()),
        RegionMask::accept_all(),
        0.2,
        PresenceTracker::new(3, 5).unwrap(),
        RecordingController::new(Box::new(recorder), RecorderMode::Photo, 5).unwrap(),
        Box::new(notifier.clone()),
    );

    let mut source = StreamSource::new(StreamConfig {
        url: "stub://test".to_string(),
        target_fps: 10,
        width: 320,
        height: 240,
    })
    .unwrap();
    source.connect().unwrap();

    // Stop mid-visit, while the tracker is PRESENT.
    for _ in 0..30 {
        let frame = source.next_frame().unwrap();
        monitor.process_frame(&frame).unwrap();
    }
    assert!(notifier.closed().is_empty());

    monitor.shutdown();

    let closed = notifier.closed();
    assert_eq!(closed.len(), 1);
    assert!(closed[0].end_time.is_some());
}
