//! catwatchd - cat presence monitor daemon
//!
//! This daemon:
//! 1. Ingests frames from the configured source (stub, RTSP/RTMP, webcam)
//! 2. Runs detection on each frame and filters it through the region mask
//! 3. Debounces per-frame detections into presence episodes
//! 4. Records video or photo artifacts for each episode
//! 5. Emits a textual event when an episode ends
//!
//! Ctrl-C triggers the forced-closure path: any open episode is closed and
//! reported before the process exits.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Parser;

use catwatch::{
    config::MonitorConfig, detect::build_detector, mask::RegionMask, DiskRecorder, Monitor,
    PresenceTracker, RecorderMode, RecordingController, StdoutNotifier, StreamConfig,
    StreamSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Recording mode: 'video' to save videos, 'photos' to save images.
    /// Overrides the configured default.
    #[arg(long)]
    mode: Option<String>,
    /// Path to a previously saved mask file (png format). Enables the
    /// detection mask.
    #[arg(long)]
    mask_path: Option<PathBuf>,
    /// Source URL override (stub://, rtsp://, rtmp://, v4l2:///dev/video0).
    #[arg(long)]
    source: Option<String>,
    /// Output directory override for capture artifacts.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Stop after this many frames (0 = run until interrupted).
    #[arg(long, default_value_t = 0)]
    max_frames: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = MonitorConfig::load()?;

    // Command line args override the loaded configuration.
    if let Some(raw) = &args.mode {
        cfg.recording.default_mode = raw
            .parse::<RecorderMode>()
            .map_err(|e| anyhow!("--mode: {}", e))?;
    }
    if let Some(path) = &args.mask_path {
        cfg.mask.path = Some(path.clone());
        cfg.mask.mode = catwatch::MaskMode::Bitmap;
    }
    if let Some(url) = &args.source {
        cfg.source.url = url.clone();
    }
    if let Some(dir) = &args.output_dir {
        cfg.recording.output_dir = dir.clone();
    }

    let mut detector = build_detector(&cfg.detector)?;
    detector.warm_up()?;
    let mask = RegionMask::from_settings(&cfg.mask)?;
    let tracker = PresenceTracker::new(cfg.tracker.hits_to_start, cfg.tracker.misses_to_end)?;
    let recorder = DiskRecorder::new(cfg.recording.output_dir.clone(), cfg.source.target_fps)?;
    let controller = RecordingController::new(
        Box::new(recorder),
        cfg.recording.default_mode,
        cfg.recording.photo_sample_interval,
    )?;
    let mut monitor = Monitor::new(
        detector,
        mask,
        cfg.detector.min_confidence,
        tracker,
        controller,
        Box::new(StdoutNotifier),
    );

    let mut source = StreamSource::new(StreamConfig {
        url: cfg.source.url.clone(),
        target_fps: cfg.source.target_fps,
        width: cfg.source.width,
        height: cfg.source.height,
    })?;
    source.connect()?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    log::info!(
        "catwatchd running: source={} mode={} output={}",
        cfg.source.url,
        cfg.recording.default_mode,
        cfg.recording.output_dir.display()
    );
    log::info!(
        "tracker thresholds: hits_to_start={} misses_to_end={} min_confidence={}",
        cfg.tracker.hits_to_start,
        cfg.tracker.misses_to_end,
        cfg.detector.min_confidence
    );

    let frame_interval = Duration::from_millis(1000 / cfg.source.target_fps.max(1) as u64);
    let mut last_health_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("frame capture failed, shutting down: {}", e);
                break;
            }
        };

        let report = monitor.process_frame(&frame)?;
        if let Some(transition) = report.transition {
            log::debug!("transition: {:?}", transition);
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = source.stats();
            log::info!(
                "source health={} frames={} episodes_closed={} url={}",
                source.is_healthy(),
                stats.frames_captured,
                monitor.episodes_closed(),
                stats.url
            );
            last_health_log = Instant::now();
        }

        if args.max_frames > 0 && monitor.frames_processed() >= args.max_frames {
            log::info!("reached max_frames={}, stopping", args.max_frames);
            break;
        }

        std::thread::sleep(frame_interval);
    }

    // Forced closure: any open episode must be closed and reported before
    // the process exits.
    monitor.shutdown();
    log::info!(
        "catwatchd stopped: {} frames processed, {} episodes",
        monitor.frames_processed(),
        monitor.episodes_closed()
    );
    Ok(())
}
