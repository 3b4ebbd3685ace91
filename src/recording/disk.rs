//! On-disk recorder.
//!
//! Produces the capture artifacts the daemon leaves behind:
//! - Photo mode: a per-episode directory of sequentially numbered JPEGs,
//!   written as frames arrive.
//! - Video mode: one video file per artifact, encoded via ffmpeg
//!   (feature: encode-ffmpeg). Without the feature, `begin(Video)` reports
//!   `Unavailable` and the controller's degraded path absorbs it.

use std::collections::HashMap;
use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use image::codecs::jpeg::JpegEncoder;

use crate::episode::ArtifactMetadata;
use crate::frame::Frame;
use crate::recording::recorder::{Recorder, RecorderError, RecorderHandle, RecorderMode};

#[cfg(feature = "encode-ffmpeg")]
use crate::recording::video_ffmpeg::VideoWriter;

const PHOTO_QUALITY: u8 = 95;

/// Recorder writing artifacts under a configured output directory.
pub struct DiskRecorder {
    output_dir: PathBuf,
    /// Frame rate stamped into video artifacts.
    #[cfg_attr(not(feature = "encode-ffmpeg"), allow(dead_code))]
    video_fps: u32,
    next_id: u64,
    sessions: HashMap<u64, DiskSession>,
}

struct DiskSession {
    mode: RecorderMode,
    path: PathBuf,
    frames_written: u64,
    confidence_sum: f64,
    first_ts: Option<Duration>,
    last_ts: Option<Duration>,
    sink: SessionSink,
}

enum SessionSink {
    Photos,
    #[cfg(feature = "encode-ffmpeg")]
    Video(VideoWriter),
}

impl DiskRecorder {
    /// Create a recorder rooted at `output_dir`, creating it if missing.
    pub fn new<P: Into<PathBuf>>(output_dir: P, video_fps: u32) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("failed to create output dir {}", output_dir.display()))?;
        Ok(Self {
            output_dir,
            video_fps: video_fps.max(1),
            next_id: 0,
            sessions: HashMap::new(),
        })
    }

    fn session_path(&self, mode: RecorderMode, id: u64) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let name = match mode {
            RecorderMode::Video => format!("cat_{}_{}.mp4", stamp, id),
            RecorderMode::Photo => format!("cat_photos_{}_{}", stamp, id),
        };
        self.output_dir.join(name)
    }
}

impl Recorder for DiskRecorder {
    fn begin(&mut self, mode: RecorderMode) -> Result<RecorderHandle, RecorderError> {
        self.next_id += 1;
        let id = self.next_id;
        let path = self.session_path(mode, id);

        let sink = match mode {
            RecorderMode::Photo => {
                fs::create_dir_all(&path).map_err(|e| {
                    RecorderError::Unavailable(format!(
                        "failed to create photo session dir {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                SessionSink::Photos
            }
            RecorderMode::Video => {
                #[cfg(feature = "encode-ffmpeg")]
                {
                    SessionSink::Video(
                        VideoWriter::new(path.clone(), self.video_fps).map_err(|e| {
                            RecorderError::Unavailable(format!(
                                "failed to open video artifact {}: {}",
                                path.display(),
                                e
                            ))
                        })?,
                    )
                }
                #[cfg(not(feature = "encode-ffmpeg"))]
                {
                    return Err(RecorderError::Unavailable(
                        "video artifacts require the encode-ffmpeg feature".to_string(),
                    ));
                }
            }
        };

        log::info!("artifact open: {} ({})", path.display(), mode);
        self.sessions.insert(
            id,
            DiskSession {
                mode,
                path,
                frames_written: 0,
                confidence_sum: 0.0,
                first_ts: None,
                last_ts: None,
                sink,
            },
        );
        Ok(RecorderHandle::new(id, mode))
    }

    fn write(
        &mut self,
        handle: &RecorderHandle,
        frame: &Frame,
        confidence: f32,
    ) -> Result<(), RecorderError> {
        let session = self
            .sessions
            .get_mut(&handle.id())
            .ok_or_else(|| RecorderError::Io(format!("unknown session {}", handle.id())))?;

        match &mut session.sink {
            SessionSink::Photos => {
                let file_name = format!("cat_{:04}.jpg", session.frames_written);
                let photo_path = session.path.join(file_name);
                let file = fs::File::create(&photo_path).map_err(|e| {
                    RecorderError::Io(format!("failed to create {}: {}", photo_path.display(), e))
                })?;
                let mut encoder =
                    JpegEncoder::new_with_quality(BufWriter::new(file), PHOTO_QUALITY);
                encoder
                    .encode(
                        frame.data(),
                        frame.width,
                        frame.height,
                        image::ExtendedColorType::Rgb8,
                    )
                    .map_err(|e| {
                        RecorderError::Io(format!(
                            "failed to encode {}: {}",
                            photo_path.display(),
                            e
                        ))
                    })?;
            }
            #[cfg(feature = "encode-ffmpeg")]
            SessionSink::Video(writer) => {
                writer
                    .write(frame)
                    .map_err(|e| RecorderError::Io(format!("video encode failed: {}", e)))?;
            }
        }

        session.frames_written += 1;
        session.confidence_sum += confidence as f64;
        if session.first_ts.is_none() {
            session.first_ts = Some(frame.timestamp);
        }
        session.last_ts = Some(frame.timestamp);
        Ok(())
    }

    fn end(&mut self, handle: RecorderHandle) -> Result<ArtifactMetadata, RecorderError> {
        let session = self
            .sessions
            .remove(&handle.id())
            .ok_or_else(|| RecorderError::Io(format!("unknown session {}", handle.id())))?;

        match session.sink {
            SessionSink::Photos => {
                if session.frames_written == 0 {
                    // Nothing captured; don't leave empty directories around.
                    if let Err(e) = fs::remove_dir(&session.path) {
                        log::warn!(
                            "failed to remove empty photo dir {}: {}",
                            session.path.display(),
                            e
                        );
                    }
                }
            }
            #[cfg(feature = "encode-ffmpeg")]
            SessionSink::Video(writer) => {
                writer
                    .finish()
                    .map_err(|e| RecorderError::Io(format!("video finalize failed: {}", e)))?;
            }
        }

        let duration_s = match (session.first_ts, session.last_ts) {
            (Some(first), Some(last)) => last.saturating_sub(first).as_secs_f64(),
            _ => 0.0,
        };
        let average_confidence = if session.frames_written > 0 {
            (session.confidence_sum / session.frames_written as f64) as f32
        } else {
            0.0
        };

        log::info!(
            "artifact closed: {} ({} frames, {:.2}s)",
            session.path.display(),
            session.frames_written,
            duration_s
        );

        Ok(ArtifactMetadata {
            path: session.path,
            mode: session.mode,
            frames_written: session.frames_written,
            duration_s,
            average_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ts_ms: u64) -> Frame {
        // 4x4 mid-gray frame.
        Frame::new(vec![128u8; 4 * 4 * 3], 4, 4, Duration::from_millis(ts_ms))
    }

    #[test]
    fn photo_session_writes_numbered_jpegs() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = DiskRecorder::new(dir.path().join("captures"), 15).unwrap();

        let handle = rec.begin(RecorderMode::Photo).unwrap();
        rec.write(&handle, &frame(0), 0.8).unwrap();
        rec.write(&handle, &frame(1000), 0.6).unwrap();
        let meta = rec.end(handle).unwrap();

        assert_eq!(meta.mode, RecorderMode::Photo);
        assert_eq!(meta.frames_written, 2);
        assert_eq!(meta.duration_s, 1.0);
        assert!(meta.path.join("cat_0000.jpg").is_file());
        assert!(meta.path.join("cat_0001.jpg").is_file());
    }

    #[test]
    fn empty_photo_session_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = DiskRecorder::new(dir.path().join("captures"), 15).unwrap();

        let handle = rec.begin(RecorderMode::Photo).unwrap();
        let meta = rec.end(handle).unwrap();

        assert_eq!(meta.frames_written, 0);
        assert!(!meta.path.exists());
    }

    #[cfg(not(feature = "encode-ffmpeg"))]
    #[test]
    fn video_mode_without_ffmpeg_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = DiskRecorder::new(dir.path().join("captures"), 15).unwrap();
        assert!(matches!(
            rec.begin(RecorderMode::Video),
            Err(RecorderError::Unavailable(_))
        ));
    }

    #[test]
    fn concurrent_sessions_are_kept_apart() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = DiskRecorder::new(dir.path().join("captures"), 15).unwrap();

        let a = rec.begin(RecorderMode::Photo).unwrap();
        let b = rec.begin(RecorderMode::Photo).unwrap();
        rec.write(&a, &frame(0), 0.5).unwrap();

        let meta_a = rec.end(a).unwrap();
        let meta_b = rec.end(b).unwrap();
        assert_eq!(meta_a.frames_written, 1);
        assert_eq!(meta_b.frames_written, 0);
        assert_ne!(meta_a.path, meta_b.path);
    }
}
