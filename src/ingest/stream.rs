//! Camera / network stream source.
//!
//! `StreamSource` hands the monitor loop one decoded RGB frame at a time.
//! `stub://` URLs select a deterministic synthetic scene (a drifting bright
//! blob that periodically enters and leaves the frame); anything else is
//! decoded through GStreamer when built with the ingest-gstreamer feature.

#[cfg(feature = "ingest-gstreamer")]
use anyhow::Context;
use anyhow::Result;
use std::time::Duration;
#[cfg(feature = "ingest-gstreamer")]
use std::time::Instant;

use crate::frame::Frame;

/// Configuration for a stream source.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Source URL: "stub://...", "rtsp://...", "rtmp://...", or
    /// "v4l2:///dev/video0" for a local webcam.
    pub url: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Frame width (synthetic frames; also the requested capture size).
    pub width: u32,
    /// Frame height.
    pub height: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "stub://cat_cam".to_string(),
            target_fps: 15,
            width: 640,
            height: 480,
        }
    }
}

/// Frame source facade over the configured backend.
pub struct StreamSource {
    backend: StreamBackend,
}

enum StreamBackend {
    Synthetic(SyntheticStreamSource),
    #[cfg(feature = "ingest-gstreamer")]
    Gstreamer(GstreamerStreamSource),
}

impl StreamSource {
    pub fn new(config: StreamConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: StreamBackend::Synthetic(SyntheticStreamSource::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-gstreamer")]
            {
                Ok(Self {
                    backend: StreamBackend::Gstreamer(GstreamerStreamSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-gstreamer"))]
            {
                anyhow::bail!("non-stub sources require the ingest-gstreamer feature")
            }
        }
    }

    /// Connect to the stream.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-gstreamer")]
            StreamBackend::Gstreamer(source) => source.connect(),
        }
    }

    /// Capture the next frame, stamped with a monotonic timestamp.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-gstreamer")]
            StreamBackend::Gstreamer(source) => source.next_frame(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            StreamBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "ingest-gstreamer")]
            StreamBackend::Gstreamer(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> StreamStats {
        match &self.backend {
            StreamBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-gstreamer")]
            StreamBackend::Gstreamer(source) => source.stats(),
        }
    }
}

/// Statistics for a stream source.
#[derive(Clone, Debug)]
pub struct StreamStats {
    pub frames_captured: u64,
    pub url: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

const BLOB_SIZE: u32 = 48;
/// The synthetic cat visits for 60 frames out of every 120.
const VISIT_PERIOD: u64 = 120;
const VISIT_LENGTH: u64 = 60;

struct SyntheticStreamSource {
    config: StreamConfig,
    frame_count: u64,
}

impl SyntheticStreamSource {
    fn new(config: StreamConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("StreamSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let index = self.frame_count;
        self.frame_count += 1;

        let timestamp =
            Duration::from_millis(index * 1000 / self.config.target_fps.max(1) as u64);
        let pixels = self.generate_pixels(index);

        Ok(Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            timestamp,
        ))
    }

    /// Flat background; while "visiting", a bright blob drifts across the
    /// frame so differencing detectors keep seeing it move.
    fn generate_pixels(&self, index: u64) -> Vec<u8> {
        let width = self.config.width;
        let height = self.config.height;
        let mut pixels = vec![24u8; (width * height * 3) as usize];

        if index % VISIT_PERIOD >= VISIT_LENGTH {
            return pixels;
        }

        let drift = (index * 3) as u32;
        let x0 = (40 + drift) % width.saturating_sub(BLOB_SIZE).max(1);
        let y0 = (height / 3) % height.saturating_sub(BLOB_SIZE).max(1);

        for y in y0..(y0 + BLOB_SIZE).min(height) {
            for x in x0..(x0 + BLOB_SIZE).min(width) {
                let idx = ((y * width + x) * 3) as usize;
                pixels[idx] = 220;
                pixels[idx + 1] = 200;
                pixels[idx + 2] = 180;
            }
        }

        pixels
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Production source using GStreamer
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-gstreamer")]
struct GstreamerStreamSource {
    config: StreamConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    connected_at: Option<Instant>,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

#[cfg(feature = "ingest-gstreamer")]
impl GstreamerStreamSource {
    fn new(config: StreamConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let pipeline_description = pipeline_for_url(&config.url)?;
        let pipeline = gstreamer::parse_launch(&pipeline_description)
            .context("build capture pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow::anyhow!("capture pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow::anyhow!("appsink element has unexpected type"))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);

        Ok(Self {
            config,
            pipeline,
            appsink,
            frame_count: 0,
            connected_at: None,
            last_frame_at: None,
            last_error: None,
        })
    }

    fn connect(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("set capture pipeline to Playing")?;
        self.connected_at = Some(Instant::now());
        log::info!("StreamSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.poll_bus();

        let timeout = self.frame_timeout();
        let sample = self
            .appsink
            .try_pull_sample(timeout)
            .context("pull stream sample")?
            .ok_or_else(|| anyhow::anyhow!("stream stalled"))?;

        let (pixels, width, height) = sample_to_pixels(&sample)?;

        let connected_at = self
            .connected_at
            .ok_or_else(|| anyhow::anyhow!("next_frame before connect"))?;
        let timestamp = connected_at.elapsed();

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Ok(Frame::new(pixels, width, height, timestamp))
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }

    fn frame_timeout(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            500
        } else {
            (1000 / self.config.target_fps).saturating_mul(4)
        };
        Duration::from_millis(base_ms.max(500) as u64)
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.timed_pop(Duration::from_millis(0)) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.last_error = Some("gstreamer reached EOS".to_string());
                }
                _ => {}
            }
        }
    }
}

#[cfg(feature = "ingest-gstreamer")]
fn pipeline_for_url(url: &str) -> Result<String> {
    let sink = "videoconvert ! video/x-raw,format=RGB ! \
                appsink name=appsink sync=false max-buffers=1 drop=true";
    if let Some(device) = url.strip_prefix("v4l2://") {
        return Ok(format!("v4l2src device={} ! {}", device, sink));
    }
    if url.starts_with("rtsp://") {
        return Ok(format!(
            "rtspsrc location={} latency=0 ! decodebin ! {}",
            url, sink
        ));
    }
    if url.starts_with("rtmp://") {
        return Ok(format!("rtmpsrc location={} ! decodebin ! {}", url, sink));
    }
    anyhow::bail!("unsupported source url '{}'", url)
}

#[cfg(feature = "ingest-gstreamer")]
fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("stream sample missing buffer")?;
    let caps = sample.caps().context("stream sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse stream caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride(0) as usize;

    let map = buffer.map_readable().context("map stream buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("stream buffer row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> StreamConfig {
        StreamConfig {
            url: "stub://test".to_string(),
            target_fps: 10,
            width: 320,
            height: 240,
        }
    }

    #[test]
    fn synthetic_source_produces_frames() -> Result<()> {
        let mut source = StreamSource::new(stub_config())?;
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert_eq!(frame.data().len(), frame.expected_len());
        Ok(())
    }

    #[test]
    fn synthetic_timestamps_are_monotonic_and_fps_paced() -> Result<()> {
        let mut source = StreamSource::new(stub_config())?;
        source.connect()?;

        let mut last = source.next_frame()?.timestamp;
        assert_eq!(last, Duration::ZERO);
        for _ in 0..10 {
            let ts = source.next_frame()?.timestamp;
            assert!(ts > last);
            last = ts;
        }
        // 10 fps -> frame 10 lands at 1.0s.
        assert_eq!(last, Duration::from_secs(1));
        Ok(())
    }

    #[test]
    fn synthetic_scene_alternates_visits_and_absence() -> Result<()> {
        let mut source = StreamSource::new(stub_config())?;
        source.connect()?;

        let mut bright_frames = 0u32;
        for _ in 0..VISIT_PERIOD {
            let frame = source.next_frame()?;
            if frame.data().iter().any(|&p| p > 100) {
                bright_frames += 1;
            }
        }
        assert_eq!(bright_frames as u64, VISIT_LENGTH);
        Ok(())
    }

    #[test]
    fn synthetic_source_is_deterministic() -> Result<()> {
        let mut a = StreamSource::new(stub_config())?;
        let mut b = StreamSource::new(stub_config())?;
        a.connect()?;
        b.connect()?;
        for _ in 0..5 {
            let fa = a.next_frame()?;
            let fb = b.next_frame()?;
            assert_eq!(fa.data(), fb.data());
            assert_eq!(fa.timestamp, fb.timestamp);
        }
        Ok(())
    }
}
