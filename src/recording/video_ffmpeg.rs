#![cfg(feature = "encode-ffmpeg")]

//! H.264 video artifact writer backed by ffmpeg.
//!
//! The encoder is opened lazily on the first frame, because artifact begin
//! happens before the recorder has seen any frame dimensions.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::format::Pixel;
use ffmpeg_next::Rational;

use crate::frame::Frame;

pub struct VideoWriter {
    path: PathBuf,
    fps: u32,
    inner: Option<Inner>,
}

struct Inner {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: scaling::Context,
    width: u32,
    height: u32,
    time_base: Rational,
    pts: i64,
}

impl VideoWriter {
    pub fn new(path: PathBuf, fps: u32) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        Ok(Self {
            path,
            fps: fps.max(1),
            inner: None,
        })
    }

    fn open(&mut self, width: u32, height: u32) -> Result<Inner> {
        let mut octx = ffmpeg::format::output(&self.path)
            .with_context(|| format!("open output {}", self.path.display()))?;

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::H264)
            .ok_or_else(|| anyhow!("H264 encoder not available"))?;

        let mut stream = octx.add_stream(codec).context("add video stream")?;

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("build video encoder")?;
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(Rational(1, self.fps as i32));
        encoder.set_frame_rate(Some(Rational(self.fps as i32, 1)));

        let encoder = encoder.open_as(codec).context("open H264 encoder")?;
        stream.set_parameters(&encoder);
        stream.set_time_base(Rational(1, self.fps as i32));

        octx.write_header().context("write container header")?;

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .context("build RGB->YUV scaler")?;

        Ok(Inner {
            octx,
            encoder,
            scaler,
            width,
            height,
            time_base: Rational(1, self.fps as i32),
            pts: 0,
        })
    }

    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.inner.is_none() {
            let inner = self.open(frame.width, frame.height)?;
            self.inner = Some(inner);
        }
        let inner = self.inner.as_mut().expect("writer opened above");

        if frame.width != inner.width || frame.height != inner.height {
            return Err(anyhow!(
                "frame size {}x{} does not match artifact {}x{}",
                frame.width,
                frame.height,
                inner.width,
                inner.height
            ));
        }
        if frame.data().len() != frame.expected_len() {
            return Err(anyhow!(
                "frame buffer has {} bytes, expected {}",
                frame.data().len(),
                frame.expected_len()
            ));
        }

        let mut rgb = ffmpeg::frame::Video::new(Pixel::RGB24, inner.width, inner.height);
        copy_rgb_plane(&mut rgb, frame);

        let mut yuv = ffmpeg::frame::Video::empty();
        inner.scaler.run(&rgb, &mut yuv).context("convert frame")?;
        yuv.set_pts(Some(inner.pts));
        inner.pts += 1;

        inner.encoder.send_frame(&yuv).context("send frame")?;
        drain_packets(&mut inner.encoder, &mut inner.octx, inner.time_base)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        let Some(mut inner) = self.inner.take() else {
            // No frame was ever written; nothing on disk to finalize.
            return Ok(());
        };
        inner.encoder.send_eof().context("flush encoder")?;
        drain_packets(&mut inner.encoder, &mut inner.octx, inner.time_base)?;
        inner.octx.write_trailer().context("write container trailer")?;
        Ok(())
    }
}

fn copy_rgb_plane(dst: &mut ffmpeg::frame::Video, src: &Frame) {
    let stride = dst.stride(0);
    let row_bytes = src.width as usize * 3;
    let data = src.data();
    let plane = dst.data_mut(0);
    for y in 0..src.height as usize {
        let src_row = &data[y * row_bytes..(y + 1) * row_bytes];
        plane[y * stride..y * stride + row_bytes].copy_from_slice(src_row);
    }
}

fn drain_packets(
    encoder: &mut ffmpeg::encoder::Video,
    octx: &mut ffmpeg::format::context::Output,
    encoder_time_base: Rational,
) -> Result<()> {
    let stream_time_base = octx
        .stream(0)
        .map(|s| s.time_base())
        .unwrap_or(encoder_time_base);
    let mut packet = ffmpeg::Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(0);
        packet.rescale_ts(encoder_time_base, stream_time_base);
        packet
            .write_interleaved(octx)
            .context("write video packet")?;
    }
    Ok(())
}
