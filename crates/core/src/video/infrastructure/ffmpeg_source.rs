use std::path::{Path, PathBuf};

use crate::shared::constants::SEEK_REOPEN_THRESHOLD;
use crate::shared::frame::Frame;
use crate::shared::source_info::SourceInfo;
use crate::video::domain::video_source::VideoSource;

type DecodedFrame = ffmpeg_next::util::frame::video::Video;

/// Decodes video files via ffmpeg-next (libavformat + libavcodec).
///
/// Each decoded frame is converted to RGB24 and wrapped in a [`Frame`]
/// carrying its presentation index. Seeking uses two strategies: small
/// forward jumps decode and discard in place, while large or backward
/// jumps reopen the container, let the demuxer land on the nearest
/// earlier keyframe, and decode forward to the exact index.
pub struct FfmpegSource {
    path: PathBuf,
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    info: SourceInfo,
    /// Seconds per unit of the stream's timestamp base.
    time_base: f64,
    next_index: u64,
    /// One-frame pushback so a seek can stop exactly on its target.
    pending: Option<DecodedFrame>,
    flushing: bool,
    done: bool,
    reopen_threshold: u64,
}

// Safety: FfmpegSource is only used from one thread at a time; the mutex
// in the playback layer serializes all access to the raw ffmpeg pointers.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Self::open_with_threshold(path, SEEK_REOPEN_THRESHOLD)
    }

    /// Opens a file with an explicit in-place/reopen seek tie-break.
    pub fn open_with_threshold(
        path: &Path,
        reopen_threshold: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("no video stream found")?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let tb = stream.time_base();
        let time_base = if tb.denominator() != 0 {
            tb.numerator() as f64 / tb.denominator() as f64
        } else {
            0.0
        };

        let frame_count = probe_frame_count(&ictx, &stream, time_base, fps);

        let info = SourceInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            frame_count,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        let scaler = rgb_scaler(&decoder)?;

        Ok(Self {
            path: path.to_path_buf(),
            ictx,
            decoder,
            scaler,
            stream_index,
            info,
            time_base,
            next_index: 0,
            pending: None,
            flushing: false,
            done: false,
            reopen_threshold,
        })
    }

    /// Discards the current demuxer/decoder state and starts over from the
    /// beginning of the file.
    fn reopen(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let ictx = ffmpeg_next::format::input(&self.path)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("no video stream found")?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let scaler = rgb_scaler(&decoder)?;

        self.ictx = ictx;
        self.decoder = decoder;
        self.scaler = scaler;
        self.stream_index = stream_index;
        self.next_index = 0;
        self.pending = None;
        self.flushing = false;
        self.done = false;
        Ok(())
    }

    /// Pulls the next decoded (pre-scale) frame, feeding packets as needed.
    fn next_decoded(&mut self) -> Result<Option<DecodedFrame>, Box<dyn std::error::Error>> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        if self.done {
            return Ok(None);
        }

        loop {
            let mut decoded = DecodedFrame::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }

            if self.flushing {
                self.done = true;
                return Ok(None);
            }

            // Feed the decoder the next packet of our stream, or EOF.
            loop {
                let Some((stream, packet)) = self.ictx.packets().next() else {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                    break;
                };
                if stream.index() != self.stream_index {
                    continue;
                }
                if self.decoder.send_packet(&packet).is_err() {
                    continue;
                }
                break;
            }
        }
    }

    fn scale_to_frame(
        &mut self,
        decoded: &DecodedFrame,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let mut rgb = DecodedFrame::empty();
        self.scaler.run(decoded, &mut rgb)?;
        let pixels = strip_stride(&rgb, self.info.width, self.info.height);
        Ok(Frame::new(
            pixels,
            self.info.width,
            self.info.height,
            self.next_index,
        ))
    }

    /// Presentation index derived from the decoded frame's timestamp.
    fn index_from_timestamp(&self, decoded: &DecodedFrame) -> Option<u64> {
        let ts = decoded.timestamp().or_else(|| decoded.pts())?;
        if self.time_base <= 0.0 || self.info.fps <= 0.0 {
            return None;
        }
        let index = (ts as f64 * self.time_base * self.info.fps).round();
        if index >= 0.0 {
            Some(index as u64)
        } else {
            None
        }
    }

    /// Reopens the container and uses the demuxer's timestamp seek, then
    /// decodes forward until the frame at `target` is next in line.
    fn seek_via_reopen(&mut self, target: u64) -> Result<(), Box<dyn std::error::Error>> {
        self.reopen()?;

        if target > 0 && self.info.fps > 0.0 {
            let seconds = target as f64 / self.info.fps;
            let ts = (seconds * f64::from(ffmpeg_next::ffi::AV_TIME_BASE)) as i64;
            // Landing on the nearest earlier keyframe is fine; the sync
            // loop below decodes the rest of the way.
            self.ictx.seek(ts, ..=ts)?;
            self.decoder.flush();
        }

        loop {
            let Some(decoded) = self.next_decoded()? else {
                return Err("seek ran past end of stream".into());
            };
            let index = self.index_from_timestamp(&decoded).unwrap_or(self.next_index);
            if index >= target {
                self.next_index = index;
                self.pending = Some(decoded);
                return Ok(());
            }
            self.next_index = index + 1;
        }
    }
}

impl VideoSource for FfmpegSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(decoded) = self.next_decoded()? else {
            return Ok(None);
        };
        let frame = self.scale_to_frame(&decoded)?;
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn seek(&mut self, index: u64) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(count) = self.info.frame_count {
            if index >= count {
                return Err(format!("seek target {index} out of range 0..{count}").into());
            }
        }

        if index == self.next_index && !self.done {
            return Ok(());
        }

        let in_place = !self.done
            && index >= self.next_index
            && index - self.next_index <= self.reopen_threshold;

        if in_place {
            while self.next_index < index {
                if self.next_decoded()?.is_none() {
                    return Err("seek ran past end of stream".into());
                }
                self.next_index += 1;
            }
            Ok(())
        } else {
            self.seek_via_reopen(index)
        }
    }

    fn position(&self) -> u64 {
        self.next_index
    }
}

fn rgb_scaler(
    decoder: &ffmpeg_next::decoder::Video,
) -> Result<ffmpeg_next::software::scaling::Context, Box<dyn std::error::Error>> {
    Ok(ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg_next::format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )?)
}

/// Frame count from stream metadata, falling back to duration * fps.
fn probe_frame_count(
    ictx: &ffmpeg_next::format::context::Input,
    stream: &ffmpeg_next::format::stream::Stream,
    time_base: f64,
    fps: f64,
) -> Option<u64> {
    let frames = stream.frames();
    if frames > 0 {
        return Some(frames as u64);
    }
    if fps > 0.0 {
        let duration = stream.duration();
        if duration > 0 && time_base > 0.0 {
            return Some((duration as f64 * time_base * fps).round() as u64);
        }
        let container_duration = ictx.duration();
        if container_duration > 0 {
            let seconds = container_duration as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE);
            return Some((seconds * fps).round() as u64);
        }
    }
    None
}

/// Copies pixel data out of an ffmpeg frame into a tightly-packed buffer.
///
/// ffmpeg rows may carry padding bytes (stride > width*3); this strips them.
fn strip_stride(rgb: &DecodedFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: f64) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();

        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps as i32));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps as i32, 1)));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);

        octx.write_header().unwrap();

        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        for i in 0..num_frames {
            let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let stride = rgb_frame.stride(0);
            let data = rgb_frame.data_mut(0);
            let value = ((i * 40) % 256) as u8;
            for row in 0..height as usize {
                for col in 0..width as usize {
                    let offset = row * stride + col * 3;
                    data[offset] = value;
                    data[offset + 1] = value;
                    data[offset + 2] = value;
                }
            }

            let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
            yuv_frame.set_pts(Some(i as i64));

            encoder.send_frame(&yuv_frame).unwrap();

            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps as i32), ost_time_base);
                encoded.write_interleaved(&mut octx).unwrap();
            }
        }

        encoder.send_eof().unwrap();
        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps as i32), ost_time_base);
            encoded.write_interleaved(&mut octx).unwrap();
        }

        octx.write_trailer().unwrap();
    }

    fn test_video_path(dir: &Path) -> PathBuf {
        dir.join("test.mp4")
    }

    #[test]
    fn test_open_returns_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 5, 160, 120, 30.0);

        let source = FfmpegSource::open(&path).unwrap();
        let info = source.info();
        assert_eq!(info.width, 160);
        assert_eq!(info.height, 120);
        assert!(info.fps > 0.0);
        assert_eq!(info.frame_count, Some(5));
        assert!(!source.is_live());
    }

    #[test]
    fn test_open_nonexistent_errors() {
        assert!(FfmpegSource::open(Path::new("/nonexistent/test.mp4")).is_err());
    }

    #[test]
    fn test_sequential_read_yields_all_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 5, 160, 120, 30.0);

        let mut source = FfmpegSource::open(&path).unwrap();
        for expected in 0..5u64 {
            let frame = source.read().unwrap().unwrap();
            assert_eq!(frame.index(), expected);
            assert_eq!(frame.data().len(), 160 * 120 * 3);
        }
        assert!(source.read().unwrap().is_none());
        // EOS is sticky until the next seek
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_position_tracks_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 5, 160, 120, 30.0);

        let mut source = FfmpegSource::open(&path).unwrap();
        assert_eq!(source.position(), 0);
        source.read().unwrap();
        source.read().unwrap();
        assert_eq!(source.position(), 2);
    }

    #[test]
    fn test_seek_forward_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 30, 160, 120, 30.0);

        let mut source = FfmpegSource::open(&path).unwrap();
        source.seek(10).unwrap();
        let frame = source.read().unwrap().unwrap();
        assert_eq!(frame.index(), 10);
    }

    #[test]
    fn test_seek_backward_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 30, 160, 120, 30.0);

        let mut source = FfmpegSource::open(&path).unwrap();
        source.seek(20).unwrap();
        source.read().unwrap();
        source.seek(3).unwrap();
        let frame = source.read().unwrap().unwrap();
        assert_eq!(frame.index(), 3);
    }

    #[test]
    fn test_seek_then_read_matches_every_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 12, 160, 120, 30.0);

        // Force the reopen path half the time by using a tiny threshold.
        let mut source = FfmpegSource::open_with_threshold(&path, 2).unwrap();
        for target in [0u64, 7, 3, 11, 4, 10, 0] {
            source.seek(target).unwrap();
            let frame = source.read().unwrap().unwrap();
            assert_eq!(frame.index(), target, "seek to {target}");
        }
    }

    #[test]
    fn test_seek_out_of_range_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 5, 160, 120, 30.0);

        let mut source = FfmpegSource::open(&path).unwrap();
        assert!(source.seek(5).is_err());
        assert!(source.seek(100).is_err());
    }

    #[test]
    fn test_seek_rewinds_after_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 5, 160, 120, 30.0);

        let mut source = FfmpegSource::open(&path).unwrap();
        while source.read().unwrap().is_some() {}

        source.seek(0).unwrap();
        let frame = source.read().unwrap().unwrap();
        assert_eq!(frame.index(), 0);
    }

    #[test]
    fn test_seek_to_current_position_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video_path(dir.path());
        create_test_video(&path, 5, 160, 120, 30.0);

        let mut source = FfmpegSource::open(&path).unwrap();
        source.read().unwrap();
        source.seek(1).unwrap();
        let frame = source.read().unwrap().unwrap();
        assert_eq!(frame.index(), 1);
    }
}
