use crate::shared::frame::Frame;
use crate::shared::source_info::SourceInfo;
use crate::video::domain::video_source::VideoSource;

/// Deterministic synthetic source for tests and demos.
///
/// Produces uniform gray frames whose brightness cycles with the frame
/// index, so any frame's origin is recoverable from its pixels. A finite
/// pattern behaves like a file (end-of-stream, seekable); a live pattern
/// never ends and rejects seeks, standing in for a camera handle.
pub struct PatternSource {
    info: SourceInfo,
    next_index: u64,
}

impl PatternSource {
    pub fn finite(width: u32, height: u32, fps: f64, frame_count: u64) -> Self {
        Self {
            info: SourceInfo {
                width,
                height,
                fps,
                frame_count: Some(frame_count),
                codec: "pattern".to_string(),
                source_path: None,
            },
            next_index: 0,
        }
    }

    pub fn live(width: u32, height: u32, fps: f64) -> Self {
        Self {
            info: SourceInfo {
                width,
                height,
                fps,
                frame_count: None,
                codec: "pattern".to_string(),
                source_path: None,
            },
            next_index: 0,
        }
    }

    /// Brightness of the frame at `index`.
    pub fn shade(index: u64) -> u8 {
        ((index * 40) % 256) as u8
    }

    fn generate(&self, index: u64) -> Frame {
        let len = (self.info.width as usize) * (self.info.height as usize) * Frame::CHANNELS;
        Frame::new(
            vec![Self::shade(index); len],
            self.info.width,
            self.info.height,
            index,
        )
    }
}

impl VideoSource for PatternSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if let Some(count) = self.info.frame_count {
            if self.next_index >= count {
                return Ok(None);
            }
        }
        let frame = self.generate(self.next_index);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn seek(&mut self, index: u64) -> Result<(), Box<dyn std::error::Error>> {
        let Some(count) = self.info.frame_count else {
            return Err("cannot seek a live source".into());
        };
        if index >= count {
            return Err(format!("seek target {index} out of range 0..{count}").into());
        }
        self.next_index = index;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.next_index
    }
}
