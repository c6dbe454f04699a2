use std::path::PathBuf;

/// Static properties of an opened video source.
///
/// Live sources (cameras, synthetic feeds) report `frame_count = None`:
/// they have no duration and cannot be seeked.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: Option<u64>,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl SourceInfo {
    pub fn is_live(&self) -> bool {
        self.frame_count.is_none()
    }

    /// Total duration in seconds, when both length and rate are known.
    pub fn duration_seconds(&self) -> Option<f64> {
        let count = self.frame_count?;
        if self.fps > 0.0 {
            Some(count as f64 / self.fps)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_finite_source() {
        let info = SourceInfo {
            width: 1920,
            height: 1080,
            fps: 30.0,
            frame_count: Some(900),
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/test.mp4")),
        };
        assert!(!info.is_live());
        assert_relative_eq!(info.duration_seconds().unwrap(), 30.0);
    }

    #[test]
    fn test_live_source_has_no_duration() {
        let info = SourceInfo {
            width: 640,
            height: 480,
            fps: 30.0,
            frame_count: None,
            codec: "raw".to_string(),
            source_path: None,
        };
        assert!(info.is_live());
        assert!(info.duration_seconds().is_none());
    }

    #[test]
    fn test_zero_fps_has_no_duration() {
        let info = SourceInfo {
            width: 640,
            height: 480,
            fps: 0.0,
            frame_count: Some(100),
            codec: String::new(),
            source_path: None,
        };
        assert!(info.duration_seconds().is_none());
    }
}
