use crate::shared::constants::{DEFAULT_CONFIDENCE, DEFAULT_IOU};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Parameters for a single inference call.
///
/// Thresholds travel with every call so slider changes take effect on the
/// very next frame without rebuilding the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InferenceOptions {
    /// Minimum confidence for a detection to be reported.
    pub confidence: f64,
    /// Overlap (IoU) threshold for non-maximum suppression.
    pub iou: f64,
    /// Ask for persistent track identities on the returned detections.
    pub with_track_ids: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            iou: DEFAULT_IOU,
            with_track_ids: false,
        }
    }
}

/// Domain interface for object detection.
///
/// Implementations may be stateful (e.g., tracking identities across
/// frames), hence `&mut self`.
pub trait ObjectDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        options: &InferenceOptions,
    ) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
