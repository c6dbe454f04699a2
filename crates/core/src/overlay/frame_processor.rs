use crate::detection::domain::object_detector::{InferenceOptions, ObjectDetector};
use crate::overlay::annotator;
use crate::overlay::display_mode::DisplayMode;
use crate::overlay::region_blur::RegionBlurrer;
use crate::shared::constants::{CENSOR_KERNEL_SIZE, DETECTION_FAILURE_LIMIT};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Why a frame went out unannotated despite detection being enabled.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionFault {
    /// One inference call failed; the raw frame was shown instead.
    Failed(String),
    /// The failure limit was hit and detection switched itself off.
    Disabled(String),
}

/// A frame after processing, ready for the handoff queue.
#[derive(Debug)]
pub struct ProcessedFrame {
    pub frame: Frame,
    pub detections: Vec<Detection>,
    pub fault: Option<DetectionFault>,
}

/// Runs optional inference on each frame and renders the active
/// annotation style onto a copy.
///
/// Inference failures degrade instead of propagating: the unannotated
/// frame is returned with a [`DetectionFault`], and after
/// `failure_limit` consecutive failures detection turns itself off so a
/// broken model cannot stall the playback loop. A successful call resets
/// the counter.
pub struct FrameProcessor {
    detector: Option<Box<dyn ObjectDetector>>,
    enabled: bool,
    options: InferenceOptions,
    mode: DisplayMode,
    blurrer: RegionBlurrer,
    consecutive_failures: u32,
    failure_limit: u32,
}

impl FrameProcessor {
    /// Processor without a detector: frames pass through untouched.
    pub fn new() -> Self {
        Self {
            detector: None,
            enabled: false,
            options: InferenceOptions::default(),
            mode: DisplayMode::default(),
            blurrer: RegionBlurrer::new(CENSOR_KERNEL_SIZE),
            consecutive_failures: 0,
            failure_limit: DETECTION_FAILURE_LIMIT,
        }
    }

    /// Processor with detection enabled from the start.
    pub fn with_detector(detector: Box<dyn ObjectDetector>) -> Self {
        Self {
            detector: Some(detector),
            enabled: true,
            ..Self::new()
        }
    }

    pub fn options(&self) -> InferenceOptions {
        self.options
    }

    pub fn set_options(&mut self, options: InferenceOptions) {
        self.options = options;
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.mode = mode;
    }

    pub fn detection_enabled(&self) -> bool {
        self.enabled && self.detector.is_some()
    }

    /// Enabling also forgives past failures.
    pub fn set_detection_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            self.consecutive_failures = 0;
        }
    }

    pub fn set_failure_limit(&mut self, limit: u32) {
        self.failure_limit = limit.max(1);
    }

    pub fn process(&mut self, frame: &Frame) -> ProcessedFrame {
        if !self.enabled {
            return passthrough(frame, None);
        }
        let Some(detector) = self.detector.as_mut() else {
            return passthrough(frame, None);
        };

        match detector.detect(frame, &self.options) {
            Ok(detections) => {
                self.consecutive_failures = 0;
                let annotated = match self.mode {
                    DisplayMode::Censored => {
                        let mut copy = frame.clone();
                        self.blurrer.blur_regions(&mut copy, &detections);
                        copy
                    }
                    mode => annotator::draw_detections(frame.clone(), &detections, mode),
                };
                ProcessedFrame {
                    frame: annotated,
                    detections,
                    fault: None,
                }
            }
            Err(e) => {
                self.consecutive_failures += 1;
                let message = e.to_string();
                log::warn!(
                    "inference failed ({}/{}): {message}",
                    self.consecutive_failures,
                    self.failure_limit
                );
                let fault = if self.consecutive_failures >= self.failure_limit {
                    self.enabled = false;
                    DetectionFault::Disabled(message)
                } else {
                    DetectionFault::Failed(message)
                };
                passthrough(frame, Some(fault))
            }
        }
    }
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn passthrough(frame: &Frame, fault: Option<DetectionFault>) -> ProcessedFrame {
    ProcessedFrame {
        frame: frame.clone(),
        detections: Vec::new(),
        fault,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted detector: errors while `failures` last, then succeeds.
    struct FakeDetector {
        detections: Vec<Detection>,
        failures: u32,
        calls: u32,
    }

    impl FakeDetector {
        fn succeeding(detections: Vec<Detection>) -> Self {
            Self {
                detections,
                failures: 0,
                calls: 0,
            }
        }

        fn failing(failures: u32) -> Self {
            Self {
                detections: Vec::new(),
                failures,
                calls: 0,
            }
        }
    }

    impl ObjectDetector for FakeDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
            _options: &InferenceOptions,
        ) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            self.calls += 1;
            if self.calls <= self.failures {
                Err("model exploded".into())
            } else {
                Ok(self.detections.clone())
            }
        }
    }

    fn frame(index: u64) -> Frame {
        Frame::new(vec![0u8; 64 * 64 * 3], 64, 64, index)
    }

    fn det(x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
        Detection::new([x1, y1, x2, y2], 0, 0.9)
    }

    #[test]
    fn test_no_detector_passes_frame_through() {
        let mut processor = FrameProcessor::new();
        let out = processor.process(&frame(4));
        assert_eq!(out.frame.index(), 4);
        assert!(out.detections.is_empty());
        assert!(out.fault.is_none());
        assert!(out.frame.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_detection_annotates_frame() {
        let detector = FakeDetector::succeeding(vec![det(10.0, 10.0, 40.0, 40.0)]);
        let mut processor = FrameProcessor::with_detector(Box::new(detector));
        processor.set_mode(DisplayMode::BoxesOnly);

        let out = processor.process(&frame(0));
        assert_eq!(out.detections.len(), 1);
        assert!(out.fault.is_none());
        // Box outline changed some pixels
        assert!(out.frame.data().iter().any(|&v| v != 0));
    }

    #[test]
    fn test_censored_mode_blurs_instead_of_drawing() {
        let detector = FakeDetector::succeeding(vec![det(8.0, 8.0, 40.0, 40.0)]);
        let mut processor = FrameProcessor::with_detector(Box::new(detector));
        processor.set_mode(DisplayMode::Censored);

        let mut raw = frame(0);
        let idx = (20 * 64 + 20) * 3;
        raw.data_mut()[idx] = 255;

        let out = processor.process(&raw);
        // Bright pixel smeared down by the blur, and no green anywhere
        assert!(out.frame.data()[idx] < 255);
        assert!(!out
            .frame
            .data()
            .chunks(3)
            .any(|px| px == [0, 255, 0]));
    }

    #[test]
    fn test_single_failure_degrades_to_raw_frame() {
        let detector = FakeDetector::failing(1);
        let mut processor = FrameProcessor::with_detector(Box::new(detector));

        let out = processor.process(&frame(0));
        assert!(matches!(out.fault, Some(DetectionFault::Failed(_))));
        assert!(out.detections.is_empty());
        assert!(processor.detection_enabled());
    }

    #[test]
    fn test_repeated_failures_disable_detection() {
        let detector = FakeDetector::failing(10);
        let mut processor = FrameProcessor::with_detector(Box::new(detector));
        processor.set_failure_limit(3);

        let raw = frame(0);
        assert!(matches!(
            processor.process(&raw).fault,
            Some(DetectionFault::Failed(_))
        ));
        assert!(matches!(
            processor.process(&raw).fault,
            Some(DetectionFault::Failed(_))
        ));
        assert!(matches!(
            processor.process(&raw).fault,
            Some(DetectionFault::Disabled(_))
        ));
        assert!(!processor.detection_enabled());

        // Once disabled, frames pass through without faults
        let out = processor.process(&raw);
        assert!(out.fault.is_none());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let detector = FakeDetector::failing(2);
        let mut processor = FrameProcessor::with_detector(Box::new(detector));
        processor.set_failure_limit(3);

        let raw = frame(0);
        processor.process(&raw); // failure 1
        processor.process(&raw); // failure 2
        processor.process(&raw); // success, counter resets
        assert_eq!(processor.consecutive_failures, 0);
        assert!(processor.detection_enabled());
    }

    #[test]
    fn test_reenabling_forgives_failures() {
        let detector = FakeDetector::failing(2);
        let mut processor = FrameProcessor::with_detector(Box::new(detector));
        processor.set_failure_limit(2);

        let raw = frame(0);
        processor.process(&raw);
        processor.process(&raw); // disabled now
        assert!(!processor.detection_enabled());

        processor.set_detection_enabled(true);
        assert!(processor.detection_enabled());
        let out = processor.process(&raw); // detector succeeds from call 3
        assert!(out.fault.is_none());
    }

    #[test]
    fn test_set_options_roundtrip() {
        let mut processor = FrameProcessor::new();
        let options = InferenceOptions {
            confidence: 0.6,
            iou: 0.3,
            with_track_ids: true,
        };
        processor.set_options(options);
        assert_eq!(processor.options(), options);
    }
}
