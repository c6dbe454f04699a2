use std::time::Duration;

/// Default detection confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// Default overlap (IoU) threshold for non-maximum suppression.
pub const DEFAULT_IOU: f64 = 0.45;

/// Capacity of the bounded handoff queue between the playback thread and
/// the render loop.
pub const HANDOFF_QUEUE_CAPACITY: usize = 5;

/// Seeks further than this many frames from the current position reopen
/// the container instead of decoding ahead in place.
pub const SEEK_REOPEN_THRESHOLD: u64 = 100;

/// Floor for the playback pacing sleep, so the loop always yields.
pub const MIN_PACING_SLEEP: Duration = Duration::from_millis(1);

/// Number of iteration samples in the rolling FPS window.
pub const FPS_WINDOW: usize = 30;

/// The FPS estimate is refreshed at least this often.
pub const FPS_REFRESH: Duration = Duration::from_secs(1);

/// Max frames a track can be lost before removal (~1 second at 30 fps).
pub const TRACKER_MAX_LOST: usize = 30;

/// Consecutive inference failures before detection is switched off.
pub const DETECTION_FAILURE_LIMIT: u32 = 3;

/// Gaussian kernel size for censor-mode region blur.
pub const CENSOR_KERNEL_SIZE: usize = 51;

/// Playback rate assumed when the source does not report one.
pub const FALLBACK_FPS: f64 = 30.0;

/// File extension for installable detection models.
pub const MODEL_EXTENSION: &str = "onnx";
