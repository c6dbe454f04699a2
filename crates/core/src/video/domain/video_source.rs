use crate::shared::frame::Frame;
use crate::shared::source_info::SourceInfo;

/// Reads frames from a video file or a live capture source.
///
/// Implementations own the decoder/camera handle; the pipeline works with
/// the abstract `Frame` and `SourceInfo` types. A source is opened by its
/// constructor and stays positioned: `read` advances sequentially, `seek`
/// repositions to an absolute frame index. Live sources report
/// `frame_count = None` and reject seeks.
pub trait VideoSource: Send {
    fn info(&self) -> &SourceInfo;

    /// Next frame in presentation order. `Ok(None)` is end-of-stream for a
    /// finite source; a live source either produces a frame or errors.
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Repositions so the next `read` returns the frame at `index`.
    fn seek(&mut self, index: u64) -> Result<(), Box<dyn std::error::Error>>;

    /// Index of the frame the next `read` will return.
    fn position(&self) -> u64;

    fn is_live(&self) -> bool {
        self.info().frame_count.is_none()
    }
}
