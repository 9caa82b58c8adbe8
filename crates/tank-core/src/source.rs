use crate::types::Frame;

/// Supplier of camera frames.
///
/// Started and stopped from the main context while the worker reads, so the
/// implementation is shared and every method takes `&self`. `read` blocks
/// until a frame is available and returns `None` once the source is stopped
/// or exhausted. `stop` must be idempotent.
pub trait FrameSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn start(&self) -> Result<(), Self::Error>;
    fn stop(&self);
    fn read(&self) -> Option<Frame>;
}
