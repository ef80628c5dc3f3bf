//! Record types shared by the capture, buffer and delivery paths

pub mod arg;
pub mod captured_log;

pub use arg::{render_args, LogArg};
pub use captured_log::{CapturedLog, LogLevel, LogMetadata};
