pub mod probe;
pub mod source;
pub mod stream_info;

pub use probe::{probe_input, ProbeResult};
pub use source::{MediaFileSource, SourceError};
pub use stream_info::{AudioStreamInfo, MediaStreamInfo, StreamKind, VideoStreamInfo};
