//! FFmpeg-backed media file source.
//!
//! Open a file with [`MediaFileSource::open`], inspect its streams, then
//! `start` it to have decoded I420 video and f32 audio frames delivered to
//! a [`VideoFrameSink`] and an [`AudioFrameSink`].

pub mod config;
pub mod core;
pub mod decode;
pub mod media;
pub mod playback;

pub use config::{Pacing, SourceConfig};
pub use decode::{
    frame_channel, AudioFrame, AudioFrameSink, ChannelSink, MediaFrame, VideoFrame, VideoFrameSink,
};
pub use media::{AudioStreamInfo, MediaFileSource, MediaStreamInfo, SourceError, StreamKind, VideoStreamInfo};
pub use playback::SourceState;
