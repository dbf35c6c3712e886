pub mod audio;
pub mod decoder;
pub mod frame;
pub mod sink;
pub mod video;

pub use audio::AudioDecoder;
pub use decoder::{DecodeError, Decoder};
pub use frame::{AudioFrame, MediaFrame, VideoFrame};
pub use sink::{frame_channel, AudioFrameSink, ChannelSink, VideoFrameSink};
pub use video::VideoDecoder;
