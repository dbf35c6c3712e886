//! Decoder abstraction shared by the audio and video paths.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::Packet;

/// Error type for decoding operations
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Failed to find decoder codec for stream {0}")]
    CodecNotFound(usize),
    #[error("Failed to open decoder for stream {stream}: {source}")]
    Open {
        stream: usize,
        #[source]
        source: ffmpeg::Error,
    },
    #[error("Error during decoding: {0}")]
    FFmpeg(#[from] ffmpeg::Error),
    #[error("Failed to convert frame: {0}")]
    Convert(#[source] ffmpeg::Error),
}

/// A decoder bound to one stream of the input.
///
/// Decoding is packet in, zero or more frames out: codecs with reordering
/// buffer frames internally and release them later or on `flush`.
pub trait Decoder {
    type Frame;

    fn stream_index(&self) -> usize;

    /// Submit a packet and collect every frame that became available
    fn decode(&mut self, packet: &Packet) -> Result<Vec<Self::Frame>, DecodeError>;

    /// Signal end of stream and collect the frames still buffered
    fn flush(&mut self) -> Result<Vec<Self::Frame>, DecodeError>;

    /// Drop buffered state so decoding can restart after a seek or a flush
    fn reset(&mut self);
}

/// No frame available right now, but nothing went wrong either.
pub(crate) fn is_drained(error: &ffmpeg::Error) -> bool {
    match error {
        ffmpeg::Error::Eof => true,
        ffmpeg::Error::Other { errno } => *errno == ffmpeg::util::error::EAGAIN,
        _ => false,
    }
}

/// Send EOF, tolerating a decoder that already saw it.
pub(crate) fn send_eof(decoder: &mut ffmpeg::decoder::Opened) -> Result<(), DecodeError> {
    match decoder.send_eof() {
        Ok(()) => Ok(()),
        Err(error) if is_drained(&error) => Ok(()),
        Err(error) => Err(error.into()),
    }
}
