//! Video decoding to planar I420 frames.

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg_next::util::frame::video::Video as RawVideoFrame;
use ffmpeg_next::{codec, decoder, Packet, Rational, Stream};
use tracing::{debug, trace, warn};

use crate::core::time::{self, Time};
use crate::decode::decoder::{is_drained, send_eof, DecodeError, Decoder};
use crate::decode::frame::VideoFrame;

const Y_PLANE: usize = 0;
const U_PLANE: usize = 1;
const V_PLANE: usize = 2;

/// Decodes one video stream, converting frames to I420 when needed
pub struct VideoDecoder {
    decoder: decoder::Video,
    stream_index: usize,
    time_base: Rational,
    convert: bool,
    scaler: Option<(Scaler, (Pixel, u32, u32))>,
    last_timestamp: Time,
}

impl VideoDecoder {
    /// Open a decoder for `stream`.
    ///
    /// With `convert` off, frames that are not already I420 are dropped.
    pub fn open(stream: &Stream, convert: bool) -> Result<Self, DecodeError> {
        let stream_index = stream.index();
        let parameters = stream.parameters();

        if codec::decoder::find(parameters.id()).is_none() {
            return Err(DecodeError::CodecNotFound(stream_index));
        }

        let open_error = |source| DecodeError::Open {
            stream: stream_index,
            source,
        };
        let decoder = codec::context::Context::from_parameters(parameters)
            .map_err(open_error)?
            .decoder()
            .video()
            .map_err(open_error)?;

        debug!(
            stream = stream_index,
            width = decoder.width(),
            height = decoder.height(),
            format = ?decoder.format(),
            "video decoder opened"
        );

        Ok(Self {
            decoder,
            stream_index,
            time_base: stream.time_base(),
            convert,
            scaler: None,
            last_timestamp: time::ZERO,
        })
    }

    fn receive_frames(&mut self) -> Result<Vec<VideoFrame>, DecodeError> {
        let mut frames = Vec::new();
        let mut decoded = RawVideoFrame::empty();

        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    if let Some(frame) = self.process_frame(&decoded)? {
                        frames.push(frame);
                    }
                }
                Err(error) if is_drained(&error) => return Ok(frames),
                Err(error) => return Err(error.into()),
            }
        }
    }

    fn process_frame(&mut self, decoded: &RawVideoFrame) -> Result<Option<VideoFrame>, DecodeError> {
        let timestamp = match decoded.timestamp().or(decoded.pts()) {
            Some(ts) => time::from_time_base(ts, self.time_base),
            None => self.last_timestamp,
        };
        self.last_timestamp = timestamp;

        trace!(
            stream = self.stream_index,
            width = decoded.width(),
            height = decoded.height(),
            time = %time::format_time(timestamp),
            "video frame"
        );

        if decoded.format() == Pixel::YUV420P {
            return Ok(Some(copy_planes(decoded, timestamp)));
        }

        if !self.convert {
            debug!(
                stream = self.stream_index,
                format = ?decoded.format(),
                "dropping non-I420 frame, conversion disabled"
            );
            return Ok(None);
        }

        let scaler = self.scaler_for(decoded)?;
        let mut converted = RawVideoFrame::empty();
        scaler.run(decoded, &mut converted).map_err(DecodeError::Convert)?;

        Ok(Some(copy_planes(&converted, timestamp)))
    }

    /// Scaler matching the frame's geometry, rebuilt when the input changes
    fn scaler_for(&mut self, decoded: &RawVideoFrame) -> Result<&mut Scaler, DecodeError> {
        let key = (decoded.format(), decoded.width(), decoded.height());

        let (scaler, _) = match self.scaler.take() {
            Some((scaler, current)) if current == key => self.scaler.insert((scaler, current)),
            previous => {
                if previous.is_some() {
                    warn!(stream = self.stream_index, ?key, "video geometry changed, rebuilding scaler");
                }
                let scaler = Scaler::get(
                    key.0,
                    key.1,
                    key.2,
                    Pixel::YUV420P,
                    key.1,
                    key.2,
                    Flags::BILINEAR,
                )
                .map_err(DecodeError::Convert)?;
                self.scaler.insert((scaler, key))
            }
        };

        Ok(scaler)
    }
}

impl Decoder for VideoDecoder {
    type Frame = VideoFrame;

    fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn decode(&mut self, packet: &Packet) -> Result<Vec<VideoFrame>, DecodeError> {
        if let Err(error) = self.decoder.send_packet(packet) {
            warn!(stream = self.stream_index, %error, "Error submitting a packet for decoding, skipping");
            return Ok(Vec::new());
        }
        self.receive_frames()
    }

    fn flush(&mut self) -> Result<Vec<VideoFrame>, DecodeError> {
        send_eof(&mut self.decoder)?;
        self.receive_frames()
    }

    fn reset(&mut self) {
        self.decoder.flush();
        self.last_timestamp = time::ZERO;
    }
}

fn copy_planes(frame: &RawVideoFrame, timestamp: Time) -> VideoFrame {
    VideoFrame {
        width: frame.width(),
        height: frame.height(),
        timestamp,
        data_y: frame.data(Y_PLANE).to_vec(),
        data_u: frame.data(U_PLANE).to_vec(),
        data_v: frame.data(V_PLANE).to_vec(),
        stride_y: frame.stride(Y_PLANE),
        stride_u: frame.stride(U_PLANE),
        stride_v: frame.stride(V_PLANE),
    }
}
