//! Stream descriptor extraction from an opened input context.

use std::time::Duration;

use ffmpeg_next::ffi::AVPixelFormat;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::{codec, format::context::Input, media, Stream};
use tracing::{debug, warn};

use crate::media::stream_info::{AudioStreamInfo, MediaStreamInfo, StreamKind, VideoStreamInfo};

/// Container-level summary plus one descriptor per decodable stream
#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
    pub duration: Option<Duration>,
    pub bitrate: u64,
    pub streams: Vec<MediaStreamInfo>,
}

/// Describe the container and its audio/video streams.
///
/// Streams whose codec has no registered decoder, and streams that are
/// neither audio nor video, are skipped.
pub fn probe_input(input: &Input) -> ProbeResult {
    // AV_TIME_BASE units (microseconds); negative means unknown
    let duration = u64::try_from(input.duration())
        .ok()
        .filter(|micros| *micros > 0)
        .map(Duration::from_micros);
    let bitrate = u64::try_from(input.bit_rate()).unwrap_or(0);

    let streams = input.streams().filter_map(|stream| describe_stream(&stream)).collect();

    ProbeResult {
        duration,
        bitrate,
        streams,
    }
}

fn describe_stream(stream: &Stream) -> Option<MediaStreamInfo> {
    let parameters = stream.parameters();
    let medium = parameters.medium();

    if medium != media::Type::Audio && medium != media::Type::Video {
        debug!(stream = stream.index(), ?medium, "skipping non audio/video stream");
        return None;
    }

    let Some(decoder) = codec::decoder::find(parameters.id()) else {
        warn!(stream = stream.index(), codec = ?parameters.id(), "unsupported codec");
        return None;
    };

    // SAFETY: the parameters are owned by the stream, which outlives these reads
    let raw = unsafe { &*parameters.as_ptr() };

    let kind = if medium == media::Type::Audio {
        StreamKind::Audio(AudioStreamInfo {
            channels: u32::try_from(raw.ch_layout.nb_channels).unwrap_or(0),
            sample_rate: u32::try_from(raw.sample_rate).unwrap_or(0),
        })
    } else {
        let format_name = pixel_format(raw.format)
            .descriptor()
            .map(|descriptor| descriptor.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        StreamKind::Video(VideoStreamInfo {
            width: u32::try_from(raw.width).unwrap_or(0),
            height: u32::try_from(raw.height).unwrap_or(0),
            format_name,
            frame_rate: frame_rate(stream),
        })
    };

    Some(MediaStreamInfo {
        index: stream.index() as u32,
        codec_name: decoder.name().to_string(),
        codec_long_name: decoder.description().to_string(),
        bitrate: u64::try_from(raw.bit_rate).unwrap_or(0),
        kind,
    })
}

/// Codec parameters keep the pixel format as a raw integer, -1 when unset
fn pixel_format(format: i32) -> Pixel {
    if format < 0 {
        return Pixel::None;
    }
    // SAFETY: non-negative values stored here come from FFmpeg's AVPixelFormat
    Pixel::from(unsafe { std::mem::transmute::<i32, AVPixelFormat>(format) })
}

fn frame_rate(stream: &Stream) -> f64 {
    let rate = stream.rate();
    if rate.denominator() == 0 {
        0.0
    } else {
        f64::from(rate)
    }
}
