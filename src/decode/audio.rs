//! Audio decoding to interleaved f32 PCM.

use ffmpeg_next::format::{sample::Type as SampleType, Sample};
use ffmpeg_next::software::resampling::Context as Resampler;
use ffmpeg_next::util::frame::audio::Audio as RawAudioFrame;
use ffmpeg_next::{codec, decoder, ChannelLayout, Packet, Rational, Stream};
use tracing::{debug, trace, warn};

use crate::core::time::{self, Time};
use crate::decode::decoder::{is_drained, send_eof, DecodeError, Decoder};
use crate::decode::frame::AudioFrame;

const OUTPUT_FORMAT: Sample = Sample::F32(SampleType::Packed);

/// Input configuration the resampler was built for
type ResamplerKey = (Sample, ChannelLayout, u32);

/// Decodes one audio stream to packed f32 at the source rate and layout
pub struct AudioDecoder {
    decoder: decoder::Audio,
    stream_index: usize,
    time_base: Rational,
    resampler: Option<(Resampler, ResamplerKey)>,
    last_timestamp: Time,
}

impl AudioDecoder {
    pub fn open(stream: &Stream) -> Result<Self, DecodeError> {
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
            .audio()
            .map_err(open_error)?;

        debug!(
            stream = stream_index,
            rate = decoder.rate(),
            channels = decoder.channels(),
            format = ?decoder.format(),
            "audio decoder opened"
        );

        Ok(Self {
            decoder,
            stream_index,
            time_base: stream.time_base(),
            resampler: None,
            last_timestamp: time::ZERO,
        })
    }

    fn receive_frames(&mut self) -> Result<Vec<AudioFrame>, DecodeError> {
        let mut frames = Vec::new();
        let mut decoded = RawAudioFrame::empty();

        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => frames.push(self.process_frame(&decoded)?),
                Err(error) if is_drained(&error) => return Ok(frames),
                Err(error) => return Err(error.into()),
            }
        }
    }

    fn process_frame(&mut self, decoded: &RawAudioFrame) -> Result<AudioFrame, DecodeError> {
        let timestamp = match decoded.timestamp().or(decoded.pts()) {
            Some(ts) => time::from_time_base(ts, self.time_base),
            None => self.last_timestamp,
        };

        let channels = u32::from(decoded.channels());
        let sample_rate = decoded.rate();

        let resampler = self.resampler_for(decoded)?;
        let mut converted = RawAudioFrame::empty();
        resampler.run(decoded, &mut converted).map_err(DecodeError::Convert)?;

        let samples = interleaved_samples(&converted, channels as usize);
        let frame = AudioFrame {
            samples,
            channels,
            sample_rate,
            timestamp,
        };

        trace!(
            stream = self.stream_index,
            nb_samples = frame.samples_per_channel(),
            channels,
            time = %time::format_time(timestamp),
            "audio frame"
        );

        self.last_timestamp = timestamp + frame.duration();
        Ok(frame)
    }

    /// Resampler matching the frame's input format, rebuilt when it changes
    fn resampler_for(&mut self, decoded: &RawAudioFrame) -> Result<&mut Resampler, DecodeError> {
        let layout = input_layout(decoded);
        let key = (decoded.format(), layout, decoded.rate());

        let (resampler, _) = match self.resampler.take() {
            Some((resampler, current)) if current == key => {
                self.resampler.insert((resampler, current))
            }
            previous => {
                if previous.is_some() {
                    warn!(stream = self.stream_index, "audio format changed, rebuilding resampler");
                }
                let resampler = Resampler::get(key.0, layout, key.2, OUTPUT_FORMAT, layout, key.2)
                    .map_err(DecodeError::Convert)?;
                self.resampler.insert((resampler, key))
            }
        };

        Ok(resampler)
    }
}

impl Decoder for AudioDecoder {
    type Frame = AudioFrame;

    fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn decode(&mut self, packet: &Packet) -> Result<Vec<AudioFrame>, DecodeError> {
        if let Err(error) = self.decoder.send_packet(packet) {
            warn!(stream = self.stream_index, %error, "Error submitting a packet for decoding, skipping");
            return Ok(Vec::new());
        }
        self.receive_frames()
    }

    fn flush(&mut self) -> Result<Vec<AudioFrame>, DecodeError> {
        send_eof(&mut self.decoder)?;
        self.receive_frames()
    }

    fn reset(&mut self) {
        self.decoder.flush();
        self.last_timestamp = time::ZERO;
    }
}

/// Some containers leave the layout unset; fall back to the default
/// layout for the channel count.
fn input_layout(decoded: &RawAudioFrame) -> ChannelLayout {
    let layout = decoded.channel_layout();
    if layout.is_empty() || layout.channels() == 0 {
        ChannelLayout::default(i32::from(decoded.channels()))
    } else {
        layout
    }
}

/// Packed f32 lives entirely in plane 0
fn interleaved_samples(frame: &RawAudioFrame, channels: usize) -> Vec<f32> {
    let count = frame.samples() * channels;
    let bytes = frame.data(0);
    let len = (count * std::mem::size_of::<f32>()).min(bytes.len());

    bytes[..len]
        .chunks_exact(std::mem::size_of::<f32>())
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
