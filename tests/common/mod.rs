//! Test media generated on the fly with FFmpeg's built-in encoders.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::{context::Output, sample::Type as SampleType, Pixel, Sample};
use ffmpeg_next::{codec, encoder, frame, ChannelLayout, Dictionary, Packet, Rational};
use tempfile::TempDir;

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;
pub const FPS: i32 = 25;
pub const SAMPLE_RATE: i32 = 48_000;
pub const CHANNELS: u32 = 2;
/// Audio samples per channel written alongside each video frame
pub const SAMPLES_PER_FRAME: usize = (SAMPLE_RATE / FPS) as usize;
/// Two seconds of video
pub const FRAMES: usize = 50;

/// A clip in its own temporary directory, removed on drop
pub struct Clip {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Clip {
    /// Matroska with one MPEG-4 video stream followed by one PCM audio stream
    pub fn new(frames: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mkv");
        write_clip(&path, frames).unwrap();
        Self { _dir: dir, path }
    }

    /// An ffmetadata file: opens fine but has no streams at all
    pub fn metadata_only() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapters.ffmeta");
        std::fs::write(&path, ";FFMETADATA1\ntitle=no streams here\n").unwrap();
        Self { _dir: dir, path }
    }
}

fn write_clip(path: &Path, frames: usize) -> Result<(), ffmpeg::Error> {
    ffmpeg::init()?;
    let mut octx = ffmpeg::format::output(&path)?;

    let video_codec = encoder::find(codec::Id::MPEG4).ok_or(ffmpeg::Error::EncoderNotFound)?;
    let mut video_config = codec::Context::new_with_codec(video_codec).encoder().video()?;
    video_config.set_flags(codec::Flags::GLOBAL_HEADER);
    video_config.set_format(Pixel::YUV420P);
    video_config.set_width(WIDTH);
    video_config.set_height(HEIGHT);
    video_config.set_time_base(Rational::new(1, FPS));
    video_config.set_frame_rate(Some(Rational::new(FPS, 1)));
    let mut video = video_config.open_with(Dictionary::new())?;

    let video_index = {
        let mut stream = octx.add_stream(video_codec.id())?;
        stream.set_parameters(&video);
        stream.set_time_base(Rational::new(1, FPS));
        stream.index()
    };

    let audio_codec = encoder::find(codec::Id::PCM_S16LE).ok_or(ffmpeg::Error::EncoderNotFound)?;
    let mut audio_config = codec::Context::new_with_codec(audio_codec).encoder().audio()?;
    audio_config.set_flags(codec::Flags::GLOBAL_HEADER);
    audio_config.set_format(Sample::I16(SampleType::Packed));
    audio_config.set_rate(SAMPLE_RATE);
    audio_config.set_channel_layout(ChannelLayout::STEREO);
    audio_config.set_time_base(Rational::new(1, SAMPLE_RATE));
    let mut audio = audio_config.open_with(Dictionary::new())?;

    let audio_index = {
        let mut stream = octx.add_stream(audio_codec.id())?;
        stream.set_parameters(&audio);
        stream.set_time_base(Rational::new(1, SAMPLE_RATE));
        stream.index()
    };

    octx.write_header()?;

    // The muxer may pick its own stream time bases
    let video_tb = octx.stream(video_index).ok_or(ffmpeg::Error::StreamNotFound)?.time_base();
    let audio_tb = octx.stream(audio_index).ok_or(ffmpeg::Error::StreamNotFound)?.time_base();

    for i in 0..frames {
        let mut picture = frame::Video::new(Pixel::YUV420P, WIDTH, HEIGHT);
        picture.data_mut(0).fill((i * 5 % 256) as u8);
        picture.data_mut(1).fill(128);
        picture.data_mut(2).fill(128);
        picture.set_pts(Some(i as i64));
        video.send_frame(&picture)?;
        drain(&mut video, video_index, Rational::new(1, FPS), video_tb, &mut octx)?;

        let mut samples = frame::Audio::new(
            Sample::I16(SampleType::Packed),
            SAMPLES_PER_FRAME,
            ChannelLayout::STEREO,
        );
        samples.set_rate(SAMPLE_RATE as u32);
        samples.data_mut(0).fill(0);
        samples.set_pts(Some((i * SAMPLES_PER_FRAME) as i64));
        audio.send_frame(&samples)?;
        drain(&mut audio, audio_index, Rational::new(1, SAMPLE_RATE), audio_tb, &mut octx)?;
    }

    video.send_eof()?;
    drain(&mut video, video_index, Rational::new(1, FPS), video_tb, &mut octx)?;
    audio.send_eof()?;
    drain(&mut audio, audio_index, Rational::new(1, SAMPLE_RATE), audio_tb, &mut octx)?;

    octx.write_trailer()
}

fn drain(
    encoder: &mut encoder::Encoder,
    index: usize,
    from: Rational,
    to: Rational,
    octx: &mut Output,
) -> Result<(), ffmpeg::Error> {
    let mut packet = Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(index);
        packet.rescale_ts(from, to);
        packet.write_interleaved(octx)?;
    }
    Ok(())
}
