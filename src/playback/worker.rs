//! Demux/decode loop run on the source's worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel::Sender;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::media;
use tracing::{debug, error, info, warn};

use crate::config::Pacing;
use crate::core::time::Time;
use crate::decode::audio::AudioDecoder;
use crate::decode::decoder::Decoder;
use crate::decode::frame::{AudioFrame, VideoFrame};
use crate::decode::sink::{self, AudioFrameSink, SinkSlot, VideoFrameSink};
use crate::decode::video::VideoDecoder;
use crate::media::source::SourceError;
use crate::playback::clock::PacingClock;
use crate::playback::state::{SourceState, StateProperty};

/// State shared between a source and its worker
pub(crate) struct Shared {
    pub running: Arc<AtomicBool>,
    pub looping: AtomicBool,
    pub video_sink: SinkSlot<dyn VideoFrameSink>,
    pub audio_sink: SinkSlot<dyn AudioFrameSink>,
    pub state: StateProperty,
}

impl Shared {
    pub fn new(looping: bool) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            looping: AtomicBool::new(looping),
            video_sink: SinkSlot::new(),
            audio_sink: SinkSlot::new(),
            state: StateProperty::new(SourceState::Initializing),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Per-run settings fixed at start
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunSettings {
    pub pacing: Pacing,
    pub convert_video: bool,
    /// Seek to the beginning before reading
    pub rewind: bool,
}

/// What the worker hands back when joined
pub(crate) struct WorkerOutcome {
    pub input: Input,
    pub reached_end: bool,
    pub result: Result<(), SourceError>,
}

/// Result of one pass over the input
enum Pass {
    /// Input exhausted after reading this many packets
    EndOfInput(u64),
    Stopped,
}

/// Marks the run finished however the worker exits, unwinding included
struct FinishGuard<'a> {
    shared: &'a Shared,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.state.set(SourceState::Ended);
    }
}

struct Pipeline {
    video: Option<VideoDecoder>,
    audio: Option<AudioDecoder>,
    clock: Option<PacingClock>,
    video_frames: u64,
    audio_frames: u64,
}

/// Worker entry point.
///
/// Reports decoder setup on `ready` before any frame is produced, then
/// decodes until the input ends or `running` is cleared.
pub(crate) fn run(
    mut input: Input,
    shared: Arc<Shared>,
    settings: RunSettings,
    ready: Sender<Result<(), SourceError>>,
) -> WorkerOutcome {
    let mut pipeline = match Pipeline::open(&mut input, settings) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            shared.running.store(false, Ordering::Release);
            // start() is waiting on the other end; the error goes there
            let _ = ready.send(Err(err));
            return WorkerOutcome {
                input,
                reached_end: false,
                result: Ok(()),
            };
        }
    };

    let _finish = FinishGuard { shared: &shared };
    sink::bind_stop_flag(Arc::clone(&shared.running));

    shared.state.set(SourceState::Live);
    let _ = ready.send(Ok(()));

    let mut reached_end = false;
    let result = loop {
        let packets = match pipeline.pass(&mut input, &shared) {
            Ok(Pass::Stopped) => break Ok(()),
            Ok(Pass::EndOfInput(packets)) => packets,
            Err(err) => break Err(err),
        };

        if !shared.looping.load(Ordering::Acquire) || !shared.is_running() {
            reached_end = true;
            break Ok(());
        }
        if packets == 0 {
            warn!("input has no packets, not looping");
            reached_end = true;
            break Ok(());
        }

        debug!("end of input, looping");
        if let Err(err) = input.seek(0, ..0) {
            break Err(SourceError::Seek(err));
        }
        pipeline.reset();
    };

    if let Err(err) = &result {
        error!(error = %err, "decode worker failed");
    }
    info!(
        video_frames = pipeline.video_frames,
        audio_frames = pipeline.audio_frames,
        reached_end,
        "decode worker finished"
    );

    WorkerOutcome {
        input,
        reached_end,
        result,
    }
}

impl Pipeline {
    fn open(input: &mut Input, settings: RunSettings) -> Result<Self, SourceError> {
        let video = match input.streams().best(media::Type::Video) {
            Some(stream) => Some(VideoDecoder::open(&stream, settings.convert_video)?),
            None => None,
        };
        let audio = match input.streams().best(media::Type::Audio) {
            Some(stream) => Some(AudioDecoder::open(&stream)?),
            None => None,
        };

        if video.is_none() && audio.is_none() {
            return Err(SourceError::NoStreams);
        }

        if settings.rewind {
            input.seek(0, ..0).map_err(SourceError::Seek)?;
        }

        let clock = match settings.pacing {
            Pacing::Realtime => Some(PacingClock::new()),
            Pacing::Unthrottled => None,
        };

        Ok(Self {
            video,
            audio,
            clock,
            video_frames: 0,
            audio_frames: 0,
        })
    }

    /// Read packets until the input is exhausted or a stop is requested,
    /// then drain the decoders.
    fn pass(&mut self, input: &mut Input, shared: &Shared) -> Result<Pass, SourceError> {
        let mut packets = 0;
        while shared.is_running() {
            let Some((stream, packet)) = input.packets().next() else {
                self.flush(shared)?;
                return Ok(Pass::EndOfInput(packets));
            };
            packets += 1;
            let index = stream.index();

            if let Some(video) = self.video.as_mut().filter(|d| d.stream_index() == index) {
                let frames = video.decode(&packet)?;
                self.deliver_video(frames, shared);
            } else if let Some(audio) = self.audio.as_mut().filter(|d| d.stream_index() == index) {
                let frames = audio.decode(&packet)?;
                self.deliver_audio(frames, shared);
            }
        }

        Ok(Pass::Stopped)
    }

    fn flush(&mut self, shared: &Shared) -> Result<(), SourceError> {
        if let Some(video) = self.video.as_mut() {
            let frames = video.flush()?;
            self.deliver_video(frames, shared);
        }
        if let Some(audio) = self.audio.as_mut() {
            let frames = audio.flush()?;
            self.deliver_audio(frames, shared);
        }
        Ok(())
    }

    fn reset(&mut self) {
        if let Some(video) = self.video.as_mut() {
            video.reset();
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.reset();
        }
        if let Some(clock) = self.clock.as_mut() {
            clock.reset();
        }
    }

    fn deliver_video(&mut self, frames: Vec<VideoFrame>, shared: &Shared) {
        for frame in frames {
            if !self.pace(frame.timestamp, shared) {
                return;
            }
            self.video_frames += 1;
            if let Some(sink) = shared.video_sink.get() {
                sink.on_video_frame(&frame);
            }
        }
    }

    fn deliver_audio(&mut self, frames: Vec<AudioFrame>, shared: &Shared) {
        for frame in frames {
            if !self.pace(frame.timestamp, shared) {
                return;
            }
            self.audio_frames += 1;
            if let Some(sink) = shared.audio_sink.get() {
                sink.on_audio_frame(&frame);
            }
        }
    }

    /// Wait for the frame's slot when pacing. False if stopped meanwhile.
    fn pace(&mut self, timestamp: Time, shared: &Shared) -> bool {
        match self.clock.as_mut() {
            Some(clock) => clock.wait_until(timestamp, &shared.running),
            None => {
                if !shared.is_running() {
                    debug!("stop requested, dropping decoded frames");
                    return false;
                }
                true
            }
        }
    }
}
