//! File-backed media source.
//!
//! A [`MediaFileSource`] owns an opened FFmpeg input. Stream descriptors are
//! read once at open time; `start` lends the input to a worker thread that
//! decodes it and feeds the configured frame sinks, and `stop` takes it back.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::context::Input;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::SourceConfig;
use crate::decode::decoder::DecodeError;
use crate::decode::sink::{AudioFrameSink, VideoFrameSink};
use crate::media::probe::{probe_input, ProbeResult};
use crate::media::stream_info::{audio_streams, video_streams, MediaStreamInfo};
use crate::playback::state::SourceState;
use crate::playback::worker::{self, RunSettings, Shared, WorkerOutcome};

const WORKER_NAME: &str = "media-file-source worker";

/// Error type for media file sources
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to initialize FFmpeg: {0}")]
    Init(#[source] ffmpeg::Error),
    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: ffmpeg::Error,
    },
    #[error("No decodable audio or video stream")]
    NoStreams,
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Seek failed: {0}")]
    Seek(#[source] ffmpeg::Error),
    #[error("Failed to spawn decode worker: {0}")]
    Thread(#[source] std::io::Error),
    #[error("Decode worker panicked")]
    WorkerPanicked,
    #[error("Source has been disposed")]
    Disposed,
}

/// FFmpeg global setup, done once per process
fn init_ffmpeg() -> Result<(), SourceError> {
    static INIT: OnceLock<Result<(), ffmpeg::Error>> = OnceLock::new();
    (*INIT.get_or_init(ffmpeg::init)).map_err(SourceError::Init)
}

/// A media file opened for probing and decoding
pub struct MediaFileSource {
    path: PathBuf,
    /// None while lent to the worker, or after a worker panic
    input: Option<Input>,
    probe: ProbeResult,
    config: SourceConfig,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<Option<WorkerOutcome>>>,
    /// The last run read the input to its end
    reached_end: bool,
}

impl MediaFileSource {
    /// Open `path` with the default configuration
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        Self::open_with_config(path, SourceConfig::default())
    }

    /// Open `path` and read its stream information.
    ///
    /// A missing file is reported as [`SourceError::NotFound`] before FFmpeg
    /// is touched.
    pub fn open_with_config(path: impl AsRef<Path>, config: SourceConfig) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        if !path.exists() {
            return Err(SourceError::NotFound(path));
        }

        init_ffmpeg()?;

        let input = ffmpeg::format::input(&path).map_err(|source| SourceError::Open {
            path: path.clone(),
            source,
        })?;
        let probe = probe_input(&input);

        info!(
            path = %path.display(),
            streams = probe.streams.len(),
            duration = ?probe.duration,
            bitrate = probe.bitrate,
            "media file opened"
        );

        Ok(Self {
            shared: Arc::new(Shared::new(config.looping)),
            path,
            input: Some(input),
            probe,
            config,
            worker: None,
            reached_end: false,
        })
    }

    /// Start decoding on a worker thread.
    ///
    /// Blocks until the decoders are open. Calling it while the source runs
    /// does nothing. After a run that reached the end of the file decoding
    /// restarts from the beginning; after a `stop` it resumes where it left off.
    ///
    /// If the previous run ended on its own with an error that nobody has
    /// collected yet, that error is returned instead and nothing starts.
    pub fn start(&mut self) -> Result<(), SourceError> {
        if self.is_running() {
            return Ok(());
        }

        // A previous run that ended on its own still needs joining
        self.reap()?;

        let input = self.input.take().ok_or(SourceError::Disposed)?;
        let settings = RunSettings {
            pacing: self.config.pacing,
            convert_video: self.config.convert_video,
            rewind: self.reached_end,
        };

        let (input_tx, input_rx) = channel::bounded::<Input>(1);
        let (ready_tx, ready_rx) = channel::bounded(1);
        let shared = Arc::clone(&self.shared);

        self.shared.running.store(true, Ordering::Release);

        let spawned = thread::Builder::new().name(WORKER_NAME.to_string()).spawn(move || {
            let input = input_rx.recv().ok()?;
            Some(worker::run(input, shared, settings, ready_tx))
        });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                self.shared.running.store(false, Ordering::Release);
                self.input = Some(input);
                return Err(SourceError::Thread(err));
            }
        };

        // The input only moves once the thread exists, so a failed spawn keeps it
        if let Err(unsent) = input_tx.send(input) {
            self.input = Some(unsent.into_inner());
        }
        self.worker = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.reached_end = false;
                info!(path = %self.path.display(), "source started");
                Ok(())
            }
            Ok(Err(err)) => {
                // Worker is exiting; join it to get the input back
                self.reap()?;
                Err(err)
            }
            Err(_) => {
                self.reap()?;
                Err(SourceError::WorkerPanicked)
            }
        }
    }

    /// Stop decoding and wait for the worker to exit.
    ///
    /// Stopping a source that is not running is a no-op. Returns the error
    /// that ended the run, if any. A worker blocked on a full
    /// [`ChannelSink`] gives up the pending frame and exits.
    ///
    /// [`ChannelSink`]: crate::decode::sink::ChannelSink
    pub fn stop(&mut self) -> Result<(), SourceError> {
        if self.worker.is_none() {
            return Ok(());
        }

        debug!(path = %self.path.display(), "stopping source");
        self.shared.running.store(false, Ordering::Release);
        self.reap()
    }

    /// Stop and release the input, reporting the stop result
    pub fn close(mut self) -> Result<(), SourceError> {
        let result = self.stop();
        self.input = None;
        info!(path = %self.path.display(), "source closed");
        result
    }

    /// Join a finished or stopping worker and take the input back
    fn reap(&mut self) -> Result<(), SourceError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        match handle.join() {
            Ok(Some(outcome)) => {
                self.input = Some(outcome.input);
                self.reached_end = outcome.reached_end;
                outcome.result
            }
            Ok(None) => Ok(()),
            Err(_) => {
                error!(path = %self.path.display(), "decode worker panicked, input lost");
                self.shared.running.store(false, Ordering::Release);
                self.shared.state.set(SourceState::Ended);
                Err(SourceError::WorkerPanicked)
            }
        }
    }

    /// True while the worker is decoding
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && self.shared.running.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Container duration, if the container declares one
    pub fn duration(&self) -> Option<Duration> {
        self.probe.duration
    }

    /// Container bitrate in bits/s, 0 when unknown
    pub fn bitrate(&self) -> u64 {
        self.probe.bitrate
    }

    /// All audio and video stream descriptors, in container order
    pub fn stream_info(&self) -> Vec<MediaStreamInfo> {
        self.probe.streams.clone()
    }

    pub fn audio_stream_info(&self) -> Vec<MediaStreamInfo> {
        audio_streams(&self.probe.streams)
    }

    pub fn video_stream_info(&self) -> Vec<MediaStreamInfo> {
        video_streams(&self.probe.streams)
    }

    /// Restart from the beginning at end of input. Takes effect at the next
    /// end of input, also while running.
    pub fn set_loop(&mut self, looping: bool) {
        self.config.looping = looping;
        self.shared.looping.store(looping, Ordering::Release);
    }

    pub fn is_looping(&self) -> bool {
        self.shared.looping.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn state(&self) -> SourceState {
        self.shared.state.get()
    }

    /// Listen for state changes; drop the receiver to stop listening
    pub fn subscribe_state(&self) -> watch::Receiver<SourceState> {
        self.shared.state.subscribe()
    }

    pub fn set_video_sink(&self, sink: Arc<dyn VideoFrameSink>) {
        self.shared.video_sink.set(Some(sink));
    }

    pub fn remove_video_sink(&self) {
        self.shared.video_sink.set(None);
    }

    pub fn set_audio_sink(&self, sink: Arc<dyn AudioFrameSink>) {
        self.shared.audio_sink.set(Some(sink));
    }

    pub fn remove_audio_sink(&self) {
        self.shared.audio_sink.set(None);
    }
}

impl fmt::Debug for MediaFileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaFileSource")
            .field("path", &self.path)
            .field("state", &self.state())
            .field("running", &self.is_running())
            .field("streams", &self.probe.streams.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for MediaFileSource {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(path = %self.path.display(), error = %err, "error stopping source on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_found() {
        let err = MediaFileSource::open("/definitely/not/here.mp4").unwrap_err();
        match err {
            SourceError::NotFound(path) => assert_eq!(path, PathBuf::from("/definitely/not/here.mp4")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_not_found_path_is_absolute() {
        let err = MediaFileSource::open("missing-relative-file.mkv").unwrap_err();
        let SourceError::NotFound(path) = err else {
            panic!("expected NotFound");
        };
        assert!(path.is_absolute());
        assert!(path.ends_with("missing-relative-file.mkv"));
    }

    #[test]
    fn test_error_messages() {
        let err = SourceError::NotFound(PathBuf::from("/tmp/x.mp4"));
        assert_eq!(err.to_string(), "/tmp/x.mp4 does not exist");

        let err = SourceError::Open {
            path: PathBuf::from("/tmp/x.mp4"),
            source: ffmpeg::Error::InvalidData,
        };
        assert!(err.to_string().starts_with("Failed to open /tmp/x.mp4: "));

        let err: SourceError = DecodeError::CodecNotFound(2).into();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn test_source_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<MediaFileSource>();
        assert_send::<SourceError>();
    }
}
