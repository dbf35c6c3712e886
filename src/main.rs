use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use media_file_source::{
    AudioFrame, AudioFrameSink, MediaFileSource, MediaStreamInfo, Pacing, SourceConfig, VideoFrame,
    VideoFrameSink,
};

#[derive(Parser, Debug)]
#[command(name = "mfsource")]
#[command(about = "Inspect a media file and optionally decode it end to end")]
struct Args {
    /// Media file to open
    file: PathBuf,

    /// Print the stream summary as JSON
    #[arg(long)]
    json: bool,

    /// Decode the whole file and count the delivered frames
    #[arg(long)]
    play: bool,

    /// Restart from the beginning at end of file (runs until killed)
    #[arg(long = "loop")]
    looping: bool,

    /// Deliver frames at their presentation time instead of as fast as possible
    #[arg(long)]
    realtime: bool,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct Summary<'a> {
    path: String,
    duration_secs: Option<f64>,
    bitrate: u64,
    streams: &'a [MediaStreamInfo],
}

#[derive(Default)]
struct FrameCounter {
    video: AtomicU64,
    audio: AtomicU64,
}

impl VideoFrameSink for FrameCounter {
    fn on_video_frame(&self, _frame: &VideoFrame) {
        self.video.fetch_add(1, Ordering::Relaxed);
    }
}

impl AudioFrameSink for FrameCounter {
    fn on_audio_frame(&self, _frame: &AudioFrame) {
        self.audio.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SourceConfig::from_file(path)?,
        None => SourceConfig::default(),
    };
    if args.looping {
        config.looping = true;
    }
    if args.realtime {
        config.pacing = Pacing::Realtime;
    }

    let source = MediaFileSource::open_with_config(&args.file, config)
        .with_context(|| format!("opening {}", args.file.display()))?;

    let streams = source.stream_info();
    if args.json {
        let summary = Summary {
            path: source.path().display().to_string(),
            duration_secs: source.duration().map(|d| d.as_secs_f64()),
            bitrate: source.bitrate(),
            streams: &streams,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", source.path().display());
        match source.duration() {
            Some(duration) => println!("  duration: {:.3}s", duration.as_secs_f64()),
            None => println!("  duration: unknown"),
        }
        println!("  bitrate: {} b/s", source.bitrate());
        for stream in &streams {
            println!("  {stream}");
        }
    }

    if args.play {
        play(source)?;
    }

    Ok(())
}

fn play(mut source: MediaFileSource) -> anyhow::Result<()> {
    let counter = Arc::new(FrameCounter::default());
    source.set_video_sink(counter.clone());
    source.set_audio_sink(counter.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("building runtime")?;

    let mut state = source.subscribe_state();
    let started = Instant::now();
    source.start()?;

    runtime.block_on(async {
        // Err only once the source is dropped
        let _ = state.wait_for(|state| state.is_ended()).await;
    });

    source.close()?;

    let video = counter.video.load(Ordering::Relaxed);
    let audio = counter.audio.load(Ordering::Relaxed);
    info!(video, audio, elapsed = ?started.elapsed(), "playback finished");
    println!("  decoded: {video} video frames, {audio} audio frames in {:.2?}", started.elapsed());

    Ok(())
}
