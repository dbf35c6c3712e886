//! Frame sinks: where decoded frames go.

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::decode::frame::{AudioFrame, MediaFrame, VideoFrame};

/// Receives decoded video frames on the decode thread
pub trait VideoFrameSink: Send + Sync {
    fn on_video_frame(&self, frame: &VideoFrame);
}

/// Receives decoded audio frames on the decode thread
pub trait AudioFrameSink: Send + Sync {
    fn on_audio_frame(&self, frame: &AudioFrame);
}

/// A replaceable sink shared between the source and its worker.
///
/// The lock is only held to clone the `Arc` out, never while a sink runs.
pub(crate) struct SinkSlot<T: ?Sized> {
    inner: Mutex<Option<Arc<T>>>,
}

impl<T: ?Sized> SinkSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub(crate) fn set(&self, sink: Option<Arc<T>>) {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = sink;
    }

    pub(crate) fn get(&self) -> Option<Arc<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// How long a full channel is waited on before rechecking for a stop
const SEND_SLICE: Duration = Duration::from_millis(10);

thread_local! {
    /// Running flag of the decode run on this thread, if any
    static STOP_FLAG: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

/// Tie sinks called on this thread to a run's running flag
pub(crate) fn bind_stop_flag(running: Arc<AtomicBool>) {
    STOP_FLAG.with(|flag| *flag.borrow_mut() = Some(running));
}

fn stop_requested() -> bool {
    STOP_FLAG.with(|flag| {
        flag.borrow()
            .as_ref()
            .is_some_and(|running| !running.load(Ordering::Acquire))
    })
}

/// Forwards frames into a crossbeam channel.
///
/// With a bounded channel the decode thread blocks while the channel is
/// full, until the source is stopped. Frames are discarded once the
/// receiver has been dropped or a stop is requested.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<MediaFrame>,
}

impl ChannelSink {
    fn forward(&self, mut frame: MediaFrame) {
        loop {
            match self.tx.send_timeout(frame, SEND_SLICE) {
                Ok(()) | Err(SendTimeoutError::Disconnected(_)) => return,
                Err(SendTimeoutError::Timeout(pending)) => {
                    if stop_requested() {
                        return;
                    }
                    frame = pending;
                }
            }
        }
    }
}

impl VideoFrameSink for ChannelSink {
    fn on_video_frame(&self, frame: &VideoFrame) {
        self.forward(MediaFrame::Video(frame.clone()));
    }
}

impl AudioFrameSink for ChannelSink {
    fn on_audio_frame(&self, frame: &AudioFrame) {
        self.forward(MediaFrame::Audio(frame.clone()));
    }
}

/// Create a channel-backed sink.
///
/// `capacity` of `None` gives an unbounded channel.
pub fn frame_channel(capacity: Option<usize>) -> (ChannelSink, Receiver<MediaFrame>) {
    let (tx, rx) = match capacity {
        Some(capacity) => channel::bounded(capacity),
        None => channel::unbounded(),
    };
    (ChannelSink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_frame(timestamp: i64) -> AudioFrame {
        AudioFrame {
            samples: vec![0.25; 8],
            channels: 2,
            sample_rate: 48_000,
            timestamp,
        }
    }

    #[test]
    fn test_channel_sink_forwards_in_order() {
        let (sink, rx) = frame_channel(None);
        sink.on_audio_frame(&audio_frame(1));
        sink.on_audio_frame(&audio_frame(2));

        let timestamps: Vec<_> = rx.try_iter().map(|frame| frame.timestamp()).collect();
        assert_eq!(timestamps, vec![1, 2]);
    }

    #[test]
    fn test_channel_sink_ignores_dropped_receiver() {
        let (sink, rx) = frame_channel(Some(1));
        drop(rx);
        // Must not block or panic
        sink.on_audio_frame(&audio_frame(1));
        sink.on_audio_frame(&audio_frame(2));
    }

    #[test]
    fn test_bounded_sink_applies_backpressure() {
        let (sink, rx) = frame_channel(Some(1));
        sink.on_audio_frame(&audio_frame(1));

        let producer = std::thread::spawn(move || sink.on_audio_frame(&audio_frame(2)));

        assert_eq!(rx.recv().map(|f| f.timestamp()).ok(), Some(1));
        assert_eq!(rx.recv().map(|f| f.timestamp()).ok(), Some(2));
        producer.join().unwrap();
    }

    #[test]
    fn test_full_channel_gives_up_on_stop() {
        let (sink, rx) = frame_channel(Some(1));
        let running = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&running);
        let producer = std::thread::spawn(move || {
            bind_stop_flag(flag);
            sink.on_audio_frame(&audio_frame(1));
            // Blocks on the full channel until the stop below
            sink.on_audio_frame(&audio_frame(2));
        });

        std::thread::sleep(Duration::from_millis(50));
        running.store(false, Ordering::Release);
        producer.join().unwrap();

        // The receiver is still alive but never drained the second frame
        assert_eq!(rx.try_iter().map(|f| f.timestamp()).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_sink_slot_replace() {
        let slot: SinkSlot<dyn AudioFrameSink> = SinkSlot::new();
        assert!(slot.get().is_none());

        let (sink, rx) = frame_channel(None);
        slot.set(Some(Arc::new(sink)));
        if let Some(sink) = slot.get() {
            sink.on_audio_frame(&audio_frame(7));
        }
        assert_eq!(rx.try_recv().map(|f| f.timestamp()).ok(), Some(7));

        slot.set(None);
        assert!(slot.get().is_none());
    }
}
