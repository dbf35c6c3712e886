//! Decoded frames handed to frame sinks.

use crate::core::time::{self, Time};

/// Decoded video frame in planar I420 (YUV 4:2:0)
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub timestamp: Time, // Timestamp in nanoseconds
    pub data_y: Vec<u8>,
    pub data_u: Vec<u8>,
    pub data_v: Vec<u8>,
    pub stride_y: usize,
    pub stride_u: usize,
    pub stride_v: usize,
}

impl VideoFrame {
    pub fn chroma_width(&self) -> u32 {
        (self.width + 1) / 2
    }

    pub fn chroma_height(&self) -> u32 {
        (self.height + 1) / 2
    }
}

/// Decoded audio frame (interleaved PCM f32)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>, // Interleaved samples (L, R, L, R, ...)
    pub channels: u32,
    pub sample_rate: u32,
    pub timestamp: Time, // Timestamp in nanoseconds
}

impl AudioFrame {
    pub fn samples_per_channel(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Playback length of this frame in nanoseconds
    pub fn duration(&self) -> Time {
        if self.sample_rate == 0 {
            return time::ZERO;
        }
        time::from_seconds(self.samples_per_channel() as f64 / self.sample_rate as f64)
    }
}

/// Either kind of decoded frame
#[derive(Debug, Clone)]
pub enum MediaFrame {
    Video(VideoFrame),
    Audio(AudioFrame),
}

impl MediaFrame {
    pub fn timestamp(&self) -> Time {
        match self {
            MediaFrame::Video(frame) => frame.timestamp,
            MediaFrame::Audio(frame) => frame.timestamp,
        }
    }
}
