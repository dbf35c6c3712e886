//! Stream descriptors extracted from media containers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Audio-specific stream parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub channels: u32,
    pub sample_rate: u32,
}

/// Video-specific stream parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    /// Pixel format name, `"unknown"` if the container does not declare one
    pub format_name: String,
    /// Real base frame rate of the stream
    pub frame_rate: f64,
}

/// Type-specific part of a stream descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamKind {
    Audio(AudioStreamInfo),
    Video(VideoStreamInfo),
}

/// Descriptor of one elementary stream within a media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaStreamInfo {
    pub index: u32,
    pub codec_name: String,
    pub codec_long_name: String,
    /// Bits per second, 0 when the container does not say
    pub bitrate: u64,
    #[serde(flatten)]
    pub kind: StreamKind,
}

impl MediaStreamInfo {
    pub fn is_audio(&self) -> bool {
        matches!(self.kind, StreamKind::Audio(_))
    }

    pub fn is_video(&self) -> bool {
        matches!(self.kind, StreamKind::Video(_))
    }

    pub fn audio(&self) -> Option<&AudioStreamInfo> {
        match &self.kind {
            StreamKind::Audio(audio) => Some(audio),
            StreamKind::Video(_) => None,
        }
    }

    pub fn video(&self) -> Option<&VideoStreamInfo> {
        match &self.kind {
            StreamKind::Video(video) => Some(video),
            StreamKind::Audio(_) => None,
        }
    }
}

impl fmt::Display for MediaStreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({}), {} b/s",
            self.index, self.codec_name, self.codec_long_name, self.bitrate
        )?;

        match &self.kind {
            StreamKind::Audio(audio) => {
                write!(f, ", audio: {} ch @ {} Hz", audio.channels, audio.sample_rate)
            }
            StreamKind::Video(video) => write!(
                f,
                ", video: {}x{} {} @ {:.3} fps",
                video.width, video.height, video.format_name, video.frame_rate
            ),
        }
    }
}

/// Keep only the audio descriptors, preserving container order
pub fn audio_streams(infos: &[MediaStreamInfo]) -> Vec<MediaStreamInfo> {
    infos.iter().filter(|info| info.is_audio()).cloned().collect()
}

/// Keep only the video descriptors, preserving container order
pub fn video_streams(infos: &[MediaStreamInfo]) -> Vec<MediaStreamInfo> {
    infos.iter().filter(|info| info.is_video()).cloned().collect()
}
