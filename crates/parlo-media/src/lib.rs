//! Audio capture and playback seams for Parlo.
//!
//! The call driver only sees the [`AudioCapturer`] and [`AudioRenderer`]
//! traits; device access lives behind them so headless runs and tests can
//! swap in the tone source and the null sink.

use thiserror::Error;

pub mod device;
pub mod tone;

pub use device::{CpalCapturer, CpalRenderer};
pub use tone::{NullRenderer, ToneCapturer};

pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u16 = 1;
pub const FRAME_MS: u32 = 20;
pub const FRAME_SAMPLES: usize = (SAMPLE_RATE as usize / 1000) * (FRAME_MS as usize);
pub const MAX_BUFFER_FRAMES: usize = 4;
pub const MAX_BUFFER_SAMPLES: usize = FRAME_SAMPLES * MAX_BUFFER_FRAMES;

/// Capture failure codes, surfaced verbatim in the user-facing report.
pub mod code {
    pub const PERMISSION_DENIED: u32 = 1;
    pub const NO_DEVICE: u32 = 2;
    pub const DEVICE_BUSY: u32 = 3;
}

pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    /// The capture device was denied or is unavailable. `code` is what the
    /// failure report shown to the user must contain.
    #[error("capture denied (code {code}): {reason}")]
    CaptureDenied { code: u32, reason: String },

    /// A device stream broke after it was granted.
    #[error("device error: {0}")]
    Device(String),

    /// The device offered a configuration we cannot consume.
    #[error("unsupported stream format: {0}")]
    Unsupported(String),
}

impl MediaError {
    pub fn denied(code: u32, reason: impl std::fmt::Display) -> Self {
        Self::CaptureDenied {
            code,
            reason: reason.to_string(),
        }
    }

    pub fn device(msg: impl std::fmt::Display) -> Self {
        Self::Device(msg.to_string())
    }
}

/// Audio-only capture constraints. No device selection: the request is
/// "audio: yes" and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u32,
}

impl CaptureConfig {
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as usize / 1000) * (self.frame_ms as usize) * (self.channels as usize)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            frame_ms: FRAME_MS,
        }
    }
}

/// One frame of interleaved i16 PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub timestamp_us: u64,
    pub samples: Vec<i16>,
}

pub trait AudioCapturer: Send {
    fn config(&self) -> CaptureConfig;

    /// Block until the next frame of local audio is available.
    fn next_frame(&mut self) -> Result<AudioFrame>;
}

pub trait AudioRenderer: Send {
    /// Hand one payload of remote audio (interleaved i16 LE PCM) to the
    /// playback sink.
    fn render(&mut self, payload: &[u8], timestamp_us: u64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_frame_constants() {
        let config = CaptureConfig::default();
        assert_eq!(config.frame_samples(), FRAME_SAMPLES);
    }

    #[test]
    fn denied_error_carries_its_code() {
        let err = MediaError::denied(code::PERMISSION_DENIED, "user said no");
        let text = err.to_string();
        assert!(text.contains("code 1"));
        assert!(text.contains("user said no"));
    }
}
