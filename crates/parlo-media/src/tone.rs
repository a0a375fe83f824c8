//! Deterministic capture source and discarding sink for headless runs.

use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use crate::{AudioCapturer, AudioFrame, AudioRenderer, CaptureConfig, Result};

const TONE_HZ: f32 = 440.0;
const TONE_AMPLITUDE: f32 = 0.2;

/// Sine-wave capture source, paced to real time so the send loop behaves
/// like a live microphone.
pub struct ToneCapturer {
    config: CaptureConfig,
    start: Instant,
    seq: u64,
    phase: f32,
}

impl ToneCapturer {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            start: Instant::now(),
            seq: 0,
            phase: 0.0,
        }
    }
}

impl AudioCapturer for ToneCapturer {
    fn config(&self) -> CaptureConfig {
        self.config
    }

    fn next_frame(&mut self) -> Result<AudioFrame> {
        // Simulate capture timing
        let frame_interval = Duration::from_millis(self.config.frame_ms as u64);
        let target_time = self.start + frame_interval * self.seq as u32;
        if let Some(wait) = target_time.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }

        let step = TAU * TONE_HZ / self.config.sample_rate as f32;
        let mut samples = Vec::with_capacity(self.config.frame_samples());
        for _ in 0..self.config.frame_samples() / self.config.channels as usize {
            let value = (self.phase.sin() * TONE_AMPLITUDE * i16::MAX as f32) as i16;
            for _ in 0..self.config.channels {
                samples.push(value);
            }
            self.phase = (self.phase + step) % TAU;
        }

        let timestamp_us = self.start.elapsed().as_micros() as u64;
        self.seq += 1;

        Ok(AudioFrame {
            timestamp_us,
            samples,
        })
    }
}

/// Discards every payload. Counts them so tests can assert playback was fed.
#[derive(Default)]
pub struct NullRenderer {
    frames: u64,
    bytes: u64,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn bytes_rendered(&self) -> u64 {
        self.bytes
    }
}

impl AudioRenderer for NullRenderer {
    fn render(&mut self, payload: &[u8], _timestamp_us: u64) -> Result<()> {
        self.frames += 1;
        self.bytes += payload.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_frames_are_full_and_bounded() {
        let config = CaptureConfig::default();
        let mut capturer = ToneCapturer::new(config);
        let frame = capturer.next_frame().unwrap();
        assert_eq!(frame.samples.len(), config.frame_samples());
        assert!(frame.samples.iter().any(|&s| s != 0));
        let limit = (TONE_AMPLITUDE * i16::MAX as f32) as i16 + 1;
        assert!(frame.samples.iter().all(|&s| s.abs() <= limit));
    }

    #[test]
    fn null_renderer_counts_frames() {
        let mut renderer = NullRenderer::new();
        let payload = vec![0u8; 1920];
        renderer.render(&payload, 0).unwrap();
        renderer.render(&payload, 20_000).unwrap();
        assert_eq!(renderer.frames_rendered(), 2);
        assert_eq!(renderer.bytes_rendered(), 3840);
    }
}
