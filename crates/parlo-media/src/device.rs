//! Default-device capture and playback via cpal.
//!
//! Both directions share the same shape: the cpal callback moves samples
//! through a mutex-guarded ring, and the trait side blocks on that ring.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleFormat, SampleRate, Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::{
    code, AudioCapturer, AudioFrame, AudioRenderer, CaptureConfig, MediaError, Result,
    MAX_BUFFER_SAMPLES,
};

const RING_POLL: Duration = Duration::from_millis(2);

fn denied_from_build(err: BuildStreamError) -> MediaError {
    match err {
        BuildStreamError::DeviceNotAvailable => {
            MediaError::denied(code::DEVICE_BUSY, "capture device not available")
        }
        other => MediaError::denied(code::PERMISSION_DENIED, other),
    }
}

/// Microphone capture from the default input device.
pub struct CpalCapturer {
    _stream: Stream,
    ring: Arc<Mutex<VecDeque<i16>>>,
    config: CaptureConfig,
    start: Instant,
}

// cpal::Stream is !Send but the handle is only kept to hold the stream open.
unsafe impl Send for CpalCapturer {}

impl CpalCapturer {
    /// Request the default microphone with audio-only constraints.
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| MediaError::denied(code::NO_DEVICE, "no audio input device"))?;

        let supported = device
            .default_input_config()
            .map_err(|e| MediaError::denied(code::PERMISSION_DENIED, e))?;
        let sample_format = supported.sample_format();

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring = Arc::new(Mutex::new(VecDeque::with_capacity(MAX_BUFFER_SAMPLES)));
        let ring_clone = ring.clone();

        let err_fn = |err| {
            tracing::error!("cpal input stream error: {}", err);
        };

        let stream = match sample_format {
            SampleFormat::F32 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        let mut ring = ring_clone.lock().unwrap();
                        for &sample in data {
                            push_capped(&mut ring, (sample * i16::MAX as f32) as i16);
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(denied_from_build)?,
            SampleFormat::I16 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        let mut ring = ring_clone.lock().unwrap();
                        for &sample in data {
                            push_capped(&mut ring, sample);
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(denied_from_build)?,
            other => {
                return Err(MediaError::Unsupported(format!(
                    "input sample format {other:?}"
                )))
            }
        };

        stream
            .play()
            .map_err(|e| MediaError::denied(code::DEVICE_BUSY, e))?;

        Ok(Self {
            _stream: stream,
            ring,
            config,
            start: Instant::now(),
        })
    }
}

impl AudioCapturer for CpalCapturer {
    fn config(&self) -> CaptureConfig {
        self.config
    }

    fn next_frame(&mut self) -> Result<AudioFrame> {
        let wanted = self.config.frame_samples();
        loop {
            {
                let mut ring = self.ring.lock().unwrap();
                if ring.len() >= wanted {
                    let samples: Vec<i16> = ring.drain(..wanted).collect();
                    return Ok(AudioFrame {
                        timestamp_us: self.start.elapsed().as_micros() as u64,
                        samples,
                    });
                }
            }
            std::thread::sleep(RING_POLL);
        }
    }
}

/// Playback to the default output device.
pub struct CpalRenderer {
    _stream: Stream,
    ring: Arc<Mutex<VecDeque<f32>>>,
}

unsafe impl Send for CpalRenderer {}

impl CpalRenderer {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| MediaError::denied(code::NO_DEVICE, "no audio output device"))?;

        let supported = device
            .default_output_config()
            .map_err(|e| MediaError::device(e))?;
        let sample_format = supported.sample_format();

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring = Arc::new(Mutex::new(VecDeque::with_capacity(MAX_BUFFER_SAMPLES)));
        let ring_clone = ring.clone();

        let err_fn = |err| {
            tracing::error!("cpal output stream error: {}", err);
        };

        let stream = match sample_format {
            SampleFormat::F32 => device
                .build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _| {
                        let mut ring = ring_clone.lock().unwrap();
                        for out in data.iter_mut() {
                            *out = ring.pop_front().unwrap_or(0.0);
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| MediaError::device(e))?,
            SampleFormat::I16 => device
                .build_output_stream(
                    &stream_config,
                    move |data: &mut [i16], _| {
                        let mut ring = ring_clone.lock().unwrap();
                        for out in data.iter_mut() {
                            let sample = ring.pop_front().unwrap_or(0.0);
                            *out = (sample * i16::MAX as f32) as i16;
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| MediaError::device(e))?,
            other => {
                return Err(MediaError::Unsupported(format!(
                    "output sample format {other:?}"
                )))
            }
        };

        stream.play().map_err(|e| MediaError::device(e))?;

        Ok(Self {
            _stream: stream,
            ring,
        })
    }
}

impl AudioRenderer for CpalRenderer {
    fn render(&mut self, payload: &[u8], _timestamp_us: u64) -> Result<()> {
        let mut ring = self.ring.lock().unwrap();
        for pair in payload.chunks_exact(2) {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            if ring.len() >= MAX_BUFFER_SAMPLES {
                ring.pop_front();
            }
            ring.push_back(sample as f32 / i16::MAX as f32);
        }
        Ok(())
    }
}

fn push_capped(ring: &mut VecDeque<i16>, sample: i16) {
    if ring.len() >= MAX_BUFFER_SAMPLES {
        ring.pop_front();
    }
    ring.push_back(sample);
}
