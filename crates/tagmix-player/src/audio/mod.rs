//! CPAL audio system
//!
//! One stereo output stream mixes every stem of the current track. The
//! session thread opens stems through [`CpalPlayerBackend`] and hands the
//! decoded voices to the callback over a lock-free queue; spent voices come
//! back over a second queue and are dropped by the [`VoiceReaper`] on the
//! session thread. The callback itself never locks, allocates, or frees.

pub mod error;
pub mod voice;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use tagmix_core::config::AudioConfig;
use tagmix_core::mixer::{LevelCell, PlayerBackend, StemPlayer};

use crate::decode;

pub use error::{AudioError, AudioResult};
use voice::{Voice, VoiceControls, VoiceMixer};

/// Preferred output rate; stems are resampled to whatever the device gives
const DEFAULT_SAMPLE_RATE: u32 = 48_000;
/// Capacity of the session-to-callback voice queue
const VOICE_QUEUE_CAPACITY: usize = 64;
/// Capacity of the callback-to-session reclaim queue
const RECLAIM_QUEUE_CAPACITY: usize = 64;

/// Everything the rest of the app needs from a started audio system
pub struct AudioSystemResult {
    /// Keeps the stream alive; drop to stop audio
    pub handle: AudioSystemHandle,
    /// Opens stems as voices on this system
    pub backend: CpalPlayerBackend,
    /// Drains the reclaim queue; call it from the session loop
    pub reaper: VoiceReaper,
    /// Negotiated sample rate
    pub sample_rate: u32,
    /// Negotiated channel count (first two carry the mix)
    pub channels: u16,
}

/// Handle to the active audio stream
pub struct AudioSystemHandle {
    _stream: Stream,
}

/// Start the audio system on the default output device
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::NoDevices)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = pick_output_config(&device)?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();

    let stream_config = StreamConfig {
        channels,
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    log::info!(
        "Audio config: {} channels, {}Hz, f32 output",
        channels,
        sample_rate
    );

    let (voice_tx, voice_rx) = rtrb::RingBuffer::new(VOICE_QUEUE_CAPACITY);
    let (reclaim_tx, reclaim_rx) = rtrb::RingBuffer::new(RECLAIM_QUEUE_CAPACITY);
    let mut mixer = VoiceMixer::new(voice_rx, reclaim_tx, channels as usize);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                mixer.render(data);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None, // No timeout (blocking)
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioSystemResult {
        handle: AudioSystemHandle { _stream: stream },
        backend: CpalPlayerBackend {
            voice_tx,
            sample_rate,
            loop_stems: config.loop_stems,
        },
        reaper: VoiceReaper { reclaim_rx },
        sample_rate,
        channels,
    })
}

/// Pick the best output configuration for a device
///
/// Prefers f32, stereo, and the default rate; falls back to whatever f32
/// config the device offers. Non-f32-only devices are rejected.
fn pick_output_config(device: &cpal::Device) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let best = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| {
            DEFAULT_SAMPLE_RATE >= c.min_sample_rate().0
                && DEFAULT_SAMPLE_RATE <= c.max_sample_rate().0
        })
        .or_else(|| {
            supported
                .iter()
                .filter(|c| c.sample_format() == SampleFormat::F32)
                .find(|c| c.channels() >= 2)
        })
        .or_else(|| {
            supported
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32)
        })
        .ok_or_else(|| AudioError::UnsupportedFormat("device offers no f32 output".to_string()))?;

    let sample_rate = if DEFAULT_SAMPLE_RATE >= best.min_sample_rate().0
        && DEFAULT_SAMPLE_RATE <= best.max_sample_rate().0
    {
        cpal::SampleRate(DEFAULT_SAMPLE_RATE)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            DEFAULT_SAMPLE_RATE,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(sample_rate))
}

/// Opens stems as voices on the running audio system
pub struct CpalPlayerBackend {
    voice_tx: rtrb::Producer<Voice>,
    sample_rate: u32,
    loop_stems: bool,
}

impl PlayerBackend for CpalPlayerBackend {
    fn open(
        &mut self,
        path: &Path,
        levels: Arc<LevelCell>,
    ) -> anyhow::Result<Box<dyn StemPlayer>> {
        let stem = decode::decode_stem(path, self.sample_rate)
            .with_context(|| format!("decoding {:?}", path))?;
        log::debug!(
            "decoded {:?}: {} frames at {}Hz",
            path.file_name().unwrap_or_default(),
            stem.samples.len() / 2,
            stem.sample_rate
        );

        let controls = Arc::new(VoiceControls::new());
        let voice = Voice::new(stem.samples, Arc::clone(&controls), levels, self.loop_stems);
        self.voice_tx
            .push(voice)
            .map_err(|_| anyhow::anyhow!("voice queue full"))?;

        Ok(Box::new(CpalStemPlayer { controls }))
    }
}

/// Player handle for one voice; every method is a flag flip
struct CpalStemPlayer {
    controls: Arc<VoiceControls>,
}

impl StemPlayer for CpalStemPlayer {
    fn set_volume(&mut self, volume: f32) {
        self.controls.set_volume(volume);
    }

    fn play(&mut self) {
        self.controls.set_playing(true);
    }

    fn pause(&mut self) {
        self.controls.set_playing(false);
    }

    fn stop(&mut self) {
        self.controls.request_stop();
    }
}

/// Drains the reclaim queue on the session thread
pub struct VoiceReaper {
    reclaim_rx: rtrb::Consumer<Voice>,
}

impl VoiceReaper {
    /// Drop every spent voice that has come back from the callback
    pub fn collect(&mut self) -> usize {
        let mut collected = 0;
        while let Ok(voice) = self.reclaim_rx.pop() {
            drop(voice);
            collected += 1;
        }
        if collected > 0 {
            log::debug!("reclaimed {} spent voices", collected);
        }
        collected
    }
}
