//! Stem decoding and resampling
//!
//! Stems are decoded in full when a track loads: Symphonia turns the file
//! into f32 samples, everything is folded to stereo, and rubato brings it
//! to the device rate. Paying the whole cost at load keeps the audio
//! callback to pure mixing.

use std::path::{Path, PathBuf};

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tagmix_core::Sample;
use thiserror::Error;

/// Frames fed to the resampler per call
const RESAMPLE_CHUNK_FRAMES: usize = 8192;

/// Errors that keep a stem from loading
///
/// A failed stem is skipped by the caller; the rest of the track loads.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("no decodable audio in file")]
    NoAudio,

    #[error("resampling failed: {0}")]
    Resample(String),
}

/// A stem ready for playback
#[derive(Debug)]
pub struct DecodedStem {
    /// Interleaved stereo samples at `sample_rate`
    pub samples: Vec<Sample>,
    pub sample_rate: u32,
}

/// Decode a stem file to interleaved stereo f32 at `target_rate`
pub fn decode_stem(path: &Path, target_rate: u32) -> Result<DecodedStem, DecodeError> {
    let (samples, sample_rate, channels) = decode_file(path)?;
    let stereo = to_stereo(samples, channels);
    let samples = if sample_rate != target_rate {
        resample_stereo(&stereo, sample_rate, target_rate)?
    } else {
        stereo
    };
    if samples.is_empty() {
        return Err(DecodeError::NoAudio);
    }
    Ok(DecodedStem {
        samples,
        sample_rate: target_rate,
    })
}

/// Decode an audio file to f32 samples using Symphonia
fn decode_file(path: &Path) -> Result<(Vec<f32>, u32, u16), DecodeError> {
    use std::fs::File;
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = File::open(path).map_err(|e| DecodeError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudio)?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::UnsupportedFormat("unknown sample rate".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Error decoding packet: {}", e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::NoAudio);
    }

    Ok((samples, sample_rate, channels))
}

/// Fold interleaved samples of any channel count into interleaved stereo
///
/// Mono is duplicated to both sides; wider layouts keep their first two
/// channels.
fn to_stereo(samples: Vec<f32>, channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples,
        n => samples
            .chunks_exact(n as usize)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Resample interleaved stereo from `from` Hz to `to` Hz
fn resample_stereo(interleaved: &[f32], from: u32, to: u32) -> Result<Vec<f32>, DecodeError> {
    let frames = interleaved.len() / 2;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in interleaved.chunks_exact(2) {
        left.push(frame[0]);
        right.push(frame[1]);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(
        to as f64 / from as f64,
        2.0,
        params,
        RESAMPLE_CHUNK_FRAMES,
        2,
    )
    .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let estimated = (frames as f64 * to as f64 / from as f64) as usize + RESAMPLE_CHUNK_FRAMES;
    let mut out_left: Vec<f32> = Vec::with_capacity(estimated);
    let mut out_right: Vec<f32> = Vec::with_capacity(estimated);

    let mut pos = 0;
    while frames - pos >= RESAMPLE_CHUNK_FRAMES {
        let end = pos + RESAMPLE_CHUNK_FRAMES;
        let chunk = [&left[pos..end], &right[pos..end]];
        let processed = resampler
            .process(&chunk, None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        out_left.extend_from_slice(&processed[0]);
        out_right.extend_from_slice(&processed[1]);
        pos = end;
    }

    if pos < frames {
        let tail = [&left[pos..], &right[pos..]];
        let processed = resampler
            .process_partial(Some(&tail), None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        out_left.extend_from_slice(&processed[0]);
        out_right.extend_from_slice(&processed[1]);
    }

    // flush what the sinc filter still holds
    let processed = resampler
        .process_partial(None::<&[&[f32]]>, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;
    out_left.extend_from_slice(&processed[0]);
    out_right.extend_from_slice(&processed[1]);

    let mut out = Vec::with_capacity(out_left.len() * 2);
    for (l, r) in out_left.iter().zip(out_right.iter()) {
        out.push(*l);
        out.push(*r);
    }
    Ok(out)
}
