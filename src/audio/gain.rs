//! # Adaptive Gain Normalization
//!
//! Transforms one raw audio chunk (interleaved little-endian 32-bit float
//! samples) into a loudness-normalized 16-bit PCM chunk ready for the speech
//! decoder. Microphone levels in the field vary wildly, so quiet input is
//! amplified before decoding:
//!
//! - RMS below 0.01: severe under-level, gain up to 20x
//! - RMS below 0.05: moderate under-level, gain up to 10x
//! - RMS at or above 0.05: passed through at unity gain
//!
//! After gain the chunk is peak-rescaled to 0.99 and clipped to `[-0.99, 0.99]`
//! so floating rounding can never overshoot the 16-bit range, then converted
//! sample-by-sample to little-endian i16 PCM.
//!
//! All functions here are pure; no session state is involved.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Severe under-level boundary; also the silence classification threshold.
pub const SEVERE_UNDER_LEVEL_RMS: f32 = 0.01;

/// Moderate under-level boundary; at or above this no gain is applied.
pub const MODERATE_UNDER_LEVEL_RMS: f32 = 0.05;

/// Headroom target for the peak rescale and clip stage.
const CLIP_CEILING: f32 = 0.99;

/// The chunk bytes could not be interpreted as f32 samples.
#[derive(Debug, PartialEq, Eq)]
pub enum AudioFormatError {
    /// Byte length is not a multiple of the 4-byte sample width.
    UnalignedLength(usize),
    /// The chunk holds no samples at all.
    Empty,
}

impl fmt::Display for AudioFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioFormatError::UnalignedLength(len) => {
                write!(f, "chunk length {} is not a multiple of 4 bytes", len)
            }
            AudioFormatError::Empty => write!(f, "chunk holds no samples"),
        }
    }
}

impl std::error::Error for AudioFormatError {}

/// Decode a chunk into f32 samples, failing fast on malformed byte lengths.
fn parse_samples(chunk: &[u8]) -> Result<Vec<f32>, AudioFormatError> {
    if chunk.is_empty() {
        return Err(AudioFormatError::Empty);
    }
    if chunk.len() % 4 != 0 {
        return Err(AudioFormatError::UnalignedLength(chunk.len()));
    }

    let mut samples = vec![0.0f32; chunk.len() / 4];
    LittleEndian::read_f32_into(chunk, &mut samples);
    Ok(samples)
}

/// Root-mean-square energy of a raw f32 chunk.
///
/// Used both for gain selection here and for silence classification, which
/// must inspect the *pre-gain* signal.
pub fn chunk_rms(chunk: &[u8]) -> Result<f32, AudioFormatError> {
    let samples = parse_samples(chunk)?;
    Ok(rms(&samples))
}

fn rms(samples: &[f32]) -> f32 {
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Select the amplification factor for a chunk with the given RMS energy.
///
/// Bands are evaluated in order and the first match wins.
fn select_gain(rms: f32) -> f32 {
    if rms < SEVERE_UNDER_LEVEL_RMS {
        (1.0 / (rms + 0.0001)).min(20.0)
    } else if rms < MODERATE_UNDER_LEVEL_RMS {
        (0.5 / (rms + 0.001)).min(10.0)
    } else {
        1.0
    }
}

/// Normalize one chunk and convert it to 16-bit little-endian PCM.
///
/// Chunks shorter than `chunk_size` are returned unchanged: a partial chunk
/// does not carry enough data to estimate energy reliably, so it is passed
/// through without amplification or format conversion.
///
/// A byte length that is not a multiple of 4 is a data error; the caller is
/// expected to log it and forward the original bytes unmodified so a single
/// bad delivery degrades processing instead of ending the session.
pub fn normalize(chunk: &[u8], chunk_size: usize) -> Result<Vec<u8>, AudioFormatError> {
    if chunk.len() < chunk_size {
        return Ok(chunk.to_vec());
    }

    let mut samples = parse_samples(chunk)?;

    let energy = rms(&samples);
    let gain = select_gain(energy);
    if gain != 1.0 {
        for sample in &mut samples {
            *sample *= gain;
        }
        tracing::debug!(rms = energy, gain, "amplified under-level chunk");
    }

    // Peak rescale to the clip ceiling, then clip to defend against residual
    // overshoot from floating rounding.
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        for sample in &mut samples {
            *sample = (*sample / peak * CLIP_CEILING).clamp(-CLIP_CEILING, CLIP_CEILING);
        }
    }

    let mut pcm = Vec::with_capacity(samples.len() * 2);
    for sample in &samples {
        let quantized = (sample * 32767.0).round() as i16;
        pcm.extend_from_slice(&quantized.to_le_bytes());
    }

    Ok(pcm)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNK_SIZE: usize = 32768;

    fn chunk_from(samples: &[f32]) -> Vec<u8> {
        let mut bytes = vec![0u8; samples.len() * 4];
        LittleEndian::write_f32_into(samples, &mut bytes);
        bytes
    }

    fn pcm_samples(bytes: &[u8]) -> Vec<i16> {
        let mut out = vec![0i16; bytes.len() / 2];
        LittleEndian::read_i16_into(bytes, &mut out);
        out
    }

    #[test]
    fn loud_chunk_gets_unity_gain_and_exact_peak_rescale() {
        // Constant 0.1 gives RMS 0.1 >= 0.05, so gain must stay 1.0 and the
        // output is purely the peak-rescaled, clipped, quantized input.
        let samples = vec![0.1f32; CHUNK_SIZE / 4];
        let chunk = chunk_from(&samples);

        let pcm = normalize(&chunk, CHUNK_SIZE).unwrap();
        let out = pcm_samples(&pcm);

        let expected = ((0.1f32 / 0.1 * 0.99).clamp(-0.99, 0.99) * 32767.0).round() as i16;
        assert_eq!(out.len(), samples.len());
        assert!(out.iter().all(|&s| s == expected));
    }

    #[test]
    fn severe_under_level_chunk_is_amplified_within_the_clip_bound() {
        // Alternating +a/-a with a = 0.005 gives RMS exactly 0.005, squarely
        // in the severe under-level band.
        let samples: Vec<f32> = (0..CHUNK_SIZE / 4)
            .map(|i| if i % 2 == 0 { 0.005 } else { -0.005 })
            .collect();
        let chunk = chunk_from(&samples);

        let pcm = normalize(&chunk, CHUNK_SIZE).unwrap();
        let out = pcm_samples(&pcm);

        let clip_bound = (0.99f32 * 32767.0).round() as i16;
        assert!(out.iter().all(|&s| s.unsigned_abs() <= clip_bound as u16));
        // The quiet signal must come out strongly amplified, not passed through.
        assert!(out.iter().any(|&s| s.abs() > 10_000));
    }

    #[test]
    fn gain_bands_match_the_documented_formulas() {
        assert_eq!(select_gain(0.005), (1.0f32 / 0.0051).min(20.0));
        assert_eq!(select_gain(0.03), (0.5f32 / 0.031).min(10.0));
        assert_eq!(select_gain(0.05), 1.0);
        assert_eq!(select_gain(0.5), 1.0);
    }

    #[test]
    fn short_chunk_is_passed_through_untouched() {
        let chunk = chunk_from(&[0.25f32; 64]);
        let out = normalize(&chunk, CHUNK_SIZE).unwrap();
        assert_eq!(out, chunk);
    }

    #[test]
    fn unaligned_length_fails_fast() {
        let chunk = vec![0u8; CHUNK_SIZE + 3];
        assert_eq!(
            normalize(&chunk, CHUNK_SIZE),
            Err(AudioFormatError::UnalignedLength(CHUNK_SIZE + 3))
        );
        assert!(chunk_rms(&chunk[..7]).is_err());
    }

    #[test]
    fn rms_of_a_silent_chunk_is_zero() {
        let chunk = chunk_from(&[0.0f32; 1024]);
        assert_eq!(chunk_rms(&chunk).unwrap(), 0.0);
    }
}
