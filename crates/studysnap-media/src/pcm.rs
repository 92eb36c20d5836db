//! Decoding of synthesized speech into playable sample buffers.
//!
//! The synthesis gateway returns base64 text wrapping raw mono signed 16-bit
//! little-endian PCM. Each sample becomes an `f32` in `[-1.0, 1.0)` by
//! dividing by 32768. Trailing `=` padding is optional.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use thiserror::Error;

const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Failure to turn encoded speech into samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid base64 audio: {0}")]
    Base64(String),
    #[error("truncated PCM data: {0} bytes is not a whole number of 16-bit samples")]
    TruncatedSample(usize),
}

/// Mono floating-point audio ready for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length at the buffer's sample rate.
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Samples converted back to 16-bit integers, clamped to the valid range.
    pub fn to_i16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&s| (s * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect()
    }
}

/// Decode base64 PCM into a mono buffer at `sample_rate`.
///
/// Empty input yields a buffer with zero frames rather than an error.
pub fn decode(encoded: &str, sample_rate: u32) -> Result<AudioBuffer, DecodeError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    if bytes.len() % 2 != 0 {
        return Err(DecodeError::TruncatedSample(bytes.len()));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(AudioBuffer {
        sample_rate,
        channels: 1,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(samples: &[i16]) -> String {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        BASE64.encode(bytes)
    }

    proptest! {
        #[test]
        fn decode_matches_each_sample(samples in proptest::collection::vec(any::<i16>(), 0..2048)) {
            let buffer = decode(&encode(&samples), 24000).unwrap();
            prop_assert_eq!(buffer.frames(), samples.len());
            for (decoded, &s) in buffer.samples.iter().zip(&samples) {
                prop_assert_eq!(*decoded, s as f32 / 32768.0);
                prop_assert!((-1.0..1.0).contains(decoded));
            }
        }
    }

    #[test]
    fn test_decode_accepts_unpadded() {
        // [0x00, 0x01] is 256 little-endian
        let unpadded = decode("AAE", 24000).unwrap();
        assert_eq!(unpadded.samples, vec![256.0 / 32768.0]);
        assert_eq!(decode("AAE=", 24000).unwrap(), unpadded);
    }

    #[test]
    fn test_decode_known_samples() {
        let buffer = decode(&encode(&[0, 16384, -32768, 32767]), 24000).unwrap();
        assert_eq!(buffer.sample_rate, 24000);
        assert_eq!(buffer.channels, 1);
        assert_eq!(buffer.frames(), 4);
        assert_eq!(buffer.samples[0], 0.0);
        assert_eq!(buffer.samples[1], 0.5);
        assert_eq!(buffer.samples[2], -1.0);
        assert!((buffer.samples[3] - 32767.0 / 32768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decode_frame_count_and_range() {
        let samples: Vec<i16> = (0..1000).map(|i| ((i * 7919) % 65536 - 32768) as i16).collect();
        let buffer = decode(&encode(&samples), 24000).unwrap();
        assert_eq!(buffer.frames(), samples.len());
        assert!(buffer.samples.iter().all(|s| (-1.0..1.0).contains(s)));
    }

    #[test]
    fn test_decode_little_endian() {
        // 0x0100 little-endian is 1, not 256
        let buffer = decode(&BASE64.encode([0x01u8, 0x00]), 24000).unwrap();
        assert_eq!(buffer.samples, vec![1.0 / 32768.0]);
    }

    #[test]
    fn test_decode_empty() {
        let buffer = decode("", 24000).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.frames(), 0);
        assert_eq!(buffer.duration(), std::time::Duration::ZERO);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(decode("not base64!!", 24000), Err(DecodeError::Base64(_))));
        assert_eq!(
            decode(&BASE64.encode([1u8, 2, 3]), 24000),
            Err(DecodeError::TruncatedSample(3))
        );
    }

    #[test]
    fn test_duration_and_back_to_i16() {
        let samples = vec![0i16; 48000];
        let buffer = decode(&encode(&samples), 24000).unwrap();
        assert_eq!(buffer.duration(), std::time::Duration::from_secs(2));

        let original = [0i16, 1234, -1234, i16::MIN, i16::MAX];
        let buffer = decode(&encode(&original), 24000).unwrap();
        assert_eq!(buffer.to_i16(), original.to_vec());
    }
}
