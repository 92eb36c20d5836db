//! WAV container encoding for handing speech to external players.

use crate::pcm::AudioBuffer;

const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;
const FORMAT_PCM: u16 = 1;

/// Format fields of a canonical RIFF/WAVE header for 16-bit integer PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WavFormat {
    channels: u16,
    sample_rate: u32,
}

impl WavFormat {
    fn block_align(self) -> u16 {
        self.channels * (BITS_PER_SAMPLE / 8)
    }

    fn byte_rate(self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Header for a `data` chunk of `data_len` bytes.
    fn header(self, data_len: u32) -> [u8; HEADER_LEN] {
        let fmt_fields: [&[u8]; 6] = [
            &FORMAT_PCM.to_le_bytes(),
            &self.channels.to_le_bytes(),
            &self.sample_rate.to_le_bytes(),
            &self.byte_rate().to_le_bytes(),
            &self.block_align().to_le_bytes(),
            &BITS_PER_SAMPLE.to_le_bytes(),
        ];
        let fmt_chunk = fmt_fields.concat();

        let riff_len = (HEADER_LEN as u32 - 8) + data_len;
        let parts: [&[u8]; 8] = [
            b"RIFF",
            &riff_len.to_le_bytes(),
            b"WAVE",
            b"fmt ",
            &(fmt_chunk.len() as u32).to_le_bytes(),
            &fmt_chunk,
            b"data",
            &data_len.to_le_bytes(),
        ];

        let mut header = [0u8; HEADER_LEN];
        let mut at = 0;
        for part in parts {
            header[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        header
    }
}

/// Encode a decoded buffer as a WAV file, samples clamped to 16-bit.
pub fn encode_wav(buffer: &AudioBuffer) -> Vec<u8> {
    let pcm = buffer.to_i16();
    let data_len = pcm.len() * 2;
    let format = WavFormat {
        channels: buffer.channels.max(1),
        sample_rate: buffer.sample_rate,
    };

    let mut wav = Vec::with_capacity(HEADER_LEN + data_len);
    wav.extend_from_slice(&format.header(data_len as u32));
    wav.extend(pcm.iter().flat_map(|s| s.to_le_bytes()));
    wav
}
