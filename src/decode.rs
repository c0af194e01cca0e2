//! Post-capture decode into per-line timelines

use crate::capture::CaptureBuffer;

/// Lines in one sample
pub const LINES: u8 = 8;

/// Composite nibble of one sample
///
/// Takes bits 1, 2, 4 and 5 of the sample (QSPI SD0, SD1, SD2, SD3 on the board wiring).
/// Kept in this exact form so traces match the ones dumped by the existing scripts.
pub const fn decode_nibble(sample: u8) -> u8 {
    ((sample >> 1) & 1) | ((sample >> 1) & 2) | ((sample >> 2) & 0x4) | ((sample >> 2) & 0x8)
}

/// Level of monitored `line` in one sample
pub const fn line_level(sample: u8, line: u8) -> bool {
    (sample >> line) & 1 != 0
}

/// Decoded view of a capture buffer
///
/// Nothing is precomputed;
/// each timeline is derived from the buffer when iterated, in capture order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecodedWaveform<'a> {
    samples: &'a [u8],
    complete: bool,
}

/// Decode `buffer`. Pure; decoding the same buffer again yields the same waveform.
pub fn decode(buffer: &CaptureBuffer) -> DecodedWaveform<'_> {
    DecodedWaveform {
        samples: buffer.as_bytes(),
        complete: buffer.is_complete(),
    }
}

impl<'a> DecodedWaveform<'a> {
    /// Number of samples in every timeline
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// False if the capture was torn down before its budget ran out
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Timeline of monitored `line`
    ///
    /// Panics if `line` is not below [`LINES`].
    pub fn line(&self, line: u8) -> impl Iterator<Item = bool> + 'a {
        assert!(line < LINES, "no monitored line {}", line);
        self.samples.iter().map(move |&s| line_level(s, line))
    }

    /// Composite nibble timeline
    pub fn nibbles(&self) -> impl Iterator<Item = u8> + 'a {
        self.samples.iter().map(|&s| decode_nibble(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CAPTURE_LEN;

    fn buffer_of(pattern: &[u8]) -> CaptureBuffer {
        let bytes = core::array::from_fn(|i| pattern[i % pattern.len()]);
        CaptureBuffer::from_bytes(bytes, true)
    }

    #[test]
    fn nibble_formula_over_every_byte() {
        for b in 0..=255u8 {
            let expected = ((b >> 1) & 1) | ((b >> 1) & 2) | ((b >> 2) & 4) | ((b >> 2) & 8);
            assert_eq!(decode_nibble(b), expected, "byte {:#04x}", b);
            assert!(decode_nibble(b) < 16);
        }
        assert_eq!(decode_nibble(0b0011_0110), 0xf);
        assert_eq!(decode_nibble(0b1100_1001), 0x0);
    }

    #[test]
    fn zero_buffer_decodes_to_all_low() {
        let buffer = CaptureBuffer::new();
        let wave = decode(&buffer);
        assert_eq!(wave.len(), CAPTURE_LEN);
        for line in 0..LINES {
            assert!(wave.line(line).all(|level| !level));
        }
        assert!(wave.nibbles().all(|n| n == 0));
        assert!(!wave.is_complete());
    }

    #[test]
    fn decode_is_repeatable() {
        let buffer = buffer_of(&[0x3c, 0xa5, 0x00, 0xff, 0x12]);
        let first = decode(&buffer);
        let second = decode(&buffer);
        assert_eq!(first, second);
        for line in 0..LINES {
            assert!(first.line(line).eq(second.line(line)));
        }
        assert!(first.nibbles().eq(second.nibbles()));
    }

    #[test]
    fn lines_follow_bit_positions() {
        let buffer = buffer_of(&[0x80, 0x01]);
        let wave = decode(&buffer);
        let line0: Vec<bool> = wave.line(0).take(4).collect();
        let line7: Vec<bool> = wave.line(7).take(4).collect();
        assert_eq!(line0, [false, true, false, true]);
        assert_eq!(line7, [true, false, true, false]);
    }

    #[test]
    #[should_panic(expected = "no monitored line")]
    fn line_out_of_range() {
        let buffer = CaptureBuffer::new();
        let _ = decode(&buffer).line(8);
    }
}
