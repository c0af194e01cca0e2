//! Text dump of a decoded capture
//!
//! ```text
//! 21: __--__--...
//! ...
//! 28: ________...
//! SD: 01200120...
//! ```
//! One row per monitored line, labelled with its GPIO number, `-` high and `_` low,
//! then the composite nibbles in hex.
//! For eyeballing only.

use core::fmt::{self, Write};

use crate::decode::{DecodedWaveform, LINES};
use crate::pins::PinRoleMap;

/// Marker row written before a capture that was torn down early
pub const INCOMPLETE_BANNER: &str = "!! incomplete capture, trigger may not have fired";

pub fn render<W: Write>(out: &mut W, wave: &DecodedWaveform<'_>, pins: &PinRoleMap) -> fmt::Result {
    if !wave.is_complete() {
        writeln!(out, "{}", INCOMPLETE_BANNER)?;
    }
    for line in 0..LINES {
        write!(out, "{:02}: ", pins.sample_base() + line)?;
        for high in wave.line(line) {
            out.write_char(if high { '-' } else { '_' })?;
        }
        out.write_char('\n')?;
    }
    out.write_str("SD: ")?;
    for nibble in wave.nibbles() {
        write!(out, "{:x}", nibble)?;
    }
    out.write_char('\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureBuffer;
    use crate::decode::decode;
    use std::string::String;

    #[test]
    fn rows_per_line_and_nibbles() {
        let bytes = core::array::from_fn(|i| [0x01, 0x02, 0x04, 0x08][i % 4]);
        let buffer = CaptureBuffer::from_bytes(bytes, true);
        let mut out = String::new();
        render(&mut out, &decode(&buffer), &PinRoleMap::BOARD).unwrap();

        let rows: Vec<&str> = out.lines().collect();
        assert_eq!(rows.len(), 9);
        assert!(rows[0].starts_with("21: -___-___"));
        assert!(rows[1].starts_with("22: _-___-__"));
        assert!(rows[7].starts_with("28: ________"));
        assert!(rows[8].starts_with("SD: 01200120"));
        for row in &rows {
            assert_eq!(row.len(), 4 + 1280);
        }
    }

    #[test]
    fn incomplete_capture_is_flagged() {
        let mut out = String::new();
        render(&mut out, &decode(&CaptureBuffer::new()), &PinRoleMap::BOARD).unwrap();
        assert_eq!(out.lines().next(), Some(INCOMPLETE_BANNER));
        assert_eq!(out.lines().count(), 10);
    }
}
