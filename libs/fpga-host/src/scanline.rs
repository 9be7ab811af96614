//! Scanline stream encoding: header assembly, bit packing, byte reversal,
//! per-facet gating, and repetition bursting. See spec §4.7.

use embedded_hal::blocking::spi::Transfer;
use heapless::Vec;
use motion_types::{Scanline, MAX_SCANLINE_BITS};
use scan_proto::instruction::Instruction;
use scan_proto::WORD_BYTES;

use crate::transport::Controller;
use crate::Error;

/// Upper bound on bytes in one encoded scanline (header + packed data +
/// padding), generous enough for [`MAX_SCANLINE_BITS`].
const MAX_ENCODED_BYTES: usize = MAX_SCANLINE_BITS / 8 + 2 * WORD_BYTES;

/// Upper bound on `write`-frame words a single encoded scanline cycle can
/// occupy.
const MAX_ENCODED_WORDS: usize = MAX_ENCODED_BYTES / WORD_BYTES + 1;

/// Computes `half_period = floor((scanline_length - 1) / (steps_per_line *
/// 2))` (spec §4.7). Fails if the result would be less than 1.
pub fn half_period(scanline_length: usize, steps_per_line: f32) -> Result<u64, &'static str> {
    let value = libm::floorf((scanline_length as f32 - 1.0) / (steps_per_line * 2.0));
    if value < 1.0 {
        return Err("commanded stage speed exceeds what this scanline length can emit");
    }
    Ok(value as u64)
}

/// Packs `bits` (each 0 or 1) into bytes, little-endian bit order within
/// each byte (bit 0 of the first bit lands in bit 0 of the first byte).
fn pack_bits(bits: &[u8], out: &mut Vec<u8, MAX_ENCODED_BYTES>) {
    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            byte |= bit << i;
        }
        let _ = out.push(byte);
    }
}

fn pad_to_word_boundary(buf: &mut Vec<u8, MAX_ENCODED_BYTES>) {
    let padding = (WORD_BYTES - (buf.len() % WORD_BYTES)) % WORD_BYTES;
    for _ in 0..padding {
        let _ = buf.push(0);
    }
}

/// Assembles the pre-reversal byte stream for one scanline cycle: tag byte,
/// 7-byte little-endian header (for non-empty `bits`), then packed laser
/// data, each stage padded to the next `word_bytes` boundary (spec §4.7).
fn assemble(bits: &[u8], half_period: u64, direction: bool) -> Vec<u8, MAX_ENCODED_BYTES> {
    let mut buf: Vec<u8, MAX_ENCODED_BYTES> = Vec::new();

    if bits.is_empty() {
        let _ = buf.push(Instruction::LastScanline.tag());
    } else {
        let _ = buf.push(Instruction::Scanline.tag());
        let payload_int: u64 = (half_period << 1) | (direction as u64);
        for i in 0..7 {
            let _ = buf.push(((payload_int >> (8 * i)) & 0xFF) as u8);
        }
    }
    pad_to_word_boundary(&mut buf);

    if !bits.is_empty() {
        pack_bits(bits, &mut buf);
        pad_to_word_boundary(&mut buf);
    }

    buf
}

/// Splits an assembled byte stream into `word_bytes`-sized chunks, each
/// reversed in place (the FPGA parser's SPI endian convention, spec §4.7).
/// Every resulting chunk carries its instruction tag, if any, in its last
/// byte, matching the general `CommandFrame` layout rule (spec §3).
fn reversed_words(assembled: &[u8]) -> impl Iterator<Item = [u8; WORD_BYTES]> + '_ {
    assembled.chunks(WORD_BYTES).map(|chunk| {
        let mut word = [0u8; WORD_BYTES];
        word[..chunk.len()].copy_from_slice(chunk);
        word.reverse();
        word
    })
}

/// Encodes `line` into the `write`-frame words the FPGA parser expects,
/// validating `bits` length and `half_period >= 1` along the way.
pub fn encode(
    line: &Scanline,
    scanline_length: usize,
) -> Result<Vec<[u8; WORD_BYTES], MAX_ENCODED_WORDS>, &'static str> {
    let bits = line.bits();
    if !bits.is_empty() && bits.len() != scanline_length {
        return Err("bits length must be 0 or scanline_length");
    }
    let hp = if bits.is_empty() { 0 } else { half_period(scanline_length, line.steps_per_line)? };
    let assembled = assemble(bits, hp, line.direction);

    let mut words = Vec::new();
    for word in reversed_words(&assembled) {
        words.push(word).map_err(|_| "scanline encodes to more words than fit the frame budget")?;
    }
    Ok(words)
}

/// Builds the all-zero "silent" counterpart of `line`: same header
/// (steps_per_line/direction), but every laser sample off. Used to fill the
/// non-exposing facets of a per-facet-gated cycle (spec §4.7).
fn silent_counterpart(line: &Scanline, scanline_length: usize) -> Result<Scanline, &'static str> {
    let zero_bits = [0u8; MAX_SCANLINE_BITS];
    Scanline::new(&zero_bits[..scanline_length], line.steps_per_line, line.direction, None)
        .ok_or("scanline_length exceeds the maximum supported scanline length")
}

impl<SPI, E> Controller<SPI>
where
    SPI: Transfer<u8, Error = E>,
{
    /// The Scanline Stream Encoder's public entry point (spec §4.7):
    /// projects `line` `repetitions` times, optionally gated to `line.facet`
    /// (the other facets in the rotation receive an all-zero, silent copy of
    /// the same header, exploiting the FPGA's deterministic facet-to-scanline
    /// mapping).
    pub fn write_line(&mut self, line: &Scanline, repetitions: u32) -> Result<(), Error<E>> {
        let scanline_length = self.config.laser.scanline_length;
        let facets = self.config.laser.facets;

        let active_words = encode(line, scanline_length).map_err(Error::InvalidScanline)?;

        match line.facet {
            None => {
                for _ in 0..repetitions {
                    for &word in active_words.iter() {
                        self.send_write_awaiting_space(word)?;
                    }
                }
            }
            Some(target) => {
                if target >= facets {
                    return Err(Error::InvalidArgument("facet index out of range"));
                }
                let silent = silent_counterpart(line, scanline_length).map_err(Error::InvalidScanline)?;
                let silent_words = encode(&silent, scanline_length).map_err(Error::InvalidScanline)?;

                for _ in 0..repetitions {
                    for f in 0..facets {
                        let words = if f == target { &active_words } else { &silent_words };
                        for &word in words.iter() {
                            self.send_write_awaiting_space(word)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Sends the end-of-exposure sentinel: a single `write` frame with
    /// `INSTR_LAST_SCANLINE` and a zeroed header (spec §4.7).
    pub fn write_last_scanline(&mut self) -> Result<(), Error<E>> {
        let sentinel = Scanline::end_of_exposure();
        let words =
            encode(&sentinel, self.config.laser.scanline_length).map_err(Error::InvalidScanline)?;
        for &word in words.iter() {
            self.send_write_awaiting_space(word)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_period_matches_e3_scenario() {
        // spec E3: facets=4, scanline_length=8, steps_per_line=1.
        assert_eq!(half_period(8, 1.0).unwrap(), 3);
    }

    #[test]
    fn half_period_below_one_is_rejected() {
        assert!(half_period(4, 10.0).is_err());
    }

    #[test]
    fn encoding_is_word_aligned() {
        let bits = [1u8, 0, 1, 0, 1, 0, 1, 0];
        let line = Scanline::new(&bits, 1.0, false, None).unwrap();
        let words = encode(&line, 8).unwrap();
        // Header word (tag + 7-byte half_period/direction) + one data word.
        assert_eq!(words.len(), 2);
    }

    #[test]
    fn tag_lands_in_last_byte_of_header_word() {
        let bits = [1u8, 0, 1, 0, 1, 0, 1, 0];
        let line = Scanline::new(&bits, 1.0, false, None).unwrap();
        let words = encode(&line, 8).unwrap();
        assert_eq!(words[0][WORD_BYTES - 1], Instruction::Scanline.tag());
    }

    #[test]
    fn empty_bits_encodes_single_last_scanline_word() {
        let line = Scanline::end_of_exposure();
        let words = encode(&line, 8).unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0][WORD_BYTES - 1], Instruction::LastScanline.tag());
        assert!(words[0][..WORD_BYTES - 1].iter().all(|&b| b == 0));
    }
}
