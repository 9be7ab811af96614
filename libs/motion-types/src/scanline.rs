//! The scanline value consumed by the scanline stream encoder.

use heapless::Vec;

use crate::MAX_SCANLINE_BITS;

/// One line of laser on/off samples plus the stage motion it is exposed
/// against.
///
/// `bits` holds one entry per sample, each `0` or `1`; packing into 8-byte
/// words and byte-reversal are the encoder's job, not this type's. An empty
/// `bits` is the end-of-exposure sentinel (spec §4.7): constructing one
/// leaves `steps_per_line`/`direction` unused by the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct Scanline {
    bits: Vec<u8, MAX_SCANLINE_BITS>,
    /// Motor steps advanced per emitted scanline; `1.0` means one step per
    /// line. Must be positive.
    pub steps_per_line: f32,
    /// `false` = forward, `true` = reverse.
    pub direction: bool,
    /// When set, restrict exposure to this facet; silent on all others.
    pub facet: Option<u8>,
}

impl Scanline {
    /// Builds a scanline from a slice of 0/1 samples.
    ///
    /// Returns `None` if `bits` contains anything other than 0 or 1, or
    /// exceeds [`MAX_SCANLINE_BITS`].
    pub fn new(bits: &[u8], steps_per_line: f32, direction: bool, facet: Option<u8>) -> Option<Self> {
        if bits.iter().any(|&b| b > 1) {
            return None;
        }
        let mut buf = Vec::new();
        buf.extend_from_slice(bits).ok()?;
        Some(Scanline { bits: buf, steps_per_line, direction, facet })
    }

    /// The end-of-exposure sentinel: no samples.
    pub fn end_of_exposure() -> Self {
        Scanline { bits: Vec::new(), steps_per_line: 1.0, direction: false, facet: None }
    }

    /// `true` if this is the end-of-exposure sentinel.
    pub fn is_end_of_exposure(&self) -> bool {
        self.bits.is_empty()
    }

    /// The raw 0/1 samples.
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_binary_samples() {
        assert!(Scanline::new(&[0, 1, 2], 1.0, false, None).is_none());
    }

    #[test]
    fn empty_bits_is_end_of_exposure() {
        let line = Scanline::new(&[], 1.0, false, None).unwrap();
        assert!(line.is_end_of_exposure());
        assert_eq!(line, Scanline::end_of_exposure());
    }
}
