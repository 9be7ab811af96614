//! Position and unit conversion between millimetres, steps, and the FPGA's
//! bit-shifted count domain. See spec §4.9.

/// `(steps * 2^(bit_shift+1)) + 2^(bit_shift-1)`, the fixed-point count
/// domain value for a signed step count.
pub fn steps_to_count(steps: i64, bit_shift: u8) -> i64 {
    (steps << (bit_shift + 1)) + (1i64 << (bit_shift - 1))
}

/// Converts a millimetre displacement to a signed step count for `axis`.
pub fn mm_to_steps(mm: f32, steps_per_mm: f32) -> i64 {
    libm::roundf(mm * steps_per_mm) as i64
}

/// Converts a raw signed 32-bit step counter back to millimetres for an
/// axis with the given `steps_per_mm`.
pub fn counter_to_mm(counter: i32, steps_per_mm: f32) -> f32 {
    counter as f32 / steps_per_mm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_to_count_matches_formula() {
        let bit_shift = 25u8;
        let steps = 4000i64;
        let expected = (steps << 26) + (1i64 << 24);
        assert_eq!(steps_to_count(steps, bit_shift), expected);
    }

    #[test]
    fn round_trip_within_one_lsb() {
        let steps_per_mm = 400.0f32;
        for s in [-1_000_000i32, -1, 0, 1, 1_000_000] {
            let mm = counter_to_mm(s, steps_per_mm);
            let back = mm_to_steps(mm, steps_per_mm);
            assert!((back - s as i64).abs() <= 1);
        }
    }
}
