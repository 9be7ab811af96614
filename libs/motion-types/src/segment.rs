//! The move segment value produced by the polynomial move encoder.

use heapless::Vec;

use crate::MAX_COEFFS;

/// One segment of a multi-axis move, as it is laid out on the wire: a tick
/// count and a flat, motor-major/degree-minor array of signed fixed-point
/// spline coefficients.
///
/// `coeffs[motor * pol_degree + degree]` is the coefficient of `degree` for
/// `motor`. A segment with `pol_degree == 2` only ever populates two
/// coefficients per motor; the unused slots are simply absent from the
/// vector, not zero-padded, since `pol_degree` is uniform across the whole
/// segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSegment {
    /// Duration of this segment in FPGA ticks. Always `<= move_ticks`.
    pub ticks: u64,
    /// Number of motors this segment covers.
    pub motors: usize,
    /// Polynomial degree per motor (2 or 3).
    pub pol_degree: usize,
    coeffs: Vec<i64, MAX_COEFFS>,
}

impl MoveSegment {
    /// Builds a segment from its tick count and a motor-major/degree-minor
    /// coefficient array.
    ///
    /// Returns `None` if `coeffs.len() != motors * pol_degree`, or if that
    /// product exceeds the fixed coefficient capacity.
    pub fn new(ticks: u64, motors: usize, pol_degree: usize, coeffs: &[i64]) -> Option<Self> {
        if coeffs.len() != motors * pol_degree {
            return None;
        }
        let mut buf = Vec::new();
        buf.extend_from_slice(coeffs).ok()?;
        Some(MoveSegment { ticks, motors, pol_degree, coeffs: buf })
    }

    /// The coefficients for `motor`, in ascending degree order.
    pub fn motor_coeffs(&self, motor: usize) -> &[i64] {
        let start = motor * self.pol_degree;
        &self.coeffs[start..start + self.pol_degree]
    }

    /// All coefficients, motor-major/degree-minor, as laid out on the wire.
    pub fn coeffs(&self) -> &[i64] {
        &self.coeffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motor_coeffs_slices_by_motor() {
        let seg = MoveSegment::new(1000, 2, 3, &[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(seg.motor_coeffs(0), &[1, 2, 3]);
        assert_eq!(seg.motor_coeffs(1), &[4, 5, 6]);
    }

    #[test]
    fn rejects_mismatched_coeff_count() {
        assert!(MoveSegment::new(1000, 2, 3, &[1, 2, 3]).is_none());
    }
}
