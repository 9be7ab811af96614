//! Host-side polynomial move engine: turns a single-axis displacement and
//! speed into a sequence of fixed-tick spline segments. See spec §4.5.

use motion_types::{MoveSegment, MAX_COEFFS};

/// The per-tick coefficient and total tick count for a single-axis
/// constant-velocity move, before it is split into `move_ticks`-bounded
/// segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMove {
    pub ticks_total: u64,
    pub count_per_tick: i64,
}

impl AxisMove {
    /// Computes the single-axis constant-velocity move described in spec
    /// §4.5: `duration_s = |delta_mm| / speed`, `ticks_total =
    /// round(duration_s * motor_freq)`, and the per-tick accumulator
    /// increment in the FPGA's fixed-point count domain.
    ///
    /// Returns `Err` if `speed_mm_s` is not positive, or if the coefficient
    /// would overflow the 64-bit wire representation.
    pub fn constant_velocity(
        delta_mm: f32,
        speed_mm_s: f32,
        steps_per_mm: f32,
        motor_freq: u32,
        bit_shift: u8,
    ) -> Result<Self, &'static str> {
        if speed_mm_s <= 0.0 {
            return Err("speed must be positive");
        }
        if delta_mm == 0.0 {
            return Ok(AxisMove { ticks_total: 0, count_per_tick: 0 });
        }

        let duration_s = libm::fabsf(delta_mm) / speed_mm_s;
        let ticks_total = libm::roundf(duration_s * motor_freq as f32) as u64;

        let sign = if delta_mm < 0.0 { -1.0 } else { 1.0 };
        let speed_steps = libm::roundf(speed_mm_s * steps_per_mm * sign) as i64;

        let multiplier = 1i64
            .checked_shl((bit_shift as u32) + 1)
            .ok_or("coefficient overflow: bit_shift too large")?;
        let shifted = speed_steps
            .checked_mul(multiplier)
            .ok_or("coefficient overflow: speed_steps shift")?;
        let rounding = 1i64 << (bit_shift - 1);
        let numerator = shifted.checked_add(rounding).ok_or("coefficient overflow: rounding add")?;
        // Floor division, matching the original source's Python `//`: plain `/`
        // truncates toward zero and is off by one count per tick on every
        // negative-direction move (homing).
        let count_per_tick = numerator.div_euclid(motor_freq as i64);

        Ok(AxisMove { ticks_total, count_per_tick })
    }
}

/// Splits a total tick count into consecutive segments of at most
/// `move_ticks` each, all but the last equal to `move_ticks` (spec §4.5,
/// §8 boundary behavior).
pub struct SegmentTicks {
    remaining: u64,
    move_ticks: u64,
}

impl SegmentTicks {
    pub fn new(ticks_total: u64, move_ticks: u64) -> Self {
        SegmentTicks { remaining: ticks_total, move_ticks }
    }
}

impl Iterator for SegmentTicks {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.remaining == 0 {
            return None;
        }
        let this = core::cmp::min(self.remaining, self.move_ticks);
        self.remaining -= this;
        Some(this)
    }
}

/// Builds the [`MoveSegment`] for one tick-bounded chunk of a single-axis
/// move: every motor's coefficients are zero except `axis`'s leading
/// coefficient, which carries `count_per_tick`.
pub fn build_segment(
    axis: usize,
    motors: usize,
    pol_degree: usize,
    count_per_tick: i64,
    ticks: u64,
) -> Option<MoveSegment> {
    if axis >= motors {
        return None;
    }
    let mut coeffs = [0i64; MAX_COEFFS];
    coeffs[axis * pol_degree] = count_per_tick;
    MoveSegment::new(ticks, motors, pol_degree, &coeffs[..motors * pol_degree])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_total_exceeding_move_ticks_splits_evenly() {
        let ticks = SegmentTicks::new(1_000_000, 10_000);
        let segments: heapless::Vec<u64, 128> = ticks.collect();
        assert_eq!(segments.len(), 100);
        assert!(segments[..99].iter().all(|&t| t == 10_000));
        assert_eq!(segments[99], 10_000);
    }

    #[test]
    fn uneven_remainder_is_final_short_segment() {
        let ticks = SegmentTicks::new(10_500, 10_000);
        let segments: heapless::Vec<u64, 8> = ticks.collect();
        assert_eq!(segments.as_slice(), &[10_000, 500]);
    }

    #[test]
    fn constant_velocity_matches_e1_scenario() {
        // spec E1: motors=1, steps_per_mm=400, move_ticks=10000,
        // motor_freq=1_000_000, bit_shift=25, pol_degree=2.
        let mv = AxisMove::constant_velocity(10.0, 10.0, 400.0, 1_000_000, 25).unwrap();
        assert_eq!(mv.ticks_total, 1_000_000);
        let expected_c1 = ((10.0 * 400.0) as i64 * (1i64 << 26) + (1i64 << 24)) / 1_000_000;
        assert_eq!(mv.count_per_tick, expected_c1);
    }

    #[test]
    fn negative_direction_uses_floor_division() {
        // steps_per_mm=400, speed=10, bit_shift=25, homing (sign=-1):
        // numerator = -268418678784, floor(numerator/1_000_000) = -268419,
        // not the -268418 truncation toward zero would give.
        let mv = AxisMove::constant_velocity(-10.0, 10.0, 400.0, 1_000_000, 25).unwrap();
        assert_eq!(mv.count_per_tick, -268_419);
    }

    #[test]
    fn build_segment_zeroes_other_motors() {
        let seg = build_segment(1, 2, 2, 42, 10_000).unwrap();
        assert_eq!(seg.motor_coeffs(0), &[0, 0]);
        assert_eq!(seg.motor_coeffs(1), &[42, 0]);
    }
}
