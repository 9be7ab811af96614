//! Point-to-point motion coordination: `goto` and `home`. See spec §4.5,
//! §4.6.

use embedded_hal::blocking::spi::Transfer;
use scan_proto::instruction::Instruction;
use scan_proto::WORD_BYTES;

use crate::move_engine::{build_segment, AxisMove, SegmentTicks};
use crate::transport::Controller;
use crate::Error;

/// Default per-axis speed when none is given (spec §4.6).
pub const DEFAULT_SPEED_MM_S: f32 = 10.0;

/// One `write`-frame word for the move header: 7-byte unsigned big-endian
/// tick count in the high bytes, `INSTR_MOVE` in the least-significant byte
/// (spec §4.5, §3 `CommandFrame`).
fn move_header_word(ticks: u64) -> [u8; WORD_BYTES] {
    let mut word = [0u8; WORD_BYTES];
    let tick_bytes = ticks.to_be_bytes();
    word[..7].copy_from_slice(&tick_bytes[1..8]);
    word[7] = Instruction::Move.tag();
    word
}

/// One `write`-frame word for a signed coefficient: big-endian two's
/// complement (spec §4.3).
fn coeff_word(coeff: i64) -> [u8; WORD_BYTES] {
    coeff.to_be_bytes()
}

impl<SPI, E> Controller<SPI>
where
    SPI: Transfer<u8, Error = E>,
{
    /// Runs every segment of a single-axis constant-velocity move (spec
    /// §4.5), stopping early if the home switch trips during a
    /// negative-direction move. Returns `true` if homing completed (the
    /// endstop was observed).
    fn run_axis_move(&mut self, axis: usize, delta_mm: f32, speed_mm_s: f32) -> Result<bool, Error<E>> {
        let hw = &self.config.hardware;
        let motors = hw.motors;
        let pol_degree = hw.pol_degree as usize;
        let bit_shift = hw.bit_shift;
        let motor_freq = hw.motor_freq;
        let move_ticks = hw.move_ticks;
        let steps_per_mm = *hw.steps_per_mm.get_index(axis).ok_or(Error::InvalidArgument("axis out of range"))?;

        let axis_move = AxisMove::constant_velocity(delta_mm, speed_mm_s, steps_per_mm, motor_freq, bit_shift)
            .map_err(Error::InvalidArgument)?;

        let negative = delta_mm < 0.0;
        let mut homed = false;

        for ticks in SegmentTicks::new(axis_move.ticks_total, move_ticks) {
            let segment = build_segment(axis, motors, pol_degree, axis_move.count_per_tick, ticks)
                .ok_or(Error::InvalidArgument("segment build failed"))?;

            self.send_write_awaiting_space(move_header_word(segment.ticks))?;
            let mut last_response = None;
            for &coeff in segment.coeffs() {
                last_response = Some(self.send_write_awaiting_space(coeff_word(coeff))?);
            }

            if negative {
                if let Some(response) = last_response {
                    if response.pins.endstops.get(axis).copied().unwrap_or(false) {
                        log::info!("axis {} homed mid-move, suppressing remaining segments", axis);
                        homed = true;
                        break;
                    }
                }
            }
        }
        Ok(homed)
    }

    /// The Point-to-Point Motion Coordinator's entry point (spec §4.6):
    /// moves every axis independently by `delta[axis]`, interpreted as
    /// absolute target positions if `absolute`, else as relative
    /// displacements. `speed` defaults to [`DEFAULT_SPEED_MM_S`] per axis
    /// when `None`.
    pub fn goto(&mut self, position: &[f32], speed: Option<&[f32]>, absolute: bool) -> Result<(), Error<E>> {
        let motors = self.config.hardware.motors;
        if position.len() != motors {
            return Err(Error::InvalidArgument("position vector length must equal motor count"));
        }
        if let Some(speed) = speed {
            if speed.len() != motors {
                return Err(Error::InvalidArgument("speed vector length must equal motor count"));
            }
        }

        self.set_parsing(true)?;

        let mut deltas = [0f32; motion_types::MAX_AXES];
        let mut homed = [false; motion_types::MAX_AXES];

        for axis in 0..motors {
            let current = self.state.position_mm[axis];
            let delta = if absolute { position[axis] - current } else { position[axis] };
            deltas[axis] = delta;
            if delta == 0.0 {
                continue;
            }
            let axis_speed = speed.map(|s| s[axis]).unwrap_or(DEFAULT_SPEED_MM_S);
            homed[axis] = self.run_axis_move(axis, delta, axis_speed)?;
        }

        for axis in 0..motors {
            if homed[axis] {
                self.state.position_mm[axis] = 0.0;
            } else {
                self.state.position_mm[axis] += deltas[axis];
            }
        }
        log::info!("goto complete: position_mm={:?}", self.state.position_mm);
        Ok(())
    }

    /// Homes the axes set in `axes_mask` (spec §4.6): issues a relative
    /// `goto` of `displacement` millimetres on each masked axis, relying on
    /// the home-abort semantics in [`Controller::run_axis_move`].
    pub fn home(&mut self, axes_mask: &[bool], speed: Option<f32>, displacement: f32) -> Result<(), Error<E>> {
        let motors = self.config.hardware.motors;
        if axes_mask.len() != motors {
            return Err(Error::InvalidArgument("axes_mask length must equal motor count"));
        }
        let mut position = [0f32; motion_types::MAX_AXES];
        for axis in 0..motors {
            if axes_mask[axis] {
                position[axis] = displacement;
            }
        }
        let speed_vec: heapless::Vec<f32, { motion_types::MAX_AXES }> =
            (0..motors).map(|_| speed.unwrap_or(DEFAULT_SPEED_MM_S)).collect();
        self.goto(&position[..motors], Some(&speed_vec[..motors]), false)
    }

    /// Reads the next axis's position from the FPGA (spec §4.9: reads are
    /// paged, one `position` opcode per axis, in sequence) and updates the
    /// local `position_mm` cache for that axis.
    pub fn poll_position(&mut self) -> Result<f32, Error<E>> {
        use scan_proto::command::Command;

        let motors = self.config.hardware.motors;
        let axis = self.state.position_read_cursor % motors;
        let response = self.send_simple(Command::Position)?;

        // Position responses repurpose the trailing pin/status bytes as the
        // low bytes of the counter (spec §4.9, Open Question ii): the
        // signed 32-bit value lives in the last four bytes of the frame.
        let mut counter_bytes = [0u8; 4];
        counter_bytes.copy_from_slice(&response.raw[5..9]);
        let counter = i32::from_be_bytes(counter_bytes);

        let steps_per_mm = *self
            .config
            .hardware
            .steps_per_mm
            .get_index(axis)
            .ok_or(Error::InvalidArgument("axis out of range"))?;
        let mm = crate::units::counter_to_mm(counter, steps_per_mm);

        self.state.position_mm[axis] = mm;
        self.state.position_read_cursor = (axis + 1) % motors;
        Ok(mm)
    }
}
