//! Mutable machine state owned by the controller. See spec §3 `MachineState`
//! and SPEC_FULL §14.

use heapless::Vec;
use motion_types::MAX_AXES;

/// Hard ceiling on the laser current digipot value, to avoid physical
/// damage to the laser diode (SPEC_FULL §14, grounded in
/// `ESP32Host.laser_current`).
pub const MAX_LASER_CURRENT: u8 = 150;

/// A single-byte sink for the laser-current digipot. Firmware wires this to
/// a real I²C peripheral; this crate only defines the seam.
pub trait LaserCurrentSink {
    type Error;
    fn set_laser_current(&mut self, value: u8) -> Result<(), Self::Error>;
}

/// Process-wide mutable state: absolute position, stepper enable latch, and
/// laser current. Mutated only by the Motion Coordinator and Laser-Head
/// Supervisor.
#[derive(Debug, Clone)]
pub struct MachineState {
    /// Absolute position per axis, in millimetres, in `steps_per_mm`
    /// insertion order.
    pub position_mm: Vec<f32, MAX_AXES>,
    /// Active-low stepper enable latch (SPEC_FULL §14): plain GPIO state,
    /// distinct from TMC2209 UART tuning which is out of scope.
    pub steppers_enabled: bool,
    /// Laser current, 0..=150.
    laser_current: u8,
    /// Which axis the next `position` read will return (spec §4.9: reads
    /// are paged, one axis per `position` opcode, in sequence).
    pub(crate) position_read_cursor: usize,
}

impl MachineState {
    /// Fresh state for a machine with `motors` axes: zero position, steppers
    /// disabled, laser off.
    pub fn new(motors: usize) -> Self {
        let mut position_mm = Vec::new();
        for _ in 0..motors {
            let _ = position_mm.push(0.0);
        }
        MachineState {
            position_mm,
            steppers_enabled: false,
            laser_current: 0,
            position_read_cursor: 0,
        }
    }

    /// Current laser current setting, 0..=150.
    pub fn laser_current(&self) -> u8 {
        self.laser_current
    }

    /// Sets the laser current, clamped to [`MAX_LASER_CURRENT`].
    ///
    /// Returns the out-of-range error message if `value` exceeds the
    /// ceiling; the caller decides whether that is fatal.
    pub fn set_laser_current_clamped(&mut self, value: u8) -> Result<(), &'static str> {
        if value > MAX_LASER_CURRENT {
            return Err("laser current exceeds hard ceiling of 150");
        }
        self.laser_current = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_laser_current_above_ceiling() {
        let mut state = MachineState::new(2);
        assert!(state.set_laser_current_clamped(151).is_err());
        assert_eq!(state.laser_current(), 0);
        assert!(state.set_laser_current_clamped(150).is_ok());
        assert_eq!(state.laser_current(), 150);
    }
}
