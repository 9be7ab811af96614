//! Status and pin-state bit layouts. See spec §6.4/§6.5.

use bitflags::bitflags;

bitflags! {
    /// The three flags packed into the last byte of a response frame.
    #[derive(Default)]
    pub struct StatusFlags: u8 {
        /// FIFO cannot accept another word.
        const FULL    = 0b0000_0001;
        /// The dispatcher is executing from the FIFO.
        const PARSING = 0b0000_0010;
        /// A submodule reported a fatal error.
        const ERROR   = 0b0000_0100;
    }
}

/// Returns `true` if bit `index` (0 = LSB) is set in `byte`.
pub const fn bit_is_set(byte: u8, index: u8) -> bool {
    (byte >> index) & 1 != 0
}

/// Bit index of the per-axis endstop flag for `axis` (0-based, in
/// `steps_per_mm` insertion order) within the pin-state byte.
pub const fn endstop_bit(axis: usize) -> u8 {
    axis as u8
}

/// Bit index of `photodiode_trigger` within the pin-state byte, given the
/// configured motor count.
pub const fn photodiode_trigger_bit(motors: usize) -> u8 {
    motors as u8
}

/// Bit index of `synchronized` within the pin-state byte, given the
/// configured motor count.
pub const fn synchronized_bit(motors: usize) -> u8 {
    motors as u8 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ones_tail_decodes_every_flag() {
        let status = StatusFlags::from_bits_truncate(0xFF);
        assert!(status.contains(StatusFlags::FULL));
        assert!(status.contains(StatusFlags::PARSING));
        assert!(status.contains(StatusFlags::ERROR));

        let motors = 3;
        let pin_byte = 0xFFu8;
        for axis in 0..motors {
            assert!(bit_is_set(pin_byte, endstop_bit(axis)));
        }
        assert!(bit_is_set(pin_byte, photodiode_trigger_bit(motors)));
        assert!(bit_is_set(pin_byte, synchronized_bit(motors)));
    }

    #[test]
    fn command_opcode_matches_spec_table() {
        use crate::command::Command;
        assert_eq!(Command::Empty.opcode(), 0);
        assert_eq!(Command::Write.opcode(), 1);
        assert_eq!(Command::Read.opcode(), 2);
        assert_eq!(Command::Debug.opcode(), 3);
        assert_eq!(Command::Position.opcode(), 4);
        assert_eq!(Command::Start.opcode(), 5);
        assert_eq!(Command::Stop.opcode(), 6);
    }
}
