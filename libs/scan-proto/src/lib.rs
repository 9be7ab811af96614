//! Wire constants for the host-to-FPGA scanning engraver command protocol.
//!
//! This crate is deliberately inert: it holds opcode values, instruction tags,
//! status bit positions and frame geometry, and nothing else. See
//! `fpga-host` for the logic that uses these constants.

#![cfg_attr(not(test), no_std)]

pub mod command;
pub mod instruction;
pub mod status;

/// Number of bytes that make up the command byte of a frame.
pub const COMMAND_BYTES: usize = 1;

/// Number of bytes that make up the word (payload) of a frame.
pub const WORD_BYTES: usize = 8;

/// Total frame size on the wire: one command byte followed by one word.
pub const FRAME_BYTES: usize = COMMAND_BYTES + WORD_BYTES;

/// Offset, from the end of a response frame, of the pin-state byte (byte 7).
pub const PIN_STATE_OFFSET_FROM_END: usize = 2;

/// Offset, from the end of a response frame, of the status byte (byte 8).
pub const STATUS_OFFSET_FROM_END: usize = 1;
