//! Host-side controller for the host↔FPGA command pipeline of a
//! transparent-polygon laser scanning engraver: SPI framing, status
//! decoding, command encoding, FIFO backpressure, the polynomial move
//! engine, point-to-point motion, scanline streaming, and laser-head
//! supervision.
//!
//! [`Controller`] is the single entry point; construct it with
//! [`config::Config::derive`] and a peripheral implementing
//! `embedded_hal::blocking::spi::Transfer<u8>`.

#![cfg_attr(not(test), no_std)]

pub mod config;
mod error;
pub mod laser_head;
mod move_engine;
mod motion;
mod scanline;
pub mod state;
pub mod status;
mod transport;
pub mod units;

pub use error::Error;
pub use transport::{Controller, SpaceAvailable, DEFAULT_MAX_TRIALS};
