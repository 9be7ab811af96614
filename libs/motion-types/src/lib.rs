//! Small `no_std` value types shared between the protocol encoder and the
//! host controller: an axis name, an ordered axis table, a move segment, and
//! a scanline. None of these types know how to talk to an FPGA; they are
//! plain data, the way `motion_sensor::Triplet` is plain data for its
//! consumers.

#![cfg_attr(not(test), no_std)]

mod axis;
mod segment;
mod scanline;

pub use axis::{AxisName, AxisTable};
pub use scanline::Scanline;
pub use segment::MoveSegment;

/// Upper bound on the number of motor axes a single machine can have.
///
/// Real machines in this family have 2-3 axes; this headroom keeps the
/// fixed-capacity containers cheap while leaving room to grow.
pub const MAX_AXES: usize = 8;

/// Upper bound on the polynomial degree of a move segment (spec §3:
/// `pol_degree` is 2 or 3).
pub const MAX_POL_DEGREE: usize = 3;

/// Upper bound on coefficients in a single move segment
/// (`MAX_AXES * MAX_POL_DEGREE`, motor-major, degree-minor).
pub const MAX_COEFFS: usize = MAX_AXES * MAX_POL_DEGREE;

/// Upper bound on the number of laser-on/off samples in a scanline.
pub const MAX_SCANLINE_BITS: usize = 4096;
