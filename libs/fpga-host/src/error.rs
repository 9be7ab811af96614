//! Error taxonomy for the host controller. See spec §7.

/// Everything that can go wrong talking to the FPGA, generic over the
/// transport's associated error type, the way `invensense_mpu::Error<P>`
/// is generic over its peripheral error.
#[derive(Debug)]
pub enum Error<E> {
    /// The SPI exchange itself failed at the bus level.
    Transport(E),
    /// The FPGA's decoded `error` status bit was set.
    Fpga,
    /// The backpressure gate exhausted its retry budget waiting for FIFO
    /// space.
    FifoFull {
        /// Number of exchanges attempted before giving up.
        attempts: u32,
    },
    /// A `HardwareConfig`/`LaserTiming` derivation invariant failed.
    InvalidConfig(&'static str),
    /// A scanline's `half_period` or bit length was invalid.
    InvalidScanline(&'static str),
    /// A caller-supplied argument (vector length, laser current, facet
    /// index) was out of range.
    InvalidArgument(&'static str),
    /// A pacing loop (facet-period sampling) exceeded its attempt budget.
    Timeout {
        /// Number of samples collected before giving up.
        attempts: u32,
    },
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Error::Transport(err)
    }
}
