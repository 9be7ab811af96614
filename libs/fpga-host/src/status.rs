//! Decoding the 2-byte status tail of a response frame. See spec §4.2, §6.4,
//! §6.5.

use heapless::Vec;
use scan_proto::status::{self, StatusFlags};
use scan_proto::{FRAME_BYTES, PIN_STATE_OFFSET_FROM_END, STATUS_OFFSET_FROM_END};

use motion_types::MAX_AXES;

/// The decoded status flags from the last byte of a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// FIFO cannot accept another word.
    pub full: bool,
    /// The dispatcher is executing from the FIFO.
    pub parsing: bool,
    /// A submodule reported a fatal error.
    pub error: bool,
}

/// The decoded pin state from the second-to-last byte of a response frame.
#[derive(Debug, Clone)]
pub struct PinState {
    /// Per-axis endstop state, in `steps_per_mm` insertion order.
    pub endstops: Vec<bool, MAX_AXES>,
    /// The photodiode has fired within its trigger window.
    pub photodiode_trigger: bool,
    /// The FPGA's facet phase is locked to the photodiode.
    pub synchronized: bool,
}

impl PinState {
    /// `true` if any configured axis's endstop bit is set.
    pub fn any_endstop(&self) -> bool {
        self.endstops.iter().any(|&b| b)
    }
}

/// A fully decoded response frame: flags, pin state (meaningful for
/// `empty`/`read`/`write`/`start`/`stop` responses), and the raw frame
/// bytes, since `debug` and `position` responses repurpose the trailing
/// "status" bytes as data rather than flags (spec §4.9, Open Question ii).
#[derive(Debug, Clone)]
pub struct Response {
    /// Status flags, decoded assuming the conventional byte-8 layout.
    pub status: Status,
    /// Pin state, decoded assuming the conventional byte-7 layout.
    pub pins: PinState,
    /// Bytes 1..6 of the 9-byte frame (position/debug/echo payload).
    pub payload: [u8; 6],
    /// The full, undecoded 9-byte response frame.
    pub raw: [u8; FRAME_BYTES],
}

/// Decodes a full 9-byte response frame, given the number of configured
/// motors (needed to locate the `photodiode_trigger`/`synchronized` bits).
pub fn decode(frame: &[u8; FRAME_BYTES], motors: usize) -> Response {
    let status_byte = frame[FRAME_BYTES - STATUS_OFFSET_FROM_END];
    let pin_byte = frame[FRAME_BYTES - PIN_STATE_OFFSET_FROM_END];

    let flags = StatusFlags::from_bits_truncate(status_byte);
    let status = Status {
        full: flags.contains(StatusFlags::FULL),
        parsing: flags.contains(StatusFlags::PARSING),
        error: flags.contains(StatusFlags::ERROR),
    };

    let mut endstops = Vec::new();
    for axis in 0..motors {
        let _ = endstops.push(status::bit_is_set(pin_byte, status::endstop_bit(axis)));
    }
    let pins = PinState {
        endstops,
        photodiode_trigger: status::bit_is_set(pin_byte, status::photodiode_trigger_bit(motors)),
        synchronized: status::bit_is_set(pin_byte, status::synchronized_bit(motors)),
    };

    let mut payload = [0u8; 6];
    payload.copy_from_slice(&frame[1..7]);

    Response { status, pins, payload, raw: *frame }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ones_tail_decodes_every_flag() {
        let frame = [0u8, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF];
        let resp = decode(&frame, 3);
        assert!(resp.status.full);
        assert!(resp.status.parsing);
        assert!(resp.status.error);
        assert_eq!(resp.pins.endstops.as_slice(), &[true, true, true]);
        assert!(resp.pins.photodiode_trigger);
        assert!(resp.pins.synchronized);
    }

    #[test]
    fn all_zero_tail_decodes_nothing_set() {
        let frame = [0u8; 9];
        let resp = decode(&frame, 2);
        assert!(!resp.status.full);
        assert!(!resp.pins.any_endstop());
        assert!(!resp.pins.synchronized);
    }
}
