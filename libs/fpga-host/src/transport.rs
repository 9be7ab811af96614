//! SPI framing, command encoding, and the FIFO backpressure gate. See spec
//! §4.1, §4.3, §4.4.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::{InputPin, OutputPin};

use scan_proto::command::Command;
use scan_proto::{FRAME_BYTES, WORD_BYTES};

use crate::config::{Config, ConfigError, RawConfig};
use crate::state::MachineState;
use crate::status::{decode, Response};
use crate::Error;

/// A level-sensitive "FIFO has space" signal, driven by the FPGA's
/// `mem_full` pin (spec §6.7, §4.4). A no-op implementation (always
/// `Ok(false)`) degrades the gate to pure polling.
pub trait SpaceAvailable {
    type Error;
    /// `true` if the FPGA currently reports the FIFO as not full.
    fn is_space_available(&mut self) -> Result<bool, Self::Error>;
}

impl<P: InputPin> SpaceAvailable for P {
    type Error = P::Error;
    fn is_space_available(&mut self) -> Result<bool, Self::Error> {
        // mem_full is high when the FIFO is full (spec §6.7): space is
        // available exactly when the pin reads low.
        self.is_low()
    }
}

/// Default bound on backpressure-gate retries in production (spec §5).
pub const DEFAULT_MAX_TRIALS: u32 = 100_000;

/// Owns the SPI bus and the machine's configuration and mutable state. The
/// single entry point for every other component in this crate.
pub struct Controller<SPI> {
    pub(crate) spi: SPI,
    pub(crate) config: Config,
    pub(crate) state: MachineState,
    /// Retry bound for the backpressure gate (spec §5: 100 000 in
    /// production, 10 in simulation).
    pub max_trials: u32,
}

impl<SPI, E> Controller<SPI>
where
    SPI: Transfer<u8, Error = E>,
{
    /// Builds a controller from an already-validated configuration.
    pub fn new(spi: SPI, config: Config) -> Self {
        let motors = config.hardware.motors;
        Controller { spi, config, state: MachineState::new(motors), max_trials: DEFAULT_MAX_TRIALS }
    }

    /// Derives a [`Config`] from `raw` and builds a controller from it,
    /// folding any [`ConfigError`] into [`Error::InvalidConfig`].
    pub fn try_new(spi: SPI, raw: RawConfig) -> Result<Self, Error<E>> {
        let config = Config::derive(raw).map_err(|ConfigError(msg)| Error::InvalidConfig(msg))?;
        Ok(Self::new(spi, config))
    }

    /// Read-only access to the derived configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read-only access to the machine state.
    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// One raw SPI exchange: sends `frame` and returns the FPGA's response
    /// (the previously latched status and payload, spec §4.1). Does not
    /// retry or decode.
    pub fn exchange(&mut self, frame: [u8; FRAME_BYTES]) -> Result<Response, Error<E>> {
        let mut buf = frame;
        self.spi.transfer(&mut buf)?;
        log::trace!("exchange: tx={:02x?} rx={:02x?}", frame, buf);
        Ok(decode(&buf, self.config.hardware.motors))
    }

    /// Encodes and sends a command with an all-zero payload: `read`,
    /// `debug`, `position`, `start`, `stop`, or `empty` (spec §4.3).
    pub fn send_simple(&mut self, command: Command) -> Result<Response, Error<E>> {
        let mut frame = [0u8; FRAME_BYTES];
        frame[0] = command.opcode();
        self.exchange(frame)
    }

    /// Sends one `write` frame with `payload` as the 8-byte word (spec
    /// §4.3). Does not retry; use [`Controller::send_write_awaiting_space`]
    /// for FIFO-gated writes.
    pub fn send_write(&mut self, payload: [u8; WORD_BYTES]) -> Result<Response, Error<E>> {
        let mut frame = [0u8; FRAME_BYTES];
        frame[0] = Command::Write.opcode();
        frame[1..].copy_from_slice(&payload);
        self.exchange(frame)
    }

    /// The FIFO Backpressure Gate (spec §4.4): issues a `write` frame that
    /// the FPGA parser must accept into the FIFO, retrying against the
    /// `full` status bit up to `max_trials` times.
    ///
    /// Fails immediately with [`Error::Fpga`] if the decoded `error` bit is
    /// ever set, and with [`Error::FifoFull`] once `max_trials` is
    /// exhausted.
    pub fn send_write_awaiting_space(&mut self, payload: [u8; WORD_BYTES]) -> Result<Response, Error<E>> {
        for attempt in 0..self.max_trials {
            let response = self.send_write(payload)?;
            if response.status.error {
                log::error!("fpga reported error after write, attempt {}", attempt);
                return Err(Error::Fpga);
            }
            if !response.status.full {
                return Ok(response);
            }
        }
        log::error!("fifo full after {} attempts", self.max_trials);
        Err(Error::FifoFull { attempts: self.max_trials })
    }

    /// Like [`Controller::send_write_awaiting_space`], but first consults an
    /// external "space available" signal (spec §4.4: an FPGA-driven
    /// edge/level `mem_full` GPIO). When the signal reports space, the
    /// write is issued without polling status at all; when it doesn't (or
    /// on a signal read error, which is treated as "unknown, fall back to
    /// polling"), the gate degrades to the plain polling loop.
    pub fn send_write_awaiting_space_with_signal<G: SpaceAvailable>(
        &mut self,
        payload: [u8; WORD_BYTES],
        signal: &mut G,
    ) -> Result<Response, Error<E>> {
        if matches!(signal.is_space_available(), Ok(true)) {
            let response = self.send_write(payload)?;
            if response.status.error {
                log::error!("fpga reported error on signal-gated write");
                return Err(Error::Fpga);
            }
            return Ok(response);
        }
        self.send_write_awaiting_space(payload)
    }

    /// Enables FIFO parsing on the FPGA (`start` opcode, spec §4.3/§6.2).
    pub fn set_parsing(&mut self, enabled: bool) -> Result<Response, Error<E>> {
        let command = if enabled { Command::Start } else { Command::Stop };
        self.send_simple(command)
    }

    /// Releases the SPI peripheral, discarding configuration and state.
    pub fn release(self) -> SPI {
        self.spi
    }

    /// Toggles `reset_pin` low then high to reset the FPGA, then performs
    /// one `empty` exchange to re-synchronize framing (SPEC_FULL §14,
    /// grounded in `ESP32Host.reset`). Caller-supplied state (position,
    /// steppers, laser current) is not touched; the FPGA-side FIFO and
    /// parsing state are lost and must be re-primed by the caller.
    pub fn resync<R: OutputPin, D: DelayMs<u32>>(
        &mut self,
        reset_pin: &mut R,
        delay: &mut D,
    ) -> Result<Response, Error<E>> {
        reset_pin.set_low().map_err(|_| Error::InvalidArgument("failed to drive fpga_reset low"))?;
        delay.delay_ms(1);
        reset_pin.set_high().map_err(|_| Error::InvalidArgument("failed to drive fpga_reset high"))?;
        delay.delay_ms(1);
        self.send_simple(Command::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, HfoscDiv, PlatformPins, RawConfig};
    use embedded_hal_mock::spi::{Mock, Transaction};
    use motion_types::AxisTable;

    fn test_config() -> Config {
        let mut steps_per_mm = AxisTable::new();
        steps_per_mm.push("x".into(), 400.0).unwrap();
        Config::derive(RawConfig {
            motors: 1,
            pol_degree: 2,
            move_ticks: 10_000,
            motor_freq: 1_000_000,
            mem_width_bits: 64,
            steps_per_mm,
            orth_to_laserline: "x",
            rpm: 3000.0,
            facets: 4,
            spinup_time: 1.5,
            stable_time: 1.125,
            laser_hz: 400_000,
            start_frac: 0.35,
            end_frac: 0.7,
            hfosc_div: HfoscDiv::Mhz48,
            test_mode: false,
            pins: PlatformPins {
                fpga_reset: 47,
                fpga_cs: 9,
                flash_cs: 10,
                stepper_cs: 38,
                mem_full: 15,
                digipot_addr: 0x28,
            },
        })
        .unwrap()
    }

    #[test]
    fn empty_exchange_round_trips_status() {
        let expectations = [Transaction::transfer(
            vec![Command::Empty.opcode(), 0, 0, 0, 0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0, 0, 0, 0, 0b0000_0010],
        )];
        let spi = Mock::new(&expectations);
        let mut controller = Controller::new(spi, test_config());
        let resp = controller.send_simple(Command::Empty).unwrap();
        assert!(resp.status.parsing);
        assert!(!resp.status.full);
        controller.release().done();
    }

    #[test]
    fn backpressure_gate_retries_until_not_full() {
        let payload = [0u8; WORD_BYTES];
        let mut write_frame = vec![Command::Write.opcode()];
        write_frame.extend_from_slice(&payload);
        let full_response = {
            let mut r = vec![0u8; FRAME_BYTES];
            r[FRAME_BYTES - 1] = 0b0000_0001;
            r
        };
        let clear_response = vec![0u8; FRAME_BYTES];

        let expectations = [
            Transaction::transfer(write_frame.clone(), full_response),
            Transaction::transfer(write_frame, clear_response),
        ];
        let spi = Mock::new(&expectations);
        let mut controller = Controller::new(spi, test_config());
        controller.max_trials = 10;
        let resp = controller.send_write_awaiting_space(payload).unwrap();
        assert!(!resp.status.full);
        controller.release().done();
    }

    #[test]
    fn backpressure_gate_fails_after_max_trials() {
        let payload = [0u8; WORD_BYTES];
        let mut write_frame = vec![Command::Write.opcode()];
        write_frame.extend_from_slice(&payload);
        let mut full_response = vec![0u8; FRAME_BYTES];
        full_response[FRAME_BYTES - 1] = 0b0000_0001;

        let expectations: heapless::Vec<Transaction, 4> = core::iter::repeat(Transaction::transfer(
            write_frame.clone(),
            full_response.clone(),
        ))
        .take(3)
        .collect();
        let spi = Mock::new(expectations.as_slice());
        let mut controller = Controller::new(spi, test_config());
        controller.max_trials = 3;
        let err = controller.send_write_awaiting_space(payload).unwrap_err();
        assert!(matches!(err, Error::FifoFull { attempts: 3 }));
        controller.release().done();
    }

    #[test]
    fn backpressure_gate_fails_fast_on_fpga_error() {
        let payload = [0u8; WORD_BYTES];
        let mut write_frame = vec![Command::Write.opcode()];
        write_frame.extend_from_slice(&payload);
        let mut error_response = vec![0u8; FRAME_BYTES];
        error_response[FRAME_BYTES - 1] = 0b0000_0100;

        let expectations = [Transaction::transfer(write_frame, error_response)];
        let spi = Mock::new(&expectations);
        let mut controller = Controller::new(spi, test_config());
        controller.max_trials = 10;
        let err = controller.send_write_awaiting_space(payload).unwrap_err();
        assert!(matches!(err, Error::Fpga));
        controller.release().done();
    }
}
