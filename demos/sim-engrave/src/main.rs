//! Drives a [`fpga_host::Controller`] against a tiny in-process FPGA
//! simulator: home both axes, move to a start position, stream a few
//! scanlines gated to one facet, then poll position back. No real hardware
//! is involved; this exercises the host-side protocol end to end the way a
//! board bring-up script would.

use std::convert::Infallible;

use embedded_hal::blocking::spi::Transfer;

use fpga_host::config::{HfoscDiv, PlatformPins, RawConfig};
use fpga_host::laser_head::Components;
use fpga_host::Controller;
use motion_types::{AxisTable, Scanline};
use scan_proto::WORD_BYTES;

/// A minimal stand-in for the FPGA: always reports the FIFO as not full and
/// never errors, so the gate in [`fpga_host`] never blocks. Logs every
/// exchanged frame at trace level.
struct SimFpga {
    exchanges: u64,
}

impl SimFpga {
    fn new() -> Self {
        SimFpga { exchanges: 0 }
    }
}

impl Transfer<u8> for SimFpga {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        self.exchanges += 1;
        log::trace!("sim fpga exchange #{}: tx={:02x?}", self.exchanges, words);
        for byte in words.iter_mut() {
            *byte = 0;
        }
        Ok(words)
    }
}

fn build_config() -> RawConfig {
    let mut steps_per_mm = AxisTable::new();
    steps_per_mm.push("x".into(), 76.2).unwrap();
    steps_per_mm.push("y".into(), 76.2).unwrap();

    RawConfig {
        motors: 2,
        pol_degree: 2,
        move_ticks: 10_000,
        motor_freq: 1_000_000,
        mem_width_bits: WORD_BYTES * 8,
        steps_per_mm,
        orth_to_laserline: "y",
        rpm: 3000.0,
        facets: 4,
        spinup_time: 1.5,
        stable_time: 1.125,
        laser_hz: 400_000,
        start_frac: 0.35,
        end_frac: 0.7,
        hfosc_div: HfoscDiv::Mhz48,
        test_mode: true,
        pins: PlatformPins {
            fpga_reset: 47,
            fpga_cs: 9,
            flash_cs: 10,
            stepper_cs: 38,
            mem_full: 15,
            digipot_addr: 0x28,
        },
    }
}

fn main() {
    env_logger::init();

    let mut controller =
        Controller::try_new(SimFpga::new(), build_config()).expect("configuration derives cleanly");
    log::info!("derived config: {:?}", controller.config());

    controller.enable_components(Components { polygon: true, synchronize: true, ..Default::default() }).unwrap();

    log::info!("homing x and y");
    controller.home(&[true, true], None, -20.0).unwrap();

    log::info!("moving to start position");
    controller.goto(&[5.0, 5.0], None, true).unwrap();

    let scanline_length = controller.config().laser.scanline_length;
    let bits: Vec<u8> = (0..scanline_length).map(|i| (i % 2) as u8).collect();
    let line = Scanline::new(&bits, 1.0, false, Some(2)).expect("scanline fits the configured length");

    log::info!("streaming {} words per scanline, gated to facet 2", WORD_BYTES);
    controller.enable_components(Components { laser0: true, polygon: true, synchronize: true, ..Default::default() }).unwrap();
    controller.write_line(&line, 4).unwrap();
    controller.write_last_scanline().unwrap();

    let mm = controller.poll_position().unwrap();
    log::info!("axis 0 reported position: {} mm", mm);

    log::info!("engrave simulation complete");
}
