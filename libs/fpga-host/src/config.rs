//! Derived, validated configuration. See spec §3, §4.10, and the platform
//! pin/clock surface this adds on top of it.

use motion_types::AxisTable;

/// An invariant from §4.10 failed during construction.
///
/// Distinct from [`crate::Error`] because configuration derivation never
/// touches the transport and so has no peripheral error type to be generic
/// over; `Controller::new` folds this into `Error::InvalidConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigError(pub &'static str);

/// The FPGA's HFOSC clock divider selection (spec §4.10 rule 2): a small
/// closed set of oscillator frequencies in MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HfoscDiv {
    Mhz48,
    Mhz24,
    Mhz12,
    Mhz6,
}

impl HfoscDiv {
    /// The oscillator frequency this divider selects, in Hz.
    pub const fn crystal_hz(self) -> u32 {
        match self {
            HfoscDiv::Mhz48 => 48_000_000,
            HfoscDiv::Mhz24 => 24_000_000,
            HfoscDiv::Mhz12 => 12_000_000,
            HfoscDiv::Mhz6 => 6_000_000,
        }
    }
}

/// Side-channel GPIO/I²C assignments (spec §6.7), carried as plain data.
/// Wiring these to actual peripherals is firmware glue outside this crate.
#[derive(Debug, Clone, Copy)]
pub struct PlatformPins {
    /// Active-low pulse on boot to reset the FPGA.
    pub fpga_reset: u32,
    /// Active-low FPGA chip select.
    pub fpga_cs: u32,
    /// Active-low flash chip select.
    pub flash_cs: u32,
    /// Active-low stepper driver chip select / enable.
    pub stepper_cs: u32,
    /// Level-sensitive "FIFO full" input, high when the FIFO cannot accept
    /// another word.
    pub mem_full: u32,
    /// I²C address of the laser-current digipot.
    pub digipot_addr: u8,
}

/// Raw, user-supplied inputs to the §4.10 derivation sequence.
#[derive(Debug, Clone)]
pub struct RawConfig {
    pub motors: usize,
    pub pol_degree: u8,
    pub move_ticks: u64,
    pub motor_freq: u32,
    pub mem_width_bits: usize,
    pub steps_per_mm: AxisTable<f32>,
    pub orth_to_laserline: &'static str,
    pub rpm: f32,
    pub facets: u8,
    pub spinup_time: f32,
    pub stable_time: f32,
    pub laser_hz: u32,
    pub start_frac: f32,
    pub end_frac: f32,
    pub hfosc_div: HfoscDiv,
    /// Skips the multiple-of-8 rounding of `scanline_length` (used by
    /// simulation/test configurations with tightly fixed geometries).
    pub test_mode: bool,
    pub pins: PlatformPins,
}

/// Static machine geometry and protocol sizing (spec §3 `HardwareConfig`).
#[derive(Debug, Clone)]
pub struct HardwareConfig {
    pub motors: usize,
    pub pol_degree: u8,
    pub move_ticks: u64,
    pub motor_freq: u32,
    pub bit_shift: u8,
    pub mem_width_bits: usize,
    pub words_per_move: usize,
    pub words_per_scanline: usize,
    pub steps_per_mm: AxisTable<f32>,
    pub orth_to_laserline: &'static str,
}

/// Derived laser/facet timing (spec §3 `LaserTiming`).
#[derive(Debug, Clone, Copy)]
pub struct LaserTiming {
    pub facets: u8,
    pub crystal_hz: u32,
    pub facet_ticks: u32,
    pub laser_ticks: u32,
    pub spinup_ticks: u32,
    pub stable_ticks: u32,
    pub scanline_length: usize,
    pub motor_period: u32,
    pub jitter_sync_ticks: u32,
    pub jitter_exp_perc: f32,
    pub photodiode_trigger_ticks: u32,
    pub photodiode_rearm_ticks: u32,
}

/// The full, validated configuration bundle.
#[derive(Debug, Clone)]
pub struct Config {
    pub hardware: HardwareConfig,
    pub laser: LaserTiming,
    pub pins: PlatformPins,
}

const WORD_BYTES: usize = scan_proto::WORD_BYTES;

impl Config {
    /// Runs the §4.10 derivation sequence, failing at the first violated
    /// invariant.
    pub fn derive(raw: RawConfig) -> Result<Config, ConfigError> {
        if raw.motors == 0 {
            return Err(ConfigError("motors must be >= 1"));
        }
        if raw.steps_per_mm.get(raw.orth_to_laserline).is_none() {
            return Err(ConfigError("orth_to_laserline is not in steps_per_mm"));
        }
        let bit_shift: u8 = match raw.pol_degree {
            2 => 25,
            3 => 40,
            _ => return Err(ConfigError("pol_degree must be 2 or 3")),
        };

        // Step 1: poly_hz = rpm / 60.
        let poly_hz = raw.rpm / 60.0;
        // Step 2: crystal_hz from the selected divider.
        let crystal_hz = raw.hfosc_div.crystal_hz();
        // Step 3: facet_ticks = round(crystal_hz / (poly_hz * facets)).
        let facet_ticks = libm::roundf(crystal_hz as f32 / (poly_hz * raw.facets as f32)) as u32;
        // Step 4: laser_ticks = floor(crystal_hz / laser_hz); require > 2.
        let laser_ticks = crystal_hz / raw.laser_hz;
        if laser_ticks <= 2 {
            return Err(ConfigError("laser_ticks must be > 2"));
        }
        // Step 5: spinup/stable ticks.
        let spinup_ticks = libm::roundf(raw.spinup_time * crystal_hz as f32) as u32;
        let stable_ticks = libm::roundf(raw.stable_time * crystal_hz as f32) as u32;
        // Step 6: jitter budget.
        let jitter_sync_ticks = libm::roundf(0.01 * facet_ticks as f32) as u32;
        let jitter_exp_perc = 0.2;
        if raw.end_frac > 1.0 - (jitter_sync_ticks as f32 + 1.0) / facet_ticks as f32 {
            return Err(ConfigError("end_frac too high for jitter_sync_ticks budget"));
        }
        // Step 7: scanline_length, rounded up to a multiple of 8 outside test mode.
        let mut scanline_length = libm::roundf(
            facet_ticks as f32 * (raw.end_frac - raw.start_frac) / laser_ticks as f32,
        ) as i64;
        if !raw.test_mode && scanline_length % 8 != 0 {
            scanline_length += 8 - (scanline_length % 8);
        }
        if scanline_length <= 0 {
            return Err(ConfigError("scanline_length must be > 0"));
        }
        let scanline_length = scanline_length as usize;
        // Step 8: motor_period = floor(crystal_hz / (poly_hz * 12)).
        let motor_period = libm::floorf(crystal_hz as f32 / (poly_hz * 12.0)) as u32;

        // Step 10: words_per_move.
        let move_header_bytes = 1 + 7;
        let coeff_bytes = raw.motors * raw.pol_degree as usize * 8;
        let words_per_move = (move_header_bytes + coeff_bytes + WORD_BYTES - 1) / WORD_BYTES;

        // Step 11: words_per_scanline.
        let data_bytes = (scanline_length + 7) / 8;
        let words_per_scanline = (move_header_bytes + data_bytes + WORD_BYTES - 1) / WORD_BYTES;

        let photodiode_trigger_ticks = laser_ticks * 8;
        let photodiode_rearm_ticks = laser_ticks * 8;

        let hardware = HardwareConfig {
            motors: raw.motors,
            pol_degree: raw.pol_degree,
            move_ticks: raw.move_ticks,
            motor_freq: raw.motor_freq,
            bit_shift,
            mem_width_bits: raw.mem_width_bits,
            words_per_move,
            words_per_scanline,
            steps_per_mm: raw.steps_per_mm,
            orth_to_laserline: raw.orth_to_laserline,
        };
        let laser = LaserTiming {
            facets: raw.facets,
            crystal_hz,
            facet_ticks,
            laser_ticks,
            spinup_ticks,
            stable_ticks,
            scanline_length,
            motor_period,
            jitter_sync_ticks,
            jitter_exp_perc,
            photodiode_trigger_ticks,
            photodiode_rearm_ticks,
        };

        log::debug!("derived hardware config: {:?}", hardware);
        log::debug!("derived laser timing: {:?}", laser);

        Ok(Config { hardware, laser, pins: raw.pins })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_raw() -> RawConfig {
        let mut steps_per_mm = AxisTable::new();
        steps_per_mm.push("x".into(), 76.2).unwrap();
        steps_per_mm.push("y".into(), 76.2).unwrap();
        RawConfig {
            motors: 2,
            pol_degree: 2,
            move_ticks: 10_000,
            motor_freq: 1_000_000,
            mem_width_bits: 64,
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
            test_mode: false,
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

    #[test]
    fn derives_facet_ticks_from_rpm_and_crystal() {
        let cfg = Config::derive(valid_raw()).unwrap();
        // facet_ticks == round(crystal_hz / (poly_hz * facets))
        let poly_hz = 3000.0 / 60.0;
        let expected = libm::roundf(48_000_000.0 / (poly_hz * 4.0)) as u32;
        assert_eq!(cfg.laser.facet_ticks, expected);
        assert!(cfg.laser.laser_ticks > 2);
    }

    #[test]
    fn scanline_length_rounds_up_to_multiple_of_8_in_production() {
        let cfg = Config::derive(valid_raw()).unwrap();
        assert_eq!(cfg.laser.scanline_length % 8, 0);
    }

    #[test]
    fn rejects_unknown_pol_degree() {
        let mut raw = valid_raw();
        raw.pol_degree = 4;
        assert!(Config::derive(raw).is_err());
    }

    #[test]
    fn rejects_laser_ticks_not_greater_than_two() {
        let mut raw = valid_raw();
        raw.laser_hz = raw.hfosc_div.crystal_hz();
        assert!(Config::derive(raw).is_err());
    }

    #[test]
    fn words_per_move_matches_header_plus_coefficients() {
        let cfg = Config::derive(valid_raw()).unwrap();
        // 1 word for [instruction, ticks], plus motors * pol_degree words.
        assert_eq!(cfg.hardware.words_per_move, 1 + 2 * 2);
    }
}
