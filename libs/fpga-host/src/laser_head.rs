//! Laser-head supervision: component enable, facet-period measurement, and
//! jitter validation. See spec §4.8 and SPEC_FULL §14.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer;
use heapless::Vec;
use scan_proto::command::Command;
use scan_proto::instruction::Instruction;
use scan_proto::WORD_BYTES;

use crate::transport::Controller;
use crate::Error;

/// Upper bound on facets a polygon can have, for fixed-capacity
/// per-facet accumulators.
pub const MAX_FACETS: usize = 8;

/// Upper bound on samples collected by a single [`Controller::measure_facet_period`]
/// call.
pub const MAX_SAMPLES: usize = 512;

/// Which hardware components an `enable_components` call toggles (spec
/// §4.8).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Components {
    pub laser0: bool,
    pub laser1: bool,
    pub polygon: bool,
    pub synchronize: bool,
    pub single_facet: bool,
}

impl Components {
    fn flags(self) -> u8 {
        (self.single_facet as u8) << 4
            | (self.synchronize as u8) << 3
            | (self.polygon as u8) << 2
            | (self.laser1 as u8) << 1
            | self.laser0 as u8
    }
}

/// Raw per-sample facet-period observations collected by
/// [`Controller::measure_facet_period`].
#[derive(Debug, Clone)]
pub struct FacetSamples {
    /// Measured period, in milliseconds, one entry per sample.
    pub period_ms: Vec<f32, MAX_SAMPLES>,
    /// The facet each sample in `period_ms` was attributed to.
    pub facet_id: Vec<u8, MAX_SAMPLES>,
    /// `true` if `max_trials` was hit before every facet reached its
    /// sample target (spec §7: a warning condition, not a propagated
    /// error).
    pub timed_out: bool,
}

/// Per-facet mean and standard deviation of the measured period, the
/// reduction `facet_mean` performs in the original source (SPEC_FULL §14).
#[derive(Debug, Clone, Copy, Default)]
pub struct FacetStat {
    pub mean_ms: f32,
    pub std_ms: f32,
    pub samples: u32,
}

/// Reduces raw samples to one [`FacetStat`] per observed facet, in facet-id
/// order.
pub fn facet_statistics(samples: &FacetSamples, facets: u8) -> Vec<FacetStat, MAX_FACETS> {
    let mut stats: Vec<FacetStat, MAX_FACETS> = Vec::new();
    for _ in 0..facets {
        let _ = stats.push(FacetStat::default());
    }
    for (&id, &period) in samples.facet_id.iter().zip(samples.period_ms.iter()) {
        if let Some(stat) = stats.get_mut(id as usize) {
            let n = stat.samples as f32;
            stat.mean_ms = (stat.mean_ms * n + period) / (n + 1.0);
            stat.samples += 1;
        }
    }
    // Second pass for variance, now that each facet's mean is final.
    let mut sums_sq = [0f32; MAX_FACETS];
    for (&id, &period) in samples.facet_id.iter().zip(samples.period_ms.iter()) {
        if let Some(stat) = stats.get(id as usize) {
            let d = period - stat.mean_ms;
            sums_sq[id as usize] += d * d;
        }
    }
    for (i, stat) in stats.iter_mut().enumerate() {
        if stat.samples > 0 {
            stat.std_ms = libm::sqrtf(sums_sq[i] / stat.samples as f32);
        }
    }
    stats
}

/// A tiny xorshift PRNG used only to pace facet-period sampling away from
/// aliasing with the polygon period (spec §4.8); not cryptographic.
#[derive(Debug, Clone, Copy)]
pub struct Pacing(u32);

impl Pacing {
    pub fn new(seed: u32) -> Self {
        Pacing(if seed == 0 { 0x2545_F491 } else { seed })
    }

    /// Next pseudo-random fraction in `[0.0, 1.0)`.
    fn next_fraction(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x as f32) / (u32::MAX as f32)
    }
}

impl<SPI, E> Controller<SPI>
where
    SPI: Transfer<u8, Error = E>,
{
    /// Encodes `components` into a single `write_pin` instruction word and
    /// sends it (spec §4.8). Not gated by `parsing`; the FPGA executes it
    /// directly when consumed from the FIFO.
    pub fn enable_components(&mut self, components: Components) -> Result<(), Error<E>> {
        let mut word = [0u8; WORD_BYTES];
        word[6] = components.flags();
        word[7] = Instruction::WritePin.tag();
        self.send_write_awaiting_space(word)?;
        Ok(())
    }

    /// Repeatedly samples the FPGA's facet tick counter via `debug` reads
    /// until every facet has accumulated `samples_target` samples or
    /// `max_trials` is reached (spec §4.8, §8 property 6). Sleeps a
    /// randomized fraction of the expected per-facet period between
    /// samples, via `pacing` and `delay`, to avoid aliasing with the
    /// polygon rotation.
    pub fn measure_facet_period<D: DelayUs<u32>>(
        &mut self,
        samples_target: u32,
        max_trials: u32,
        pacing: &mut Pacing,
        delay: &mut D,
    ) -> Result<FacetSamples, Error<E>> {
        let facets = self.config.laser.facets;
        let crystal_hz = self.config.laser.crystal_hz as f32;

        let mut counts = [0u32; MAX_FACETS];
        let mut samples = FacetSamples { period_ms: Vec::new(), facet_id: Vec::new(), timed_out: false };

        for attempt in 0..max_trials {
            let response = self.send_simple(Command::Debug)?;
            let mut tick_bytes = [0u8; 8];
            tick_bytes[1..8].copy_from_slice(&response.raw[1..8]);
            let ticks = u64::from_be_bytes(tick_bytes);
            let facet_id = response.raw[8];

            let period_ms = ticks as f32 / crystal_hz * 1000.0;
            if samples.period_ms.push(period_ms).is_err() || samples.facet_id.push(facet_id).is_err() {
                break;
            }
            if let Some(count) = counts.get_mut(facet_id as usize) {
                *count += 1;
            }

            if (0..facets as usize).all(|f| counts[f] >= samples_target) {
                log::info!("facet period measurement reached target after {} samples", attempt + 1);
                return Ok(samples);
            }

            let fraction = pacing.next_fraction();
            let wait_us = (period_ms * 1000.0 * fraction) as u32;
            delay.delay_us(wait_us);
        }

        log::warn!("facet period measurement hit max_trials ({}) before reaching target", max_trials);
        samples.timed_out = true;
        Ok(samples)
    }

    /// Validates the laser head is spinning and synchronized within spec
    /// (spec §4.8): the observed minimum period must be at least half the
    /// expected per-facet period at the configured `rpm`, and the relative
    /// jitter across facet means must stay below `jitter_exp_perc`.
    pub fn test_laserhead(&self, samples: &FacetSamples, rpm: f32) -> Result<(), Error<E>> {
        if samples.period_ms.is_empty() {
            return Err(Error::InvalidArgument("no facet samples collected"));
        }
        let facets = self.config.laser.facets as f32;
        let expected_ms = 60.0 / (rpm * facets / 1000.0);

        let min_ms = samples.period_ms.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_ms = samples.period_ms.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let mean_ms = samples.period_ms.iter().sum::<f32>() / samples.period_ms.len() as f32;

        if min_ms < expected_ms / 2.0 {
            log::error!("laser head stalled or mis-synchronized: min period {} ms < {} ms", min_ms, expected_ms / 2.0);
            return Err(Error::InvalidArgument("facet period below stall threshold"));
        }

        let jitter_percent = (mean_ms - min_ms + max_ms - mean_ms) / mean_ms * 100.0;
        if jitter_percent >= self.config.laser.jitter_exp_perc {
            log::error!("facet jitter {}% exceeds budget {}%", jitter_percent, self.config.laser.jitter_exp_perc);
            return Err(Error::InvalidArgument("facet jitter exceeds configured budget"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_pin_flags_pack_in_documented_bit_order() {
        let c = Components { laser0: true, laser1: false, polygon: true, synchronize: false, single_facet: true };
        // bit0=laser0, bit1=laser1, bit2=polygon, bit3=synchronize, bit4=single_facet
        assert_eq!(c.flags(), 0b1_0_1_0_1);
    }

    #[test]
    fn facet_statistics_computes_per_facet_mean() {
        let mut samples = FacetSamples { period_ms: Vec::new(), facet_id: Vec::new(), timed_out: false };
        for (id, ms) in [(0u8, 10.0f32), (0, 12.0), (1, 20.0), (1, 20.0)] {
            samples.period_ms.push(ms).unwrap();
            samples.facet_id.push(id).unwrap();
        }
        let stats = facet_statistics(&samples, 2);
        assert_eq!(stats[0].samples, 2);
        assert!((stats[0].mean_ms - 11.0).abs() < 1e-6);
        assert_eq!(stats[1].samples, 2);
        assert!((stats[1].mean_ms - 20.0).abs() < 1e-6);
        assert!((stats[1].std_ms - 0.0).abs() < 1e-6);
    }

    #[test]
    fn pacing_fractions_stay_in_unit_range() {
        let mut pacing = Pacing::new(12345);
        for _ in 0..100 {
            let f = pacing.next_fraction();
            assert!(f >= 0.0 && f < 1.0);
        }
    }
}
