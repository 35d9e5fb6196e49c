use log::warn;
use serde::{Deserialize, Serialize};
use crate::drivers::{AcquisitionError, VoltageWaveform};
/// Marker for a measurement that could not be computed. The instrument uses
/// the same value for an unmeasurable frequency.
pub const INVALID_MEASUREMENT: f64 = 9.9e37;
pub fn is_invalid(value: f64) -> bool {
    value == INVALID_MEASUREMENT
}
/// Renders a reading rounded to `decimals`, or asterisks for the sentinel.
pub fn format_reading(value: f64, decimals: usize, unit: &str) -> String {
    if is_invalid(value) {
        format!("******** {unit}")
    } else {
        format!("{value:.decimals$} {unit}")
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub max: f64,
    pub min: f64,
    pub rms: f64,
    pub mean: f64,
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerMeasurement {
    /// P, mean of the per-sample product (W).
    pub active: f64,
    /// S, product of the two RMS values (VA).
    pub apparent: f64,
    /// Q, sqrt(S^2 - P^2) (var).
    pub reactive: f64,
}
impl PowerMeasurement {
    pub const INVALID: PowerMeasurement = PowerMeasurement {
        active: INVALID_MEASUREMENT,
        apparent: INVALID_MEASUREMENT,
        reactive: INVALID_MEASUREMENT,
    };
    pub fn is_valid(&self) -> bool {
        !(is_invalid(self.active) || is_invalid(self.apparent) || is_invalid(self.reactive))
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairMeasurement {
    pub ch1: ChannelStats,
    pub ch2: ChannelStats,
    pub power: PowerMeasurement,
}
pub fn measure(wave: &VoltageWaveform) -> Result<ChannelStats, AcquisitionError> {
    if wave.is_empty() {
        return Err(AcquisitionError::EmptyWaveform);
    }
    let samples = wave.samples();
    let n = samples.len() as f64;
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let rms = (samples.dot(samples) / n).sqrt();
    let mean = samples.sum() / n;
    Ok(ChannelStats { max, min, rms, mean })
}
/// Per-channel stats plus power, treating `wave1` as voltage and `wave2` as
/// current sampled at the same instants. Waveforms of different lengths get
/// `PowerMeasurement::INVALID`.
pub fn measure_pair(
    wave1: &VoltageWaveform,
    wave2: &VoltageWaveform,
) -> Result<PairMeasurement, AcquisitionError> {
    let ch1 = measure(wave1)?;
    let ch2 = measure(wave2)?;
    let power = if wave1.len() == wave2.len() {
        let inner = wave1.samples().dot(wave2.samples());
        let apparent = ch1.rms * ch2.rms;
        let active = inner / wave1.len() as f64;
        // |P| <= S analytically; rounding can push P^2 a hair above S^2.
        let reactive = (apparent * apparent - active * active).max(0.0).sqrt();
        PowerMeasurement {
            active,
            apparent,
            reactive,
        }
    } else {
        warn!(
            "channel lengths differ ({} vs {}); power unavailable",
            wave1.len(),
            wave2.len()
        );
        PowerMeasurement::INVALID
    };
    Ok(PairMeasurement { ch1, ch2, power })
}
#[cfg(test)]
mod tests {
    use super::*;
    fn wave(v: &[f64]) -> VoltageWaveform {
        VoltageWaveform::from(v.to_vec())
    }
    #[test]
    fn constant_wave() {
        let s = measure(&wave(&[-2.5; 8])).unwrap();
        assert_eq!(s.max, -2.5);
        assert_eq!(s.min, -2.5);
        assert!((s.rms - 2.5).abs() < 1e-12);
        assert!((s.mean + 2.5).abs() < 1e-12);
    }
    #[test]
    fn ramp_stats() {
        let s = measure(&wave(&[0.0, 5.0, 10.0, 15.0])).unwrap();
        assert_eq!(s.max, 15.0);
        assert_eq!(s.min, 0.0);
        assert!((s.rms - (350.0f64 / 4.0).sqrt()).abs() < 1e-9);
        assert!((s.rms - 9.354).abs() < 1e-3);
        assert_eq!(s.mean, 7.5);
    }
    #[test]
    fn empty_wave_is_an_error() {
        assert!(matches!(
            measure(&VoltageWaveform::default()),
            Err(AcquisitionError::EmptyWaveform)
        ));
        assert!(measure_pair(&wave(&[1.0]), &VoltageWaveform::default()).is_err());
    }
    #[test]
    fn resistive_load_has_no_reactive_power() {
        let v: Vec<f64> = (0..400)
            .map(|i| (i as f64 * std::f64::consts::TAU / 100.0).sin() * 3.0)
            .collect();
        let m = measure_pair(&wave(&v), &wave(&v)).unwrap();
        assert!((m.power.active - m.power.apparent).abs() < 1e-9);
        assert!(m.power.reactive.abs() < 1e-3);
        assert!(!m.power.reactive.is_nan());
        assert!(m.power.is_valid());
    }
    #[test]
    fn quadrature_load_is_purely_reactive() {
        let n = 1000;
        let step = std::f64::consts::TAU / n as f64;
        let u: Vec<f64> = (0..n).map(|i| (i as f64 * step).sin()).collect();
        let i: Vec<f64> = (0..n).map(|k| (k as f64 * step).cos()).collect();
        let m = measure_pair(&wave(&u), &wave(&i)).unwrap();
        assert!(m.power.active.abs() < 1e-9);
        assert!((m.power.reactive - 0.5).abs() < 1e-9);
        assert!((m.power.apparent - 0.5).abs() < 1e-9);
    }
    #[test]
    fn mismatched_lengths_yield_sentinel() {
        let m = measure_pair(&wave(&[1.0, 2.0, 3.0]), &wave(&[1.0, 2.0])).unwrap();
        assert_eq!(m.power.active, 9.9e37);
        assert_eq!(m.power.apparent, 9.9e37);
        assert_eq!(m.power.reactive, 9.9e37);
        assert!(!m.power.is_valid());
        assert_eq!(m.ch1.max, 3.0);
        assert_eq!(m.ch2.max, 2.0);
    }
    #[test]
    fn readings_format_sentinel_as_unavailable() {
        assert_eq!(format_reading(INVALID_MEASUREMENT, 1, "Hz"), "******** Hz");
        assert_eq!(format_reading(49.96, 1, "Hz"), "50.0 Hz");
        assert_eq!(format_reading(1.23456, 3, "V"), "1.235 V");
    }
}
