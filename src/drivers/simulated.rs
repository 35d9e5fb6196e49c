//! In-process oscilloscope answering the same SCPI subset as the hardware.
//!
//! Each channel produces a noisy sine. The binary stream interleaves three
//! auxiliary bytes ahead of every real sample, matching what the instrument
//! sends in RAW/BYTE mode, so the normal decimation recovers the signal.
use std::f64::consts::TAU;
use std::io;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::drivers::commands::{self, TIMEBASE_DIVISIONS};
use crate::drivers::measure::INVALID_MEASUREMENT;
use crate::drivers::{AcquisitionError, ScpiTransport};
const CODE_CENTER: f64 = 127.0;
const AUX_BYTE: u8 = 0;
#[derive(Clone, Copy, Debug)]
pub struct SimulatedChannel {
    pub frequency_hz: f64,
    pub amplitude_volts: f64,
    pub phase_rad: f64,
    pub volts_per_code: f64,
}
pub struct SimulatedScope {
    channels: [SimulatedChannel; 2],
    timebase_scale: f64,
    memory_depth: u64,
    noise_codes: f64,
    waveform_source: usize,
    measure_source: usize,
    window: (u64, u64),
    running: bool,
    elapsed_s: f64,
    data_reads: usize,
    rng: StdRng,
}
impl SimulatedScope {
    pub fn new(seed: u64) -> Self {
        Self {
            channels: [
                SimulatedChannel {
                    frequency_hz: 50.0,
                    amplitude_volts: 2.0,
                    phase_rad: 0.0,
                    volts_per_code: 0.04,
                },
                SimulatedChannel {
                    frequency_hz: 50.0,
                    amplitude_volts: 0.5,
                    phase_rad: -TAU / 12.0,
                    volts_per_code: 0.01,
                },
            ],
            timebase_scale: 5.0e-3,
            memory_depth: 24_000,
            noise_codes: 1.0,
            waveform_source: 0,
            measure_source: 0,
            window: (1, 1),
            running: true,
            elapsed_s: 0.0,
            data_reads: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }
    pub fn with_channel(mut self, channel: u8, config: SimulatedChannel) -> Self {
        if let Some(slot) = self.channels.get_mut(usize::from(channel).wrapping_sub(1)) {
            *slot = config;
        }
        self
    }
    pub fn with_memory_depth(mut self, depth: u64) -> Self {
        self.memory_depth = depth.max(1);
        self
    }
    pub fn with_noise(mut self, codes: f64) -> Self {
        self.noise_codes = codes.max(0.0);
        self
    }
    pub fn is_running(&self) -> bool {
        self.running
    }
    pub fn data_reads(&self) -> usize {
        self.data_reads
    }
    fn sample_rate(&self) -> f64 {
        self.memory_depth as f64 / (self.timebase_scale * TIMEBASE_DIVISIONS)
    }
    fn x_increment(&self) -> f64 {
        1.0 / self.sample_rate()
    }
    fn fault(command: &str, reason: &str) -> AcquisitionError {
        AcquisitionError::Transport(io::Error::new(
            io::ErrorKind::Other,
            format!("`{command}` rejected: {reason}"),
        ))
    }
    fn parse_channel(command: &str, value: &str) -> Result<usize, AcquisitionError> {
        match value.trim() {
            "1" => Ok(0),
            "2" => Ok(1),
            _ => Err(Self::fault(command, "unknown channel")),
        }
    }
    fn code_at(&mut self, byte_index: u64) -> u8 {
        if byte_index % 4 != 3 {
            return AUX_BYTE;
        }
        let ch = self.channels[self.waveform_source];
        let t = self.elapsed_s + byte_index as f64 * self.x_increment();
        let noise = if self.noise_codes > 0.0 {
            self.rng.gen_range(-self.noise_codes..=self.noise_codes)
        } else {
            0.0
        };
        let volts = ch.amplitude_volts * (TAU * ch.frequency_hz * t + ch.phase_rad).sin();
        (CODE_CENTER + volts / ch.volts_per_code + noise)
            .round()
            .clamp(0.0, 255.0) as u8
    }
    fn read_window(&mut self, command: &str) -> Result<Vec<u8>, AcquisitionError> {
        if self.running {
            return Err(Self::fault(command, "instrument must be stopped"));
        }
        let (start, stop) = self.window;
        let stop = stop.min(self.memory_depth);
        if start < 1 || start > stop {
            return Err(Self::fault(command, "empty read window"));
        }
        self.data_reads += 1;
        Ok((start - 1..stop).map(|k| self.code_at(k)).collect())
    }
}
impl ScpiTransport for SimulatedScope {
    fn write(&mut self, command: &str) -> Result<(), AcquisitionError> {
        match command {
            commands::STOP => self.running = false,
            commands::RUN => {
                if !self.running {
                    // advance time so consecutive captures differ
                    self.elapsed_s += self.timebase_scale * TIMEBASE_DIVISIONS * 1.37;
                }
                self.running = true;
            }
            commands::WAVEFORM_MODE_RAW | commands::WAVEFORM_FORMAT_BYTE => {}
            _ => {
                let (head, value) = command
                    .split_once(' ')
                    .ok_or_else(|| Self::fault(command, "unknown command"))?;
                match head {
                    commands::WAVEFORM_START | commands::WAVEFORM_STOP => {
                        let sample: u64 = value
                            .trim()
                            .parse()
                            .map_err(|_| Self::fault(command, "bad sample index"))?;
                        if head == commands::WAVEFORM_START {
                            self.window.0 = sample;
                        } else {
                            self.window.1 = sample;
                        }
                    }
                    commands::WAVEFORM_SOURCE | commands::MEASURE_SOURCE => {
                        let channel = value
                            .strip_prefix("CHANnel")
                            .ok_or_else(|| Self::fault(command, "unknown source"))?;
                        let idx = Self::parse_channel(command, channel)?;
                        if head == commands::WAVEFORM_SOURCE {
                            self.waveform_source = idx;
                        } else {
                            self.measure_source = idx;
                        }
                    }
                    _ => return Err(Self::fault(command, "unknown command")),
                }
            }
        }
        Ok(())
    }
    fn query_ascii(&mut self, command: &str) -> Result<Vec<f64>, AcquisitionError> {
        let ch = self.channels[self.waveform_source];
        let value = match command {
            commands::X_INCREMENT => self.x_increment(),
            commands::X_REFERENCE => 0.0,
            commands::Y_ORIGIN => 0.0,
            commands::Y_REFERENCE => CODE_CENTER,
            commands::Y_INCREMENT => ch.volts_per_code,
            commands::SAMPLE_RATE => self.sample_rate(),
            commands::TIMEBASE_SCALE => self.timebase_scale,
            commands::FREQUENCY => {
                let measured = self.channels[self.measure_source];
                if measured.amplitude_volts == 0.0 {
                    INVALID_MEASUREMENT
                } else {
                    measured.frequency_hz
                }
            }
            _ => return Err(Self::fault(command, "unknown query")),
        };
        Ok(vec![value])
    }
    fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, AcquisitionError> {
        match command {
            commands::WAVEFORM_DATA => self.read_window(command),
            _ => Err(Self::fault(command, "unknown query")),
        }
    }
}
