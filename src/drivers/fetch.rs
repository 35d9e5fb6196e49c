use log::debug;
use serde::{Deserialize, Serialize};
use crate::drivers::commands::{self, TIMEBASE_DIVISIONS};
use crate::drivers::transport::query_scalar;
use crate::drivers::{AcquisitionError, RawWaveform, ScpiTransport};
/// Largest window a single `:WAVeform:DATA?` may return in RAW/BYTE mode.
pub const DEFAULT_CHUNK_SAMPLES: u64 = 500_000;
/// Scaling constants captured while the instrument is stopped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionParameters {
    pub x_increment: f64,
    pub x_reference: f64,
    pub y_origin: f64,
    pub y_reference: f64,
    pub y_increment: f64,
}
impl AcquisitionParameters {
    pub fn query<T: ScpiTransport + ?Sized>(transport: &mut T) -> Result<Self, AcquisitionError> {
        Ok(Self {
            x_increment: query_scalar(transport, commands::X_INCREMENT)?,
            x_reference: query_scalar(transport, commands::X_REFERENCE)?,
            y_origin: query_scalar(transport, commands::Y_ORIGIN)?,
            y_reference: query_scalar(transport, commands::Y_REFERENCE)?,
            y_increment: query_scalar(transport, commands::Y_INCREMENT)?,
        })
    }
}
/// Samples held in acquisition memory: timebase scale * 12 divisions * sample rate.
pub fn memory_depth<T: ScpiTransport + ?Sized>(transport: &mut T) -> Result<u64, AcquisitionError> {
    let sample_rate = query_scalar(transport, commands::SAMPLE_RATE)?;
    let time_base = query_scalar(transport, commands::TIMEBASE_SCALE)?;
    let depth = (time_base * TIMEBASE_DIVISIONS * sample_rate).round();
    if !depth.is_finite() || depth < 1.0 {
        return Err(AcquisitionError::InvalidMemoryDepth(depth));
    }
    Ok(depth as u64)
}
/// Inclusive, one-based sample range for one binary read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadWindow {
    pub start: u64,
    pub stop: u64,
}
/// Splits `depth` samples into windows of at most `cap` samples.
///
/// The first window is `[1, min(depth, cap)]`. Each further window `i` spans
/// `[i * cap + 1, (i + 1) * cap]`, and the last one ends at `depth` exactly.
/// Depth is integral, so any `depth > cap` yields at least two windows and the
/// tail beyond the first chunk is always fetched.
pub fn plan_windows(depth: u64, cap: u64) -> Result<Vec<ReadWindow>, AcquisitionError> {
    if cap == 0 {
        return Err(AcquisitionError::InvalidChunkSize);
    }
    if depth == 0 {
        return Err(AcquisitionError::InvalidMemoryDepth(0.0));
    }
    let mut windows = vec![ReadWindow {
        start: 1,
        stop: depth.min(cap),
    }];
    if depth > cap {
        let chunks = depth.div_ceil(cap);
        for i in 1..chunks {
            let stop = if i == chunks - 1 { depth } else { (i + 1) * cap };
            windows.push(ReadWindow {
                start: i * cap + 1,
                stop,
            });
        }
    }
    Ok(windows)
}
pub fn set_read_window<T: ScpiTransport + ?Sized>(
    transport: &mut T,
    window: ReadWindow,
) -> Result<(), AcquisitionError> {
    transport.write(&commands::window_bound(commands::WAVEFORM_START, window.start))?;
    transport.write(&commands::window_bound(commands::WAVEFORM_STOP, window.stop))
}
/// Issues one binary read per window and concatenates the chunks in order.
pub fn fetch_raw<T: ScpiTransport + ?Sized>(
    transport: &mut T,
    depth: u64,
    cap: u64,
) -> Result<RawWaveform, AcquisitionError> {
    let windows = plan_windows(depth, cap)?;
    let mut raw = RawWaveform::default();
    for window in windows {
        set_read_window(transport, window)?;
        let chunk = transport.query_binary(commands::WAVEFORM_DATA)?;
        debug!(
            "chunk [{}, {}] -> {} bytes",
            window.start,
            window.stop,
            chunk.len()
        );
        raw.extend(chunk);
    }
    Ok(raw)
}
/// One stopped-instrument snapshot: scaling constants, depth and raw codes.
#[derive(Clone, Debug)]
pub struct Acquisition {
    pub params: AcquisitionParameters,
    pub memory_depth: u64,
    pub raw: RawWaveform,
}
pub fn fetch<T: ScpiTransport + ?Sized>(
    transport: &mut T,
    cap: u64,
) -> Result<Acquisition, AcquisitionError> {
    let params = AcquisitionParameters::query(transport)?;
    let memory_depth = memory_depth(transport)?;
    let raw = fetch_raw(transport, memory_depth, cap)?;
    Ok(Acquisition {
        params,
        memory_depth,
        raw,
    })
}
