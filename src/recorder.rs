use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use log::info;
use crate::drivers::SaveError;
use crate::types::{ChannelCapture, ScopeMessage, SingleChannelRecord, TwoChannelRecord};
/// Decimation factor applied between the raw stream and the voltages.
const TIME_SCALE: f64 = 4.0;
/// `len` evenly spaced instants from `4 * x_reference` to `4 * x_increment * len`.
pub fn time_axis(x_reference: f64, x_increment: f64, len: usize) -> Vec<f64> {
    let start = x_reference * TIME_SCALE;
    let stop = x_increment * TIME_SCALE * len as f64;
    match len {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let span = stop - start;
            let last = (len - 1) as f64;
            (0..len).map(|i| start + span * i as f64 / last).collect()
        }
    }
}
fn capture_time(capture: &ChannelCapture) -> Vec<f64> {
    time_axis(capture.x_reference, capture.x_increment, capture.voltages.len())
}
pub fn write_single<W: Write>(w: &mut W, record: &SingleChannelRecord) -> Result<(), SaveError> {
    let capture = &record.capture;
    writeln!(w, "CH{} [V],Time [S]", capture.channel)?;
    for (v, t) in capture.voltages.iter().zip(capture_time(capture)) {
        writeln!(w, "{v},{t}")?;
    }
    Ok(())
}
pub fn write_pair<W: Write>(w: &mut W, record: &TwoChannelRecord) -> Result<(), SaveError> {
    let (first, second) = (record.ch1.voltages.len(), record.ch2.voltages.len());
    if first != second {
        return Err(SaveError::LengthMismatch { first, second });
    }
    writeln!(w, "CH1 [V],CH2 [V],Time [S]")?;
    let rows = record
        .ch1
        .voltages
        .iter()
        .zip(record.ch2.voltages.iter())
        .zip(capture_time(&record.ch1));
    for ((v1, v2), t) in rows {
        writeln!(w, "{v1},{v2},{t}")?;
    }
    Ok(())
}
enum Stored {
    Single(SingleChannelRecord),
    Pair(TwoChannelRecord),
}
/// Keeps the most recent record so the user can save it at any time.
#[derive(Default)]
pub struct MeasurementStore {
    last: Option<Stored>,
}
impl MeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }
    /// Remembers record messages, ignores everything else.
    pub fn observe(&mut self, msg: &ScopeMessage) {
        match msg {
            ScopeMessage::Single(r) => self.last = Some(Stored::Single(r.clone())),
            ScopeMessage::TwoChannel(r) => self.last = Some(Stored::Pair(r.clone())),
            _ => {}
        }
    }
    pub fn has_measurement(&self) -> bool {
        self.last.is_some()
    }
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), SaveError> {
        match &self.last {
            Some(Stored::Single(r)) => write_single(w, r),
            Some(Stored::Pair(r)) => write_pair(w, r),
            None => Err(SaveError::NoMeasurement),
        }
    }
    pub fn save(&self, path: &Path) -> Result<(), SaveError> {
        if !self.has_measurement() {
            return Err(SaveError::NoMeasurement);
        }
        let mut w = BufWriter::new(File::create(path)?);
        self.write_to(&mut w)?;
        w.flush()?;
        info!("saved measurement to {}", path.display());
        Ok(())
    }
}
