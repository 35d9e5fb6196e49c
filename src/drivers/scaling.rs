use ndarray::Array1;
use crate::drivers::AcquisitionParameters;
/// Unsigned byte codes exactly as the instrument returned them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawWaveform(pub Vec<u8>);
impl RawWaveform {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn extend(&mut self, chunk: Vec<u8>) {
        self.0.extend(chunk);
    }
    /// Drops the byte at every even index, keeping indices 1, 3, 5, ...
    pub fn drop_every_other(self) -> Self {
        RawWaveform(self.0.into_iter().skip(1).step_by(2).collect())
    }
    /// Keeps one byte in four (indices 3, 7, 11, ...). In RAW/BYTE mode the
    /// stream carries three auxiliary bytes per real sample.
    // TODO: confirm the interleave layout against the instrument programming guide.
    pub fn decimate(self) -> Self {
        self.drop_every_other().drop_every_other()
    }
}
impl From<Vec<u8>> for RawWaveform {
    fn from(value: Vec<u8>) -> Self {
        RawWaveform(value)
    }
}
/// Calibrated samples in volts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoltageWaveform(Array1<f64>);
impl VoltageWaveform {
    pub fn samples(&self) -> &Array1<f64> {
        &self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }
    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}
impl From<Vec<f64>> for VoltageWaveform {
    fn from(value: Vec<f64>) -> Self {
        VoltageWaveform(Array1::from(value))
    }
}
/// `volts = (code - y_origin - y_reference) * y_increment`, elementwise.
pub fn to_voltage(raw: RawWaveform, params: &AcquisitionParameters) -> VoltageWaveform {
    let offset = params.y_origin + params.y_reference;
    let codes: Array1<f64> = raw.0.into_iter().map(f64::from).collect();
    VoltageWaveform(codes.mapv(|code| (code - offset) * params.y_increment))
}
