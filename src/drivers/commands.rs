// SCPI command set spoken to the oscilloscope.
pub const STOP: &str = ":STOP";
pub const RUN: &str = ":RUN";
pub const WAVEFORM_MODE_RAW: &str = ":WAVeform:MODE RAW";
pub const WAVEFORM_FORMAT_BYTE: &str = ":WAVeform:FORMat BYTE";
pub const WAVEFORM_DATA: &str = ":WAVeform:DATA?";
pub const WAVEFORM_START: &str = ":WAVeform:STARt";
pub const WAVEFORM_STOP: &str = ":WAVeform:STOP";
pub const WAVEFORM_SOURCE: &str = ":WAVeform:SOURce";
pub const MEASURE_SOURCE: &str = ":MEASure:SOURce";
pub const X_INCREMENT: &str = ":WAVeform:XINCrement?";
pub const X_REFERENCE: &str = ":WAVeform:XREFerence?";
pub const Y_ORIGIN: &str = ":WAVeform:YORigin?";
pub const Y_REFERENCE: &str = ":WAVeform:YREFerence?";
pub const Y_INCREMENT: &str = ":WAVeform:YINCrement?";
pub const SAMPLE_RATE: &str = ":ACQuire:SRATe?";
pub const TIMEBASE_SCALE: &str = "TIMebase:SCALe?";
pub const FREQUENCY: &str = ":MEAS:ITEM? FREQ";
/// Horizontal divisions on screen; memory depth = scale * divisions * rate.
pub const TIMEBASE_DIVISIONS: f64 = 12.0;
pub fn source_channel(prefix: &str, channel: u8) -> String {
    format!("{prefix} CHANnel{channel}")
}
pub fn window_bound(prefix: &str, sample: u64) -> String {
    format!("{prefix} {sample}")
}
