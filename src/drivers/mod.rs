// src/drivers/mod.rs
// 声明同级目录下的子模块文件
pub mod block;
pub mod commands;
pub mod error;
pub mod fetch;
pub mod measure;
pub mod scaling;
pub mod simulated;
pub mod stream;
pub mod transport;
// 公开导出这些模块里的结构体，方便外部调用
pub use error::{AcquisitionError, SaveError};
pub use fetch::{fetch, Acquisition, AcquisitionParameters, ReadWindow, DEFAULT_CHUNK_SAMPLES};
pub use measure::{
    format_reading, measure, measure_pair, ChannelStats, PairMeasurement, PowerMeasurement,
    INVALID_MEASUREMENT,
};
pub use scaling::{to_voltage, RawWaveform, VoltageWaveform};
pub use simulated::{SimulatedChannel, SimulatedScope};
pub use stream::{connect_tcp, open_serial, StreamTransport};
pub use transport::{ManualTransport, ScpiTransport};
