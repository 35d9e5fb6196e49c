//! Oscilloscope acquisition core: polls a SCPI scope, reassembles chunked
//! binary waveforms, converts them to volts and measures them on a worker
//! thread. Presentation code drives it through [`engine::Engine`].
pub mod config;
pub mod drivers;
pub mod engine;
pub mod recorder;
pub mod scope;
pub mod types;
pub use config::{AppConfig, TransportConfig};
pub use engine::{AcquisitionControl, Engine};
pub use recorder::MeasurementStore;
pub use scope::{AcquisitionSettings, ScopeSession};
