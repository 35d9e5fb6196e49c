// src/types.rs
use serde::{Deserialize, Serialize};
use crate::drivers::{ChannelStats, PairMeasurement, VoltageWaveform};

// 采集模式
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Single,
    Continuous,
}

// 通道选择
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSelection {
    #[default]
    Channel1,
    Channel2,
    Both,
}

impl ChannelSelection {
    /// Instrument channel number for single-channel selections.
    pub fn single(self) -> Option<u8> {
        match self {
            ChannelSelection::Channel1 => Some(1),
            ChannelSelection::Channel2 => Some(2),
            ChannelSelection::Both => None,
        }
    }
}

// 触发设置
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub enabled: bool,
    pub threshold_volts: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self { enabled: false, threshold_volts: 1.0 }
    }
}

// 界面发给后台的命令 (运行中也可修改)
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlCommand {
    SetMode(Mode),
    SetTriggerEnabled(bool),
    SetThreshold(f64),
}

// 停止原因
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// `request_stop` was observed at an iteration boundary.
    Requested,
    /// Trigger enabled and a channel maximum reached the threshold.
    Triggered,
    /// Single mode finished its one cycle.
    SingleShot,
    /// Nobody is listening for results any more.
    Disconnected,
}

// 单通道一次采集的结果
#[derive(Clone, Debug)]
pub struct ChannelCapture {
    pub channel: u8,
    pub voltages: VoltageWaveform,
    pub x_increment: f64,
    pub x_reference: f64,
    pub frequency: f64,
}

#[derive(Clone, Debug)]
pub struct SingleChannelRecord {
    pub capture: ChannelCapture,
    pub stats: ChannelStats,
}

#[derive(Clone, Debug)]
pub struct TwoChannelRecord {
    pub ch1: ChannelCapture,
    pub ch2: ChannelCapture,
    pub measurement: PairMeasurement,
}

// 后台发给界面的消息
#[derive(Clone, Debug)]
pub enum ScopeMessage {
    Started(ChannelSelection),
    Single(SingleChannelRecord),
    TwoChannel(TwoChannelRecord),
    Stopped(StopReason),
    Failed(String),
}
