// src/main.rs
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use scopepoll::drivers::format_reading;
use scopepoll::types::{ChannelCapture, ScopeMessage};
use scopepoll::{AcquisitionControl, AppConfig, Engine, MeasurementStore, ScopeSession};

#[derive(Debug, Parser)]
#[command(name = "scopepoll")]
#[command(about = "Poll an oscilloscope and measure its waveforms", long_about = None)]
struct Cli {
    /// JSON configuration; the built-in simulated scope is used without one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the last record as CSV when acquisition ends.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Stop after this many records (continuous mode).
    #[arg(long)]
    max_records: Option<usize>,
}

fn describe(capture: &ChannelCapture) -> String {
    format!(
        "CH{}: {} samples, f = {}",
        capture.channel,
        capture.voltages.len(),
        format_reading(capture.frequency, 1, "Hz")
    )
}

// 入口函数
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let transport = config.open_transport()?;
    let session = ScopeSession::connect(transport).context("selected device is not supported")?;
    let control = AcquisitionControl::new(config.mode, config.trigger);
    let mut engine = Engine::new(session, config.acquisition, control);
    engine.start(config.channels)?;

    let mut store = MeasurementStore::new();
    let mut records = 0usize;
    while let Some(msg) = engine.next_message() {
        store.observe(&msg);
        match &msg {
            ScopeMessage::Started(selection) => info!("acquiring {selection:?}"),
            ScopeMessage::Single(r) => {
                records += 1;
                info!(
                    "{} | max {} min {} rms {} avg {}",
                    describe(&r.capture),
                    format_reading(r.stats.max, 3, "V"),
                    format_reading(r.stats.min, 3, "V"),
                    format_reading(r.stats.rms, 3, "V"),
                    format_reading(r.stats.mean, 3, "V"),
                );
            }
            ScopeMessage::TwoChannel(r) => {
                records += 1;
                let m = &r.measurement;
                info!("{} | max {} rms {}", describe(&r.ch1), format_reading(m.ch1.max, 3, "V"), format_reading(m.ch1.rms, 3, "V"));
                info!("{} | max {} rms {}", describe(&r.ch2), format_reading(m.ch2.max, 3, "V"), format_reading(m.ch2.rms, 3, "V"));
                info!(
                    "P {} S {} Q {}",
                    format_reading(m.power.active, 3, "W"),
                    format_reading(m.power.apparent, 3, "VA"),
                    format_reading(m.power.reactive, 3, "Var"),
                );
            }
            ScopeMessage::Stopped(reason) => {
                info!("stopped: {reason:?}");
                break;
            }
            ScopeMessage::Failed(e) => {
                error!("acquisition failed: {e}");
                break;
            }
        }
        if cli.max_records.is_some_and(|n| records >= n) && !engine.control().stop_requested() {
            engine.request_stop();
        }
    }
    engine.wait()?;

    if let Some(path) = &cli.save {
        // 保存失败只提示, 不退出
        if let Err(e) = store.save(path) {
            error!("could not save {}: {e}", path.display());
        }
    }
    Ok(())
}
