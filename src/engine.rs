// src/engine.rs
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, SendError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::drivers::{measure, measure_pair, AcquisitionError, ScpiTransport};
use crate::scope::{AcquisitionSettings, ScopeSession};
use crate::types::*;

const MODE_SINGLE: u8 = 0;
const MODE_CONTINUOUS: u8 = 1;

/// Mode and trigger settings shared between the UI and the worker. The UI is
/// the only writer; the worker reads them once per iteration.
#[derive(Debug)]
pub struct AcquisitionControl {
    mode: AtomicU8,
    trigger_enabled: AtomicBool,
    threshold_bits: AtomicU64,
    stop: AtomicBool,
}

impl AcquisitionControl {
    pub fn new(mode: Mode, trigger: TriggerConfig) -> Self {
        let control = Self {
            mode: AtomicU8::new(MODE_SINGLE),
            trigger_enabled: AtomicBool::new(false),
            threshold_bits: AtomicU64::new(0),
            stop: AtomicBool::new(false),
        };
        control.set_mode(mode);
        control.set_trigger(trigger);
        control
    }

    pub fn mode(&self) -> Mode {
        match self.mode.load(Ordering::Relaxed) {
            MODE_CONTINUOUS => Mode::Continuous,
            _ => Mode::Single,
        }
    }

    pub fn set_mode(&self, mode: Mode) {
        let raw = match mode {
            Mode::Single => MODE_SINGLE,
            Mode::Continuous => MODE_CONTINUOUS,
        };
        self.mode.store(raw, Ordering::Relaxed);
    }

    pub fn trigger(&self) -> TriggerConfig {
        TriggerConfig {
            enabled: self.trigger_enabled.load(Ordering::Relaxed),
            threshold_volts: f64::from_bits(self.threshold_bits.load(Ordering::Relaxed)),
        }
    }

    pub fn set_trigger(&self, trigger: TriggerConfig) {
        self.threshold_bits
            .store(trigger.threshold_volts.to_bits(), Ordering::Relaxed);
        self.trigger_enabled.store(trigger.enabled, Ordering::Relaxed);
    }

    pub fn apply(&self, cmd: ControlCommand) {
        match cmd {
            ControlCommand::SetMode(mode) => self.set_mode(mode),
            ControlCommand::SetTriggerEnabled(on) => self.trigger_enabled.store(on, Ordering::Relaxed),
            ControlCommand::SetThreshold(v) => self.threshold_bits.store(v.to_bits(), Ordering::Relaxed),
        }
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn clear_stop(&self) {
        self.stop.store(false, Ordering::Release);
    }

    /// Exit check after a record went out: trigger first, then single mode.
    fn after_emit(&self, peaks: &[f64]) -> Option<StopReason> {
        let trigger = self.trigger();
        if trigger.enabled && peaks.iter().any(|&p| p >= trigger.threshold_volts) {
            return Some(StopReason::Triggered);
        }
        if self.mode() == Mode::Single {
            return Some(StopReason::SingleShot);
        }
        None
    }
}

impl Default for AcquisitionControl {
    fn default() -> Self {
        Self::new(Mode::default(), TriggerConfig::default())
    }
}

/// Single-channel loop: capture, measure, emit, until a stop condition.
pub fn run_single<T: ScpiTransport>(
    session: &mut ScopeSession<T>,
    channel: u8,
    settings: &AcquisitionSettings,
    control: &AcquisitionControl,
    tx: &Sender<ScopeMessage>,
) -> Result<StopReason, AcquisitionError> {
    session.select_channel(channel)?;
    let mut cycle: u64 = 0;
    loop {
        if control.stop_requested() {
            return Ok(StopReason::Requested);
        }
        let capture = session.capture(channel, settings)?;
        let stats = measure(&capture.voltages)?;
        cycle += 1;
        debug!("cycle {cycle}: CH{channel} max {:.3} V rms {:.3} V", stats.max, stats.rms);
        // 停止请求: 不再发送结果
        if control.stop_requested() {
            return Ok(StopReason::Requested);
        }
        if tx.send(ScopeMessage::Single(SingleChannelRecord { capture, stats })).is_err() {
            return Ok(StopReason::Disconnected);
        }
        if let Some(reason) = control.after_emit(&[stats.max]) {
            return Ok(reason);
        }
    }
}

/// Two-channel loop: both channels captured back to back, then joint power.
pub fn run_pair<T: ScpiTransport>(
    session: &mut ScopeSession<T>,
    settings: &AcquisitionSettings,
    control: &AcquisitionControl,
    tx: &Sender<ScopeMessage>,
) -> Result<StopReason, AcquisitionError> {
    let mut cycle: u64 = 0;
    loop {
        if control.stop_requested() {
            return Ok(StopReason::Requested);
        }
        session.select_channel(1)?;
        let ch1 = session.capture(1, settings)?;
        session.select_channel(2)?;
        let ch2 = session.capture(2, settings)?;
        let measurement = measure_pair(&ch1.voltages, &ch2.voltages)?;
        cycle += 1;
        debug!(
            "cycle {cycle}: P {:.3} W S {:.3} VA Q {:.3} var",
            measurement.power.active, measurement.power.apparent, measurement.power.reactive
        );
        if control.stop_requested() {
            return Ok(StopReason::Requested);
        }
        let peaks = [measurement.ch1.max, measurement.ch2.max];
        if tx
            .send(ScopeMessage::TwoChannel(TwoChannelRecord { ch1, ch2, measurement }))
            .is_err()
        {
            return Ok(StopReason::Disconnected);
        }
        if let Some(reason) = control.after_emit(&peaks) {
            return Ok(reason);
        }
    }
}

fn worker<T: ScpiTransport>(
    mut session: ScopeSession<T>,
    selection: ChannelSelection,
    settings: AcquisitionSettings,
    control: Arc<AcquisitionControl>,
    tx: Sender<ScopeMessage>,
) -> ScopeSession<T> {
    tx.send(ScopeMessage::Started(selection)).ok();
    info!("acquisition started ({selection:?}, {:?})", control.mode());
    let outcome = match selection.single() {
        Some(channel) => run_single(&mut session, channel, &settings, &control, &tx),
        None => run_pair(&mut session, &settings, &control, &tx),
    };
    match outcome {
        Ok(reason) => {
            info!("acquisition stopped: {reason:?}");
            tx.send(ScopeMessage::Stopped(reason)).ok();
        }
        Err(e) => {
            error!("acquisition aborted: {e}");
            tx.send(ScopeMessage::Failed(e.to_string())).ok();
        }
    }
    session
}

enum WorkerState<T: ScpiTransport> {
    Idle(ScopeSession<T>),
    Running(JoinHandle<Option<ScopeSession<T>>>),
    /// The worker panicked and took the session with it.
    Lost,
}

/// Owns the scope session and at most one acquisition worker.
pub struct Engine<T: ScpiTransport + Send + 'static> {
    state: WorkerState<T>,
    control: Arc<AcquisitionControl>,
    settings: AcquisitionSettings,
    /// Receiving end of the current run; the worker owns the only sender.
    rx: Receiver<ScopeMessage>,
}

impl<T: ScpiTransport + Send + 'static> Engine<T> {
    pub fn new(session: ScopeSession<T>, settings: AcquisitionSettings, control: AcquisitionControl) -> Self {
        let (_, rx) = channel();
        Self {
            state: WorkerState::Idle(session),
            control: Arc::new(control),
            settings,
            rx,
        }
    }

    pub fn control(&self) -> &AcquisitionControl {
        &self.control
    }

    pub fn apply(&self, cmd: ControlCommand) {
        self.control.apply(cmd);
    }

    pub fn is_running(&self) -> bool {
        matches!(&self.state, WorkerState::Running(handle) if !handle.is_finished())
    }

    /// Spawns the worker. Fails with `WorkerBusy` while one is still active.
    /// Messages the previous run left unread are discarded.
    pub fn start(&mut self, selection: ChannelSelection) -> Result<(), AcquisitionError> {
        self.start_on(selection, thread::Builder::new().name("scope-acquisition".to_owned()))
    }

    fn start_on(
        &mut self,
        selection: ChannelSelection,
        builder: thread::Builder,
    ) -> Result<(), AcquisitionError> {
        if self.is_running() {
            return Err(AcquisitionError::WorkerBusy);
        }
        self.reclaim();
        let session = match mem::replace(&mut self.state, WorkerState::Lost) {
            WorkerState::Idle(session) => session,
            other => {
                self.state = other;
                return Err(AcquisitionError::NoSession);
            }
        };
        self.control.clear_stop();
        let control = Arc::clone(&self.control);
        let settings = self.settings;
        let (tx, rx) = channel();
        // 线程启动成功后才交出会话
        let (handoff, pickup) = channel::<ScopeSession<T>>();
        let spawned = builder.spawn(move || {
            let session = pickup.recv().ok()?;
            Some(worker(session, selection, settings, control, tx))
        });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.state = WorkerState::Idle(session);
                return Err(e.into());
            }
        };
        if let Err(SendError(session)) = handoff.send(session) {
            handle.join().ok();
            self.state = WorkerState::Idle(session);
            return Err(AcquisitionError::NoSession);
        }
        self.rx = rx;
        self.state = WorkerState::Running(handle);
        Ok(())
    }

    /// Asks the worker to stop at its next iteration boundary.
    pub fn request_stop(&self) {
        self.control.request_stop();
    }

    /// Joins the worker (if any) and takes the session back.
    pub fn wait(&mut self) -> Result<(), AcquisitionError> {
        self.reclaim();
        match self.state {
            WorkerState::Idle(_) => Ok(()),
            _ => Err(AcquisitionError::NoSession),
        }
    }

    pub fn stop(&mut self) -> Result<(), AcquisitionError> {
        self.request_stop();
        self.wait()
    }

    fn reclaim(&mut self) {
        if let WorkerState::Running(_) = self.state {
            if let WorkerState::Running(handle) = mem::replace(&mut self.state, WorkerState::Lost) {
                match handle.join() {
                    Ok(Some(session)) => self.state = WorkerState::Idle(session),
                    Ok(None) => warn!("acquisition worker exited before receiving the session"),
                    Err(_) => warn!("acquisition worker panicked; session lost"),
                }
            }
        }
    }

    /// Session access while no worker holds it.
    pub fn session(&self) -> Option<&ScopeSession<T>> {
        match &self.state {
            WorkerState::Idle(session) => Some(session),
            _ => None,
        }
    }

    pub fn into_session(mut self) -> Option<ScopeSession<T>> {
        self.request_stop();
        self.reclaim();
        match mem::replace(&mut self.state, WorkerState::Lost) {
            WorkerState::Idle(session) => Some(session),
            _ => None,
        }
    }

    /// Blocks until the worker sends something. `None` once the worker is
    /// gone and its messages are drained, panicked workers included.
    pub fn next_message(&self) -> Option<ScopeMessage> {
        self.rx.recv().ok()
    }

    /// `Timeout` means nothing arrived yet; `Disconnected` means the worker
    /// has exited and nothing more will come.
    pub fn next_message_timeout(&self, timeout: Duration) -> Result<ScopeMessage, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_next_message(&self) -> Option<ScopeMessage> {
        self.rx.try_recv().ok()
    }
}

impl<T: ScpiTransport + Send + 'static> Drop for Engine<T> {
    fn drop(&mut self) {
        self.control.request_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{commands, ManualTransport, SimulatedChannel, SimulatedScope};

    const WAIT: Duration = Duration::from_secs(10);

    fn settings() -> AcquisitionSettings {
        AcquisitionSettings { chunk_samples: 1_000, settle_ms: 0 }
    }

    fn engine(scope: SimulatedScope, mode: Mode, trigger: TriggerConfig) -> Engine<SimulatedScope> {
        let session = ScopeSession::connect(scope).unwrap();
        Engine::new(session, settings(), AcquisitionControl::new(mode, trigger))
    }

    fn scope() -> SimulatedScope {
        SimulatedScope::new(3).with_memory_depth(2_400).with_noise(0.0)
    }

    fn until_stopped(engine: &Engine<SimulatedScope>) -> (Vec<ScopeMessage>, StopReason) {
        let mut seen = Vec::new();
        loop {
            match engine.next_message_timeout(WAIT).expect("worker went silent") {
                ScopeMessage::Stopped(reason) => return (seen, reason),
                ScopeMessage::Failed(e) => panic!("worker failed: {e}"),
                other => seen.push(other),
            }
        }
    }

    #[test]
    fn single_mode_emits_exactly_one_record() {
        let mut engine = engine(scope(), Mode::Single, TriggerConfig::default());
        engine.start(ChannelSelection::Channel1).unwrap();
        let (seen, reason) = until_stopped(&engine);
        assert_eq!(reason, StopReason::SingleShot);
        assert!(matches!(seen[0], ScopeMessage::Started(ChannelSelection::Channel1)));
        let records: Vec<_> = seen
            .iter()
            .filter_map(|m| match m {
                ScopeMessage::Single(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].capture.voltages.len(), 600);
        assert_eq!(records[0].capture.frequency, 50.0);
        assert!((records[0].stats.max - 2.0).abs() < 0.05);
        engine.wait().unwrap();
        let session = engine.session().unwrap();
        // 2400 samples / 1000 per chunk
        assert_eq!(session.transport().data_reads(), 3);
        assert!(session.transport().is_running());
    }

    #[test]
    fn continuous_mode_runs_until_stop_requested() {
        let mut engine = engine(scope(), Mode::Continuous, TriggerConfig::default());
        engine.start(ChannelSelection::Channel2).unwrap();
        let mut records = 0;
        while records < 4 {
            if let Ok(ScopeMessage::Single(r)) = engine.next_message_timeout(WAIT) {
                assert_eq!(r.capture.channel, 2);
                records += 1;
            }
        }
        assert!(engine.is_running());
        engine.request_stop();
        let (_, reason) = until_stopped(&engine);
        assert_eq!(reason, StopReason::Requested);
        engine.wait().unwrap();
        assert!(!engine.is_running());
    }

    #[test]
    fn trigger_stops_continuous_run() {
        let trigger = TriggerConfig { enabled: true, threshold_volts: 1.5 };
        let mut engine = engine(scope(), Mode::Continuous, trigger);
        engine.start(ChannelSelection::Channel1).unwrap();
        let (seen, reason) = until_stopped(&engine);
        assert_eq!(reason, StopReason::Triggered);
        assert_eq!(seen.iter().filter(|m| matches!(m, ScopeMessage::Single(_))).count(), 1);
    }

    #[test]
    fn trigger_above_peak_keeps_running() {
        let trigger = TriggerConfig { enabled: true, threshold_volts: 5.0 };
        let mut engine = engine(scope(), Mode::Continuous, trigger);
        engine.start(ChannelSelection::Channel1).unwrap();
        let mut records = 0;
        while records < 2 {
            if let Ok(ScopeMessage::Single(_)) = engine.next_message_timeout(WAIT) {
                records += 1;
            }
        }
        engine.stop().unwrap();
    }

    #[test]
    fn switching_to_single_ends_continuous_run() {
        let mut engine = engine(scope(), Mode::Continuous, TriggerConfig::default());
        engine.start(ChannelSelection::Channel1).unwrap();
        loop {
            if let Ok(ScopeMessage::Single(_)) = engine.next_message_timeout(WAIT) {
                break;
            }
        }
        engine.apply(ControlCommand::SetMode(Mode::Single));
        let (_, reason) = until_stopped(&engine);
        assert_eq!(reason, StopReason::SingleShot);
    }

    #[test]
    fn second_worker_is_refused() {
        let mut engine = engine(scope(), Mode::Continuous, TriggerConfig::default());
        engine.start(ChannelSelection::Channel1).unwrap();
        assert!(matches!(
            engine.start(ChannelSelection::Both),
            Err(AcquisitionError::WorkerBusy)
        ));
        engine.stop().unwrap();
        engine.apply(ControlCommand::SetMode(Mode::Single));
        engine.start(ChannelSelection::Channel1).unwrap();
        engine.wait().unwrap();
    }

    #[test]
    fn two_channel_record_carries_power() {
        let mut engine = engine(scope(), Mode::Single, TriggerConfig::default());
        engine.start(ChannelSelection::Both).unwrap();
        let (seen, reason) = until_stopped(&engine);
        assert_eq!(reason, StopReason::SingleShot);
        let record = seen
            .into_iter()
            .find_map(|m| match m {
                ScopeMessage::TwoChannel(r) => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(record.ch1.channel, 1);
        assert_eq!(record.ch2.channel, 2);
        assert_eq!(record.ch1.voltages.len(), record.ch2.voltages.len());
        let power = record.measurement.power;
        assert!(power.is_valid());
        // 2 V and 0.5 V peak sines: S = (2 / sqrt 2) * (0.5 / sqrt 2)
        assert!((power.apparent - 0.5).abs() < 0.02, "S = {}", power.apparent);
        assert!(power.active.abs() <= power.apparent + 1e-9);
        assert!(!power.reactive.is_nan());
    }

    #[test]
    fn two_channel_trigger_watches_either_channel() {
        let quiet = SimulatedChannel {
            frequency_hz: 50.0,
            amplitude_volts: 0.2,
            phase_rad: 0.0,
            volts_per_code: 0.04,
        };
        let loud = SimulatedChannel { amplitude_volts: 3.0, ..quiet };
        let scope = scope().with_channel(1, quiet).with_channel(2, loud);
        let trigger = TriggerConfig { enabled: true, threshold_volts: 2.5 };
        let mut engine = engine(scope, Mode::Continuous, trigger);
        engine.start(ChannelSelection::Both).unwrap();
        let (_, reason) = until_stopped(&engine);
        assert_eq!(reason, StopReason::Triggered);
    }

    #[test]
    fn transport_fault_aborts_and_returns_session() {
        let transport = ManualTransport::new().with_ascii(":WAVeform:XINCrement?", &[1.0e-6]);
        let session = ScopeSession::connect(transport).unwrap();
        let mut engine = Engine::new(session, settings(), AcquisitionControl::default());
        engine.start(ChannelSelection::Channel1).unwrap();
        let mut failed = None;
        while let Ok(msg) = engine.next_message_timeout(WAIT) {
            if let ScopeMessage::Failed(e) = msg {
                failed = Some(e);
                break;
            }
        }
        assert!(failed.unwrap().contains("XREFerence"));
        engine.wait().unwrap();
        assert!(engine.session().is_some());
        engine.start(ChannelSelection::Channel1).unwrap();
        engine.wait().unwrap();
    }

    /// Dies inside the capture cycle, as a driver bug would.
    struct PanicsOnStop(ManualTransport);

    impl ScpiTransport for PanicsOnStop {
        fn write(&mut self, command: &str) -> Result<(), AcquisitionError> {
            if command == commands::STOP {
                panic!("link dropped mid-command");
            }
            self.0.write(command)
        }

        fn query_ascii(&mut self, command: &str) -> Result<Vec<f64>, AcquisitionError> {
            self.0.query_ascii(command)
        }

        fn query_binary(&mut self, command: &str) -> Result<Vec<u8>, AcquisitionError> {
            self.0.query_binary(command)
        }
    }

    #[test]
    fn panicked_worker_closes_message_stream() {
        let transport = PanicsOnStop(ManualTransport::new().with_ascii(commands::X_INCREMENT, &[1.0e-6]));
        let session = ScopeSession::connect(transport).unwrap();
        let mut engine = Engine::new(session, settings(), AcquisitionControl::default());
        engine.start(ChannelSelection::Channel1).unwrap();
        assert!(matches!(engine.next_message(), Some(ScopeMessage::Started(_))));
        assert!(engine.next_message().is_none());
        assert_eq!(engine.next_message_timeout(WAIT).err(), Some(RecvTimeoutError::Disconnected));
        assert!(matches!(engine.wait(), Err(AcquisitionError::NoSession)));
        assert!(matches!(
            engine.start(ChannelSelection::Channel1),
            Err(AcquisitionError::NoSession)
        ));
    }

    #[test]
    fn idle_engine_reports_silence() {
        let mut engine = engine(scope(), Mode::Continuous, TriggerConfig::default());
        assert!(engine.next_message().is_none());
        assert_eq!(engine.next_message_timeout(WAIT).err(), Some(RecvTimeoutError::Disconnected));
        engine.start(ChannelSelection::Channel1).unwrap();
        assert!(matches!(engine.next_message_timeout(WAIT), Ok(ScopeMessage::Started(_))));
        engine.stop().unwrap();
        while let Ok(msg) = engine.next_message_timeout(WAIT) {
            assert!(!matches!(msg, ScopeMessage::Failed(_)));
        }
        assert!(engine.next_message().is_none());
    }

    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    #[test]
    fn failed_spawn_keeps_session() {
        let mut engine = engine(scope(), Mode::Single, TriggerConfig::default());
        let oversized = thread::Builder::new().stack_size(1 << 60);
        assert!(matches!(
            engine.start_on(ChannelSelection::Channel1, oversized),
            Err(AcquisitionError::Transport(_))
        ));
        assert!(engine.session().is_some());
        engine.start(ChannelSelection::Channel1).unwrap();
        let (_, reason) = until_stopped(&engine);
        assert_eq!(reason, StopReason::SingleShot);
    }

    #[test]
    fn control_cell_round_trips_settings() {
        let control = AcquisitionControl::default();
        assert_eq!(control.mode(), Mode::Single);
        control.apply(ControlCommand::SetMode(Mode::Continuous));
        control.apply(ControlCommand::SetThreshold(-0.25));
        control.apply(ControlCommand::SetTriggerEnabled(true));
        assert_eq!(control.mode(), Mode::Continuous);
        assert_eq!(control.trigger(), TriggerConfig { enabled: true, threshold_volts: -0.25 });
        assert_eq!(control.after_emit(&[-0.3]), None);
        assert_eq!(control.after_emit(&[-0.3, -0.25]), Some(StopReason::Triggered));
    }
}
