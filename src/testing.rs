// Testing - Deterministic simulation of host timers and audio output
// Drives the engine on a manual clock, with optional timer jitter and clock skew

use crate::audio::click::ToneShape;
use crate::audio::parameters::MasterVolume;
use crate::audio::{Accent, AudioClock, Player, PlayerError, PlayerFactory, TransitionLevel};
use crate::driver::TimerDriven;
use crate::sequencer::timer::HostClock;
use crate::sequencer::wake_lock::{WakeLease, WakeLock};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use crate::sequencer::timer::ManualHostClock as SimHostClock;

#[derive(Debug)]
struct SimClockState {
    host: SimHostClock,
    /// Audio seconds per host second
    rate: f64,
    base_audio: Cell<f64>,
    base_host: Cell<f64>,
    frozen: Cell<bool>,
}

/// Audio clock derived from the simulated host clock; freezes while suspended
#[derive(Debug, Clone)]
pub struct SimAudioClock {
    state: Rc<SimClockState>,
}

impl SimAudioClock {
    /// Starts at 0 and runs at host speed
    pub fn new(host: SimHostClock) -> Self {
        Self::with_rate(host, 1.0)
    }

    /// `rate` above 1.0 makes audio time run fast against host timers
    pub fn with_rate(host: SimHostClock, rate: f64) -> Self {
        let base_host = host.now();
        Self {
            state: Rc::new(SimClockState {
                host,
                rate,
                base_audio: Cell::new(0.0),
                base_host: Cell::new(base_host),
                frozen: Cell::new(false),
            }),
        }
    }

    pub fn freeze(&self) {
        if !self.state.frozen.get() {
            self.state.base_audio.set(self.current_time());
            self.state.frozen.set(true);
        }
    }

    pub fn unfreeze(&self) {
        if self.state.frozen.get() {
            self.state.base_host.set(self.state.host.now());
            self.state.frozen.set(false);
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.state.frozen.get()
    }
}

impl AudioClock for SimAudioClock {
    fn current_time(&self) -> f64 {
        let state = &self.state;
        if state.frozen.get() {
            state.base_audio.get()
        } else {
            state.base_audio.get() + (state.host.now() - state.base_host.get()) * state.rate
        }
    }
}

/// Sound handed to a simulated player
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimSound {
    Click { at: f64, accent: Accent },
    Transition { at: f64, level: TransitionLevel },
}

#[derive(Debug, Default)]
struct SimPlayerState {
    sounds: Vec<SimSound>,
    suspended: bool,
    closed: bool,
    suspend_count: u32,
    resume_count: u32,
    master_volume: f32,
}

/// Shared record of everything a simulated player was asked to do
#[derive(Debug, Clone, Default)]
pub struct SimPlayerLog {
    state: Rc<RefCell<SimPlayerState>>,
}

impl SimPlayerLog {
    pub fn sounds(&self) -> Vec<SimSound> {
        self.state.borrow().sounds.clone()
    }

    pub fn clicks(&self) -> Vec<(f64, Accent)> {
        self.state
            .borrow()
            .sounds
            .iter()
            .filter_map(|sound| match *sound {
                SimSound::Click { at, accent } => Some((at, accent)),
                SimSound::Transition { .. } => None,
            })
            .collect()
    }

    pub fn transitions(&self) -> Vec<(f64, TransitionLevel)> {
        self.state
            .borrow()
            .sounds
            .iter()
            .filter_map(|sound| match *sound {
                SimSound::Transition { at, level } => Some((at, level)),
                SimSound::Click { .. } => None,
            })
            .collect()
    }

    pub fn is_suspended(&self) -> bool {
        self.state.borrow().suspended
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    pub fn suspend_count(&self) -> u32 {
        self.state.borrow().suspend_count
    }

    pub fn resume_count(&self) -> u32 {
        self.state.borrow().resume_count
    }

    pub fn master_volume(&self) -> f32 {
        self.state.borrow().master_volume
    }
}

/// Player recording scheduled sounds; sound lengths match the real tones
#[derive(Debug)]
pub struct SimPlayer {
    clock: SimAudioClock,
    log: SimPlayerLog,
}

impl SimPlayer {
    pub fn new(clock: SimAudioClock) -> Self {
        let log = SimPlayerLog::default();
        log.state.borrow_mut().master_volume = 1.0;
        Self { clock, log }
    }

    pub fn log(&self) -> SimPlayerLog {
        self.log.clone()
    }

    fn record(&self, sound: SimSound) {
        self.log.state.borrow_mut().sounds.push(sound);
    }
}

impl AudioClock for SimPlayer {
    fn current_time(&self) -> f64 {
        self.clock.current_time()
    }
}

impl Player for SimPlayer {
    type Clock = SimAudioClock;

    fn clock(&self) -> SimAudioClock {
        self.clock.clone()
    }

    fn schedule_click(&mut self, at: f64, accent: Accent) -> f64 {
        self.record(SimSound::Click { at, accent });
        at + ToneShape::click(accent).map_or(0.0, |tone| tone.duration())
    }

    fn schedule_transition(&mut self, at: f64, level: TransitionLevel) -> f64 {
        self.record(SimSound::Transition { at, level });
        at + ToneShape::transition(level).duration()
    }

    fn queue_space(&self) -> usize {
        usize::MAX
    }

    fn suspend(&mut self) {
        self.clock.freeze();
        let mut state = self.log.state.borrow_mut();
        state.suspended = true;
        state.suspend_count += 1;
    }

    fn resume(&mut self) {
        self.clock.unfreeze();
        let mut state = self.log.state.borrow_mut();
        state.suspended = false;
        state.resume_count += 1;
    }

    fn close(&mut self) {
        self.clock.freeze();
        self.log.state.borrow_mut().closed = true;
    }

    fn master_volume(&self) -> f32 {
        self.log.master_volume()
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.log.state.borrow_mut().master_volume = MasterVolume::clamp(volume);
    }
}

/// Creates simulated players whose clocks start at zero on creation
#[derive(Debug)]
pub struct SimPlayerFactory {
    host: SimHostClock,
    rate: f64,
    logs: Vec<SimPlayerLog>,
    fail: bool,
}

impl SimPlayerFactory {
    pub fn new(host: SimHostClock) -> Self {
        Self::with_rate(host, 1.0)
    }

    /// Players whose audio clocks run at `rate` against the host clock
    pub fn with_rate(host: SimHostClock, rate: f64) -> Self {
        Self {
            host,
            rate,
            logs: Vec::new(),
            fail: false,
        }
    }

    /// Makes every following `create` fail
    pub fn set_failing(&mut self, fail: bool) {
        self.fail = fail;
    }

    pub fn created(&self) -> usize {
        self.logs.len()
    }

    pub fn logs(&self) -> &[SimPlayerLog] {
        &self.logs
    }

    pub fn last_log(&self) -> Option<&SimPlayerLog> {
        self.logs.last()
    }
}

impl PlayerFactory for SimPlayerFactory {
    type Player = SimPlayer;

    fn create(&mut self) -> Result<SimPlayer, PlayerError> {
        if self.fail {
            return Err(PlayerError::NoDevice);
        }
        let player = SimPlayer::new(SimAudioClock::with_rate(self.host.clone(), self.rate));
        self.logs.push(player.log());
        Ok(player)
    }
}

/// Wake lock counting held leases
#[derive(Debug, Clone, Default)]
pub struct SimWakeLock {
    held: Rc<Cell<u32>>,
    acquired: Rc<Cell<u32>>,
}

impl SimWakeLock {
    pub fn is_held(&self) -> bool {
        self.held.get() > 0
    }

    pub fn acquired(&self) -> u32 {
        self.acquired.get()
    }
}

impl WakeLock for SimWakeLock {
    fn acquire(&mut self) -> Option<WakeLease> {
        self.held.set(self.held.get() + 1);
        self.acquired.set(self.acquired.get() + 1);
        let held = self.held.clone();
        Some(WakeLease::new(move || held.set(held.get() - 1)))
    }
}

type Jitter = Box<dyn FnMut() -> f64>;

/// Runs timer-driven components on a manual host clock.
/// Every timer fires at its deadline plus the jitter returned for it.
pub struct SimDriver {
    host: SimHostClock,
    jitter: Option<Jitter>,
    ticks: u64,
}

impl SimDriver {
    pub fn new() -> Self {
        Self {
            host: SimHostClock::new(0.0),
            jitter: None,
            ticks: 0,
        }
    }

    /// Late fire, in seconds, applied to every timer
    pub fn with_jitter(jitter: impl FnMut() -> f64 + 'static) -> Self {
        Self {
            jitter: Some(Box::new(jitter)),
            ..Self::new()
        }
    }

    pub fn host(&self) -> SimHostClock {
        self.host.clone()
    }

    pub fn now(&self) -> f64 {
        self.host.now()
    }

    /// Ticks handled so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Fires everything due up to `until`, then leaves the clock there
    pub fn run_until(&mut self, target: &mut impl TimerDriven, until: f64) {
        while let Some(deadline) = target.next_deadline() {
            if deadline > until {
                break;
            }
            let late = self.jitter.as_mut().map_or(0.0, |jitter| jitter().max(0.0));
            let fire_at = (deadline + late).max(self.host.now());
            self.host.set(fire_at);
            target.tick();
            self.ticks += 1;
        }
        if until > self.host.now() {
            self.host.set(until);
        }
    }

    /// Moves the clock without firing anything
    pub fn advance(&self, seconds: f64) {
        self.host.advance(seconds);
    }
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}
