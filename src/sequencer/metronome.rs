// Metronome - Playback facade over a stopwatch and a look-ahead scheduler
// Owns the player lifecycle, transport state and keep-awake lease

use super::cursor::{Position, TaskPlan};
use super::scheduler::NoteScheduler;
use super::stopwatch::{Stopwatch, StopwatchError};
use super::task::{MetronomeTask, TaskError};
use super::timer::{HostClock, earliest};
use super::transport::TransportState;
use super::wake_lock::{NoWakeLock, WakeLease, WakeLock};
use crate::audio::parameters::MasterVolume;
use crate::audio::{AudioClock, ClockOf, Player, PlayerError, PlayerFactory};
use crate::config::EngineConfig;
use crate::messaging::event::{EventControl, SubscriptionId};
use crate::messaging::notification::{ClickEvent, TransitionEvent};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum MetronomeError {
    #[error("invalid task: {0}")]
    Task(#[from] TaskError),

    #[error("player error: {0}")]
    Player(#[from] PlayerError),

    #[error("stopwatch error: {0}")]
    Stopwatch(#[from] StopwatchError),

    #[error("no task has been started")]
    NotStarted,
}

pub type ClickCallback = Rc<dyn Fn(&ClickEvent)>;
pub type FinishCallback = Rc<dyn Fn()>;

/// One playback of a task: the emitter and, unless it is being rebuilt,
/// the scheduler feeding the current player
struct Session<F: PlayerFactory, H> {
    stopwatch: Stopwatch<ClockOf<F>, H>,
    scheduler: Option<NoteScheduler<F::Player, H>>,
}

/// Which timer owner fires next
#[derive(Debug, Clone, Copy)]
enum Due {
    Stopwatch,
    Scheduler,
    Draining(usize),
}

/// Plays a [`MetronomeTask`] with drift-corrected clicks.
///
/// Single-threaded: the owner calls [`Metronome::tick`] whenever
/// [`Metronome::next_deadline`] has passed on the host clock.
pub struct Metronome<F: PlayerFactory, H> {
    factory: F,
    host: H,
    config: EngineConfig,
    wake_lock: Box<dyn WakeLock>,
    lease: Option<WakeLease>,
    session: Option<Session<F, H>>,
    /// Detached schedulers waiting to close their player
    draining: Vec<NoteScheduler<F::Player, H>>,
    state: TransportState,
    master_volume: f32,
    transitions: Rc<EventControl<TransitionEvent>>,
    finish_flag: Rc<Cell<bool>>,
    task: Option<MetronomeTask>,
    on_click: Option<ClickCallback>,
    on_finished: Option<FinishCallback>,
}

impl<F, H> Metronome<F, H>
where
    F: PlayerFactory,
    H: HostClock + Clone,
{
    pub fn new(factory: F, host: H, config: EngineConfig) -> Self {
        Self::with_wake_lock(factory, host, config, NoWakeLock)
    }

    pub fn with_wake_lock(factory: F, host: H, config: EngineConfig, wake_lock: impl WakeLock + 'static) -> Self {
        Self {
            factory,
            host,
            master_volume: MasterVolume::clamp(config.master_volume),
            config,
            wake_lock: Box::new(wake_lock),
            lease: None,
            session: None,
            draining: Vec::new(),
            state: TransportState::Stopped,
            transitions: Rc::new(EventControl::new()),
            finish_flag: Rc::new(Cell::new(false)),
            task: None,
            on_click: None,
            on_finished: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Task of the current (or last finished) playback
    pub fn task(&self) -> Option<&MetronomeTask> {
        self.task.as_ref()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Drops whatever is playing and starts `task` from its first note
    pub fn restart(
        &mut self,
        task: MetronomeTask,
        on_click: impl Fn(&ClickEvent) + 'static,
        on_finished: impl Fn() + 'static,
    ) -> Result<(), MetronomeError> {
        self.restart_with(task, Some(Rc::new(on_click)), Some(Rc::new(on_finished)))
    }

    fn restart_with(
        &mut self,
        task: MetronomeTask,
        on_click: Option<ClickCallback>,
        on_finished: Option<FinishCallback>,
    ) -> Result<(), MetronomeError> {
        task.validate()?;
        self.teardown();

        let mut player = self.factory.create()?;
        player.set_master_volume(self.master_volume);

        let plan = Arc::new(TaskPlan::new(&task));
        let start_time = player.current_time() + self.config.start_delay;
        let stopwatch = Stopwatch::start(
            player.clock(),
            self.host.clone(),
            plan.clone(),
            start_time,
            self.config.drift,
        );

        if let Some(handler) = &on_click {
            stopwatch.on_click().subscribe_rc(handler.clone());
        }
        let transitions = self.transitions.clone();
        stopwatch
            .on_transition()
            .subscribe(move |event| transitions.invoke(event));
        let finish_flag = self.finish_flag.clone();
        stopwatch.on_finish().subscribe(move |_| finish_flag.set(true));

        let scheduler = NoteScheduler::new(
            player,
            self.host.clone(),
            stopwatch.cursor().clone(),
            self.config.lookahead,
        );

        log::info!(
            "Starting task: {} part(s), {} measures, {:.1}s",
            plan.parts().len(),
            plan.total_measures(),
            plan.total_duration()
        );

        self.session = Some(Session {
            stopwatch,
            scheduler: Some(scheduler),
        });
        self.task = Some(task);
        self.on_click = on_click;
        self.on_finished = on_finished;
        self.state = TransportState::Playing;
        self.lease = self.wake_lock.acquire();
        Ok(())
    }

    /// Suspends emission and the player, keeping the position
    pub fn pause(&mut self) -> Result<(), MetronomeError> {
        if self.state != TransportState::Playing {
            return Ok(());
        }
        if let Some(session) = self.session.as_mut() {
            session.stopwatch.suspend()?;
            if let Some(scheduler) = session.scheduler.as_mut() {
                scheduler.suspend();
            }
        }
        self.state = TransportState::Paused;
        self.lease = None;
        log::info!("Paused before {}", self.position().unwrap_or_default());
        Ok(())
    }

    /// Continues a paused task, or replays a finished one.
    /// Returns whether playback (re)started.
    pub fn resume(&mut self) -> Result<bool, MetronomeError> {
        match self.state {
            TransportState::Playing => Ok(false),
            TransportState::Stopped => Err(MetronomeError::NotStarted),
            TransportState::Finished => {
                let task = self.task.clone().ok_or(MetronomeError::NotStarted)?;
                log::info!("Replaying finished task");
                self.restart_with(task, self.on_click.clone(), self.on_finished.clone())?;
                Ok(true)
            }
            TransportState::Paused => {
                self.resume_session()?;
                self.state = TransportState::Playing;
                self.lease = self.wake_lock.acquire();
                log::info!("Resumed at {}", self.position().unwrap_or_default());
                Ok(true)
            }
        }
    }

    fn resume_session(&mut self) -> Result<(), MetronomeError> {
        let session = self.session.as_mut().ok_or(MetronomeError::NotStarted)?;

        match session.scheduler.as_mut() {
            Some(scheduler) => scheduler.resume(),
            None => {
                // Task was edited while paused: continue on a fresh player
                let mut player = self.factory.create()?;
                player.set_master_volume(self.master_volume);
                session
                    .stopwatch
                    .rebase(player.clock(), self.config.start_delay)?;
                session.scheduler = Some(NoteScheduler::new(
                    player,
                    self.host.clone(),
                    session.stopwatch.cursor().clone(),
                    self.config.lookahead,
                ));
            }
        }

        session.stopwatch.resume()?;
        Ok(())
    }

    /// Applies an edited task. Position indices are kept and the new geometry
    /// applies from the next note on; a playing task keeps playing.
    pub fn update_task(&mut self, task: MetronomeTask) -> Result<(), MetronomeError> {
        task.validate()?;

        match self.state {
            TransportState::Stopped => return Err(MetronomeError::NotStarted),
            TransportState::Finished => {
                self.task = Some(task);
                return Ok(());
            }
            TransportState::Playing | TransportState::Paused => {}
        }

        let was_playing = self.state.is_playing();
        if was_playing {
            self.pause()?;
        }

        if let Some(session) = self.session.as_mut() {
            session
                .stopwatch
                .update_task(Arc::new(TaskPlan::new(&task)))?;
            if let Some(mut scheduler) = session.scheduler.take() {
                scheduler.close();
                if !scheduler.is_closed() {
                    self.draining.push(scheduler);
                }
            }
        }
        self.task = Some(task);
        log::info!("Task updated");

        if was_playing {
            self.resume()?;
        }
        Ok(())
    }

    /// Tears playback down; the finish callback is forgotten
    pub fn stop(&mut self) {
        if self.state == TransportState::Stopped {
            return;
        }
        self.teardown();
        self.on_finished = None;
        log::info!("Stopped");
    }

    fn teardown(&mut self) {
        if let Some(session) = self.session.take()
            && let Some(mut scheduler) = session.scheduler
        {
            scheduler.close();
            if !scheduler.is_closed() {
                self.draining.push(scheduler);
            }
        }
        self.finish_flag.set(false);
        self.lease = None;
        self.state = TransportState::Stopped;
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Clamped to 0.0..=2.0 and applied to the playing player at once
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = MasterVolume::clamp(volume);
        if let Some(scheduler) = self
            .session
            .as_mut()
            .and_then(|session| session.scheduler.as_mut())
        {
            scheduler.player_mut().set_master_volume(self.master_volume);
        }
    }

    /// Position of the next note
    pub fn position(&self) -> Option<Position> {
        self.session.as_ref().map(|session| session.stopwatch.position())
    }

    pub fn last_note_position(&self) -> Option<Position> {
        self.session
            .as_ref()
            .and_then(|session| session.stopwatch.last_note())
    }

    pub fn total_elapsed_seconds(&self) -> f64 {
        self.session
            .as_ref()
            .map_or(0.0, |session| session.stopwatch.elapsed_seconds())
    }

    /// Drift corrections applied in the current playback
    pub fn corrections(&self) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |session| session.stopwatch.corrections())
    }

    pub fn subscribe_transitions(&self, handler: impl Fn(&TransitionEvent) + 'static) -> SubscriptionId {
        self.transitions.subscribe(handler)
    }

    pub fn unsubscribe_transitions(&self, id: SubscriptionId) -> bool {
        self.transitions.unsubscribe(id)
    }

    /// Earliest host time at which [`Metronome::tick`] has work to do
    pub fn next_deadline(&self) -> Option<f64> {
        let session = self.session.as_ref();
        earliest(
            [
                session.and_then(|session| session.stopwatch.next_deadline()),
                session
                    .and_then(|session| session.scheduler.as_ref())
                    .and_then(|scheduler| scheduler.next_deadline()),
            ]
            .into_iter()
            .chain(self.draining.iter().map(|scheduler| scheduler.next_deadline())),
        )
    }

    /// Fires every due timer in deadline order
    pub fn tick(&mut self) {
        let now = self.host.now();
        while let Some(due) = self.next_due(now) {
            match due {
                Due::Stopwatch => {
                    if let Some(session) = self.session.as_mut() {
                        session.stopwatch.poll();
                    }
                }
                Due::Scheduler => {
                    if let Some(scheduler) = self
                        .session
                        .as_mut()
                        .and_then(|session| session.scheduler.as_mut())
                    {
                        scheduler.poll();
                    }
                }
                Due::Draining(index) => {
                    self.draining[index].poll();
                }
            }

            if self.finish_flag.replace(false) {
                self.handle_finish();
            }
        }
        self.draining.retain(|scheduler| !scheduler.is_closed());
    }

    fn next_due(&self, now: f64) -> Option<Due> {
        let mut best: Option<(f64, Due)> = None;
        let mut consider = |deadline: Option<f64>, due: Due| {
            if let Some(deadline) = deadline.filter(|deadline| *deadline <= now)
                && best.is_none_or(|(current, _)| deadline < current)
            {
                best = Some((deadline, due));
            }
        };

        if let Some(session) = self.session.as_ref() {
            consider(session.stopwatch.next_deadline(), Due::Stopwatch);
            if let Some(scheduler) = session.scheduler.as_ref() {
                consider(scheduler.next_deadline(), Due::Scheduler);
            }
        }
        for (index, scheduler) in self.draining.iter().enumerate() {
            consider(scheduler.next_deadline(), Due::Draining(index));
        }
        best.map(|(_, due)| due)
    }

    fn handle_finish(&mut self) {
        // The output is released once the end cue has played
        if let Some(mut scheduler) = self
            .session
            .as_mut()
            .and_then(|session| session.scheduler.take())
        {
            scheduler.close();
            if !scheduler.is_closed() {
                self.draining.push(scheduler);
            }
        }
        self.state = TransportState::Finished;
        self.lease = None;
        log::info!("Playback finished");

        if let Some(on_finished) = self.on_finished.clone() {
            on_finished();
        }
    }
}
