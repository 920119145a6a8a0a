// Queued player - Control side of the click output
// Sounds cross to the audio thread through a lock-free SPSC queue

use super::click::{ClickRenderer, ScheduledSound, ToneShape};
use super::parameters::MasterVolume;
use super::timing::AudioTiming;
use super::{Accent, AudioClock, Player, PlayerError, PlayerFactory, TransitionLevel};
use crate::messaging::channels::{SoundProducer, create_sound_channel};
use ringbuf::traits::{Observer, Producer};
use std::any::Any;

/// Output parameters of a queued player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSettings {
    pub sample_rate: u32,
    pub queue_capacity: usize,
    pub master_volume: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            queue_capacity: 4096,
            master_volume: 1.0,
        }
    }
}

/// Player whose clock is the renderer's frame counter
pub struct QueuedPlayer {
    producer: SoundProducer,
    timing: AudioTiming,
    volume: MasterVolume,
    /// Keeps the device stream alive, dropped on close
    output: Option<Box<dyn Any>>,
    closed: bool,
    dropped: u64,
}

impl QueuedPlayer {
    /// Creates a player and the renderer that must be driven by the audio side
    pub fn new(settings: PlayerSettings) -> (Self, ClickRenderer) {
        let (producer, consumer) = create_sound_channel(settings.queue_capacity);
        let timing = AudioTiming::new(settings.sample_rate);
        let volume = MasterVolume::new(settings.master_volume);

        let renderer = ClickRenderer::new(consumer, timing.clone(), volume.clone());
        let player = Self {
            producer,
            timing,
            volume,
            output: None,
            closed: false,
            dropped: 0,
        };
        (player, renderer)
    }

    pub fn attach_output(&mut self, output: Box<dyn Any>) {
        self.output = Some(output);
    }

    pub fn timing(&self) -> &AudioTiming {
        &self.timing
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sounds lost to a full queue
    pub fn dropped_sounds(&self) -> u64 {
        self.dropped
    }

    fn enqueue(&mut self, at: f64, tone: ToneShape) -> f64 {
        let finish = at + tone.duration();
        if self.closed {
            return finish;
        }

        let sound = ScheduledSound {
            start_sample: self.timing.seconds_to_samples(at),
            tone,
        };
        if self.producer.try_push(sound).is_err() {
            self.dropped += 1;
            log::warn!("Sound queue full, dropped sound at {at:.3}s");
        }
        finish
    }
}

impl AudioClock for QueuedPlayer {
    fn current_time(&self) -> f64 {
        self.timing.current_time()
    }
}

impl Player for QueuedPlayer {
    type Clock = AudioTiming;

    fn clock(&self) -> AudioTiming {
        self.timing.clone()
    }

    fn schedule_click(&mut self, at: f64, accent: Accent) -> f64 {
        match ToneShape::click(accent) {
            Some(tone) => self.enqueue(at, tone),
            None => at,
        }
    }

    fn schedule_transition(&mut self, at: f64, level: TransitionLevel) -> f64 {
        self.enqueue(at, ToneShape::transition(level))
    }

    fn queue_space(&self) -> usize {
        self.producer.vacant_len()
    }

    fn suspend(&mut self) {
        self.timing.set_suspended(true);
    }

    fn resume(&mut self) {
        if !self.closed {
            self.timing.set_suspended(false);
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.timing.set_suspended(true);
        self.output = None;
    }

    fn master_volume(&self) -> f32 {
        self.volume.get()
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.volume.set(volume);
    }
}

/// Receives the audio side of every new player
pub trait RendererSink {
    /// Rate the renderer will be driven at
    fn sample_rate(&self) -> u32;

    /// Starts driving `renderer`; the returned guard lives as long as the player
    fn attach(&mut self, renderer: ClickRenderer) -> Result<Option<Box<dyn Any>>, PlayerError>;
}

/// Creates queued players and hands their renderers to a sink
pub struct QueuedPlayerFactory<S> {
    sink: S,
    settings: PlayerSettings,
}

impl<S: RendererSink> QueuedPlayerFactory<S> {
    pub fn new(sink: S, queue_capacity: usize) -> Self {
        let settings = PlayerSettings {
            sample_rate: sink.sample_rate(),
            queue_capacity,
            ..PlayerSettings::default()
        };
        Self { sink, settings }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: RendererSink> PlayerFactory for QueuedPlayerFactory<S> {
    type Player = QueuedPlayer;

    fn create(&mut self) -> Result<QueuedPlayer, PlayerError> {
        let (mut player, renderer) = QueuedPlayer::new(self.settings);
        if let Some(output) = self.sink.attach(renderer)? {
            player.attach_output(output);
        }
        log::debug!(
            "Created queued player at {} Hz (queue {})",
            self.settings.sample_rate,
            self.settings.queue_capacity
        );
        Ok(player)
    }
}
