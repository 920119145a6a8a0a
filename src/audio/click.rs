// Click - Tone shapes for clicks and transition cues
// ClickRenderer turns queued sounds into samples on the audio thread

use super::parameters::MasterVolume;
use super::timing::AudioTiming;
use super::{Accent, TransitionLevel};
use crate::messaging::channels::SoundConsumer;
use ringbuf::traits::Consumer;
use std::collections::VecDeque;
use std::f64::consts::PI;

/// Pitch of a normal click, accents are raised from here
pub const BASE_FREQUENCY: f32 = 1000.0;

/// Sine burst with a linear attack/release envelope, repeated `beeps` times
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneShape {
    pub frequency: f32,
    /// Peak amplitude before master volume
    pub volume: f32,
    pub attack: f64,
    pub release: f64,
    pub beeps: u32,
    /// Silence between beeps
    pub pause: f64,
}

impl ToneShape {
    /// Click for an audible accent, `None` for silent notes
    pub fn click(accent: Accent) -> Option<Self> {
        let (frequency, volume) = match accent {
            Accent::Silent => return None,
            Accent::Normal => (BASE_FREQUENCY, 0.85),
            // 4 semitones up
            Accent::Medium => (BASE_FREQUENCY + BASE_FREQUENCY / 12.0 * 4.0, 1.0),
            // 7 semitones up
            Accent::Strong => (BASE_FREQUENCY + BASE_FREQUENCY / 12.0 * 7.0, 1.0),
        };

        Some(Self {
            frequency,
            volume,
            attack: 0.001,
            release: 0.01,
            beeps: 1,
            pause: 0.0,
        })
    }

    /// Low triple beep for a stop, high double beep for a warning
    pub fn transition(level: TransitionLevel) -> Self {
        let (frequency, beeps, pause) = match level {
            TransitionLevel::Stop => (440.0, 3, 0.08),
            TransitionLevel::Warning => (880.0, 2, 0.04),
        };

        Self {
            frequency,
            volume: 1.0,
            attack: 0.005,
            release: 0.01,
            beeps,
            pause,
        }
    }

    fn beep_period(&self) -> f64 {
        self.attack + self.release + self.pause
    }

    /// Seconds from start until the last beep has faded out
    pub fn duration(&self) -> f64 {
        self.beeps as f64 * (self.attack + self.release) + self.beeps.saturating_sub(1) as f64 * self.pause
    }

    /// Envelope value `t` seconds after the start
    pub fn envelope(&self, t: f64) -> f32 {
        if t < 0.0 {
            return 0.0;
        }
        let beep = (t / self.beep_period()).floor();
        if beep >= self.beeps as f64 {
            return 0.0;
        }

        let local = t - beep * self.beep_period();
        let level = if local < self.attack {
            local / self.attack
        } else if local < self.attack + self.release {
            1.0 - (local - self.attack) / self.release
        } else {
            0.0
        };
        level as f32 * self.volume
    }

    pub fn sample(&self, t: f64) -> f32 {
        let envelope = self.envelope(t);
        if envelope == 0.0 {
            return 0.0;
        }
        envelope * (2.0 * PI * self.frequency as f64 * t).sin() as f32
    }
}

/// A tone queued to start at an absolute frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSound {
    pub start_sample: u64,
    pub tone: ToneShape,
}

impl ScheduledSound {
    fn end_sample(&self, sample_rate: f64) -> u64 {
        self.start_sample + (self.tone.duration() * sample_rate).ceil() as u64
    }
}

/// Audio side of a queued player.
/// Pops sounds from the lock-free queue and mixes them, advancing the shared
/// clock by every rendered frame unless the player is suspended.
pub struct ClickRenderer {
    consumer: SoundConsumer,
    timing: AudioTiming,
    volume: MasterVolume,
    pending: VecDeque<ScheduledSound>,
    voices: Vec<ScheduledSound>,
    sample_rate: f64,
}

impl ClickRenderer {
    /// Sounds waiting in the pending list before the queue is read again
    const PENDING_CAPACITY: usize = 1024;
    const MAX_VOICES: usize = 16;

    pub fn new(consumer: SoundConsumer, timing: AudioTiming, volume: MasterVolume) -> Self {
        let sample_rate = timing.sample_rate() as f64;
        Self {
            consumer,
            timing,
            volume,
            pending: VecDeque::with_capacity(Self::PENDING_CAPACITY),
            voices: Vec::with_capacity(Self::MAX_VOICES),
            sample_rate,
        }
    }

    pub fn timing(&self) -> &AudioTiming {
        &self.timing
    }

    /// Sounds received but not started yet
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Fills interleaved `data`; silence while suspended
    pub fn render<T>(&mut self, data: &mut [T], channels: usize, convert: impl Fn(f32) -> T) {
        let channels = channels.max(1);
        let frames = data.len() / channels;

        if self.timing.is_suspended() {
            for sample in data.iter_mut() {
                *sample = convert(0.0);
            }
            return;
        }

        self.drain_queue();

        let start = self.timing.current_sample();
        let gain = self.volume.get();

        for (offset, frame) in data.chunks_mut(channels).take(frames).enumerate() {
            let index = start + offset as u64;
            self.start_due_voices(index);

            let mut mixed = 0.0f32;
            for voice in &self.voices {
                let t = (index - voice.start_sample) as f64 / self.sample_rate;
                mixed += voice.tone.sample(t);
            }
            let value = (mixed * gain).clamp(-1.0, 1.0);

            for sample in frame.iter_mut() {
                *sample = convert(value);
            }
        }

        let end = start + frames as u64;
        let sample_rate = self.sample_rate;
        self.voices.retain(|voice| voice.end_sample(sample_rate) > end);
        self.timing.advance(frames);
    }

    /// Sounds arrive in time order, so those left in the queue start after every pending one
    fn drain_queue(&mut self) {
        while self.pending.len() < Self::PENDING_CAPACITY
            && let Some(sound) = self.consumer.try_pop()
        {
            let index = self
                .pending
                .partition_point(|queued| queued.start_sample <= sound.start_sample);
            self.pending.insert(index, sound);
        }
    }

    fn start_due_voices(&mut self, index: u64) {
        while self
            .pending
            .front()
            .is_some_and(|sound| sound.start_sample <= index)
        {
            if let Some(sound) = self.pending.pop_front() {
                // Late sounds start mid-envelope, expired ones are skipped
                if sound.end_sample(self.sample_rate) > index {
                    if self.voices.len() == Self::MAX_VOICES {
                        self.voices.remove(0);
                    }
                    self.voices.push(sound);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::channels::create_sound_channel;
    use ringbuf::traits::{Observer, Producer};

    #[test]
    fn test_click_tones() {
        assert_eq!(ToneShape::click(Accent::Silent), None);

        let normal = ToneShape::click(Accent::Normal).unwrap();
        let medium = ToneShape::click(Accent::Medium).unwrap();
        let strong = ToneShape::click(Accent::Strong).unwrap();

        assert_eq!(normal.frequency, 1000.0);
        assert_eq!(normal.volume, 0.85);
        assert!((medium.frequency - 1333.333).abs() < 0.01);
        assert!((strong.frequency - 1583.333).abs() < 0.01);
        assert!((strong.duration() - 0.011).abs() < 1e-12);
    }

    #[test]
    fn test_transition_tones() {
        let stop = ToneShape::transition(TransitionLevel::Stop);
        assert_eq!(stop.frequency, 440.0);
        assert_eq!(stop.beeps, 3);
        // 3 beeps of 15ms with two 80ms pauses
        assert!((stop.duration() - 0.205).abs() < 1e-12);

        let warning = ToneShape::transition(TransitionLevel::Warning);
        assert_eq!(warning.frequency, 880.0);
        assert!((warning.duration() - 0.07).abs() < 1e-12);
    }

    #[test]
    fn test_envelope_shape() {
        let tone = ToneShape::click(Accent::Strong).unwrap();

        assert_eq!(tone.envelope(-0.001), 0.0);
        assert_eq!(tone.envelope(0.0), 0.0);
        assert!((tone.envelope(0.0005) - 0.5).abs() < 1e-6);
        assert!((tone.envelope(0.001) - 1.0).abs() < 1e-6);
        assert!((tone.envelope(0.006) - 0.5).abs() < 1e-6);
        assert_eq!(tone.envelope(0.012), 0.0);

        // Gap between beeps is silent
        let stop = ToneShape::transition(TransitionLevel::Stop);
        assert_eq!(stop.envelope(0.05), 0.0);
        assert!(stop.envelope(0.095 + 0.005) > 0.9);
    }

    #[test]
    fn test_renderer_plays_queued_sound_at_its_frame() {
        let (mut producer, consumer) = create_sound_channel(16);
        let timing = AudioTiming::new(48000);
        let mut renderer = ClickRenderer::new(consumer, timing.clone(), MasterVolume::default());

        let tone = ToneShape::click(Accent::Normal).unwrap();
        producer
            .try_push(ScheduledSound {
                start_sample: 480,
                tone,
            })
            .unwrap();

        let mut block = vec![0.0f32; 1024];
        renderer.render(&mut block, 1, |sample| sample);

        assert_eq!(timing.current_sample(), 1024);
        assert!(block[..481].iter().all(|sample| *sample == 0.0));
        assert!(block[481..1008].iter().any(|sample| sample.abs() > 0.1));
        assert!(block.iter().all(|sample| sample.abs() <= 0.85));
    }

    #[test]
    fn test_renderer_stereo_frames_are_duplicated() {
        let (mut producer, consumer) = create_sound_channel(16);
        let timing = AudioTiming::new(48000);
        let mut renderer = ClickRenderer::new(consumer, timing.clone(), MasterVolume::default());

        producer
            .try_push(ScheduledSound {
                start_sample: 0,
                tone: ToneShape::click(Accent::Strong).unwrap(),
            })
            .unwrap();

        let mut block = vec![0.0f32; 256];
        renderer.render(&mut block, 2, |sample| sample);

        assert_eq!(timing.current_sample(), 128);
        for frame in block.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_pending_list_stays_within_capacity() {
        let (mut producer, consumer) = create_sound_channel(2048);
        let timing = AudioTiming::new(48000);
        let mut renderer = ClickRenderer::new(consumer, timing, MasterVolume::default());

        let tone = ToneShape::click(Accent::Normal).unwrap();
        for index in 0..1500 {
            producer
                .try_push(ScheduledSound {
                    start_sample: 1_000_000 + index * 100,
                    tone,
                })
                .unwrap();
        }

        let mut block = vec![0.0f32; 64];
        renderer.render(&mut block, 1, |sample| sample);
        assert_eq!(renderer.pending_len(), ClickRenderer::PENDING_CAPACITY);
        // The rest waits in the queue
        assert_eq!(producer.vacant_len(), 2048 - (1500 - ClickRenderer::PENDING_CAPACITY));
    }

    #[test]
    fn test_renderer_frozen_while_suspended() {
        let (_producer, consumer) = create_sound_channel(4);
        let timing = AudioTiming::new(48000);
        let mut renderer = ClickRenderer::new(consumer, timing.clone(), MasterVolume::default());

        timing.set_suspended(true);
        let mut block = vec![1.0f32; 64];
        renderer.render(&mut block, 1, |sample| sample);

        assert_eq!(timing.current_sample(), 0);
        assert!(block.iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn test_master_volume_scales_output() {
        let peak = |volume: f32| {
            let (mut producer, consumer) = create_sound_channel(4);
            let timing = AudioTiming::new(48000);
            let mut renderer = ClickRenderer::new(consumer, timing, MasterVolume::new(volume));
            producer
                .try_push(ScheduledSound {
                    start_sample: 0,
                    tone: ToneShape::click(Accent::Normal).unwrap(),
                })
                .unwrap();
            let mut block = vec![0.0f32; 1024];
            renderer.render(&mut block, 1, |sample| sample);
            block.iter().map(|sample| sample.abs()).fold(0.0f32, f32::max)
        };

        let half = peak(0.5);
        let full = peak(1.0);
        assert!(full > half * 1.9 && full < half * 2.1);
    }
}
