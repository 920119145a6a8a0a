// Audio Export - Offline rendering of a task to a WAV file
//
// Runs the same metronome as real-time playback, but on a manual host clock
// that advances with the rendered frames. Rendering is split at timer
// deadlines so every timer fires on its exact frame.

use super::click::ClickRenderer;
use super::player::{QueuedPlayerFactory, RendererSink};
use super::PlayerError;
use crate::config::EngineConfig;
use crate::sequencer::metronome::{Metronome, MetronomeError};
use crate::sequencer::task::MetronomeTask;
use crate::sequencer::timer::{HostClock, ManualHostClock};
use hound::{WavSpec, WavWriter};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Metronome(#[from] MetronomeError),

    #[error("failed to write WAV file: {0}")]
    Wav(#[from] hound::Error),

    #[error("task did not finish within {0:.1}s of rendering")]
    Unfinished(f64),
}

/// Export settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSettings {
    /// Number of channels (1=mono, 2=stereo)
    pub channels: u16,
    /// Frames rendered per block at most
    pub block_size: usize,
    /// Silence kept after the task end (seconds)
    pub tail: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            channels: 1,
            block_size: 512,
            tail: 0.5,
        }
    }
}

/// What an export produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSummary {
    pub frames: u64,
    pub clicks: u64,
    pub duration: f64,
}

/// Keeps the renderer of the newest player for the offline loop
#[derive(Clone)]
pub struct OfflineSink {
    sample_rate: u32,
    slot: Rc<RefCell<Option<ClickRenderer>>>,
}

impl OfflineSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            slot: Rc::new(RefCell::new(None)),
        }
    }

    /// Renders `data` with the current renderer, silence when there is none
    pub fn render(&self, data: &mut [f32], channels: usize) {
        match self.slot.borrow_mut().as_mut() {
            Some(renderer) => renderer.render(data, channels, |sample| sample),
            None => data.fill(0.0),
        }
    }
}

impl RendererSink for OfflineSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn attach(&mut self, renderer: ClickRenderer) -> Result<Option<Box<dyn Any>>, PlayerError> {
        *self.slot.borrow_mut() = Some(renderer);
        Ok(None)
    }
}

/// Renders `task` to a 16-bit WAV file at `path`
pub fn export_wav(
    task: MetronomeTask,
    config: &EngineConfig,
    settings: &ExportSettings,
    path: &Path,
) -> Result<ExportSummary, ExportError> {
    let sample_rate = config.sample_rate;
    let channels = settings.channels.max(1);
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;

    let sink = OfflineSink::new(sample_rate);
    let host = ManualHostClock::new(0.0);
    let factory = QueuedPlayerFactory::new(sink.clone(), config.queue_capacity);
    let mut metronome = Metronome::new(factory, host.clone(), *config);

    let limit = task.total_duration() + config.start_delay + settings.tail + 1.0;
    let clicks = Rc::new(Cell::new(0u64));
    let finished_at = Rc::new(Cell::new(None::<f64>));
    {
        let clicks = clicks.clone();
        let finished_at = finished_at.clone();
        let finish_host = host.clone();
        metronome.restart(
            task,
            move |event| {
                if event.is_audible() {
                    clicks.set(clicks.get() + 1);
                }
            },
            move || finished_at.set(Some(finish_host.now())),
        )?;
    }

    log::info!(
        "Exporting to {} at {} Hz, {} channel(s)",
        path.display(),
        sample_rate,
        channels
    );

    let rate = sample_rate as f64;
    let channel_count = channels as usize;
    let mut block = vec![0.0f32; settings.block_size.max(1) * channel_count];
    let mut frames_done: u64 = 0;

    loop {
        metronome.tick();

        let now = host.now();
        if let Some(end) = finished_at.get()
            && now >= end + settings.tail
        {
            break;
        }
        if now > limit {
            return Err(ExportError::Unfinished(limit));
        }

        // Stop the block at the next deadline so it fires on time
        let mut frames = settings.block_size.max(1);
        if let Some(deadline) = metronome.next_deadline() {
            let until = ((deadline - now) * rate).ceil().max(1.0) as usize;
            frames = frames.min(until);
        }

        let data = &mut block[..frames * channel_count];
        sink.render(data, channel_count);
        for sample in data.iter() {
            writer.write_sample((sample * i16::MAX as f32) as i16)?;
        }

        frames_done += frames as u64;
        host.set(frames_done as f64 / rate);
    }

    writer.finalize()?;
    metronome.stop();

    let summary = ExportSummary {
        frames: frames_done,
        clicks: clicks.get(),
        duration: frames_done as f64 / rate,
    };
    log::info!(
        "Export complete: {} clicks, {:.2}s",
        summary.clicks,
        summary.duration
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::task::{PartDuration, TaskPart};

    #[test]
    fn test_export_single_measure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("click.wav");
        let task = MetronomeTask::single(TaskPart::new(PartDuration::Measures(1))).unwrap();

        let summary =
            export_wav(task, &EngineConfig::default(), &ExportSettings::default(), &path).unwrap();
        assert_eq!(summary.clicks, 4);
        // 0.1s start delay, 4 beats at 60 bpm, 0.5s tail
        assert!((summary.duration - 4.6).abs() < 0.02);

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 48000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len() as u64, summary.frames);

        // First click starts at 0.1s
        assert!(samples[..4800].iter().all(|s| *s == 0));
        assert!(samples[4800..5400].iter().any(|s| s.abs() > 10000));
        // Second click one second later
        assert!(samples[52800..53400].iter().any(|s| s.abs() > 10000));
    }

    #[test]
    fn test_offline_sink_renders_silence_without_player() {
        let sink = OfflineSink::new(48000);
        let mut data = [1.0f32; 64];
        sink.render(&mut data, 1);
        assert!(data.iter().all(|sample| *sample == 0.0));
    }
}
