use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use practice_metronome::audio::click::{ClickRenderer, ScheduledSound, ToneShape};
use practice_metronome::audio::parameters::MasterVolume;
use practice_metronome::audio::timing::AudioTiming;
use practice_metronome::messaging::channels::create_sound_channel;
use practice_metronome::sequencer::cursor::{PositionCursor, TaskPlan};
use practice_metronome::testing::{SimDriver, SimPlayerFactory};
use practice_metronome::{
    Accent, EngineConfig, Metronome, MetronomeTask, PartDuration, TaskPart,
};
use ringbuf::traits::Producer;
use std::sync::Arc;

fn practice_task() -> MetronomeTask {
    MetronomeTask::new(vec![
        TaskPart::new(PartDuration::Measures(16)).with_bpm(90.0),
        TaskPart::new(PartDuration::Measures(16))
            .with_bpm(140.0)
            .with_divider(4),
        TaskPart::new(PartDuration::Seconds(60.0)).with_bpm(200.0),
    ])
    .unwrap()
}

/// Walking the cursor is what every fill and every emitted note does
fn bench_cursor_walk(c: &mut Criterion) {
    let plan = Arc::new(TaskPlan::new(&practice_task()));

    c.bench_function("cursor_walk_full_task", |b| {
        b.iter(|| {
            let mut cursor = PositionCursor::new(plan.clone(), 0.0);
            let mut notes = 0u32;
            while !cursor.finished() {
                black_box(cursor.note_accent());
                black_box(cursor.measure_transition());
                cursor.advance_note();
                notes += 1;
            }
            black_box(notes)
        });
    });
}

/// Whole task on simulated clocks: stopwatch, scheduler and player lifecycle
fn bench_simulated_playback(c: &mut Criterion) {
    let task = practice_task();

    c.bench_function("simulated_playback", |b| {
        b.iter(|| {
            let mut driver = SimDriver::new();
            let mut metronome = Metronome::new(
                SimPlayerFactory::new(driver.host()),
                driver.host(),
                EngineConfig::default(),
            );
            metronome.restart(task.clone(), |_| {}, || {}).unwrap();
            driver.run_until(&mut metronome, task.total_duration() + 1.0);
            black_box(metronome.total_elapsed_seconds())
        });
    });
}

/// Audio callback cost with overlapping clicks
fn bench_click_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("click_render");

    for voices in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(voices), &voices, |b, &voices| {
            let (mut producer, consumer) = create_sound_channel(64);
            let timing = AudioTiming::new(48000);
            let mut renderer = ClickRenderer::new(consumer, timing, MasterVolume::default());
            let tone = ToneShape::click(Accent::Strong).unwrap();
            let mut block = vec![0.0f32; 512 * 2];
            let mut start = 0u64;

            b.iter(|| {
                for voice in 0..voices {
                    let _ = producer.try_push(ScheduledSound {
                        start_sample: start + voice as u64 * 8,
                        tone,
                    });
                }
                renderer.render(&mut block, 2, |sample| sample);
                start += 512;
                black_box(&block);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_cursor_walk,
    bench_simulated_playback,
    bench_click_render
);
criterion_main!(benches);
