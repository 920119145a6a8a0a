// Practice Metronome - Plays a task file, or renders it to WAV
//
// Usage: practice_metronome <task.ron|task.json> [--wav <out.wav>] [--config <config.ron>]
//
// Without --wav, playback goes to the default audio device when the
// `device` feature is enabled.

use practice_metronome::{EngineConfig, ExportSettings, export_wav, load_task};
use std::path::PathBuf;
use std::process::ExitCode;

struct Args {
    task: PathBuf,
    wav: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut task = None;
    let mut wav = None;
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--wav" => wav = Some(args.next().ok_or("--wav needs a path")?.into()),
            "--config" => config = Some(args.next().ok_or("--config needs a path")?.into()),
            flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
            path if task.is_none() => task = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument {extra}")),
        }
    }

    Ok(Args {
        task: task.ok_or("missing task file")?,
        wav,
        config,
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("usage: practice_metronome <task.ron|task.json> [--wav <out.wav>] [--config <config.ron>]");
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load_or_default(args.config.as_deref())?;
    let task = load_task(&args.task)?;

    if let Some(out) = args.wav {
        let summary = export_wav(task, &config, &ExportSettings::default(), &out)?;
        println!(
            "Wrote {} ({} clicks, {:.1}s)",
            out.display(),
            summary.clicks,
            summary.duration
        );
        return Ok(());
    }

    play(task, config)
}

#[cfg(feature = "device")]
fn play(
    task: practice_metronome::MetronomeTask,
    config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    use practice_metronome::audio::device::CpalSink;
    use practice_metronome::sequencer::timer::SystemHostClock;
    use practice_metronome::{Metronome, QueuedPlayerFactory, run_realtime};

    let host = SystemHostClock::new();
    let factory = QueuedPlayerFactory::new(CpalSink::new()?, config.queue_capacity);
    let mut metronome = Metronome::new(factory, host, config);
    let part_count = task.parts().len();

    metronome.restart(
        task,
        |event| {
            if event.is_audible() {
                log::debug!("{} at {:.3}s", event.position, event.time);
            }
        },
        || println!("Done."),
    )?;
    metronome.subscribe_transitions(move |event| {
        if event.is_stop() && event.part_index < part_count {
            println!("Part {}/{}", event.part_index + 1, part_count);
        } else if !event.is_stop() {
            println!("Last measure of part {}", event.part_index + 1);
        }
    });

    run_realtime(&mut metronome, &host, || true);
    Ok(())
}

#[cfg(not(feature = "device"))]
fn play(
    _task: practice_metronome::MetronomeTask,
    _config: EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the `device` feature; use --wav <out.wav> to render offline".into())
}
