// Integration test: Task and engine config files on disk

use practice_metronome::config::parse_task_ron;
use practice_metronome::testing::{SimDriver, SimPlayerFactory};
use practice_metronome::{
    Accent, ConfigError, EngineConfig, Metronome, PartDuration, TimeSignature, load_task,
};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

const TASK_RON: &str = r#"(
    parts: [
        (
            name: Some("warm up"),
            bpm: 120.0,
            signature: (numerator: 3, denominator: 4),
            beat_accents: {0: 3, 2: 0},
            duration: measures(2),
        ),
        (
            bpm: 60.0,
            beat_divider: 2,
            duration: seconds(8.0),
        ),
    ],
)"#;

#[test]
fn test_load_ron_task() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("task.ron");
    fs::write(&path, TASK_RON).unwrap();

    let task = load_task(&path).unwrap();
    assert_eq!(task.parts().len(), 2);

    let warm_up = &task.parts()[0];
    assert_eq!(warm_up.name.as_deref(), Some("warm up"));
    assert_eq!(warm_up.signature, TimeSignature::three_four());
    assert_eq!(warm_up.beat_accents.get(0), Accent::Strong);
    assert_eq!(warm_up.beat_accents.get(1), Accent::Normal);
    assert_eq!(warm_up.beat_accents.get(2), Accent::Silent);

    let second = &task.parts()[1];
    assert_eq!(second.duration, PartDuration::Seconds(8.0));
    assert_eq!(second.measure_count(), 2);
    // 2 measures of 3 beats at 120 bpm, then 2 measures of 4 beats at 60 bpm
    assert!((task.total_duration() - 11.0).abs() < 1e-9);
}

#[test]
fn test_load_json_task() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("task.json");
    fs::write(
        &path,
        r#"{"parts": [{"bpm": 90.0, "duration": {"measures": 4}}]}"#,
    )
    .unwrap();

    let task = load_task(&path).unwrap();
    assert_eq!(task.parts()[0].bpm, 90.0);
    assert_eq!(task.parts()[0].measure_count(), 4);
}

#[test]
fn test_invalid_task_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("task.ron");
    fs::write(&path, "(parts: [])").unwrap();
    assert!(matches!(load_task(&path), Err(ConfigError::Task(_))));

    fs::write(&path, "(parts: [(duration: measures(0))])").unwrap();
    assert!(matches!(load_task(&path), Err(ConfigError::Task(_))));

    fs::write(&path, "(parts: [").unwrap();
    assert!(matches!(load_task(&path), Err(ConfigError::Ron(_))));

    let missing = dir.path().join("missing.ron");
    assert!(matches!(load_task(&missing), Err(ConfigError::Io(_))));
}

#[test]
fn test_engine_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = EngineConfig::default();
    config.start_delay = 0.25;
    config.drift.error_threshold = 0.004;
    config.lookahead.interval = 3.0;

    for name in ["engine.ron", "nested/engine.json"] {
        let path = dir.path().join(name);
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
        assert_eq!(EngineConfig::load_or_default(Some(path.as_path())).unwrap(), config);
    }
}

#[test]
fn test_invalid_engine_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.ron");
    fs::write(&path, "(lookahead: (factor: -1.0))").unwrap();

    assert!(matches!(
        EngineConfig::load(&path),
        Err(ConfigError::Invalid {
            field: "lookahead.factor",
            ..
        })
    ));
}

#[test]
fn test_silent_beat_from_file_plays_nothing() {
    let task = parse_task_ron(
        "(parts: [(signature: (numerator: 2, denominator: 4), beat_divider: 2, \
         beat_accents: {1: 0}, duration: measures(1))])",
    )
    .unwrap();

    let mut driver = SimDriver::new();
    let mut metronome = Metronome::new(
        SimPlayerFactory::new(driver.host()),
        driver.host(),
        EngineConfig::default(),
    );
    let accents = Rc::new(RefCell::new(Vec::new()));
    let sink = accents.clone();
    metronome
        .restart(task, move |event| sink.borrow_mut().push(event.accent), || {})
        .unwrap();
    driver.run_until(&mut metronome, 10.0);

    // The silent beat also silences its subdivision
    assert_eq!(
        *accents.borrow(),
        vec![Accent::Normal, Accent::Normal, Accent::Silent, Accent::Silent]
    );
    assert_eq!(metronome.factory().last_log().unwrap().clicks().len(), 2);
}
