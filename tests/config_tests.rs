use joymouse::binding::BindingTable;
use joymouse::config::{Backend, ConfigError, Settings};
use joymouse::device::{DeviceRegistry, MemorySource};
use joymouse::engine::{Engine, ModifierInput};
use joymouse::output::{DryRunSink, MouseButton, ScrollDirection, SinkCall};
use std::io::Write;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[input]
modifier = "dev:0:button:6"
poll_hz = 250
startup_grace_ms = 0
axis_deadzone = 0.1
axis_speed = 300.0

[toggle]
binding = "dev:0:button:12"
center = "CenterMouse:Virtual"
restore_on_off = true

[output]
backend = "dry_run"
desktop = [1280, 720]

[logging]
level = "debug"

[mappings]
keys = [
    "dev:0:button:1 => F1",
    "dev:0:button:1:M => MB1:hold",
    "dev:0:axis:4:pos:0.5 => WheelDown:hold",
    "dev:deadbeefdeadbeef:button:2 => F2",
]
axes = ["dev:0:axis:0 => mouse_x"]
"#;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(CONFIG);
    let settings = Settings::load(file.path()).unwrap();

    assert_eq!(settings.output.backend, Backend::DryRun);
    assert_eq!(settings.log_level().unwrap(), tracing::Level::DEBUG);
    assert_eq!(settings.tick_period(), Duration::from_millis(4));
    // 4 key lines + 1 axis line + the session toggle
    assert_eq!(settings.binding_maps().unwrap().len(), 6);
}

#[test]
fn test_missing_and_broken_files() {
    let missing = std::env::temp_dir().join("joymouse-does-not-exist.toml");
    assert!(matches!(
        Settings::load(&missing),
        Err(ConfigError::Read { .. })
    ));

    let broken = write_config("[input\npoll_hz = 250");
    assert!(matches!(
        Settings::load(broken.path()),
        Err(ConfigError::Parse { .. })
    ));

    let invalid = write_config("[input]\npoll_hz = 5000\n");
    assert!(matches!(
        Settings::load(invalid.path()),
        Err(ConfigError::Invalid { .. })
    ));
}

#[test]
fn test_threshold_out_of_range_fails_the_load() {
    let file = write_config("[mappings]\nkeys = [\"dev:0:axis:2:pos:1.2 => F1\"]\n");
    let settings = Settings::load(file.path()).unwrap();
    assert!(matches!(
        settings.binding_maps(),
        Err(ConfigError::Binding(_))
    ));
}

#[test]
fn test_configured_engine_end_to_end() {
    let file = write_config(CONFIG);
    let settings = Settings::load(file.path()).unwrap();

    let source = MemorySource::new();
    source.add_device("030000005e040000", 16, 6);
    let registry = DeviceRegistry::from_source(&source);

    let table = BindingTable::build(settings.binding_maps().unwrap(), &registry);
    // unknown GUID dropped at load
    assert_eq!(table.len(), 5);

    let modifier = settings
        .modifier_binding()
        .unwrap()
        .and_then(|m| ModifierInput::resolve(m, &registry));
    let sink = DryRunSink::new(settings.dry_run_desktop());
    let log = sink.call_log();

    let mut engine = Engine::create(
        Box::new(source.clone()),
        Box::new(sink),
        table,
        modifier,
        settings.detector_settings(),
        settings.executor_settings().unwrap(),
    )
    .start();

    let t0 = Instant::now();
    let at = |ms: u64| t0 + Duration::from_millis(ms);

    // base layer tap
    source.set_button(0, 0, true);
    engine.tick(at(0));
    source.set_button(0, 0, false);
    engine.tick(at(4));
    assert_eq!(
        log.take(),
        vec![SinkCall::TapKey {
            combo: "F1".to_string(),
            hold_ms: 30
        }]
    );

    // modifier layer hold
    source.set_button(0, 5, true);
    source.set_button(0, 0, true);
    engine.tick(at(8));
    source.set_button(0, 0, false);
    engine.tick(at(12));
    source.set_button(0, 5, false);
    engine.tick(at(16));
    assert_eq!(
        log.take(),
        vec![
            SinkCall::MouseButton {
                button: MouseButton::Left,
                down: true
            },
            SinkCall::MouseButton {
                button: MouseButton::Left,
                down: false
            },
        ]
    );

    // axis as button with a ramped wheel
    source.set_axis(0, 4, 0.9);
    engine.tick(at(20));
    engine.tick(at(240));
    source.set_axis(0, 4, 0.0);
    engine.tick(at(244));
    assert_eq!(
        log.take(),
        vec![
            SinkCall::Scroll(ScrollDirection::Down),
            SinkCall::Scroll(ScrollDirection::Down),
        ]
    );

    // stick motion: 300 px/s at 250 Hz is 1.2 px per tick
    source.set_axis(0, 0, 1.0);
    engine.tick(at(248));
    source.set_axis(0, 0, 0.05);
    engine.tick(at(252));
    assert_eq!(log.take(), vec![SinkCall::MoveRelative(1, 0)]);

    // session toggle: recenter, then restore
    source.set_button(0, 11, true);
    engine.tick(at(300));
    source.set_button(0, 11, false);
    engine.tick(at(304));
    source.set_button(0, 11, true);
    engine.tick(at(600));
    let calls = log.take();
    assert_eq!(calls[0], SinkCall::MoveAbsolute(640, 360));
    assert_eq!(calls[1], SinkCall::MoveAbsolute(641, 360));
    assert_eq!(calls.len(), 2);

    let _stopped = engine.shutdown();
}

#[test]
fn test_startup_grace_from_config() {
    let file = write_config(
        "[input]\nstartup_grace_ms = 100\n[mappings]\nkeys = [\"dev:0:button:1 => F1\"]\n",
    );
    let settings = Settings::load(file.path()).unwrap();

    let source = MemorySource::new();
    source.add_device("030000005e040000", 16, 6);
    let registry = DeviceRegistry::from_source(&source);
    let table = BindingTable::build(settings.binding_maps().unwrap(), &registry);
    let sink = DryRunSink::new(settings.dry_run_desktop());
    let log = sink.call_log();
    let mut engine = Engine::create(
        Box::new(source.clone()),
        Box::new(sink),
        table,
        None,
        settings.detector_settings(),
        settings.executor_settings().unwrap(),
    )
    .start();

    let t0 = Instant::now();
    let at = |ms: u64| t0 + Duration::from_millis(ms);

    // pressed at launch and released inside the window: nothing
    source.set_button(0, 0, true);
    engine.tick(at(0));
    source.set_button(0, 0, false);
    engine.tick(at(50));
    assert!(log.is_empty());

    source.set_button(0, 0, true);
    engine.tick(at(100));
    assert_eq!(
        log.take(),
        vec![SinkCall::TapKey {
            combo: "F1".to_string(),
            hold_ms: 30
        }]
    );
}
