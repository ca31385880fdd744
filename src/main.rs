use clap::Parser;
use color_eyre::Result;
use joymouse::binding::BindingTable;
use joymouse::config::{Backend, Settings};
use joymouse::device::{DeviceRegistry, GilrsSource, InputSource};
use joymouse::engine::{runner, Engine, ModifierInput};
use joymouse::output::{DryRunSink, OutputSink, RdevSink};
#[cfg(windows)]
use joymouse::output::Win32Sink;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Maps game controller buttons and axes to mouse and keyboard input.
#[derive(Parser, Debug)]
#[command(name = "joymouse", version, about)]
struct Cli {
    /// Config file (default: <config dir>/joymouse/joymouse.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output actions instead of injecting them
    #[arg(long)]
    dry_run: bool,

    /// Print the detected controllers and exit
    #[arg(long)]
    list_devices: bool,

    /// Overrides [logging] level
    #[arg(long)]
    log_level: Option<Level>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup()?;

    if cli.list_devices {
        setup_logging(cli.log_level.unwrap_or(Level::WARN));
        return list_devices();
    }

    let path = match cli.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let settings = Settings::load(&path)?;
    setup_logging(match cli.log_level {
        Some(level) => level,
        None => settings.log_level()?,
    });
    info!("Configuration loaded from {}", path.display());

    // Bindings werden vor dem Start vollständig geprüft
    let maps = settings.binding_maps()?;
    let modifier = settings.modifier_binding()?;

    let source = GilrsSource::create()?;
    let registry = DeviceRegistry::from_source(&source);
    let table = BindingTable::build(maps, &registry);
    if table.is_empty() {
        warn!("No binding could be resolved to a device, running idle");
    }
    let modifier = modifier.and_then(|m| ModifierInput::resolve(m, &registry));

    let backend = if cli.dry_run {
        Backend::DryRun
    } else {
        settings.output.backend
    };
    let sink = create_sink(backend, &settings);
    // Tasten, die das Backend nicht senden kann, sind ein Ladefehler
    table.check_keys(|key| sink.supports_key(key))?;

    let engine = Engine::create(
        Box::new(source),
        sink,
        table,
        modifier,
        settings.detector_settings(),
        settings.executor_settings()?,
    )
    .start();

    // Ctrl-C beendet die Schleife, gehaltene Ausgaben werden freigegeben
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, stopping"),
            Err(e) => error!("Unable to listen for interrupt: {}", e),
        }
        trigger.cancel();
    });

    let stopped = runner::run(engine, settings.tick_period(), cancel).await;
    info!("Stopped after {} tick(s)", stopped.ticks());
    Ok(())
}

fn create_sink(backend: Backend, settings: &Settings) -> Box<dyn OutputSink> {
    match backend {
        Backend::DryRun => {
            info!("Dry run: output actions are logged, not injected");
            Box::new(DryRunSink::new(settings.dry_run_desktop()))
        }
        Backend::Rdev => Box::new(RdevSink::new()),
        #[cfg(windows)]
        Backend::Native => Box::new(Win32Sink::new()),
        #[cfg(not(windows))]
        Backend::Native => Box::new(RdevSink::new()),
    }
}

fn list_devices() -> Result<()> {
    let mut source = GilrsSource::create()?;
    source.refresh();
    let devices = source.devices();
    if devices.is_empty() {
        println!("No controllers detected");
        return Ok(());
    }
    for device in devices {
        println!("{}", device);
    }
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
