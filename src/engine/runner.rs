//! Fixed-rate loop driving a running engine until cancelled.

use super::{Engine, Running, Stopped};
use chrono::Local;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Ticks `engine` every `period` until `cancel` fires, then shuts it down.
///
/// The tick body is synchronous; the interval wait is the only suspension
/// point.
pub async fn run(
    mut engine: Engine<Running>,
    period: Duration,
    cancel: CancellationToken,
) -> Engine<Stopped> {
    info!("Starting remap loop with {:?} tick period", period);

    let mut interval_timer = tokio::time::interval(period);
    // a late tick is taken late, not replayed in a burst
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Stats for performance monitoring
    let mut cycles: u64 = 0;
    let mut total_events: usize = 0;
    let mut slowest = Duration::ZERO;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Cancellation requested, leaving remap loop");
                break;
            }
            _ = interval_timer.tick() => {}
        }

        let now = Instant::now();
        let report = engine.tick(now);
        let cycle = now.elapsed();
        slowest = slowest.max(cycle);
        cycles += 1;
        total_events += report.events;

        if report.events > 0 {
            debug!(
                "Tick {}: {} event(s), {} engaged action(s)",
                engine.ticks(),
                report.events,
                report.engaged
            );
        }

        // Log stats periodically
        let wall = Local::now();
        if wall - last_stats_time > stats_interval {
            let elapsed_seconds = (wall - last_stats_time).num_seconds().max(1);
            info!(
                "Loop stats: {} ticks, {} events in {} seconds (slowest tick {:.2} ms)",
                cycles,
                total_events,
                elapsed_seconds,
                slowest.as_secs_f64() * 1000.0
            );
            info!(
                "Average: {:.2} ticks/sec, {:.2} events/sec",
                cycles as f64 / elapsed_seconds as f64,
                total_events as f64 / elapsed_seconds as f64
            );

            // Reset counters
            cycles = 0;
            total_events = 0;
            slowest = Duration::ZERO;
            last_stats_time = wall;
        }
    }

    engine.shutdown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{parse_mapping, BindingTable};
    use crate::device::{DeviceRegistry, MemorySource};
    use crate::engine::{DetectorSettings, ExecutorSettings};
    use crate::output::{DryRunSink, MouseButton, Rect, SinkCall};

    #[tokio::test(flavor = "current_thread")]
    async fn test_cancel_stops_and_releases() {
        let source = MemorySource::new();
        source.add_device("abcd", 4, 2);
        source.set_button(0, 0, true);
        let registry = DeviceRegistry::from_source(&source);
        let table = BindingTable::build(
            vec![parse_mapping("dev:0:button:1 => MB1:hold").unwrap()],
            &registry,
        );
        let sink = DryRunSink::new(Rect::new(0, 0, 800, 600));
        let log = sink.call_log();

        let engine = Engine::create(
            Box::new(source.clone()),
            Box::new(sink),
            table,
            None,
            DetectorSettings {
                startup_grace: Duration::ZERO,
                ..DetectorSettings::default()
            },
            ExecutorSettings::default(),
        )
        .start();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let (stopped, _) = tokio::join!(run(engine, Duration::from_millis(4), cancel), async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            trigger.cancel();
        });

        assert!(stopped.ticks() >= 1);
        assert!(source.refreshes() >= 1);
        let calls = log.snapshot();
        assert_eq!(
            calls.first(),
            Some(&SinkCall::MouseButton {
                button: MouseButton::Left,
                down: true
            })
        );
        assert_eq!(
            calls.last(),
            Some(&SinkCall::MouseButton {
                button: MouseButton::Left,
                down: false
            })
        );
    }
}
