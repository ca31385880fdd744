//! Remapping engine with statum state machine for the tick lifecycle
//!
//! # State Machine
//!
//! ```text
//! Armed ──start──► Running ──shutdown──► Stopped
//!                   │  ▲
//!                   └──┘ tick(now)
//! ```
//!
//! # One tick
//!
//! ```text
//! InputSource::refresh ──► Detector::poll ──► InputEvent* ──► Executor::handle_event
//!                                                               │
//!                                              Executor::update ◄┘ ──► OutputSink
//! ```
//!
//! All state is owned by the engine and mutated from a single thread; every
//! derived rate within a tick is computed against the one `now` passed in.

pub mod detector;
pub mod executor;
pub mod motion;
pub mod ramp;
pub mod runner;

use crate::binding::{ActivationMode, BindingTable};
use crate::device::InputSource;
use crate::output::OutputSink;
use statum::{machine, state};
use std::time::Instant;
use tracing::{debug, info};

pub use detector::{Detector, DetectorSettings, InputEvent, ModifierInput};
pub use executor::{Executor, ExecutorSettings, MotionSettings, WiggleDefaults};

/// States for the engine lifecycle using statum
#[state]
#[derive(Debug, Clone)]
pub enum EngineState {
    Armed,   // Devices resolved, state allocated
    Running, // Ticking
    Stopped, // Outputs released
}

/// What a single tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub events: usize,
    pub engaged: usize,
}

#[machine]
pub struct Engine<S: EngineState> {
    source: Box<dyn InputSource>,
    sink: Box<dyn OutputSink>,
    table: BindingTable,
    detector: Detector,
    executor: Executor,
    // reused across ticks
    events: Vec<InputEvent>,
    ticks: u64,
}

impl<S: EngineState> Engine<S> {
    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    pub fn modifier_active(&self) -> bool {
        self.detector.modifier_active()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Engine<Armed> {
    pub fn create(
        source: Box<dyn InputSource>,
        sink: Box<dyn OutputSink>,
        table: BindingTable,
        modifier: Option<ModifierInput>,
        detector_settings: DetectorSettings,
        executor_settings: ExecutorSettings,
    ) -> Self {
        debug!(
            "Creating engine: detector={:?}, executor={:?}",
            detector_settings, executor_settings
        );
        let detector = Detector::new(&table, modifier, detector_settings);
        let executor = Executor::new(&table, executor_settings);

        Self::new(
            source,
            sink,
            table,
            detector,
            executor,
            Vec::new(), // events
            0,          // ticks
        )
    }

    pub fn start(self) -> Engine<Running> {
        info!("Starting engine with {} binding(s):", self.table.len());
        for entry in self.table.entries() {
            let outputs: Vec<String> = entry.map.outputs.iter().map(|o| o.to_string()).collect();
            info!("  {} => {}", entry.map.input, outputs.join(", "));
        }
        let toggles = self
            .table
            .entries()
            .iter()
            .flat_map(|e| e.map.outputs.iter())
            .filter(|o| o.mode == ActivationMode::Toggle)
            .count();
        debug!("{} toggle action(s) configured", toggles);
        self.transition()
    }
}

impl Engine<Running> {
    /// Runs one poll, detect, execute, update cycle against `now`.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.source.refresh();
        self.detector
            .poll(&self.table, self.source.as_ref(), now, &mut self.events);

        let events = self.events.len();
        for event in self.events.drain(..) {
            self.executor
                .handle_event(&self.table, event, now, self.sink.as_mut());
        }
        self.executor.update(&self.table, now, self.sink.as_mut());
        self.ticks += 1;

        TickReport {
            events,
            engaged: self.executor.engaged_count(),
        }
    }

    /// Releases every held output and stops.
    pub fn shutdown(mut self) -> Engine<Stopped> {
        info!("Shutting down engine after {} tick(s)", self.ticks);
        self.executor.release_all(&self.table, self.sink.as_mut());
        self.transition()
    }
}

impl Engine<Stopped> {}
