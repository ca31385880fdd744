//! Binding-Subsystem: Datenmodell, Ausdruckssprache und Tabelle.
//!
//! # Ablauf
//!
//! ```text
//! "dev:0:button:3:M => Ctrl+F2"
//!        │ parse_mapping
//!        ▼
//!   BindingMap ──► BindingTable::build ──► BindingEntry (BindingId, ActionIds)
//! ```
//!
//! Bindings werden einmal beim Start gebaut und sind danach unveränderlich.

pub mod error;
pub mod model;
pub mod parser;
pub mod table;

pub use error::BindingError;
pub use model::{
    ActionKind, ActivationMode, AxisMode, BindingMap, CenterTarget, DeviceSelector, InputBinding,
    InputControl, InputKind, OutputAction, RampSpec, SessionToggleSpec, TargetPoint, TargetSpace,
    Threshold, WiggleSpec, MAX_RAMP_MS, MAX_RAMP_RATE,
};
pub use parser::{parse_input, parse_mapping, parse_output};
pub use table::{ActionId, BindingEntry, BindingId, BindingTable, LayerSlot, SlotKey};
