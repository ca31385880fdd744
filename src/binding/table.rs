//! Binding-Tabelle: Arena aller aktiven Bindings mit Index nach physischem
//! Eingang.
//!
//! Jedes Binding bekommt beim Laden eine feste [`BindingId`], jede seiner
//! Ausgaben eine [`ActionId`]. Detector und Executor halten ihren Zustand in
//! flachen Vektoren unter diesen Ids.

use super::error::BindingError;
use super::model::{ActionKind, BindingMap, InputKind, OutputAction};
use crate::device::{DeviceIndex, DeviceRegistry, Resolution};
use crate::output::KeyName;
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, info, warn};

pub type BindingId = usize;
pub type ActionId = usize;

/// Physischer Eingang nach Geräteauflösung, unabhängig von Layer und
/// Schwellwert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub device: DeviceIndex,
    pub kind: InputKind,
    pub id: u32,
}

/// Bindings eines physischen Eingangs, getrennt nach Layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerSlot {
    pub base: Vec<BindingId>,
    pub modified: Vec<BindingId>,
}

#[derive(Clone, Debug)]
pub struct BindingEntry {
    pub id: BindingId,
    pub map: BindingMap,
    pub device: DeviceIndex,
    actions: Range<ActionId>,
}

impl BindingEntry {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            device: self.device,
            kind: self.map.input.control.kind(),
            id: self.map.input.control.id(),
        }
    }

    /// Ausgaben zusammen mit ihren ActionIds, in Konfigurationsreihenfolge.
    pub fn actions(&self) -> impl Iterator<Item = (ActionId, &OutputAction)> {
        self.actions.clone().zip(self.map.outputs.iter())
    }
}

#[derive(Clone, Debug, Default)]
pub struct BindingTable {
    entries: Vec<BindingEntry>,
    slots: HashMap<SlotKey, LayerSlot>,
    action_count: usize,
}

impl BindingTable {
    /// Baut die Tabelle aus den geparsten Maps.
    ///
    /// Maps mit identischem Eingang werden zusammengeführt (Ausgaben werden
    /// angehängt). Nicht auflösbare GUIDs werden mit genau einer Warnung
    /// verworfen; Index-Selektoren ohne Gerät bleiben inert erhalten.
    pub fn build(maps: Vec<BindingMap>, registry: &DeviceRegistry) -> Self {
        let mut merged: Vec<BindingMap> = Vec::with_capacity(maps.len());
        for map in maps {
            match merged.iter_mut().find(|m| m.input == map.input) {
                Some(existing) => {
                    debug!(
                        "Merging {} output(s) into existing binding {}",
                        map.outputs.len(),
                        existing.input
                    );
                    existing.outputs.extend(map.outputs);
                }
                None => merged.push(map),
            }
        }

        let mut table = BindingTable::default();
        for map in merged {
            let device = match registry.resolve(&map.input.selector) {
                Resolution::Attached(index) => index,
                Resolution::Detached(index) => {
                    warn!(
                        "Binding {}: device {} is not attached, binding stays inert until it is",
                        map.input, index
                    );
                    index
                }
                Resolution::Unknown => {
                    warn!(
                        "Binding {}: device GUID {} not found, binding dropped",
                        map.input, map.input.selector
                    );
                    continue;
                }
            };
            table.push(map, device);
        }

        info!(
            "Binding table built: {} binding(s), {} action(s), {} physical input(s)",
            table.entries.len(),
            table.action_count,
            table.slots.len()
        );
        table
    }

    fn push(&mut self, map: BindingMap, device: DeviceIndex) {
        let id = self.entries.len();
        let actions = self.action_count..self.action_count + map.outputs.len();
        self.action_count = actions.end;

        let entry = BindingEntry {
            id,
            map,
            device,
            actions,
        };
        let slot = self.slots.entry(entry.slot_key()).or_default();
        let layer = if entry.map.input.modifier_layer {
            &mut slot.modified
        } else {
            &mut slot.base
        };
        if !layer.is_empty() {
            debug!(
                "Binding {} shares its physical input with {} other binding(s) on the same layer",
                entry.map.input,
                layer.len()
            );
        }
        layer.push(id);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[BindingEntry] {
        &self.entries
    }

    pub fn get(&self, id: BindingId) -> Option<&BindingEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn action_count(&self) -> usize {
        self.action_count
    }

    pub fn slot(&self, key: &SlotKey) -> Option<&LayerSlot> {
        self.slots.get(key)
    }

    /// Basis-Binding, für dessen physischen Eingang auch ein Modifier-Binding
    /// existiert.
    pub fn has_modified_counterpart(&self, id: BindingId) -> bool {
        self.entries
            .get(id)
            .filter(|e| !e.map.input.modifier_layer)
            .and_then(|e| self.slots.get(&e.slot_key()))
            .map(|slot| !slot.modified.is_empty())
            .unwrap_or(false)
    }

    /// Prüft vor dem Start, ob das Ausgabe-Backend jede konfigurierte Taste
    /// senden kann.
    pub fn check_keys(&self, supported: impl Fn(KeyName) -> bool) -> Result<(), BindingError> {
        let actions = self.entries.iter().flat_map(|e| e.map.outputs.iter());
        for action in actions {
            let ActionKind::Key { combo } = &action.kind else {
                continue;
            };
            if let Some(key) = combo.keys().iter().find(|k| !supported(**k)) {
                return Err(BindingError::UnsupportedKey {
                    expr: action.value.clone(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}
