//! Fehlerdefinitionen für das Binding-Modul

use thiserror::Error;

/// Fehlertypen beim Parsen und Aufbauen der Bindings.
///
/// Alle Varianten sind fatal: eine Konfiguration mit einem fehlerhaften
/// Binding wird nicht teilweise geladen.
#[derive(Debug, Error)]
pub enum BindingError {
    /// Zeile ohne `=>` Trenner
    #[error("Mapping '{0}' is missing the '=>' separator")]
    MissingSeparator(String),

    /// Ungültiger Eingabeausdruck
    #[error("Invalid input binding '{expr}': {reason}")]
    InvalidInput { expr: String, reason: String },

    /// Ungültiger Ausgabeausdruck
    #[error("Invalid output action '{expr}': {reason}")]
    InvalidOutput { expr: String, reason: String },

    /// Schwellwert außerhalb von [0, 1]
    #[error("Threshold {value} in '{expr}' is outside [0, 1]")]
    ThresholdOutOfRange { expr: String, value: String },

    /// Rampenrate außerhalb von 1..=1000 pro Sekunde
    #[error("{what} {value} in '{expr}' is outside 1..=1000 per second")]
    RateOutOfRange {
        expr: String,
        what: &'static str,
        value: String,
    },

    /// Unbekannter Tastenname in einer Tastenkombination
    #[error("Unknown key '{key}' in '{expr}'")]
    UnknownKey { expr: String, key: String },

    /// Taste, die das gewählte Ausgabe-Backend nicht senden kann
    #[error("Key '{key}' in '{expr}' cannot be sent by the selected output backend")]
    UnsupportedKey { expr: String, key: String },

    /// Eingabe und Ausgabe passen nicht zusammen
    #[error("Output '{output}' cannot be driven by input '{input}': {reason}")]
    Incompatible {
        input: String,
        output: String,
        reason: String,
    },
}

impl BindingError {
    pub(crate) fn input(expr: &str, reason: impl Into<String>) -> Self {
        BindingError::InvalidInput {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn output(expr: &str, reason: impl Into<String>) -> Self {
        BindingError::InvalidOutput {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}
