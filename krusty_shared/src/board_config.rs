//! Board abstraction and pin mapping (shared)
//!
//! Resolves Raspberry Pi header positions such as `P1_11` into the BCM GPIO
//! numbers that address the memory-mapped GPIO block.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hardware_traits::PinId;

/// Board revision; the two revisions wire a few P1 header pins differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardRevision {
    V1,
    #[default]
    V2,
}

// (header pin, gpio) for the 2x13 P1 header, revision 1
const P1_V1: &[(&str, u32)] = &[
    ("P1_03", 0),
    ("P1_05", 1),
    ("P1_07", 4),
    ("P1_08", 14),
    ("P1_10", 15),
    ("P1_11", 17),
    ("P1_12", 18),
    ("P1_13", 21),
    ("P1_15", 22),
    ("P1_16", 23),
    ("P1_18", 24),
    ("P1_19", 10),
    ("P1_21", 9),
    ("P1_22", 25),
    ("P1_23", 11),
    ("P1_24", 8),
    ("P1_26", 7),
];

// revision 2 renumbers P1_03, P1_05, P1_13 and adds the P5 header
const P1_V2: &[(&str, u32)] = &[
    ("P1_03", 2),
    ("P1_05", 3),
    ("P1_07", 4),
    ("P1_08", 14),
    ("P1_10", 15),
    ("P1_11", 17),
    ("P1_12", 18),
    ("P1_13", 27),
    ("P1_15", 22),
    ("P1_16", 23),
    ("P1_18", 24),
    ("P1_19", 10),
    ("P1_21", 9),
    ("P1_22", 25),
    ("P1_23", 11),
    ("P1_24", 8),
    ("P1_26", 7),
    ("P5_03", 28),
    ("P5_04", 29),
    ("P5_05", 30),
    ("P5_06", 31),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardTiming {
    /// Shortest STEP high or low time the driver IC accepts.
    pub min_pulse_width: Duration,
}

impl Default for BoardTiming {
    fn default() -> Self {
        // A4988: STEP must stay low, then high, for at least 1us each
        Self {
            min_pulse_width: Duration::from_micros(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardConfig {
    pub revision: BoardRevision,
    pub timing: BoardTiming,
}

impl BoardConfig {
    pub fn new(revision: BoardRevision) -> Self {
        Self {
            revision,
            timing: BoardTiming::default(),
        }
    }

    fn header(&self) -> &'static [(&'static str, u32)] {
        match self.revision {
            BoardRevision::V1 => P1_V1,
            BoardRevision::V2 => P1_V2,
        }
    }

    /// Resolve a pin name into a `PinId`.
    ///
    /// Accepts header positions (`P1_11`, case-insensitive) and raw GPIO
    /// numbers (`gpio17` or `17`). Returns `None` for names this board
    /// revision does not expose.
    pub fn resolve_pin(&self, name: &str) -> Option<PinId> {
        let name = name.trim();
        let upper = name.to_ascii_uppercase();
        if let Some(&(_, gpio)) = self.header().iter().find(|(header, _)| *header == upper) {
            return Some(PinId(gpio));
        }
        let digits = upper.strip_prefix("GPIO").unwrap_or(upper.as_str());
        let gpio: u32 = digits.parse().ok()?;
        self.header()
            .iter()
            .any(|&(_, g)| g == gpio)
            .then_some(PinId(gpio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_header_names_by_revision() {
        let v1 = BoardConfig::new(BoardRevision::V1);
        let v2 = BoardConfig::new(BoardRevision::V2);
        assert_eq!(v1.resolve_pin("P1_03"), Some(PinId(0)));
        assert_eq!(v2.resolve_pin("P1_03"), Some(PinId(2)));
        assert_eq!(v1.resolve_pin("p1_13"), Some(PinId(21)));
        assert_eq!(v2.resolve_pin("P1_13"), Some(PinId(27)));
        assert_eq!(v1.resolve_pin("P5_03"), None);
        assert_eq!(v2.resolve_pin("P5_03"), Some(PinId(28)));
    }

    #[test]
    fn test_resolve_raw_gpio_numbers() {
        let board = BoardConfig::default();
        assert_eq!(board.resolve_pin("gpio17"), Some(PinId(17)));
        assert_eq!(board.resolve_pin("22"), Some(PinId(22)));
        assert_eq!(board.resolve_pin("gpio5"), None);
        assert_eq!(board.resolve_pin("bogus"), None);
    }
}
