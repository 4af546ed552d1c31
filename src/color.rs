//! C5: stable color-pair assignment for visual disambiguation between targets.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossterm::style::Color;

/// One palette entry: a high-intensity variant for the pod prefix and a
/// normal-intensity variant of the same hue for the container prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPair {
    pub pod: Color,
    pub container: Color,
}

const PALETTE: [ColorPair; 6] = [
    ColorPair {
        pod: Color::DarkCyan,
        container: Color::Cyan,
    },
    ColorPair {
        pod: Color::DarkGreen,
        container: Color::Green,
    },
    ColorPair {
        pod: Color::DarkMagenta,
        container: Color::Magenta,
    },
    ColorPair {
        pod: Color::DarkYellow,
        container: Color::Yellow,
    },
    ColorPair {
        pod: Color::DarkBlue,
        container: Color::Blue,
    },
    ColorPair {
        pod: Color::DarkRed,
        container: Color::Red,
    },
];

/// Hands out [`ColorPair`]s from a fixed six-entry palette in round-robin
/// order. An assigner owns its own counter, so tests can create independent
/// instances instead of relying on hidden process-wide state.
#[derive(Debug, Default)]
pub struct ColorAssigner {
    counter: AtomicUsize,
}

impl ColorAssigner {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    /// Returns the next color pair and advances the counter. Safe to call
    /// concurrently: the fetch-and-add guarantees no two callers ever read
    /// the same index.
    pub fn assign(&self) -> ColorPair {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % PALETTE.len();
        PALETTE[index]
    }
}
