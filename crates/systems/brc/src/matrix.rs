//! Shared select lines
//!
//! The coprocessor's P1 port drives eight lines that are, at the same time,
//! the keypad column strobes, the display grid enables and the indicator
//! lamp commons:
//!
//! ```text
//! P1 bit  0  1  2  3  4  5  6  7
//! column  H  G  F  E  D  C  B  A
//! grid    0  1  2  3  4  5  6  7
//! ```
//!
//! A set bit asserts the line. There is exactly one register here; the
//! keypad view and the display view are both pure functions of it, so the
//! two can never disagree about what is selected.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

use crate::keypad::{Keypad, COLUMNS};

/// Row vector returned when no key is seen (active low, 4 bits)
pub const ROWS_IDLE: u8 = 0x0F;

/// Iterate over the line indices asserted in a select value
pub fn asserted_lines(select: u8) -> impl Iterator<Item = usize> {
    (0..COLUMNS).filter(move |&line| select & (1 << line) != 0)
}

/// Keypad view: active-low row vector for whatever columns `select` strobes
pub fn rows_for(select: u8, keypad: &Keypad) -> u8 {
    let held = asserted_lines(select).fold(0u8, |acc, column| acc | keypad.column(column));
    !held & ROWS_IDLE
}

/// Display view: mask of grids enabled by `select`
pub fn grids_for(select: u8) -> u8 {
    select
}

/// The select register and its two readers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixFabric {
    select: u8,
}

impl MatrixFabric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.select = 0;
    }

    /// Latch a new P1 value
    pub fn write_select(&mut self, value: u8) {
        if value != self.select {
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!("Matrix: select {:02X} -> {:02X}", self.select, value)
            });
        }
        if value == 0 {
            log(LogCategory::Bus, LogLevel::Trace, || {
                "Matrix: no column or grid selected".to_string()
            });
        }
        self.select = value;
    }

    pub fn select(&self) -> u8 {
        self.select
    }

    /// Active-low row vector (4 bits) for the currently strobed columns
    pub fn read_rows(&self, keypad: &Keypad) -> u8 {
        rows_for(self.select, keypad)
    }

    /// Grids currently enabled
    pub fn grids(&self) -> u8 {
        grids_for(self.select)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypad::Key;

    #[test]
    fn test_no_keys_reads_idle() {
        let mut fabric = MatrixFabric::new();
        let keypad = Keypad::new();
        for select in [0x00, 0x01, 0x80, 0xFF] {
            fabric.write_select(select);
            assert_eq!(fabric.read_rows(&keypad), ROWS_IDLE);
        }
    }

    #[test]
    fn test_unselected_column_is_invisible() {
        let mut fabric = MatrixFabric::new();
        let mut keypad = Keypad::new();
        keypad.set_key(Key::Enter, true); // column 4, row 0

        fabric.write_select(0x00);
        assert_eq!(fabric.read_rows(&keypad), ROWS_IDLE);

        fabric.write_select(0x08);
        assert_eq!(fabric.read_rows(&keypad), ROWS_IDLE);

        fabric.write_select(0x10);
        assert_eq!(fabric.read_rows(&keypad), 0x0E);
    }

    #[test]
    fn test_multiple_columns_are_ored() {
        let mut fabric = MatrixFabric::new();
        let mut keypad = Keypad::new();
        keypad.set_key(Key::Ace, true); // column 0, row 0
        keypad.set_key(Key::Clubs, true); // column 7, row 3

        fabric.write_select(0x81);
        assert_eq!(fabric.read_rows(&keypad), 0x06);

        fabric.write_select(0x80);
        assert_eq!(fabric.read_rows(&keypad), 0x07);
    }

    #[test]
    fn test_reading_rows_does_not_touch_select() {
        let mut fabric = MatrixFabric::new();
        let keypad = Keypad::new();
        fabric.write_select(0x24);
        fabric.read_rows(&keypad);
        assert_eq!(fabric.select(), 0x24);
        assert_eq!(fabric.grids(), 0x24);
    }

    #[test]
    fn test_asserted_lines() {
        let lines: Vec<usize> = asserted_lines(0b1000_0101).collect();
        assert_eq!(lines, vec![0, 2, 7]);
        assert_eq!(asserted_lines(0).count(), 0);
    }
}
