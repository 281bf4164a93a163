//! Multiplexed display and indicator lamps
//!
//! The panel has an 8 digit, 14 segment VFD (the same tube as the Speak &
//! Spell) and 8 indicator LEDs. Only the grids selected on P1 light at any
//! moment; the coprocessor walks through them fast enough that the eye sees
//! a steady picture. We reproduce that with a per-grid record of the last
//! segment word latched into it and the display tick it happened on. A grid
//! that has not been refreshed for `window` ticks reads as blank, so a
//! halted coprocessor eventually leaves a dark panel instead of a frozen
//! one.
//!
//! # Segment register
//!
//! Segment data arrives 4 bits at a time from the 8243 expander ports:
//!
//! ```text
//! port  bits    .0         .1     .2   .3
//! P4    0..=3   M          L      N    E
//! P5    4..=7   D          I      K    J
//! P6    8..=11  A          B      F    G
//! P7   12..=15  LED enable (tone) C    H
//! ```
//!
//! Digit layout:
//!
//! ```text
//!        A
//!   ***********
//!  * *I  *J K* *
//! F*  *  *  *  *B
//!  *   * * *   *
//!   G**** *****H
//!  *   * * *   *
//! E*  *  *  *  *C
//!  * *N  *M L* *
//!   ***********
//!        D
//! ```
//!
//! P7.0 gates the indicator LED sharing the grid line. P7.1 is the tone
//! output on models without speech.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::matrix::asserted_lines;

pub const GRIDS: usize = 8;

/// Value reported for a grid that is dark
pub const BLANK: u16 = 0;

/// Bit of the segment word that enables the grid's LED
pub const LAMP_ENABLE: u16 = 1 << 12;

/// Bit of the segment word that drives the tone output
pub const TONE: u16 = 1 << 13;

/// The four expander ports carrying segment data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NibblePort {
    P4,
    P5,
    P6,
    P7,
}

impl NibblePort {
    pub const ALL: [NibblePort; 4] = [NibblePort::P4, NibblePort::P5, NibblePort::P6, NibblePort::P7];

    /// Position of this port's field in the segment register
    pub const fn index(self) -> usize {
        match self {
            NibblePort::P4 => 0,
            NibblePort::P5 => 1,
            NibblePort::P6 => 2,
            NibblePort::P7 => 3,
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(NibblePort::P4),
            1 => Some(NibblePort::P5),
            2 => Some(NibblePort::P6),
            3 => Some(NibblePort::P7),
            _ => None,
        }
    }

    const fn shift(self) -> u32 {
        4 * self.index() as u32
    }
}

/// Segments of one 14 segment digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
}

impl Segment {
    pub const ALL: [Segment; 14] = [
        Segment::A,
        Segment::B,
        Segment::C,
        Segment::D,
        Segment::E,
        Segment::F,
        Segment::G,
        Segment::H,
        Segment::I,
        Segment::J,
        Segment::K,
        Segment::L,
        Segment::M,
        Segment::N,
    ];

    /// Bit of the raw segment word wired to this segment
    pub const fn raw_bit(self) -> u16 {
        match self {
            Segment::M => 0,
            Segment::L => 1,
            Segment::N => 2,
            Segment::E => 3,
            Segment::D => 4,
            Segment::I => 5,
            Segment::K => 6,
            Segment::J => 7,
            Segment::A => 8,
            Segment::B => 9,
            Segment::F => 10,
            Segment::G => 11,
            Segment::C => 14,
            Segment::H => 15,
        }
    }
}

/// Raw 16-bit word latched into a grid, as wired on the board
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentWord(pub u16);

impl SegmentWord {
    pub fn is_lit(self, segment: Segment) -> bool {
        self.0 & (1 << segment.raw_bit()) != 0
    }

    /// Segments in A..=N order (bit 0 = A), for renderers
    pub fn segment_mask(self) -> u16 {
        Segment::ALL
            .iter()
            .enumerate()
            .filter(|&(_, &segment)| self.is_lit(segment))
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }

    pub fn lamp(self) -> bool {
        self.0 & LAMP_ENABLE != 0
    }
}

/// Last refresh of one grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRecord {
    pub segments: u16,
    /// Display tick of the last commit; `None` if never refreshed
    pub refreshed_at: Option<u64>,
}

/// One rendered picture of the panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFrame {
    pub grids: [u16; GRIDS],
}

impl DisplayFrame {
    pub fn digit(&self, grid: usize) -> SegmentWord {
        SegmentWord(self.grids.get(grid).copied().unwrap_or(BLANK))
    }

    /// Indicator LEDs, bit n = LED on grid n
    pub fn lamps(&self) -> u8 {
        self.grids
            .iter()
            .enumerate()
            .filter(|&(_, &word)| word & LAMP_ENABLE != 0)
            .fold(0, |mask, (grid, _)| mask | (1 << grid))
    }

    pub fn is_blank(&self) -> bool {
        self.grids.iter().all(|&word| word == BLANK)
    }
}

impl Index<usize> for DisplayFrame {
    type Output = u16;

    fn index(&self, grid: usize) -> &u16 {
        &self.grids[grid]
    }
}

/// Segment register plus the per-grid persistence records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayBuffer {
    /// Segment data being assembled for the current grid
    register: u16,
    grids: [GridRecord; GRIDS],
    /// Display ticks since power-on
    now: u64,
    /// Ticks a grid stays visible after its last refresh
    window: u64,
}

impl DisplayBuffer {
    pub fn new(window: u64) -> Self {
        Self {
            register: 0,
            grids: [GridRecord::default(); GRIDS],
            now: 0,
            window: window.max(1),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.window);
    }

    /// Merge a 4-bit value into the field owned by `port`
    pub fn latch_nibble(&mut self, port: NibblePort, value: u8) {
        let shift = port.shift();
        let field = 0xF << shift;
        self.register = (self.register & !field) | ((u16::from(value) & 0xF) << shift);
    }

    /// Current value of one port's field
    pub fn nibble(&self, port: NibblePort) -> u8 {
        ((self.register >> port.shift()) & 0xF) as u8
    }

    pub fn register(&self) -> u16 {
        self.register
    }

    /// Latch the segment register into every grid enabled by `select`
    pub fn commit(&mut self, select: u8) {
        let (register, now) = (self.register, self.now);
        for grid in asserted_lines(select) {
            let previous = self.grids[grid].segments;
            if previous != register {
                log(LogCategory::Display, LogLevel::Trace, || {
                    format!(
                        "Display: grid {} {:04X} -> {:04X} at tick {}",
                        grid, previous, register, now
                    )
                });
            }
            self.grids[grid] = GridRecord {
                segments: register,
                refreshed_at: Some(now),
            };
        }
    }

    /// Advance the display clock by one tick
    pub fn tick(&mut self) {
        self.now += 1;
        let stale_edge = self.now.checked_sub(self.window);
        if let Some(edge) = stale_edge {
            for (grid, record) in self.grids.iter().enumerate() {
                if record.refreshed_at == Some(edge) && record.segments != BLANK {
                    log(LogCategory::Display, LogLevel::Debug, || {
                        format!("Display: grid {} decayed at tick {}", grid, self.now)
                    });
                }
            }
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    pub fn grid(&self, grid: usize) -> Option<&GridRecord> {
        self.grids.get(grid)
    }

    fn is_visible(&self, record: &GridRecord) -> bool {
        record
            .refreshed_at
            .map_or(false, |at| self.now.saturating_sub(at) < self.window)
    }

    /// Picture of the panel as of the current tick; no side effects
    pub fn render_frame(&self) -> DisplayFrame {
        let mut frame = DisplayFrame::default();
        for (out, record) in frame.grids.iter_mut().zip(self.grids.iter()) {
            if self.is_visible(record) {
                *out = record.segments;
            }
        }
        frame
    }
}
