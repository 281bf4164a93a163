//! 8243 I/O expander
//!
//! The expander hangs off the coprocessor's P2 bits 0..=3 and PROG pin and
//! provides the four 4-bit ports P4..=P7 that carry segment data. A transfer
//! takes one PROG pulse:
//!
//! - PROG falling edge: P2 bits 3..=2 hold the opcode, bits 1..=0 the port
//! - PROG rising edge: P2 bits 3..=0 hold the data (write, OR, AND)
//!
//! ```text
//! opcode  00 read   01 write   10 OR   11 AND
//! ```
//!
//! For a read, the expander drives the port's value onto P2 while PROG is
//! low. The port latches themselves are the fields of the display's
//! segment register, so every modification lands through
//! `DisplayBuffer::latch_nibble` and only ever touches one field.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

use crate::display::{DisplayBuffer, NibblePort};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpanderOp {
    Read,
    Write,
    Or,
    And,
}

impl ExpanderOp {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => ExpanderOp::Read,
            1 => ExpanderOp::Write,
            2 => ExpanderOp::Or,
            _ => ExpanderOp::And,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expander {
    /// PROG pin level
    prog: bool,
    /// Operation latched on the last PROG falling edge
    pending: Option<(ExpanderOp, NibblePort)>,
    /// Low nibble last written to P2 by the coprocessor
    p2: u8,
    /// Value driven back onto P2 during a read
    read_data: Option<u8>,
}

impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

impl Expander {
    pub fn new() -> Self {
        Self {
            prog: true,
            pending: None,
            p2: 0x0F,
            read_data: None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Coprocessor write to P2 (only bits 0..=3 reach the expander)
    pub fn p2_w(&mut self, value: u8) {
        self.p2 = value & 0x0F;
    }

    /// Low nibble of P2 as seen by the coprocessor
    pub fn p2_r(&self) -> u8 {
        self.read_data.unwrap_or(self.p2) & 0x0F
    }

    /// Drive the PROG pin; returns the port modified on a rising edge
    pub fn prog_w(&mut self, level: bool, display: &mut DisplayBuffer) -> Option<NibblePort> {
        let was = self.prog;
        self.prog = level;

        if was && !level {
            let op = ExpanderOp::from_bits(self.p2 >> 2);
            let port = NibblePort::from_index((self.p2 & 0x03) as usize)?;
            self.pending = Some((op, port));
            if op == ExpanderOp::Read {
                self.read_data = Some(display.nibble(port));
            }
            return None;
        }

        if !was && level {
            self.read_data = None;
            let (op, port) = self.pending.take()?;
            let current = display.nibble(port);
            let value = match op {
                ExpanderOp::Read => return None,
                ExpanderOp::Write => self.p2,
                ExpanderOp::Or => current | self.p2,
                ExpanderOp::And => current & self.p2,
            };
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!("8243: {:?} {:?} {:X} -> {:X}", op, port, current, value)
            });
            display.latch_nibble(port, value);
            return Some(port);
        }

        None
    }
}
