//! UPI-41 data bus buffer
//!
//! The main unit has no I/O of its own; everything goes through the 8041's
//! host interface at ports 00/01 (A0 selects data or status). One byte
//! travels each way:
//!
//! - host write: byte lands in the input buffer, IBF set, F1 = A0
//! - coprocessor read of the input buffer: IBF cleared
//! - coprocessor write of the output buffer: OBF set
//! - host read of data: OBF cleared
//!
//! Status register: bit 0 OBF, bit 1 IBF, bit 2 F0, bit 3 F1, bits 4..=7
//! written by the coprocessor.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

pub const STATUS_OBF: u8 = 0x01;
pub const STATUS_IBF: u8 = 0x02;
pub const STATUS_F0: u8 = 0x04;
pub const STATUS_F1: u8 = 0x08;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    input: u8,
    output: u8,
    obf: bool,
    ibf: bool,
    f0: bool,
    f1: bool,
    user_status: u8,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn status(&self) -> u8 {
        let mut status = self.user_status & 0xF0;
        if self.obf {
            status |= STATUS_OBF;
        }
        if self.ibf {
            status |= STATUS_IBF;
        }
        if self.f0 {
            status |= STATUS_F0;
        }
        if self.f1 {
            status |= STATUS_F1;
        }
        status
    }

    /// Main unit read; `a0` selects status (1) or data (0)
    pub fn host_read(&mut self, a0: bool) -> u8 {
        if a0 {
            return self.status();
        }
        if !self.obf {
            log(LogCategory::Sync, LogLevel::Trace, || {
                "Mailbox: host read with empty output buffer".to_string()
            });
        }
        self.obf = false;
        self.output
    }

    /// Main unit write; `a0` = 1 marks a command byte
    pub fn host_write(&mut self, a0: bool, value: u8) {
        if self.ibf {
            log(LogCategory::Sync, LogLevel::Debug, || {
                format!(
                    "Mailbox: host overwrote unread {:02X} with {:02X}",
                    self.input, value
                )
            });
        }
        self.input = value;
        self.ibf = true;
        self.f1 = a0;
    }

    /// Coprocessor `IN A,DBB`
    pub fn dbb_read(&mut self) -> u8 {
        self.ibf = false;
        self.input
    }

    /// Coprocessor `OUT DBB,A`
    pub fn dbb_write(&mut self, value: u8) {
        self.output = value;
        self.obf = true;
    }

    /// Coprocessor `MOV STS,A` (only the upper nibble is writable)
    pub fn sts_write(&mut self, value: u8) {
        self.user_status = value & 0xF0;
    }

    pub fn set_f0(&mut self, state: bool) {
        self.f0 = state;
    }

    pub fn ibf(&self) -> bool {
        self.ibf
    }

    pub fn obf(&self) -> bool {
        self.obf
    }
}
