//! Core emulator primitives and traits.
//!
//! Processors are treated as external components: a system only needs to
//! reset them, step them and let them reach their peripherals through a
//! [`Bus`]. Everything that is specific to one machine lives in its own
//! system crate.

pub mod logging;

use serde_json::Value;

/// A CPU-like component that can be stepped; returns cycles consumed.
pub trait Cpu {
    fn reset(&mut self);
    fn step(&mut self) -> u32;
}

/// Peripheral interface seen by a processor.
///
/// Memory accesses use the full 16-bit address space; port accesses use
/// the processor's separate 8-bit I/O space. Unmapped reads float high.
pub trait Bus {
    /// Read a byte from memory
    fn read(&self, addr: u16) -> u8 {
        let _ = addr;
        0xFF
    }

    /// Write a byte to memory
    fn write(&mut self, addr: u16, val: u8) {
        let _ = (addr, val);
    }

    /// Read from I/O port
    fn io_read(&mut self, port: u8) -> u8 {
        let _ = port;
        0xFF
    }

    /// Write to I/O port
    fn io_write(&mut self, port: u8, val: u8) {
        let _ = (port, val);
    }
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whatever the system presents to a renderer once per frame
    type Frame;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate one host frame and return the produced output.
    fn step_frame(&mut self) -> Result<Self::Frame, Self::Error>;

    /// Return a JSON-serializable save state.
    /// Save states hold emulator state only, never ROM contents.
    fn save_state(&self) -> Value;

    /// Load a JSON save state.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false
    }
}
