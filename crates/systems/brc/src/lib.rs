//! Fidelity card computers (Bridge Challenger family)
//!
//! These machines pair a Z80 main unit with an 8041 coprocessor that owns
//! all of the I/O:
//!
//! - a card reader: an optical sensor on T0 sees the barcode printed on each
//!   card as it is swiped
//! - an 8x4 keypad and an 8 digit, 14 segment display with 8 indicator
//!   lamps, all multiplexed over the same eight P1 select lines
//! - an 8243 expander whose four nibble ports carry the segment data
//! - on speech models, an S14001A that holds the Z80 on WAIT while it
//!   speaks
//!
//! The processors themselves are supplied by the caller through
//! `emu_core::Cpu` and reach the hardware here through `emu_core::Bus`.

pub mod barcode;
pub mod bus;
pub mod card;
pub mod config;
pub mod display;
pub mod expander;
pub mod keypad;
pub mod mailbox;
pub mod matrix;
pub mod scheduler;
pub mod sync;
pub mod system;

use thiserror::Error;

pub use bus::{CardIo, MainBus, McuBus, McuPort};
pub use card::{Card, CardCode, Rank, Suit};
pub use config::{MachineConfig, Model};
pub use display::{DisplayFrame, NibblePort, SegmentWord};
pub use keypad::Key;
pub use system::{BrcSystem, FixedPlayback, PlaybackTimer};

/// Card computer errors
#[derive(Debug, Error)]
pub enum BrcError {
    #[error("Invalid card code {0:#04x} (must be 0..=127)")]
    InvalidCardCode(u8),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown coprocessor port {0:#04x}")]
    UnknownPort(u8),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
