//! Processor-facing buses
//!
//! Both processors reach the I/O core through `emu_core::Bus`. The core
//! itself lives in one `CardIo` shared behind `Rc<RefCell<_>>`, so the two
//! bus views and the system see the same select register, segment register
//! and stall state.
//!
//! Coprocessor (8041) port map:
//!
//! ```text
//! 0x01        P1     select lines (keypad columns, display grids)
//! 0x02        P2     bits 0..=3 expander bus, bits 4..=7 keypad rows (in)
//! 0x04..=0x07 P4..P7 expander ports, direct (MOVD/ANLD/ORLD)
//! 0x10        T0     card sensor, 1 = bright
//! 0x11        T1     master clock / 4, inverted
//! 0x12        PROG   expander strobe (bit 0 = level)
//! 0x20        DBB    host data buffer
//! 0x21        STS    status register (upper nibble writable)
//! 0x22        F0     status flag F0 (bit 0)
//! ```
//!
//! Main unit (Z80): memory writes to E000..=FFFF speak word `data & 0x3F`
//! on speech models; memory reads there return the speech busy line in bit
//! 0. I/O ports decode A0 only: data (A0 = 0) and status/command (A0 = 1)
//! of the coprocessor mailbox.

use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::Bus;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use crate::barcode::BarcodeScanner;
use crate::config::Model;
use crate::display::{DisplayBuffer, NibblePort};
use crate::expander::Expander;
use crate::keypad::Keypad;
use crate::mailbox::Mailbox;
use crate::matrix::MatrixFabric;
use crate::sync::{StallSource, SyncController};
use crate::BrcError;

/// Start of the speech chip window in the main unit's address space
pub const SPEECH_BASE: u16 = 0xE000;

/// Tone output bit within expander port P7
const P7_TONE: u8 = 0x02;

/// Decoded coprocessor port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McuPort {
    P1,
    P2,
    Expander(NibblePort),
    T0,
    T1,
    Prog,
    Dbb,
    Sts,
    F0,
}

impl TryFrom<u8> for McuPort {
    type Error = BrcError;

    fn try_from(port: u8) -> Result<Self, Self::Error> {
        Ok(match port {
            0x01 => McuPort::P1,
            0x02 => McuPort::P2,
            0x04..=0x07 => match NibblePort::from_index(usize::from(port - 0x04)) {
                Some(nibble) => McuPort::Expander(nibble),
                None => return Err(BrcError::UnknownPort(port)),
            },
            0x10 => McuPort::T0,
            0x11 => McuPort::T1,
            0x12 => McuPort::Prog,
            0x20 => McuPort::Dbb,
            0x21 => McuPort::Sts,
            0x22 => McuPort::F0,
            _ => return Err(BrcError::UnknownPort(port)),
        })
    }
}

impl McuPort {
    pub fn address(self) -> u8 {
        match self {
            McuPort::P1 => 0x01,
            McuPort::P2 => 0x02,
            McuPort::Expander(nibble) => 0x04 + nibble.index() as u8,
            McuPort::T0 => 0x10,
            McuPort::T1 => 0x11,
            McuPort::Prog => 0x12,
            McuPort::Dbb => 0x20,
            McuPort::Sts => 0x21,
            McuPort::F0 => 0x22,
        }
    }
}

/// All peripheral state shared by the two processors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardIo {
    pub model: Model,
    pub scanner: BarcodeScanner,
    pub fabric: MatrixFabric,
    pub display: DisplayBuffer,
    pub expander: Expander,
    pub mailbox: Mailbox,
    pub sync: SyncController,
    pub keypad: Keypad,
    /// One-bit tone output (non-speech models)
    speaker: bool,
    /// Master clock time of the access being serviced
    now: u64,
    /// Word accepted by the speech unit, waiting for the system to time it
    playback: Option<u8>,
}

impl CardIo {
    pub fn new(model: Model, decay_window: u64) -> Self {
        Self {
            model,
            scanner: BarcodeScanner::new(),
            fabric: MatrixFabric::new(),
            display: DisplayBuffer::new(decay_window),
            expander: Expander::new(),
            mailbox: Mailbox::new(),
            sync: SyncController::new(),
            keypad: Keypad::new(),
            speaker: false,
            now: 0,
            playback: None,
        }
    }

    pub fn reset(&mut self) {
        self.scanner.reset();
        self.fabric.reset();
        self.display.reset();
        self.expander.reset();
        self.mailbox.reset();
        self.sync.reset();
        self.keypad.release_all();
        self.speaker = false;
        self.now = 0;
        self.playback = None;
    }

    pub fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    pub fn speaker_level(&self) -> bool {
        self.speaker
    }

    /// Take the pending speech word, if the main unit just issued one
    pub fn take_playback_request(&mut self) -> Option<u8> {
        self.playback.take()
    }

    /// A playback write from the main unit
    pub fn speak(&mut self, word: u8) {
        if self.sync.begin_playback(StallSource::Speech) {
            log(LogCategory::Sync, LogLevel::Debug, || {
                format!("Speech: word {:02X}", word)
            });
            self.playback = Some(word);
        }
    }

    /// Speech busy line as seen by the main unit
    pub fn speech_busy(&self) -> bool {
        self.sync.is_stalled()
    }

    /// Master clock / 4, inverted: high for 2 cycles then low for 2
    fn t1(&self) -> bool {
        (self.now / 2) & 1 == 0
    }

    fn write_select(&mut self, value: u8) {
        self.fabric.write_select(value);
        self.display.commit(self.fabric.select());
    }

    fn nibble_written(&mut self, port: NibblePort) {
        self.display.commit(self.fabric.select());
        if port == NibblePort::P7 && !self.model.has_speech() {
            self.speaker = self.display.nibble(NibblePort::P7) & P7_TONE != 0;
        }
    }

    pub fn mcu_read(&mut self, port: McuPort) -> u8 {
        match port {
            McuPort::P1 => self.fabric.select(),
            McuPort::P2 => self.expander.p2_r() | (self.fabric.read_rows(&self.keypad) << 4),
            McuPort::Expander(nibble) => self.display.nibble(nibble),
            McuPort::T0 => u8::from(self.scanner.sense()),
            McuPort::T1 => u8::from(self.t1()),
            McuPort::Prog => 0xFF,
            McuPort::Dbb => self.mailbox.dbb_read(),
            McuPort::Sts => self.mailbox.status(),
            McuPort::F0 => u8::from(self.mailbox.status() & crate::mailbox::STATUS_F0 != 0),
        }
    }

    pub fn mcu_write(&mut self, port: McuPort, value: u8) {
        match port {
            McuPort::P1 => self.write_select(value),
            McuPort::P2 => self.expander.p2_w(value),
            McuPort::Expander(nibble) => {
                self.display.latch_nibble(nibble, value);
                self.nibble_written(nibble);
            }
            McuPort::Prog => {
                if let Some(nibble) = self.expander.prog_w(value & 1 != 0, &mut self.display) {
                    self.nibble_written(nibble);
                }
            }
            McuPort::Dbb => self.mailbox.dbb_write(value),
            McuPort::Sts => self.mailbox.sts_write(value),
            McuPort::F0 => self.mailbox.set_f0(value & 1 != 0),
            McuPort::T0 | McuPort::T1 => {
                log(LogCategory::Stubs, LogLevel::Debug, || {
                    format!("MCU: write {:02X} to input pin {:?} ignored", value, port)
                });
            }
        }
    }
}

/// The coprocessor's view of the I/O core
#[derive(Clone)]
pub struct McuBus {
    io: Rc<RefCell<CardIo>>,
}

impl McuBus {
    pub fn new(io: Rc<RefCell<CardIo>>) -> Self {
        Self { io }
    }
}

impl Bus for McuBus {
    fn io_read(&mut self, port: u8) -> u8 {
        match McuPort::try_from(port) {
            Ok(decoded) => self.io.borrow_mut().mcu_read(decoded),
            Err(_) => {
                log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("MCU: read from unmapped port {:02X}", port)
                });
                0xFF
            }
        }
    }

    fn io_write(&mut self, port: u8, val: u8) {
        match McuPort::try_from(port) {
            Ok(decoded) => self.io.borrow_mut().mcu_write(decoded, val),
            Err(_) => {
                log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("MCU: write {:02X} to unmapped port {:02X}", val, port)
                });
            }
        }
    }
}

/// The main unit's view of the I/O core
#[derive(Clone)]
pub struct MainBus {
    io: Rc<RefCell<CardIo>>,
}

impl MainBus {
    pub fn new(io: Rc<RefCell<CardIo>>) -> Self {
        Self { io }
    }
}

impl Bus for MainBus {
    fn read(&self, addr: u16) -> u8 {
        if addr >= SPEECH_BASE {
            let io = self.io.borrow();
            if io.model.has_speech() {
                return 0xFE | u8::from(io.speech_busy());
            }
        }
        log(LogCategory::Stubs, LogLevel::Trace, || {
            format!("Main: read from unmapped address {:04X}", addr)
        });
        0xFF
    }

    fn write(&mut self, addr: u16, val: u8) {
        if addr >= SPEECH_BASE {
            let mut io = self.io.borrow_mut();
            if io.model.has_speech() {
                io.speak(val & 0x3F);
                return;
            }
        }
        log(LogCategory::Stubs, LogLevel::Trace, || {
            format!("Main: write {:02X} to unmapped address {:04X}", val, addr)
        });
    }

    fn io_read(&mut self, port: u8) -> u8 {
        self.io.borrow_mut().mailbox.host_read(port & 1 != 0)
    }

    fn io_write(&mut self, port: u8, val: u8) {
        self.io.borrow_mut().mailbox.host_write(port & 1 != 0, val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardCode;
    use crate::keypad::Key;

    fn shared(model: Model) -> (Rc<RefCell<CardIo>>, McuBus, MainBus) {
        let io = Rc::new(RefCell::new(CardIo::new(model, 20)));
        let mcu = McuBus::new(Rc::clone(&io));
        let main = MainBus::new(Rc::clone(&io));
        (io, mcu, main)
    }

    #[test]
    fn test_port_decode() {
        for port in [0x01, 0x02, 0x04, 0x05, 0x06, 0x07, 0x10, 0x11, 0x12, 0x20, 0x21, 0x22] {
            let decoded = McuPort::try_from(port).unwrap();
            assert_eq!(decoded.address(), port);
        }
        assert!(matches!(
            McuPort::try_from(0x03),
            Err(BrcError::UnknownPort(0x03))
        ));
    }

    #[test]
    fn test_p2_combines_expander_and_rows() {
        let (io, mut mcu, _) = shared(Model::Vbrc);
        io.borrow_mut().keypad.set_key(Key::Enter, true); // column 4, row 0

        mcu.io_write(0x02, 0x05);
        mcu.io_write(0x01, 0x10);
        assert_eq!(mcu.io_read(0x02), 0xE5);

        mcu.io_write(0x01, 0x01);
        assert_eq!(mcu.io_read(0x02), 0xF5);
    }

    #[test]
    fn test_select_and_nibbles_commit_grid() {
        let (io, mut mcu, _) = shared(Model::Vbrc);
        mcu.io_write(0x01, 0x04);
        for (port, value) in [(0x04, 0xA), (0x05, 0xB), (0x06, 0xC), (0x07, 0xD)] {
            mcu.io_write(port, value);
        }
        let frame = io.borrow().display.render_frame();
        assert_eq!(frame[2], 0xDCBA);
        assert_eq!(mcu.io_read(0x06), 0xC);
    }

    #[test]
    fn test_prog_path_commits_grid() {
        let (io, mut mcu, _) = shared(Model::Vbrc);
        mcu.io_write(0x01, 0x80);
        // write 0x9 to P6
        mcu.io_write(0x02, 0b01_10);
        mcu.io_write(0x12, 0);
        mcu.io_write(0x02, 0x9);
        mcu.io_write(0x12, 1);
        assert_eq!(io.borrow().display.render_frame()[7], 0x0900);
    }

    #[test]
    fn test_t0_follows_sensor() {
        let (io, mut mcu, _) = shared(Model::Vbrc);
        assert_eq!(mcu.io_read(0x10), 1);
        io.borrow_mut().scanner.start_scan(CardCode::new(0).unwrap());
        io.borrow_mut().scanner.tick(); // first payload half-bit
        // Sync bit 8 is a logical 0: dark first
        assert_eq!(mcu.io_read(0x10), 0);
    }

    #[test]
    fn test_t1_runs_at_quarter_master_clock() {
        let (io, mut mcu, _) = shared(Model::Vbrc);
        let levels: Vec<u8> = (0..12)
            .map(|t| {
                io.borrow_mut().set_time(t);
                mcu.io_read(0x11)
            })
            .collect();
        assert_eq!(levels, vec![1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0]);
    }

    #[test]
    fn test_speech_write_stalls_and_queues_word() {
        let (io, _, mut main) = shared(Model::Vbrc);
        assert_eq!(main.read(0xE000), 0xFE);
        main.write(0xE123, 0xC5);
        assert!(io.borrow().sync.is_stalled());
        assert_eq!(main.read(0xFFFF), 0xFF);
        assert_eq!(io.borrow_mut().take_playback_request(), Some(0x05));
        assert_eq!(io.borrow_mut().take_playback_request(), None);
    }

    #[test]
    fn test_no_speech_model_ignores_speech_window() {
        let (io, _, mut main) = shared(Model::Gin);
        main.write(0xE000, 0x01);
        assert!(!io.borrow().sync.is_stalled());
        assert_eq!(main.read(0xE000), 0xFF);
    }

    #[test]
    fn test_tone_line_on_non_speech_model() {
        let (io, mut mcu, _) = shared(Model::Ubc);
        mcu.io_write(0x07, 0x2);
        assert!(io.borrow().speaker_level());
        mcu.io_write(0x07, 0x1);
        assert!(!io.borrow().speaker_level());

        let (io, mut mcu, _) = shared(Model::Vbrc);
        mcu.io_write(0x07, 0x2);
        assert!(!io.borrow().speaker_level());
    }

    #[test]
    fn test_mailbox_round_trip() {
        let (_, mut mcu, mut main) = shared(Model::Vbrc);
        main.io_write(0x01, 0x80);
        assert_eq!(mcu.io_read(0x21) & 0x0A, 0x0A);
        assert_eq!(mcu.io_read(0x20), 0x80);

        mcu.io_write(0x20, 0x33);
        assert_eq!(main.io_read(0x01) & 0x01, 0x01);
        assert_eq!(main.io_read(0x00), 0x33);
        assert_eq!(main.io_read(0x01) & 0x01, 0x00);
    }

    #[test]
    fn test_unmapped_ports_float_high() {
        let (_, mut mcu, _) = shared(Model::Vbrc);
        assert_eq!(mcu.io_read(0x40), 0xFF);
        mcu.io_write(0x40, 0x00);
    }
}
