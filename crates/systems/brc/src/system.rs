//! Card computer system
//!
//! Interleaves the two processors and the event timeline on one master
//! clock. Each unit keeps its own local time; whichever is furthest behind
//! runs next, and due events always go before a processor step at the same
//! time. The main unit is skipped entirely while stalled and resumes at
//! the time the stall was released.

use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::{Cpu, System};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::{CardIo, MainBus, McuBus};
use crate::card::CardCode;
use crate::config::MachineConfig;
use crate::display::DisplayFrame;
use crate::keypad::Key;
use crate::scheduler::{Event, Scheduler};
use crate::BrcError;

/// Supplies how long the speech unit needs for one word
pub trait PlaybackTimer {
    fn playback_us(&mut self, word: u8) -> u64;
}

/// Every word takes the same time
#[derive(Debug, Clone, Copy)]
pub struct FixedPlayback(pub u64);

impl PlaybackTimer for FixedPlayback {
    fn playback_us(&mut self, _word: u8) -> u64 {
        self.0
    }
}

const STATE_VERSION: u64 = 2;

pub struct BrcSystem<M: Cpu, C: Cpu> {
    config: MachineConfig,
    main: M,
    mcu: C,
    io: Rc<RefCell<CardIo>>,
    scheduler: Scheduler,
    /// Master clock
    now: u64,
    main_time: u64,
    mcu_time: u64,
    playback_timer: Option<Box<dyn PlaybackTimer>>,
}

impl<M: Cpu, C: Cpu> BrcSystem<M, C> {
    /// Build the machine; the processors are created around their buses
    pub fn new(
        config: MachineConfig,
        make_main: impl FnOnce(MainBus) -> M,
        make_mcu: impl FnOnce(McuBus) -> C,
    ) -> Result<Self, BrcError> {
        config.validate()?;

        let io = Rc::new(RefCell::new(CardIo::new(
            config.model,
            u64::from(config.decay_window_ticks),
        )));
        let main = make_main(MainBus::new(Rc::clone(&io)));
        let mcu = make_mcu(McuBus::new(Rc::clone(&io)));

        let mut system = Self {
            config,
            main,
            mcu,
            io,
            scheduler: Scheduler::new(),
            now: 0,
            main_time: 0,
            mcu_time: 0,
            playback_timer: None,
        };
        system.schedule_periodic();
        Ok(system)
    }

    pub fn set_playback_timer(&mut self, timer: Box<dyn PlaybackTimer>) {
        self.playback_timer = Some(timer);
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Shared peripheral state
    pub fn io(&self) -> Rc<RefCell<CardIo>> {
        Rc::clone(&self.io)
    }

    pub fn main_cpu(&self) -> &M {
        &self.main
    }

    pub fn mcu(&self) -> &C {
        &self.mcu
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    fn schedule_periodic(&mut self) {
        let shift = self.config.barcode_shift_cycles();
        let tick = self.config.display_tick_cycles();
        self.scheduler.schedule_at(self.now + shift, Event::BarcodeShift);
        self.scheduler.schedule_at(self.now + tick, Event::DisplayTick);
    }

    /// Swipe a card through the reader
    pub fn swipe_card(&mut self, code: CardCode) {
        self.scheduler.schedule_at(self.now, Event::CardSwipe(code));
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        self.scheduler
            .schedule_at(self.now, Event::KeyChange { key, pressed });
    }

    /// Report speech completion (hosts without a `PlaybackTimer`)
    ///
    /// Applies to the stall open at the time of the call; a later stall needs
    /// its own report.
    pub fn speech_done(&mut self) {
        let generation = self.io.borrow().sync.generation();
        self.scheduler
            .schedule_at(self.now, Event::SpeechDone(generation));
    }

    /// The reset button: both processors restart, peripherals keep state
    pub fn press_reset(&mut self) {
        log(LogCategory::Cpu, LogLevel::Info, || {
            "BRC: reset button".to_string()
        });
        self.main.reset();
        self.mcu.reset();
        // The data bus buffer is part of the coprocessor
        self.io.borrow_mut().mailbox.reset();
    }

    pub fn speaker_level(&self) -> bool {
        self.io.borrow().speaker_level()
    }

    pub fn main_stalled(&self) -> bool {
        self.io.borrow().sync.is_stalled()
    }

    pub fn render_frame(&self) -> DisplayFrame {
        self.io.borrow().display.render_frame()
    }

    fn dispatch(&mut self, time: u64, event: Event) {
        match event {
            Event::BarcodeShift => {
                self.io.borrow_mut().scanner.tick();
                self.scheduler
                    .schedule_at(time + self.config.barcode_shift_cycles(), Event::BarcodeShift);
            }
            Event::DisplayTick => {
                self.io.borrow_mut().display.tick();
                self.scheduler
                    .schedule_at(time + self.config.display_tick_cycles(), Event::DisplayTick);
            }
            Event::CardSwipe(code) => self.io.borrow_mut().scanner.start_scan(code),
            Event::KeyChange { key, pressed } => {
                log(LogCategory::Input, LogLevel::Debug, || {
                    format!("BRC: {:?} {}", key, if pressed { "down" } else { "up" })
                });
                self.io.borrow_mut().keypad.set_key(key, pressed);
            }
            Event::SpeechDone(generation) => {
                if self.io.borrow_mut().sync.complete(generation) {
                    self.main_time = self.main_time.max(time);
                }
            }
        }
    }

    fn step_main(&mut self) {
        self.io.borrow_mut().set_time(self.main_time);
        let cycles = self.main.step().max(1);
        self.io.borrow_mut().sync.advance(cycles);
        self.main_time += u64::from(cycles) * u64::from(self.config.main_cpu_divider);

        let word = self.io.borrow_mut().take_playback_request();
        if let (Some(word), Some(timer)) = (word, self.playback_timer.as_mut()) {
            let generation = self.io.borrow().sync.generation();
            let done = self
                .main_time
                .saturating_add(self.config.us_to_cycles(timer.playback_us(word)));
            self.scheduler
                .schedule_at(done, Event::SpeechDone(generation));
        }
    }

    fn step_mcu(&mut self) {
        self.io.borrow_mut().set_time(self.mcu_time);
        let cycles = self.mcu.step().max(1);
        self.mcu_time += u64::from(cycles) * u64::from(self.config.mcu_divider);
    }

    /// Run everything scheduled before `target` (master cycles)
    pub fn run_until(&mut self, target: u64) {
        loop {
            let main_due = if self.main_stalled() {
                u64::MAX
            } else {
                self.main_time
            };
            let unit_due = main_due.min(self.mcu_time);
            let event_due = self.scheduler.peek_time().unwrap_or(u64::MAX);

            if unit_due.min(event_due) >= target {
                break;
            }

            if event_due <= unit_due {
                self.now = event_due;
                if let Some(entry) = self.scheduler.pop_due(event_due) {
                    self.dispatch(entry.time, entry.event);
                }
            } else if self.mcu_time <= main_due {
                self.now = self.mcu_time;
                self.step_mcu();
            } else {
                self.now = self.main_time;
                self.step_main();
            }
        }
        self.now = target;
        // A stalled main unit catches up to the present when released
        if self.main_stalled() {
            self.main_time = self.main_time.max(target);
        }
    }
}

impl<M: Cpu, C: Cpu> System for BrcSystem<M, C> {
    type Error = BrcError;
    type Frame = DisplayFrame;

    fn reset(&mut self) {
        self.main.reset();
        self.mcu.reset();
        self.io.borrow_mut().reset();
        self.scheduler.clear();
        self.now = 0;
        self.main_time = 0;
        self.mcu_time = 0;
        self.schedule_periodic();
    }

    fn step_frame(&mut self) -> Result<DisplayFrame, Self::Error> {
        let target = self.now + self.config.frame_cycles();
        self.run_until(target);
        Ok(self.render_frame())
    }

    fn save_state(&self) -> Value {
        let io = self.io.borrow();
        serde_json::json!({
            "system": "brc",
            "version": STATE_VERSION,
            "model": self.config.model,
            "now": self.now,
            "main_time": self.main_time,
            "mcu_time": self.mcu_time,
            "io": &*io,
            "scheduler": &self.scheduler,
        })
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        use serde::de::Error;

        if v["system"] != "brc" {
            return Err(serde_json::Error::custom("not a BRC save state"));
        }
        let version: u64 = serde_json::from_value(v["version"].clone())?;
        if version != STATE_VERSION {
            return Err(serde_json::Error::custom(format!(
                "unsupported save state version {}",
                version
            )));
        }
        let io: CardIo = serde_json::from_value(v["io"].clone())?;
        if io.model != self.config.model {
            return Err(serde_json::Error::custom(format!(
                "save state is for {:?}, machine is {:?}",
                io.model, self.config.model
            )));
        }
        let window = u64::from(self.config.decay_window_ticks);
        if io.display.window() != window {
            return Err(serde_json::Error::custom(format!(
                "save state decays after {} ticks, machine after {}",
                io.display.window(),
                window
            )));
        }
        let scheduler: Scheduler = serde_json::from_value(v["scheduler"].clone())?;
        let now = serde_json::from_value(v["now"].clone())?;
        let main_time = serde_json::from_value(v["main_time"].clone())?;
        let mcu_time = serde_json::from_value(v["mcu_time"].clone())?;

        *self.io.borrow_mut() = io;
        self.scheduler = scheduler;
        self.now = now;
        self.main_time = main_time;
        self.mcu_time = mcu_time;
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }
}
