//! Scripted processors for driving the machine from the outside

#![allow(dead_code)]

use emu_brc::{BrcSystem, MachineConfig, MainBus, McuBus, Model};
use emu_core::{Bus, Cpu};

/// Cycles every scripted instruction takes
pub const STEP_CYCLES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Out(u8, u8),
    In(u8),
    Store(u16, u8),
    Load(u16),
    Nop,
}

/// Runs one `Op` per step, then idles (or starts over when looping)
pub struct ScriptCpu<B: Bus> {
    bus: B,
    script: Vec<Op>,
    pc: usize,
    looping: bool,
    pub reads: Vec<u8>,
    pub steps: u64,
    pub resets: u32,
}

impl<B: Bus> ScriptCpu<B> {
    pub fn new(bus: B, script: Vec<Op>, looping: bool) -> Self {
        Self {
            bus,
            script,
            pc: 0,
            looping,
            reads: Vec::new(),
            steps: 0,
            resets: 0,
        }
    }

    pub fn idle(bus: B) -> Self {
        Self::new(bus, Vec::new(), false)
    }

    pub fn finished(&self) -> bool {
        !self.looping && self.pc >= self.script.len()
    }
}

impl<B: Bus> Cpu for ScriptCpu<B> {
    fn reset(&mut self) {
        self.pc = 0;
        self.resets += 1;
    }

    fn step(&mut self) -> u32 {
        self.steps += 1;
        if self.pc >= self.script.len() {
            if !self.looping || self.script.is_empty() {
                return STEP_CYCLES;
            }
            self.pc = 0;
        }
        match self.script[self.pc] {
            Op::Out(port, value) => self.bus.io_write(port, value),
            Op::In(port) => {
                let value = self.bus.io_read(port);
                self.reads.push(value);
            }
            Op::Store(addr, value) => self.bus.write(addr, value),
            Op::Load(addr) => {
                let value = self.bus.read(addr);
                self.reads.push(value);
            }
            Op::Nop => {}
        }
        self.pc += 1;
        STEP_CYCLES
    }
}

pub type ScriptSystem = BrcSystem<ScriptCpu<MainBus>, ScriptCpu<McuBus>>;

pub fn scripted(model: Model, main: Vec<Op>, mcu: Vec<Op>, mcu_loops: bool) -> ScriptSystem {
    BrcSystem::new(
        MachineConfig::for_model(model),
        |bus| ScriptCpu::new(bus, main, false),
        |bus| ScriptCpu::new(bus, mcu, mcu_loops),
    )
    .expect("default config is valid")
}
