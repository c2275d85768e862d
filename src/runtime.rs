use std::fmt;

use serde::Serialize;
use tracing::{debug, error};

use crate::cpu::{Cpu, CpuConfig, Flags, Trap};
use crate::decoder::TableDecoder;
use crate::exec::IntExecutor;
use crate::memory::{Bus, LinearMemory};
use crate::program::{Program, Word};
use crate::registers::Reg;
use crate::syscall::{HostSystem, SystemCalls};

/// How a program ended when it did not fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Exit {
    /// R1 at halt.
    pub code: Word,
    pub steps: u64,
}

#[derive(thiserror::Error, Debug)]
#[error("cpu fault")]
pub struct Fault {
    #[source]
    pub trap: Trap,
    pub dump: Box<CoreDump>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterValue {
    pub name: &'static str,
    pub value: Word,
}

/// Snapshot of the machine state for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreDump {
    pub registers: Vec<RegisterValue>,
    pub flags: Flags,
    /// Top of stack first.
    pub stack: Vec<Word>,
    /// The first `dump_bytes` bytes of memory.
    pub memory: Vec<u8>,
    pub steps: u64,
}

impl CoreDump {
    pub fn capture<B: Bus>(cpu: &Cpu, bus: &mut B) -> Self {
        let len = cpu.cfg.dump_bytes.min(bus.size());
        let memory = (0..len as u32).map_while(|a| bus.read_u8(a).ok()).collect();
        Self {
            registers: Reg::all()
                .map(|r| RegisterValue {
                    name: r.mnemonic(),
                    value: cpu.get(r),
                })
                .collect(),
            flags: cpu.flags,
            stack: cpu.stack.iter_top_down().collect(),
            memory,
            steps: cpu.steps,
        }
    }
}

impl fmt::Display for CoreDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "registers:")?;
        for r in &self.registers {
            writeln!(f, "  {:<4}{:>12} ({:#010x})", r.name, r.value, r.value as u32)?;
        }
        writeln!(f, "flags: {:?}", self.flags)?;
        write!(f, "stack:")?;
        if self.stack.is_empty() {
            write!(f, " (empty)")?;
        }
        for v in &self.stack {
            write!(f, " {v}")?;
        }
        writeln!(f)?;
        writeln!(f, "memory:")?;
        for (row, chunk) in self.memory.chunks(16).enumerate() {
            write!(f, "  {:04x}:", row * 16)?;
            for b in chunk {
                write!(f, " {b:02x}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "steps: {}", self.steps)
    }
}

/// One CPU with its memory and host services.
pub struct Machine<B = LinearMemory, S = HostSystem> {
    pub cpu: Cpu,
    pub mem: B,
    pub sys: S,
}

impl Machine {
    pub fn new(cfg: CpuConfig) -> Self {
        Self::with_system(cfg, HostSystem)
    }
}

impl<S: SystemCalls> Machine<LinearMemory, S> {
    pub fn with_system(cfg: CpuConfig, sys: S) -> Self {
        Self {
            cpu: Cpu::new(cfg),
            mem: LinearMemory::new(cfg.memory_size),
            sys,
        }
    }
}

impl<B: Bus, S: SystemCalls> Machine<B, S> {
    pub fn with_parts(cpu: Cpu, mem: B, sys: S) -> Self {
        Self { cpu, mem, sys }
    }

    /// Runs `program` from word 0 on reset registers and zeroed memory.
    pub fn run(&mut self, program: &Program) -> Result<Exit, Fault> {
        self.cpu.load(program);
        self.mem.reset();
        let dec = TableDecoder::new();
        let exec = IntExecutor;
        match self.cpu.run(program, &mut self.mem, &mut self.sys, &dec, &exec) {
            Ok(()) => {
                let exit = Exit {
                    code: self.cpu.get(Reg::R1),
                    steps: self.cpu.steps,
                };
                debug!(code = exit.code, steps = exit.steps, "halted");
                Ok(exit)
            }
            Err(trap) => {
                error!(ip = self.cpu.ip(), steps = self.cpu.steps, "{trap}");
                let dump = Box::new(self.dump());
                self.cpu.halt();
                Err(Fault { trap, dump })
            }
        }
    }

    pub fn dump(&mut self) -> CoreDump {
        CoreDump::capture(&self.cpu, &mut self.mem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Op;

    #[test]
    fn exit_code_is_r1() {
        let p = Program::from_resolved(vec![Op::MovDword as Word, 0, 7, Op::Halt as Word]).unwrap();
        let mut m = Machine::new(CpuConfig::default());
        assert_eq!(m.run(&p).unwrap(), Exit { code: 7, steps: 2 });
    }

    #[test]
    fn fault_carries_dump() {
        let cfg = CpuConfig {
            dump_bytes: 8,
            ..CpuConfig::default()
        };
        let p = Program::from_resolved(vec![
            Op::WriteMemByteDword as Word, 0, 65,
            Op::MovDword as Word, 1, 3,
            Op::Push as Word, 1,
            Op::DivDword as Word, 0, 0,
        ])
        .unwrap();
        let mut m = Machine::new(cfg);
        let fault = m.run(&p).unwrap_err();
        assert!(matches!(fault.trap, Trap::DivideByZero));
        assert_eq!(fault.dump.memory, vec![65, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(fault.dump.stack, vec![3]);
        assert_eq!(fault.dump.registers[1], RegisterValue { name: "r2", value: 3 });
        assert!(!m.cpu.is_running());
        let text = fault.dump.to_string();
        assert!(text.contains("  0000: 41 00 00 00 00 00 00 00"), "{text}");
    }

    #[test]
    fn parts_can_carry_a_smaller_bus() {
        let cfg = CpuConfig::default();
        let mut m = Machine::with_parts(Cpu::new(cfg), LinearMemory::new(16), HostSystem);
        let p = Program::from_resolved(vec![Op::WriteMemIntDword as Word, 12, 1, Op::Halt as Word]).unwrap();
        assert_eq!(m.run(&p).unwrap().steps, 2);
        assert_eq!(&m.mem.mem[12..], &[0, 0, 0, 1]);

        let p = Program::from_resolved(vec![Op::WriteMemIntDword as Word, 13, 1]).unwrap();
        let fault = m.run(&p).unwrap_err();
        assert!(matches!(fault.trap, Trap::Bus { addr: 13, .. }));
    }
}
