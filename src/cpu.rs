use std::io;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::decoder::{Decoder, Op};
use crate::disasm::fmt_decoded;
use crate::exec::Executor;
use crate::memory::Bus;
use crate::program::{Program, Word};
use crate::registers::{self, Reg};
use crate::stack::{CallStack, StackError};
use crate::syscall::{Syscall, SystemCalls};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub memory_size: usize,
    pub stack_capacity: usize,
    /// Bytes of memory included in a core dump.
    pub dump_bytes: usize,
    /// Fault after this many executed instructions; unlimited when `None`.
    pub max_steps: Option<u64>,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            memory_size: 65536,
            stack_capacity: 256,
            dump_bytes: 256,
            max_steps: None,
        }
    }
}

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags: u8 {
const OVERFLOW = 1 << 0;
const UNDERFLOW = 1 << 1;
const GREATER = 1 << 2;
const LOWER = 1 << 3;
const EQUAL = 1 << 4;
}
}

#[derive(thiserror::Error, Debug)]
pub enum Trap {
    #[error("invalid opcode {opcode} at word {at}")]
    InvalidInstruction { at: usize, opcode: Word },
    #[error("instruction pointer {ip} outside the program")]
    IpOutOfRange { ip: Word },
    #[error("register index {index} out of range")]
    Register { index: Word },
    #[error("bus error at {addr:#x}: {source}")]
    Bus {
        addr: Word,
        #[source]
        source: anyhow::Error,
    },
    #[error("byte write of {value} exceeds {}", i8::MAX)]
    ByteRange { value: Word },
    #[error(transparent)]
    Stack(#[from] StackError),
    #[error("division by zero")]
    DivideByZero,
    #[error("unknown system call {id}")]
    UnknownSyscall { id: Word },
    #[error("system call {call:?} failed: {source}")]
    Syscall {
        call: Syscall,
        #[source]
        source: io::Error,
    },
    #[error("step limit of {limit} reached")]
    StepLimit { limit: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub regs: [Word; registers::COUNT],
    pub flags: Flags,
    pub stack: CallStack,
    pub program_len: usize,
    /// Instructions executed since the last reset.
    pub steps: u64,
    pub cfg: CpuConfig,
}

impl Cpu {
    pub fn new(cfg: CpuConfig) -> Self {
        Self {
            regs: [0; registers::COUNT],
            flags: Flags::empty(),
            stack: CallStack::new(cfg.stack_capacity),
            program_len: 0,
            steps: 0,
            cfg,
        }
    }

    pub fn reset(&mut self) {
        self.regs = [0; registers::COUNT];
        self.flags = Flags::empty();
        self.stack.clear();
        self.program_len = 0;
        self.steps = 0;
    }

    /// Resets the CPU and points it at the first word of `program`.
    pub fn load(&mut self, program: &Program) {
        self.reset();
        self.program_len = program.len();
    }

    pub fn ip(&self) -> Word {
        self.regs[Reg::Rip.index()]
    }

    pub fn set_ip(&mut self, ip: Word) {
        self.regs[Reg::Rip.index()] = ip;
    }

    pub fn get(&self, reg: Reg) -> Word {
        self.regs[reg.index()]
    }

    pub fn set(&mut self, reg: Reg, value: Word) {
        self.regs[reg.index()] = value;
    }

    /// Reads the register named by a bytecode operand.
    pub fn reg(&self, index: Word) -> Result<Word, Trap> {
        Reg::from_index(index)
            .map(|r| self.get(r))
            .ok_or(Trap::Register { index })
    }

    pub fn set_reg(&mut self, index: Word, value: Word) -> Result<(), Trap> {
        let r = Reg::from_index(index).ok_or(Trap::Register { index })?;
        self.set(r, value);
        Ok(())
    }

    /// The loop continues while the pointer is below the program length.
    /// Negative pointers keep it going so the next fetch faults.
    pub fn is_running(&self) -> bool {
        i64::from(self.ip()) < self.program_len as i64
    }

    pub fn halt(&mut self) {
        self.set_ip(Word::try_from(self.program_len).unwrap_or(Word::MAX));
    }

    /// Executes one instruction. While the handler runs, `rip` holds the
    /// index of the last word consumed; afterwards it moves one word on.
    pub fn step<B: Bus, S: SystemCalls, D: Decoder, X: Executor>(
        &mut self,
        program: &Program,
        bus: &mut B,
        sys: &mut S,
        dec: &D,
        exec: &X,
    ) -> Result<(), Trap> {
        let ip = self.ip();
        let at = usize::try_from(ip)
            .ok()
            .filter(|&at| at < program.len())
            .ok_or(Trap::IpOutOfRange { ip })?;
        if let Some(limit) = self.cfg.max_steps {
            if self.steps >= limit {
                return Err(Trap::StepLimit { limit });
            }
        }
        let opcode = program.words()[at];
        let d = dec.decode(program.words(), at).ok_or_else(|| match Op::from_opcode(opcode) {
            // known opcode whose operands run past the end
            Some(op) => Trap::IpOutOfRange {
                ip: (at + op.operand_count()) as Word,
            },
            None => Trap::InvalidInstruction { at, opcode },
        })?;
        trace!(at, "{}", fmt_decoded(&d));
        self.set_ip((at + d.op.operand_count()) as Word);
        self.steps += 1;
        exec.exec(self, bus, sys, d)?;
        self.set_ip(self.ip().wrapping_add(1));
        Ok(())
    }

    pub fn run<B: Bus, S: SystemCalls, D: Decoder, X: Executor>(
        &mut self,
        program: &Program,
        bus: &mut B,
        sys: &mut S,
        dec: &D,
        exec: &X,
    ) -> Result<(), Trap> {
        while self.is_running() {
            self.step(program, bus, sys, dec, exec)?;
        }
        Ok(())
    }
}
