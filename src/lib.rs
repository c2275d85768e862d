pub mod assembler;
pub mod cpu;
pub mod decoder;
pub mod disasm;
pub mod exec;
pub mod image;
pub mod instructions;
pub mod labels;
pub mod memory;
pub mod program;
pub mod registers;
pub mod runtime;
pub mod stack;
pub mod syscall;

pub use assembler::{assemble, AsmError, Assembler, Diagnostic, WarningKind};
pub use cpu::{Cpu, CpuConfig, Flags, Trap};
pub use labels::{label_id, LabelError};
pub use memory::{Bus, LinearMemory};
pub use program::{Program, ProgramError, Word};
pub use registers::Reg;
pub use runtime::{CoreDump, Exit, Fault, Machine};
pub use syscall::{HostSystem, Syscall, SystemCalls};
