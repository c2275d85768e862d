use crate::cpu::{Cpu, Flags, Trap};
use crate::decoder::{Decoded, Op};
use crate::instructions::{self, Form};
use crate::memory::Bus;
use crate::program::Word;
use crate::registers::Reg;
use crate::syscall::{Syscall, SystemCalls};

pub trait Executor {
    fn exec<B: Bus, S: SystemCalls>(
        &self,
        cpu: &mut Cpu,
        bus: &mut B,
        sys: &mut S,
        d: Decoded,
    ) -> Result<(), Trap>;
}

/// Integer executor covering the whole instruction set.
pub struct IntExecutor;

impl Executor for IntExecutor {
    fn exec<B: Bus, S: SystemCalls>(
        &self,
        cpu: &mut Cpu,
        bus: &mut B,
        sys: &mut S,
        d: Decoded,
    ) -> Result<(), Trap> {
        match d.op {
            Op::MovDword | Op::MovReg => {
                let v = source(cpu, &d)?;
                cpu.set_reg(d.a, v)?;
            }
            Op::AddDword | Op::AddReg => {
                let v = source(cpu, &d)?;
                let cur = cpu.reg(d.a)?;
                cpu.flags = Flags::empty();
                cpu.flags.set(Flags::OVERFLOW, cur.checked_add(v).is_none());
                cpu.set_reg(d.a, cur.wrapping_add(v))?;
            }
            Op::SubDword | Op::SubReg => {
                let v = source(cpu, &d)?;
                let cur = cpu.reg(d.a)?;
                cpu.flags = Flags::empty();
                cpu.flags.set(Flags::UNDERFLOW, cur.checked_sub(v).is_none());
                cpu.set_reg(d.a, cur.wrapping_sub(v))?;
            }
            Op::MulDword | Op::MulReg => {
                let v = source(cpu, &d)?;
                let cur = cpu.reg(d.a)?;
                cpu.flags = Flags::empty();
                cpu.flags.set(Flags::OVERFLOW, cur.checked_mul(v).is_none());
                cpu.set_reg(d.a, cur.wrapping_mul(v))?;
            }
            Op::DivDword | Op::DivReg => {
                let v = source(cpu, &d)?;
                let cur = cpu.reg(d.a)?;
                cpu.flags = Flags::empty();
                if v == 0 {
                    return Err(Trap::DivideByZero);
                }
                cpu.set_reg(d.a, cur.wrapping_div(v))?;
                cpu.set(Reg::R6, cur.wrapping_rem(v));
            }
            Op::XorDword | Op::XorReg => {
                let v = source(cpu, &d)?;
                let cur = cpu.reg(d.a)?;
                cpu.set_reg(d.a, cur ^ v)?;
            }
            Op::AndDword | Op::AndReg => {
                let v = source(cpu, &d)?;
                let cur = cpu.reg(d.a)?;
                cpu.set_reg(d.a, cur & v)?;
            }
            Op::OrDword | Op::OrReg => {
                let v = source(cpu, &d)?;
                let cur = cpu.reg(d.a)?;
                cpu.set_reg(d.a, cur | v)?;
            }
            Op::ShlDword | Op::ShlReg => {
                let v = source(cpu, &d)?;
                let cur = cpu.reg(d.a)?;
                cpu.set_reg(d.a, cur.wrapping_shl(v as u32))?;
            }
            Op::ShrDword | Op::ShrReg => {
                let v = source(cpu, &d)?;
                let cur = cpu.reg(d.a)?;
                cpu.set_reg(d.a, cur.wrapping_shr(v as u32))?;
            }
            Op::NotReg => {
                let cur = cpu.reg(d.a)?;
                cpu.set_reg(d.a, !cur)?;
            }
            Op::IncReg => {
                let cur = cpu.reg(d.a)?;
                cpu.flags.set(Flags::OVERFLOW, cur.checked_add(1).is_none());
                cpu.set_reg(d.a, cur.wrapping_add(1))?;
            }
            Op::DecReg => {
                let cur = cpu.reg(d.a)?;
                cpu.flags.set(Flags::UNDERFLOW, cur.checked_sub(1).is_none());
                cpu.set_reg(d.a, cur.wrapping_sub(1))?;
            }
            Op::CmpDword => {
                let reg = cpu.reg(d.a)?;
                compare(cpu, d.b, reg);
            }
            Op::CmpReg => {
                let first = cpu.reg(d.a)?;
                let second = cpu.reg(d.b)?;
                compare(cpu, first, second);
            }
            Op::Label => {}
            Op::Jmp => jump(cpu, d.a),
            Op::Je => {
                if cpu.flags.contains(Flags::EQUAL) {
                    jump(cpu, d.a);
                }
            }
            Op::Jne => {
                if !cpu.flags.contains(Flags::EQUAL) {
                    jump(cpu, d.a);
                }
            }
            Op::Jg => {
                if cpu.flags.contains(Flags::GREATER) {
                    jump(cpu, d.a);
                }
            }
            Op::Jb => {
                if cpu.flags.contains(Flags::LOWER) {
                    jump(cpu, d.a);
                }
            }
            Op::WriteMemByteDword => write_byte(bus, d.a, d.b)?,
            Op::WriteMemIntDword => write_int(bus, d.a, d.b)?,
            Op::ReadMemByteDword => read_byte(cpu, bus, d.a, d.b)?,
            Op::ReadMemIntDword => read_int(cpu, bus, d.a, d.b)?,
            Op::WriteMemByteReg => {
                let (offset, value) = (cpu.reg(d.a)?, cpu.reg(d.b)?);
                write_byte(bus, offset, value)?;
            }
            Op::WriteMemIntReg => {
                let (offset, value) = (cpu.reg(d.a)?, cpu.reg(d.b)?);
                write_int(bus, offset, value)?;
            }
            Op::ReadMemByteReg => {
                let offset = cpu.reg(d.b)?;
                read_byte(cpu, bus, d.a, offset)?;
            }
            Op::ReadMemIntReg => {
                let offset = cpu.reg(d.b)?;
                read_int(cpu, bus, d.a, offset)?;
            }
            Op::Push => {
                let v = cpu.reg(d.a)?;
                cpu.stack.push(v)?;
            }
            Op::Pop => {
                // check the destination before consuming the entry
                cpu.reg(d.a)?;
                let v = cpu.stack.pop()?;
                cpu.set_reg(d.a, v)?;
            }
            Op::Call => {
                // rip sits on the operand; the return address is the opcode index
                let ret = cpu.ip().wrapping_sub(1);
                cpu.stack.push(ret)?;
                cpu.set_ip(d.a);
            }
            Op::Retn => {
                if cpu.stack.is_empty() {
                    cpu.halt();
                } else {
                    let addr = cpu.stack.pop()?;
                    cpu.set_ip(addr.wrapping_add(Op::Call.operand_count() as Word));
                }
            }
            Op::Halt => cpu.halt(),
            Op::Int => syscall(cpu, bus, sys, d.a)?,
        }
        Ok(())
    }
}

/// Second operand: the register's value for register forms, the immediate
/// otherwise.
fn source(cpu: &Cpu, d: &Decoded) -> Result<Word, Trap> {
    match instructions::describe(d.op.opcode()).map(|desc| desc.form) {
        Some(Form::RegReg) => cpu.reg(d.b),
        _ => Ok(d.b),
    }
}

/// Sets exactly one of EQUAL, GREATER, LOWER. Equality is checked first and
/// GREATER means `second > first`.
fn compare(cpu: &mut Cpu, first: Word, second: Word) {
    cpu.flags.remove(Flags::EQUAL | Flags::GREATER | Flags::LOWER);
    let flag = if second == first {
        Flags::EQUAL
    } else if second >= first {
        Flags::GREATER
    } else {
        Flags::LOWER
    };
    cpu.flags.insert(flag);
}

fn jump(cpu: &mut Cpu, offset: Word) {
    cpu.set_ip(cpu.ip().wrapping_add(offset));
}

fn bus_err(addr: Word) -> impl FnOnce(anyhow::Error) -> Trap {
    move |source| Trap::Bus { addr, source }
}

fn write_byte<B: Bus>(bus: &mut B, offset: Word, value: Word) -> Result<(), Trap> {
    if value > Word::from(i8::MAX) {
        return Err(Trap::ByteRange { value });
    }
    bus.write_u8(offset as u32, value as u8).map_err(bus_err(offset))
}

fn write_int<B: Bus>(bus: &mut B, offset: Word, value: Word) -> Result<(), Trap> {
    bus.write_u32(offset as u32, value as u32).map_err(bus_err(offset))
}

fn read_byte<B: Bus>(cpu: &mut Cpu, bus: &mut B, reg: Word, offset: Word) -> Result<(), Trap> {
    cpu.reg(reg)?;
    let b = bus.read_u8(offset as u32).map_err(bus_err(offset))?;
    cpu.set_reg(reg, Word::from(b))
}

fn read_int<B: Bus>(cpu: &mut Cpu, bus: &mut B, reg: Word, offset: Word) -> Result<(), Trap> {
    cpu.reg(reg)?;
    let v = bus.read_u32(offset as u32).map_err(bus_err(offset))?;
    cpu.set_reg(reg, v as Word)
}

fn syscall<B: Bus, S: SystemCalls>(
    cpu: &mut Cpu,
    bus: &mut B,
    sys: &mut S,
    id: Word,
) -> Result<(), Trap> {
    let call = Syscall::try_from(id).map_err(|id| Trap::UnknownSyscall { id })?;
    let failed = move |source: std::io::Error| Trap::Syscall { call, source };

    match call {
        Syscall::ReadLine => {
            let prompt = string_arg(cpu, bus)?;
            let line = sys.read_line(&prompt).map_err(failed)?;
            let dest = cpu.get(Reg::R2);
            let mut bytes = line.into_bytes();
            let len = bytes.len();
            bytes.push(0);
            bus.write_bytes(dest as u32, &bytes).map_err(bus_err(dest))?;
            cpu.set(Reg::R1, len as Word);
        }
        Syscall::WriteLine => {
            let text = string_arg(cpu, bus)?;
            sys.write_line(&text).map_err(failed)?;
        }
        Syscall::ReadFileByte => {
            let path = string_arg(cpu, bus)?;
            let pos = file_position(cpu).map_err(failed)?;
            let b = sys.read_file_byte(&path, pos).map_err(failed)?;
            cpu.set(Reg::R1, b.map_or(-1, Word::from));
        }
        Syscall::WriteFileByte => {
            let path = string_arg(cpu, bus)?;
            let pos = file_position(cpu).map_err(failed)?;
            let value = cpu.get(Reg::R3) as u8;
            sys.write_file_byte(&path, pos, value).map_err(failed)?;
        }
        Syscall::FileSize => {
            let path = string_arg(cpu, bus)?;
            let size = sys.file_size(&path).map_err(failed)?;
            cpu.set(Reg::R1, Word::try_from(size).unwrap_or(Word::MAX));
        }
        Syscall::MemSize => {
            cpu.set(Reg::R1, Word::try_from(bus.size()).unwrap_or(Word::MAX));
        }
    }
    Ok(())
}

/// The null-terminated string at the offset held in R1.
fn string_arg<B: Bus>(cpu: &Cpu, bus: &mut B) -> Result<String, Trap> {
    let at = cpu.get(Reg::R1);
    bus.read_cstr(at as u32).map_err(bus_err(at))
}

fn file_position(cpu: &Cpu) -> std::io::Result<u64> {
    u64::try_from(cpu.get(Reg::R2)).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "negative file position")
    })
}
