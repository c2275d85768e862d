use serde::{Deserialize, Serialize};

use crate::instructions;
use crate::program::Word;

/// Every instruction the CPU executes. The discriminant is the opcode word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Op {
    // value forms: REG, VALUE
    MovDword = 1,
    AddDword = 2,
    SubDword = 3,
    XorDword = 4,
    AndDword = 5,
    OrDword = 6,
    CmpDword = 7,
    MulDword = 33,
    DivDword = 34,
    ShlDword = 51,
    ShrDword = 52,
    // register forms: REG, REG2
    MovReg = 8,
    AddReg = 9,
    SubReg = 10,
    XorReg = 11,
    AndReg = 12,
    NotReg = 13,
    OrReg = 14,
    CmpReg = 15,
    IncReg = 16,
    DecReg = 17,
    MulReg = 35,
    DivReg = 36,
    ShlReg = 53,
    ShrReg = 54,
    // control flow
    Label = 18,
    Jmp = 19,
    Je = 20,
    Jne = 21,
    Jg = 22,
    Jb = 23,
    // memory addressed by immediate offset
    WriteMemByteDword = 24,
    WriteMemIntDword = 25,
    ReadMemByteDword = 26,
    ReadMemIntDword = 27,
    // memory addressed through registers
    WriteMemByteReg = 60,
    WriteMemIntReg = 61,
    ReadMemByteReg = 62,
    ReadMemIntReg = 63,
    // stack
    Push = 28,
    Pop = 29,
    Call = 30,
    Retn = 31,
    // cpu
    Halt = 32,
    Int = 80,
}

impl Op {
    pub const ALL: [Op; 45] = [
        Op::MovDword,
        Op::AddDword,
        Op::SubDword,
        Op::XorDword,
        Op::AndDword,
        Op::OrDword,
        Op::CmpDword,
        Op::MulDword,
        Op::DivDword,
        Op::ShlDword,
        Op::ShrDword,
        Op::MovReg,
        Op::AddReg,
        Op::SubReg,
        Op::XorReg,
        Op::AndReg,
        Op::NotReg,
        Op::OrReg,
        Op::CmpReg,
        Op::IncReg,
        Op::DecReg,
        Op::MulReg,
        Op::DivReg,
        Op::ShlReg,
        Op::ShrReg,
        Op::Label,
        Op::Jmp,
        Op::Je,
        Op::Jne,
        Op::Jg,
        Op::Jb,
        Op::WriteMemByteDword,
        Op::WriteMemIntDword,
        Op::ReadMemByteDword,
        Op::ReadMemIntDword,
        Op::WriteMemByteReg,
        Op::WriteMemIntReg,
        Op::ReadMemByteReg,
        Op::ReadMemIntReg,
        Op::Push,
        Op::Pop,
        Op::Call,
        Op::Retn,
        Op::Halt,
        Op::Int,
    ];

    pub fn from_opcode(opcode: Word) -> Option<Op> {
        instructions::describe(opcode).map(|d| d.op)
    }

    pub fn opcode(self) -> Word {
        self as Word
    }

    pub fn operand_count(self) -> usize {
        instructions::describe(self.opcode()).map_or(0, |d| d.form.operand_count())
    }

    /// Relative jumps whose operand is rewritten to `target - index`.
    pub fn is_relative_jump(self) -> bool {
        matches!(self, Op::Jmp | Op::Je | Op::Jne | Op::Jg | Op::Jb)
    }

    /// Instructions whose single operand names a label in source text.
    pub fn takes_label(self) -> bool {
        self == Op::Label || self == Op::Call || self.is_relative_jump()
    }
}

/// One instruction pulled out of the word stream. Unused operand slots are 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub op: Op,
    /// Index of the opcode word.
    pub at: usize,
    pub a: Word,
    pub b: Word,
}

impl Decoded {
    /// Number of words the instruction occupies, opcode included.
    pub fn width(&self) -> usize {
        1 + self.op.operand_count()
    }
}

pub trait Decoder {
    fn decode(&self, words: &[Word], at: usize) -> Option<Decoded>;
}

/// Decodes by consulting the instruction table for the current opcode before
/// touching any operand word.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableDecoder;

impl TableDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for TableDecoder {
    fn decode(&self, words: &[Word], at: usize) -> Option<Decoded> {
        let op = Op::from_opcode(*words.get(at)?)?;
        let mut operands = [0; 2];
        for (i, slot) in operands.iter_mut().enumerate().take(op.operand_count()) {
            *slot = *words.get(at + 1 + i)?;
        }
        Some(Decoded {
            op,
            at,
            a: operands[0],
            b: operands[1],
        })
    }
}
