use crate::decoder::Op;
use crate::program::Word;

/// Operand layout of an instruction; fixes how many words follow the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// No operands.
    Bare,
    /// A register index.
    Reg,
    /// Register index, then an immediate value or memory offset.
    RegImm,
    /// Two register indices.
    RegReg,
    /// Memory offset, then an immediate value.
    ImmImm,
    /// A single immediate (system call id).
    Imm,
    /// Label id, left in place after resolution.
    Marker,
    /// Label reference, resolved to `target - index`.
    Rel,
    /// Label reference, resolved to `target - 1`.
    Call,
}

impl Form {
    pub const fn operand_count(self) -> usize {
        match self {
            Form::Bare => 0,
            Form::Reg | Form::Imm | Form::Marker | Form::Rel | Form::Call => 1,
            Form::RegImm | Form::RegReg | Form::ImmImm => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub op: Op,
    pub mnemonic: &'static str,
    pub form: Form,
}

const fn desc(op: Op, mnemonic: &'static str, form: Form) -> InstrDesc {
    InstrDesc { op, mnemonic, form }
}

pub const TABLE: &[InstrDesc] = &[
    desc(Op::MovDword, "movd", Form::RegImm),
    desc(Op::AddDword, "addd", Form::RegImm),
    desc(Op::SubDword, "subd", Form::RegImm),
    desc(Op::MulDword, "muld", Form::RegImm),
    desc(Op::DivDword, "divd", Form::RegImm),
    desc(Op::XorDword, "xord", Form::RegImm),
    desc(Op::AndDword, "andd", Form::RegImm),
    desc(Op::OrDword, "ord", Form::RegImm),
    desc(Op::CmpDword, "cmpd", Form::RegImm),
    desc(Op::ShlDword, "shld", Form::RegImm),
    desc(Op::ShrDword, "shrd", Form::RegImm),
    desc(Op::MovReg, "movr", Form::RegReg),
    desc(Op::AddReg, "addr", Form::RegReg),
    desc(Op::SubReg, "subr", Form::RegReg),
    desc(Op::MulReg, "mulr", Form::RegReg),
    desc(Op::DivReg, "divr", Form::RegReg),
    desc(Op::XorReg, "xorr", Form::RegReg),
    desc(Op::AndReg, "andr", Form::RegReg),
    desc(Op::OrReg, "orr", Form::RegReg),
    desc(Op::CmpReg, "cmpr", Form::RegReg),
    desc(Op::ShlReg, "shlr", Form::RegReg),
    desc(Op::ShrReg, "shrr", Form::RegReg),
    desc(Op::NotReg, "notr", Form::Reg),
    desc(Op::IncReg, "incr", Form::Reg),
    desc(Op::DecReg, "decr", Form::Reg),
    desc(Op::Label, "label", Form::Marker),
    desc(Op::Jmp, "jmp", Form::Rel),
    desc(Op::Je, "je", Form::Rel),
    desc(Op::Jne, "jne", Form::Rel),
    desc(Op::Jg, "jg", Form::Rel),
    desc(Op::Jb, "jb", Form::Rel),
    desc(Op::WriteMemByteDword, "wmbd", Form::ImmImm),
    desc(Op::WriteMemIntDword, "wmid", Form::ImmImm),
    desc(Op::ReadMemByteDword, "rmbd", Form::RegImm),
    desc(Op::ReadMemIntDword, "rmid", Form::RegImm),
    desc(Op::WriteMemByteReg, "wmbr", Form::RegReg),
    desc(Op::WriteMemIntReg, "wmir", Form::RegReg),
    desc(Op::ReadMemByteReg, "rmbr", Form::RegReg),
    desc(Op::ReadMemIntReg, "rmir", Form::RegReg),
    desc(Op::Push, "push", Form::Reg),
    desc(Op::Pop, "pop", Form::Reg),
    desc(Op::Call, "call", Form::Call),
    desc(Op::Retn, "retn", Form::Bare),
    desc(Op::Halt, "hlt", Form::Bare),
    desc(Op::Int, "int", Form::Imm),
];

/// Extra spellings accepted by the assembler on top of each entry's mnemonic.
const ALIASES: &[(&str, Op)] = &[
    ("@", Op::Label),
    ("function", Op::Label),
    ("proc", Op::Label),
    ("end_function", Op::Retn),
    ("end_proc", Op::Retn),
];

const MAX_OPCODE: usize = 80;

const fn build_index() -> [i8; MAX_OPCODE + 1] {
    let mut index = [-1i8; MAX_OPCODE + 1];
    let mut i = 0;
    while i < TABLE.len() {
        index[TABLE[i].op as usize] = i as i8;
        i += 1;
    }
    index
}

/// opcode -> position in TABLE, -1 where no instruction exists.
static INDEX: [i8; MAX_OPCODE + 1] = build_index();

pub fn describe(opcode: Word) -> Option<&'static InstrDesc> {
    let slot = usize::try_from(opcode).ok()?;
    let pos = *INDEX.get(slot)?;
    usize::try_from(pos).ok().map(|pos| &TABLE[pos])
}

pub fn operand_count(opcode: Word) -> Option<usize> {
    describe(opcode).map(|d| d.form.operand_count())
}

pub fn mnemonic(op: Op) -> &'static str {
    describe(op.opcode()).map_or("?", |d| d.mnemonic)
}

/// Looks up a source mnemonic, ignoring ASCII case.
pub fn from_mnemonic(name: &str) -> Option<Op> {
    let name = name.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|d| d.mnemonic == name)
        .map(|d| d.op)
        .or_else(|| ALIASES.iter().find(|(alias, _)| *alias == name).map(|(_, op)| *op))
}
