use serde::{Deserialize, Serialize};

use crate::program::Word;

pub const COUNT: usize = 9;

/// Register file slots. The discriminant is the index used in bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum Reg {
    R1 = 0,
    R2 = 1,
    R3 = 2,
    R4 = 3,
    R5 = 4,
    /// Also receives the remainder of every division.
    R6 = 5,
    Rbp = 6,
    Rsp = 7,
    /// Instruction pointer.
    Rip = 8,
}

const NAMES: [(&str, Reg); COUNT] = [
    ("r1", Reg::R1),
    ("r2", Reg::R2),
    ("r3", Reg::R3),
    ("r4", Reg::R4),
    ("r5", Reg::R5),
    ("r6", Reg::R6),
    ("rbp", Reg::Rbp),
    ("rsp", Reg::Rsp),
    ("rip", Reg::Rip),
];

impl Reg {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: Word) -> Option<Reg> {
        let index = usize::try_from(index).ok()?;
        NAMES.get(index).map(|(_, reg)| *reg)
    }

    /// Case-insensitive lookup of `r1`..`r6`, `rbp`, `rsp`, `rip`.
    pub fn from_mnemonic(name: &str) -> Option<Reg> {
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, reg)| *reg)
    }

    pub fn mnemonic(self) -> &'static str {
        NAMES[self.index()].0
    }

    pub fn all() -> impl Iterator<Item = Reg> {
        NAMES.iter().map(|(_, reg)| *reg)
    }
}
