use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::instructions;

/// The unit of the bytecode stream: opcodes, operands and offsets alike.
pub type Word = i32;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("unknown opcode {opcode} at word {at}")]
    UnknownOpcode { at: usize, opcode: Word },
    #[error("instruction at word {at} needs {needed} operand(s) but the program ends")]
    Truncated { at: usize, needed: usize },
}

/// A finished, label-resolved word sequence. This is the CPU's only input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    words: Vec<Word>,
}

impl Program {
    /// Wraps words that are already resolved after checking that they decode
    /// end to end: every opcode is known and no instruction is cut short.
    pub fn from_resolved(words: Vec<Word>) -> Result<Self, ProgramError> {
        walk(&words)?;
        Ok(Self { words })
    }

    /// Used by the label resolver, which has walked the words itself.
    pub(crate) fn from_checked(words: Vec<Word>) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn into_words(self) -> Vec<Word> {
        self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// One bit per word, set where an instruction starts when the program is
    /// read linearly from index 0.
    pub fn instruction_starts(&self) -> BitVec {
        let mut starts = bitvec![0; self.words.len()];
        let mut at = 0;
        while at < self.words.len() {
            starts.set(at, true);
            match instructions::operand_count(self.words[at]) {
                Some(n) => at += 1 + n,
                None => break,
            }
        }
        starts
    }
}

/// Walks `words` instruction by instruction, returning the start index of
/// every instruction.
pub(crate) fn walk(words: &[Word]) -> Result<Vec<usize>, ProgramError> {
    let mut starts = Vec::new();
    let mut at = 0;
    while at < words.len() {
        let opcode = words[at];
        let needed =
            instructions::operand_count(opcode).ok_or(ProgramError::UnknownOpcode { at, opcode })?;
        if at + needed >= words.len() {
            return Err(ProgramError::Truncated { at, needed });
        }
        starts.push(at);
        at += 1 + needed;
    }
    Ok(starts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Op;

    #[test]
    fn rejects_unknown_opcode_and_truncation() {
        assert_eq!(
            Program::from_resolved(vec![Op::Halt as Word, 99]),
            Err(ProgramError::UnknownOpcode { at: 1, opcode: 99 })
        );
        assert_eq!(
            Program::from_resolved(vec![Op::MovDword as Word, 0]),
            Err(ProgramError::Truncated { at: 0, needed: 2 })
        );
    }

    #[test]
    fn marks_instruction_starts() {
        let p = Program::from_resolved(vec![Op::MovDword as Word, 0, 5, Op::IncReg as Word, 0, Op::Halt as Word])
            .unwrap();
        let starts = p.instruction_starts();
        let marked: Vec<usize> = starts.iter_ones().collect();
        assert_eq!(marked, vec![0, 3, 5]);
    }
}
