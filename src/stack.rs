use serde::{Deserialize, Serialize};

use crate::program::Word;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    #[error("stack overflow (capacity {capacity})")]
    Overflow { capacity: usize },
    #[error("stack underflow")]
    Underflow,
}

/// Fixed-capacity word stack shared by CALL/RETN and PUSH/POP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStack {
    slots: Vec<Word>,
    capacity: usize,
}

impl CallStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: Word) -> Result<(), StackError> {
        if self.is_full() {
            return Err(StackError::Overflow {
                capacity: self.capacity,
            });
        }
        self.slots.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Word, StackError> {
        self.slots.pop().ok_or(StackError::Underflow)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Entries from the top of the stack down.
    pub fn iter_top_down(&self) -> impl Iterator<Item = Word> + '_ {
        self.slots.iter().rev().copied()
    }
}
