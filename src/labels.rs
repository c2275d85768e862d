use std::collections::HashMap;

use tracing::debug;

use crate::decoder::Op;
use crate::program::{self, Program, ProgramError, Word};

/// Characters folded into the checksum per round.
const CHUNK: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("label {id:#010x} redefined at word {at}")]
    Redefined { id: Word, at: usize },
    #[error("label {id:#010x} used at word {at} is not defined")]
    Undefined { id: Word, at: usize },
    #[error(transparent)]
    Malformed(#[from] ProgramError),
}

/// Folds a label name into its 32-bit id.
///
/// A running CRC-32 is fed the name four characters at a time and the
/// checksum after every chunk is XORed into the id. Distinct names can
/// collide; two colliding labels are reported as a redefinition.
pub fn label_id(name: &str) -> Word {
    let chars: Vec<char> = name.chars().collect();
    let mut crc = crc32_init();
    let mut id = 0u32;
    let mut buf = [0u8; 4];
    for chunk in chars.chunks(CHUNK) {
        for c in chunk {
            crc = crc32_update(crc, c.encode_utf8(&mut buf).as_bytes());
        }
        id ^= crc32_finalize(crc);
    }
    id as Word
}

fn crc32_init() -> u32 {
    0xFFFF_FFFFu32
}

fn crc32_update(mut crc: u32, bytes: &[u8]) -> u32 {
    for &byte in bytes {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = if (crc & 1) == 1 { u32::MAX } else { 0 };
            crc = (crc >> 1) ^ (0xEDB8_8320u32 & mask);
        }
    }
    crc
}

fn crc32_finalize(crc: u32) -> u32 {
    !crc
}

/// Rewrites label references into offsets.
///
/// Label markers keep their id operand. Jumps become `target - index`, calls
/// become `target - 1`, where `target` is the index of the LABEL opcode.
pub fn resolve(mut words: Vec<Word>) -> Result<Program, LabelError> {
    let starts = program::walk(&words)?;

    let mut targets: HashMap<Word, usize> = HashMap::new();
    for &at in &starts {
        if words[at] == Op::Label.opcode() {
            let id = words[at + 1];
            if targets.insert(id, at).is_some() {
                return Err(LabelError::Redefined { id, at });
            }
        }
    }

    let mut patched = 0usize;
    for &at in &starts {
        let Some(op) = Op::from_opcode(words[at]) else {
            continue;
        };
        if !op.is_relative_jump() && op != Op::Call {
            continue;
        }
        let id = words[at + 1];
        let target = *targets.get(&id).ok_or(LabelError::Undefined { id, at })?;
        words[at + 1] = if op == Op::Call {
            target as Word - 1
        } else {
            target as Word - at as Word
        };
        patched += 1;
    }

    debug!(labels = targets.len(), patched, "labels resolved");
    Ok(Program::from_checked(words))
}
