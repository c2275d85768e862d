//! Persisted bytecode: one line of signed hex words, each followed by `;`.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::program::{Program, ProgramError, Word};

const SEPARATOR: char = ';';

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("word {index} is not hexadecimal: {text:?}")]
    BadWord { index: usize, text: String },
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// `-1a` for -26, lowercase, trailing separator and newline.
pub fn encode(program: &Program) -> String {
    let mut out = String::with_capacity(program.len() * 4 + 1);
    for &w in program.words() {
        if w < 0 {
            out.push('-');
        }
        // infallible on String
        let _ = write!(out, "{:x}", w.unsigned_abs());
        out.push(SEPARATOR);
    }
    out.push('\n');
    out
}

pub fn decode(text: &str) -> Result<Program, ImageError> {
    let mut words: Vec<Word> = Vec::new();
    for (index, seg) in text.split(SEPARATOR).map(str::trim).filter(|s| !s.is_empty()).enumerate() {
        let w = Word::from_str_radix(seg, 16).map_err(|_| ImageError::BadWord {
            index,
            text: seg.to_string(),
        })?;
        words.push(w);
    }
    Ok(Program::from_resolved(words)?)
}

pub fn write_file(path: impl AsRef<Path>, program: &Program) -> Result<(), ImageError> {
    fs::write(path, encode(program))?;
    Ok(())
}

pub fn read_file(path: impl AsRef<Path>) -> Result<Program, ImageError> {
    decode(&fs::read_to_string(path)?)
}
