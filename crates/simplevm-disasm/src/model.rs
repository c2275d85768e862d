use anyhow::{Context, Result};
use std::path::Path;

use simplevm::decoder::{Decoded, Decoder, TableDecoder};
use simplevm::{image, Program, Word};

/// A loaded program plus the instruction boundaries of its linear sweep.
#[derive(Debug, Clone)]
pub struct Image {
    pub program: Program,
    starts: Vec<bool>,
}

impl Image {
    pub fn new(program: Program) -> Self {
        let starts = program.instruction_starts().iter().map(|b| *b).collect();
        Self { program, starts }
    }

    pub fn words(&self) -> &[Word] {
        self.program.words()
    }

    pub fn len(&self) -> usize {
        self.program.len()
    }

    pub fn is_empty(&self) -> bool {
        self.program.is_empty()
    }

    /// True when an instruction begins at `index`.
    pub fn is_boundary(&self, index: usize) -> bool {
        self.starts.get(index).copied().unwrap_or(false)
    }

    pub fn decode(&self, index: usize) -> Option<Decoded> {
        TableDecoder::new().decode(self.words(), index)
    }
}

/// Reads a persisted bytecode file, or assembles a `.vasm` source.
pub fn load_image(path: &Path) -> Result<Image> {
    let program = if path.extension().is_some_and(|e| e == "vasm") {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        simplevm::assemble(&source).with_context(|| format!("assembling {}", path.display()))?
    } else {
        image::read_file(path).with_context(|| format!("loading {}", path.display()))?
    };
    Ok(Image::new(program))
}
