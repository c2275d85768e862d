//! Host services reached through the `int` instruction.
//!
//! The CPU reads the string argument from memory at the offset in R1, calls
//! one of these operations and writes the result back into R1 (and memory for
//! [`Syscall::ReadLine`]).

use std::fs::OpenOptions;
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};

use crate::program::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    /// R1 = prompt, R2 = destination offset. R1 <- line length.
    ReadLine = 0,
    /// R1 = text.
    WriteLine = 1,
    /// R1 = path, R2 = position. R1 <- byte or -1 at end of file.
    ReadFileByte = 2,
    /// R1 = path, R2 = position, R3 = value.
    WriteFileByte = 3,
    /// R1 = path. R1 <- size in bytes.
    FileSize = 4,
    /// R1 <- memory capacity.
    MemSize = 5,
}

impl TryFrom<Word> for Syscall {
    type Error = Word;

    fn try_from(id: Word) -> Result<Self, Self::Error> {
        Ok(match id {
            0 => Syscall::ReadLine,
            1 => Syscall::WriteLine,
            2 => Syscall::ReadFileByte,
            3 => Syscall::WriteFileByte,
            4 => Syscall::FileSize,
            5 => Syscall::MemSize,
            other => return Err(other),
        })
    }
}

pub trait SystemCalls {
    fn read_line(&mut self, prompt: &str) -> io::Result<String>;
    fn write_line(&mut self, text: &str) -> io::Result<()>;
    fn read_file_byte(&mut self, path: &str, position: u64) -> io::Result<Option<u8>>;
    fn write_file_byte(&mut self, path: &str, position: u64, value: u8) -> io::Result<()>;
    fn file_size(&mut self, path: &str) -> io::Result<u64>;
}

/// Console on stdin/stdout, files on the local file system.
#[derive(Debug, Default)]
pub struct HostSystem;

impl SystemCalls for HostSystem {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        let mut out = io::stdout().lock();
        out.write_all(prompt.as_bytes())?;
        out.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(strip_newline(line))
    }

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        writeln!(io::stdout().lock(), "{text}")
    }

    fn read_file_byte(&mut self, path: &str, position: u64) -> io::Result<Option<u8>> {
        let mut file = OpenOptions::new().read(true).open(path)?;
        file.seek(SeekFrom::Start(position))?;
        let mut buf = [0u8; 1];
        match file.read(&mut buf)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    fn write_file_byte(&mut self, path: &str, position: u64, value: u8) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.seek(SeekFrom::Start(position))?;
        file.write_all(&[value])
    }

    fn file_size(&mut self, path: &str) -> io::Result<u64> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn strip_newline(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}
