use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Byte-addressable storage the CPU reads and writes. Words are big-endian.
pub trait Bus {
    fn size(&self) -> usize;
    fn read_u8(&mut self, addr: u32) -> Result<u8>;
    fn read_u32(&mut self, addr: u32) -> Result<u32>;
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()>;
    fn write_u32(&mut self, addr: u32, val: u32) -> Result<()>;

    /// Reads bytes from `addr` up to a 0 byte or the end of memory. The
    /// start itself must lie inside memory.
    fn read_cstr(&mut self, addr: u32) -> Result<String> {
        ensure!(
            (addr as usize) < self.size(),
            "string at {addr:#x} outside memory of {} bytes",
            self.size()
        );
        let mut bytes = Vec::new();
        let mut at = addr as usize;
        while at < self.size() {
            let b = self.read_u8(at as u32)?;
            if b == 0 {
                break;
            }
            bytes.push(b);
            at += 1;
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Zeroes every byte.
    fn reset(&mut self);

    fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        for (i, b) in bytes.iter().enumerate() {
            self.write_u8(addr.wrapping_add(i as u32), *b)?;
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self { mem: vec![0; size] }
    }

    fn span(&self, addr: u32, len: usize) -> Result<usize> {
        let off = addr as usize;
        ensure!(
            off.checked_add(len).is_some_and(|end| end <= self.mem.len()),
            "address {addr:#x} (+{len}) outside memory of {} bytes",
            self.mem.len()
        );
        Ok(off)
    }
}

impl std::fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearMemory").field("size", &self.mem.len()).finish()
    }
}

impl Bus for LinearMemory {
    fn size(&self) -> usize {
        self.mem.len()
    }
    fn reset(&mut self) {
        self.mem.fill(0);
    }
    fn read_u8(&mut self, addr: u32) -> Result<u8> {
        let off = self.span(addr, 1)?;
        Ok(self.mem[off])
    }
    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        let off = self.span(addr, 4)?;
        Ok(u32::from_be_bytes([
            self.mem[off],
            self.mem[off + 1],
            self.mem[off + 2],
            self.mem[off + 3],
        ]))
    }
    fn write_u8(&mut self, addr: u32, val: u8) -> Result<()> {
        let off = self.span(addr, 1)?;
        self.mem[off] = val;
        Ok(())
    }
    fn write_u32(&mut self, addr: u32, val: u32) -> Result<()> {
        let off = self.span(addr, 4)?;
        self.mem[off..off + 4].copy_from_slice(&val.to_be_bytes());
        Ok(())
    }
}
