//! fwflash-dummy - In-memory flash emulator for testing
//!
//! This crate provides a raw flash device that emulates NOR flash in
//! memory: erase sets whole blocks to `0xFF`, programming can only clear
//! bits. It records every operation and can simulate a power cut after a
//! given number of writes, which is how the header-last update order is
//! exercised without real hardware.

#![warn(missing_docs)]

use fwflash_core::flash::{FlashError, FlashResult, RawFlash};

pub mod target;

pub use target::DummyTarget;

/// A recorded device operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Block erase
    Erase {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
    /// Program operation
    Write {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: usize,
    },
}

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub size: usize,
    /// Erase block size in bytes
    pub erase_size: u32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: 256 * 1024,
            erase_size: 4096,
        }
    }
}

/// Dummy flash device
///
/// Emulates a NOR flash in memory for testing purposes.
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    ops: Vec<Op>,
    writes_before_cut: Option<usize>,
    write_protected: bool,
    bad_cells: Vec<usize>,
}

impl DummyFlash {
    /// Create a new, fully erased dummy flash
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            ops: Vec::new(),
            writes_before_cut: None,
            write_protected: false,
            bad_cells: Vec::new(),
        }
    }

    /// Create a new dummy flash with default configuration (256 KiB, 4 KiB blocks)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = std::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Lose power after `writes` more successful writes
    ///
    /// Every later write or erase fails and leaves the content untouched.
    pub fn cut_power_after_writes(&mut self, writes: usize) {
        self.writes_before_cut = Some(writes);
    }

    /// Restore power
    pub fn restore_power(&mut self) {
        self.writes_before_cut = None;
    }

    /// Make every write and erase fail
    pub fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }

    /// Mark the byte at `addr` as worn out: it no longer erases
    pub fn add_bad_cell(&mut self, addr: usize) {
        self.bad_cells.push(addr);
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Operations performed so far, oldest first
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Forget recorded operations
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    fn powered(&self) -> bool {
        self.writes_before_cut != Some(0)
    }

    fn span(&self, addr: u32, len: usize) -> FlashResult<std::ops::Range<usize>> {
        let start = addr as usize;
        if start + len > self.data.len() {
            return Err(FlashError::OutOfBounds {
                addr,
                len,
                size: self.data.len(),
            });
        }
        Ok(start..start + len)
    }
}

impl RawFlash for DummyFlash {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> FlashResult<()> {
        let range = self.span(addr, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> FlashResult<()> {
        if self.write_protected {
            return Err(FlashError::WriteProtected);
        }
        if !self.powered() {
            log::debug!("dummy: write at {:#x} dropped (no power)", addr);
            return Err(FlashError::Write {
                addr,
                len: data.len(),
            });
        }
        let range = self.span(addr, data.len())?;

        // Flash programming: can only change 1 -> 0
        for (cell, &byte) in self.data[range].iter_mut().zip(data) {
            *cell &= byte;
        }

        self.ops.push(Op::Write {
            addr,
            len: data.len(),
        });
        if let Some(n) = self.writes_before_cut.as_mut() {
            *n -= 1;
        }
        Ok(())
    }

    fn erase(&mut self, addr: u32, len: u32) -> FlashResult<()> {
        if self.write_protected {
            return Err(FlashError::WriteProtected);
        }
        if !self.powered() {
            return Err(FlashError::Erase { addr, len });
        }
        let block = self.config.erase_size;
        if addr % block != 0 || len % block != 0 {
            return Err(FlashError::Erase { addr, len });
        }
        let range = self.span(addr, len as usize)?;

        // Erase sets all bytes to 0xFF
        self.data[range.clone()].fill(0xFF);
        for &cell in self.bad_cells.iter().filter(|c| range.contains(c)) {
            self.data[cell] = 0x00;
        }
        self.ops.push(Op::Erase { addr, len });
        Ok(())
    }
}
