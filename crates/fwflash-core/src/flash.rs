//! Raw flash update algorithm
//!
//! Raw flash targets hold a bootloader image laid out as a small header
//! (preamble) followed by the body. Updates use a header-last discipline:
//!
//! ```text
//!  1. erase ceil(size / erase_block) blocks from offset 0
//!  2. write image[header..]  at offset `header`     (body)
//!  3. write image[..header]  at offset 0            (header)
//!  4. read back `size` bytes and compare
//! ```
//!
//! Erased NOR flash reads as `0xFF`, so a power cut between steps 2 and 3
//! leaves an erased header in front of a complete body. That never
//! compares equal to a real image, so the next verify reports a mismatch
//! instead of a bootable-but-wrong device.

use std::time::Instant;
use thiserror::Error;

use crate::outcome::{InstallOutcome, InstallReport, VerifyOutcome};

/// Chunk size used for read-back comparisons
const VERIFY_CHUNK_SIZE: usize = 4096;

/// Errors from a raw flash backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlashError {
    /// Read failed
    #[error("read of {len} bytes at {addr:#x} failed")]
    Read { addr: u32, len: usize },
    /// Write failed
    #[error("write of {len} bytes at {addr:#x} failed")]
    Write { addr: u32, len: usize },
    /// Erase failed
    #[error("erase of {len} bytes at {addr:#x} failed")]
    Erase { addr: u32, len: u32 },
    /// Access beyond the end of the device
    #[error("access at {addr:#x} (+{len}) beyond device size {size:#x}")]
    OutOfBounds { addr: u32, len: usize, size: usize },
    /// Device is read-only
    #[error("device is write protected")]
    WriteProtected,
    /// Image is empty
    #[error("image is empty")]
    EmptyImage,
}

/// Result type for raw flash operations
pub type FlashResult<T> = std::result::Result<T, FlashError>;

/// Address-based access to a raw flash device
///
/// The backend handles the flash protocol; callers only see read, write
/// and erase by address.
pub trait RawFlash {
    /// Total device size in bytes
    fn size(&self) -> usize;

    /// Read `buf.len()` bytes starting at `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> FlashResult<()>;

    /// Write `data` at `addr` (the region must already be erased)
    fn write(&mut self, addr: u32, data: &[u8]) -> FlashResult<()>;

    /// Erase `len` bytes starting at `addr`; both must be block aligned
    fn erase(&mut self, addr: u32, len: u32) -> FlashResult<()>;
}

impl<T: RawFlash + ?Sized> RawFlash for Box<T> {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> FlashResult<()> {
        (**self).read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> FlashResult<()> {
        (**self).write(addr, data)
    }

    fn erase(&mut self, addr: u32, len: u32) -> FlashResult<()> {
        (**self).erase(addr, len)
    }
}

/// Hardware constants for a raw flash target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Erase granularity in bytes
    pub erase_block_size: u32,
    /// Size of the image header written last
    pub header_size: u32,
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self {
            erase_block_size: 4096,
            header_size: 32,
        }
    }
}

impl FlashGeometry {
    /// Number of erase blocks needed to cover `size` bytes
    pub fn erase_blocks(&self, size: usize) -> usize {
        size.div_ceil(self.erase_block_size as usize)
    }

    /// Bytes erased for an image of `size` bytes
    ///
    /// `None` if the erased span does not fit a 32-bit address.
    pub fn erase_len(&self, size: usize) -> Option<u32> {
        let blocks = u32::try_from(self.erase_blocks(size)).ok()?;
        blocks.checked_mul(self.erase_block_size)
    }
}

/// Compare the first `image.len()` bytes of the device against `image`
pub fn verify_image<F: RawFlash + ?Sized>(
    flash: &mut F,
    image: &[u8],
) -> FlashResult<VerifyOutcome> {
    if image.is_empty() {
        return Err(FlashError::EmptyImage);
    }
    check_bounds(flash, 0, image.len())?;

    let mut buf = vec![0u8; VERIFY_CHUNK_SIZE];
    let mut offset = 0usize;
    while offset < image.len() {
        let len = std::cmp::min(VERIFY_CHUNK_SIZE, image.len() - offset);
        let chunk = &mut buf[..len];
        flash.read(offset as u32, chunk)?;
        if chunk != &image[offset..offset + len] {
            log::debug!("Flash content differs in chunk at {:#x}", offset);
            return Ok(VerifyOutcome::Mismatch);
        }
        offset += len;
    }
    Ok(VerifyOutcome::Match)
}

/// Install `image` unless the device already holds it
///
/// Any `Err` means the device could not be driven and its content is
/// undefined. A clean write that does not read back correctly is
/// reported as [`InstallOutcome::Failed`].
pub fn install_image<F: RawFlash + ?Sized>(
    flash: &mut F,
    image: &[u8],
    geometry: &FlashGeometry,
) -> FlashResult<InstallReport> {
    if verify_image(flash, image)? == VerifyOutcome::Match {
        log::info!("Flash already contains the image - no changes needed");
        return Ok(InstallOutcome::SkippedUpToDate.into());
    }

    let blocks = geometry.erase_blocks(image.len());
    let erase_len = geometry
        .erase_len(image.len())
        .ok_or(FlashError::OutOfBounds {
            addr: 0,
            len: image.len(),
            size: flash.size(),
        })?;
    check_bounds(flash, 0, erase_len as usize)?;

    let started = Instant::now();
    log::info!(
        "Erasing {} block(s) ({} bytes) of {} byte blocks",
        blocks,
        erase_len,
        geometry.erase_block_size
    );
    flash.erase(0, erase_len)?;

    let header = std::cmp::min(geometry.header_size as usize, image.len());
    if header < image.len() {
        log::debug!(
            "Writing body: {} bytes at {:#x}",
            image.len() - header,
            header
        );
        flash.write(header as u32, &image[header..])?;
    }
    log::debug!("Writing header: {} bytes at 0x0", header);
    flash.write(0, &image[..header])?;
    let window = started.elapsed();

    let outcome = match verify_image(flash, image)? {
        VerifyOutcome::Match => InstallOutcome::Updated,
        VerifyOutcome::Mismatch => {
            log::warn!("Flash content does not match the image after writing");
            InstallOutcome::Failed
        }
    };

    Ok(InstallReport {
        outcome,
        bricking_window: Some(window),
    })
}

/// Addresses are 32-bit, so nothing past 4 GiB is reachable either
fn check_bounds<F: RawFlash + ?Sized>(flash: &F, addr: u32, len: usize) -> FlashResult<()> {
    let size = flash.size();
    let end = u64::from(addr).saturating_add(len as u64);
    if end > size as u64 || end > 1u64 << 32 {
        return Err(FlashError::OutOfBounds { addr, len, size });
    }
    Ok(())
}
