//! Firmware package extraction
//!
//! A package is a tarball, optionally gzip-compressed, with
//! `manifest.json` and the section images at its root.

use flate2::read::GzDecoder;
use fwflash_core::{Error, Manifest, ManifestError, Result};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Manifest file name at the archive root
pub const MANIFEST_NAME: &str = "manifest.json";

/// gzip member header magic
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Unpack `package` into `dest`
///
/// Compression is detected from the content, not the file name. Entries
/// that would land outside `dest` are skipped by the unpacker.
pub fn extract(package: &Path, dest: &Path) -> Result<()> {
    let file = File::open(package).map_err(|e| {
        Error::Config(format!("cannot open package {}: {}", package.display(), e))
    })?;
    let mut reader = BufReader::new(file);
    let gzip = is_gzip(&mut reader).map_err(|e| read_error(package, e))?;

    let reader: Box<dyn Read> = if gzip {
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(false);
    archive.set_overwrite(true);
    archive.unpack(dest).map_err(|e| read_error(package, e))?;

    log::info!(
        "Extracted {}{}",
        package.display(),
        if gzip { " (gzip)" } else { "" }
    );
    Ok(())
}

/// Unpack `package` into `dest` and parse its manifest
pub fn open(package: &Path, dest: &Path) -> Result<Manifest> {
    extract(package, dest)?;
    Manifest::from_file(&dest.join(MANIFEST_NAME))
}

fn is_gzip(reader: &mut BufReader<File>) -> io::Result<bool> {
    use std::io::BufRead;
    let head = reader.fill_buf()?;
    Ok(head.starts_with(&GZIP_MAGIC))
}

fn read_error(package: &Path, source: io::Error) -> Error {
    Error::Manifest(ManifestError::Read {
        path: package.to_path_buf(),
        source,
    })
}
