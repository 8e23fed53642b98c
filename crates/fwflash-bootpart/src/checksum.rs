//! Checksum file kept next to the boot image
//!
//! One line per file, in the format written by `md5sum` and `sha256sum`:
//!
//! ```text
//! 900150983cd24fb0d6963f7d28e17f72  boot.img
//! ```

use fwflash_core::hash::HashAlgorithm;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// One file and its expected digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumEntry {
    /// Lowercase hex digest
    pub digest: String,
    /// File name relative to the partition root
    pub file_name: String,
}

impl ChecksumEntry {
    /// Algorithm implied by the digest length
    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        HashAlgorithm::from_hex_digest(&self.digest)
    }
}

/// Parsed checksum file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumFile {
    entries: Vec<ChecksumEntry>,
}

impl ChecksumFile {
    /// A file listing exactly one entry
    pub fn single(digest: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            entries: vec![ChecksumEntry {
                digest: digest.into(),
                file_name: file_name.into(),
            }],
        }
    }

    /// Parse checksum file contents
    ///
    /// Returns `None` if any non-blank line is malformed. A `*` before the
    /// file name (binary mode marker) is accepted and dropped.
    pub fn parse(text: &str) -> Option<Self> {
        let mut entries = Vec::new();
        for line in text.lines().map(str::trim_end) {
            if line.is_empty() {
                continue;
            }
            let (digest, rest) = line.split_once(' ')?;
            let file_name = rest.trim_start_matches(' ').trim_start_matches('*');
            HashAlgorithm::from_hex_digest(digest)?;
            if file_name.is_empty() || file_name.contains('/') {
                return None;
            }
            entries.push(ChecksumEntry {
                digest: digest.to_string(),
                file_name: file_name.to_string(),
            });
        }
        Some(Self { entries })
    }

    /// Read and parse the checksum file at `path`
    ///
    /// A missing file reads as `Ok(None)`, as does malformed content.
    pub fn load(path: &Path) -> io::Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// All entries in file order
    pub fn entries(&self) -> &[ChecksumEntry] {
        &self.entries
    }

    /// Digest recorded for `file_name`
    pub fn digest_for(&self, file_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.file_name == file_name)
            .map(|e| e.digest.as_str())
    }

    /// Check one entry against the file stored under `root`
    ///
    /// False if the entry is absent, the file is missing or the digest
    /// differs.
    pub fn validates(&self, root: &Path, file_name: &str) -> io::Result<bool> {
        let Some(entry) = self.entries.iter().find(|e| e.file_name == file_name) else {
            return Ok(false);
        };
        entry_matches(root, entry)
    }

    /// Check every entry against the files stored under `root`
    ///
    /// An empty checksum file validates nothing and returns false.
    pub fn validates_all(&self, root: &Path) -> io::Result<bool> {
        if self.entries.is_empty() {
            return Ok(false);
        }
        for entry in &self.entries {
            if !entry_matches(root, entry)? {
                log::debug!("Checksum mismatch for {}", entry.file_name);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn entry_matches(root: &Path, entry: &ChecksumEntry) -> io::Result<bool> {
    let Some(algorithm) = entry.algorithm() else {
        return Ok(false);
    };
    let file = match File::open(root.join(&entry.file_name)) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    Ok(algorithm.digest_reader(file)? == entry.digest)
}

impl fmt::Display for ChecksumFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}  {}", entry.digest, entry.file_name)?;
        }
        Ok(())
    }
}
