//! Content digests for firmware artifacts
//!
//! The manifest declares one hex digest per section. The algorithm is
//! implied by the digest length: 32 hex digits is MD5 (what the reference
//! packages ship), 64 is SHA-256.

use crate::error::{Error, Result};
use crate::manifest::ResolvedArtifact;
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer size for streaming digests
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// 128-bit MD5
    Md5,
    /// 256-bit SHA-2
    Sha256,
}

impl HashAlgorithm {
    /// Infer the algorithm from a hex digest string
    ///
    /// Only lowercase hex is accepted; the comparison is case-sensitive.
    pub fn from_hex_digest(digest: &str) -> Option<Self> {
        if !digest.bytes().all(is_lower_hex) {
            return None;
        }
        match digest.len() {
            32 => Some(Self::Md5),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Digest everything readable from `reader`, as lowercase hex
    pub fn digest_reader<R: Read>(self, reader: R) -> io::Result<String> {
        match self {
            Self::Md5 => stream::<Md5, R>(reader),
            Self::Sha256 => stream::<Sha256, R>(reader),
        }
    }

    /// Digest a byte slice, as lowercase hex
    pub fn digest_bytes(self, data: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
        }
    }

    /// Digest a file, as lowercase hex
    pub fn digest_file(self, path: &Path) -> Result<String> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        self.digest_reader(file).map_err(|e| Error::io(path, e))
    }
}

fn is_lower_hex(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'a'..=b'f')
}

fn stream<D: Digest, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Recompute the digest of `artifact` and compare it to the manifest hash
///
/// Returns [`Error::HashMismatch`] on any difference. There is no partial
/// matching: the hex strings must be identical.
pub fn verify(artifact: &ResolvedArtifact) -> Result<()> {
    let actual = artifact.algorithm().digest_file(artifact.path())?;
    if actual != artifact.hash() {
        return Err(Error::HashMismatch {
            section: artifact.section().to_string(),
            expected: artifact.hash().to_string(),
            actual,
        });
    }
    log::debug!(
        "{}: {} matches manifest hash {}",
        artifact.section(),
        artifact.path().display(),
        actual
    );
    Ok(())
}
