//! Package manifest: compatibility check and section resolution
//!
//! The manifest is a JSON object with top-level `Model` and `Generation`
//! fields. Every other top-level key is a section:
//!
//! ```json
//! {
//!   "Model": "ctrl-a",
//!   "Generation": [3, 4],
//!   "boot":   { "Name": "image.ub",  "Hash": "9e107d9d372bb6826bd81d3542a419d6" },
//!   "flash1": { "Name": "spl1.bin",  "Hash": "e4d909c290d0fb1ca068ffaddf22cbd0" }
//! }
//! ```

use crate::error::{ManifestError, Result};
use crate::hash::HashAlgorithm;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Parsed package manifest
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Hardware model this package targets
    #[serde(rename = "Model")]
    pub model: String,

    /// Hardware generations this package supports
    #[serde(rename = "Generation", deserialize_with = "generations")]
    pub generations: Vec<String>,

    /// Remaining top-level entries, one per section
    #[serde(flatten)]
    sections: Map<String, Value>,
}

/// Accept `[3, 4]`, `["3", "4"]`, or a bare scalar
fn generations<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    fn scalar<E: serde::de::Error>(value: &Value) -> std::result::Result<String, E> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(E::custom(format!("invalid generation value: {}", other))),
        }
    }

    match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().map(scalar::<D::Error>).collect(),
        Value::Null => Err(D::Error::custom("Generation is null")),
        other => Ok(vec![scalar::<D::Error>(&other)?]),
    }
}

#[derive(Debug, Deserialize)]
struct SectionFields {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Hash")]
    hash: Option<String>,
}

impl Manifest {
    /// Parse a manifest from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ManifestError::Malformed(e).into())
    }

    /// Read and parse a manifest file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Section names, in file order
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Check the manifest against the device's model and generation
    ///
    /// The model must match exactly. The generation matches if it equals
    /// any one of the manifest's generations.
    pub fn validate(&self, model: &str, generation: &str) -> Result<()> {
        if self.model != model {
            return Err(ManifestError::ModelMismatch {
                manifest: self.model.clone(),
                requested: model.to_string(),
            }
            .into());
        }

        if !self.generations.iter().any(|g| g == generation) {
            return Err(ManifestError::GenerationMismatch {
                requested: generation.to_string(),
                supported: self.generations.join(", "),
            }
            .into());
        }

        log::debug!(
            "Manifest accepted for model '{}' generation '{}'",
            model,
            generation
        );
        Ok(())
    }

    /// Resolve a section to its extracted file and expected hash
    pub fn resolve(&self, section: &str, base_dir: &Path) -> Result<ResolvedArtifact> {
        let value = self
            .sections
            .get(section)
            .ok_or_else(|| ManifestError::MissingSection(section.to_string()))?;

        let fields = SectionFields::deserialize(value).map_err(|e| {
            ManifestError::InvalidSection {
                section: section.to_string(),
                message: e.to_string(),
            }
        })?;

        let name = fields.name.ok_or_else(|| ManifestError::MissingField {
            section: section.to_string(),
            field: "Name",
        })?;
        let hash = fields.hash.ok_or_else(|| ManifestError::MissingField {
            section: section.to_string(),
            field: "Hash",
        })?;

        if !is_contained(Path::new(&name)) {
            return Err(ManifestError::UnsafePath {
                section: section.to_string(),
                name,
            }
            .into());
        }

        let algorithm =
            HashAlgorithm::from_hex_digest(&hash).ok_or_else(|| ManifestError::UnknownHash {
                section: section.to_string(),
                hash: hash.clone(),
            })?;

        Ok(ResolvedArtifact {
            section: section.to_string(),
            path: base_dir.join(&name),
            file_name: name,
            hash,
            algorithm,
        })
    }
}

/// True if `path` is relative and never climbs out of its base
fn is_contained(path: &Path) -> bool {
    let mut components = path.components().peekable();
    if components.peek().is_none() {
        return false;
    }
    components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// A manifest section bound to its extracted file
///
/// Created once per requested section and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    section: String,
    path: PathBuf,
    file_name: String,
    hash: String,
    algorithm: HashAlgorithm,
}

impl ResolvedArtifact {
    /// Manifest section name
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Absolute path of the extracted file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name as declared in the manifest
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Expected lowercase hex digest
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Digest algorithm implied by the hash
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}
