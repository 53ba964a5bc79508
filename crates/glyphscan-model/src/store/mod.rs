//! Model persistence.
//!
//! Artifacts are wrapped in a small versioned envelope and written either as
//! bincode (compact, the default) or JSON (inspectable). Both encodings round
//! trip a model exactly.

mod binary;
mod json;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::pipeline::GlyphModel;
use crate::{ModelError, Result};

/// Current envelope version.
pub const ARTIFACT_VERSION: u32 = 2;

/// Trait for model stores.
pub trait ModelStore {
    /// Load the model stored under `id`.
    fn load(&self, id: &str) -> Result<GlyphModel>;

    /// Store `model` under `id`, replacing any previous artifact.
    fn save(&self, model: &GlyphModel, id: &str) -> Result<()>;
}

/// On-disk encoding of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Bincode,
    Json,
}

impl ArtifactFormat {
    /// Pick the format from a file extension (`.json` -> JSON, anything else -> bincode).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ArtifactFormat::Json,
            _ => ArtifactFormat::Bincode,
        }
    }

    pub fn encode(&self, model: &GlyphModel) -> Result<Vec<u8>> {
        let envelope = Envelope {
            version: ARTIFACT_VERSION,
            model: model.clone(),
        };
        match self {
            ArtifactFormat::Bincode => binary::encode(&envelope),
            ArtifactFormat::Json => json::encode(&envelope),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<GlyphModel> {
        let envelope = match self {
            ArtifactFormat::Bincode => binary::decode(bytes)?,
            ArtifactFormat::Json => json::decode(bytes)?,
        };

        if envelope.version != ARTIFACT_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: envelope.version,
                expected: ARTIFACT_VERSION,
            });
        }

        envelope.model.validate()?;
        Ok(envelope.model)
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    model: GlyphModel,
}

/// Store keeping one file per artifact under a root directory.
///
/// Identifiers are paths relative to the root; absolute identifiers are used
/// as is.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the current directory.
    pub fn current_dir() -> Self {
        Self::new(".")
    }

    /// Resolve an identifier to a file path.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }
}

impl ModelStore for FileStore {
    fn load(&self, id: &str) -> Result<GlyphModel> {
        let path = self.path_for(id);
        debug!("Loading model artifact from {}", path.display());

        let bytes = fs::read(&path)?;
        let model = ArtifactFormat::from_path(&path).decode(&bytes)?;

        debug!(
            "Loaded model '{}' with {} classes",
            model.metadata().name,
            model.classes().len()
        );
        Ok(model)
    }

    fn save(&self, model: &GlyphModel, id: &str) -> Result<()> {
        let path = self.path_for(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = ArtifactFormat::from_path(&path).encode(model)?;
        fs::write(&path, bytes)?;

        info!("Saved model '{}' to {}", model.metadata().name, path.display());
        Ok(())
    }
}
