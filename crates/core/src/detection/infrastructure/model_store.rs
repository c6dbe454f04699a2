use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::MODEL_EXTENSION;

#[derive(Error, Debug)]
pub enum ModelStoreError {
    #[error("could not determine a models directory")]
    NoDirectory,
    #[error("failed to create models directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read models directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a .{MODEL_EXTENSION} model file")]
    NotAModel { path: PathBuf },
    #[error("model {name} is already installed (pass overwrite to replace it)")]
    AlreadyInstalled { name: String },
    #[error("failed to copy model to {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Directory of user-installed detection models.
///
/// Models are plain `.onnx` files copied into the store; installing one
/// with a name that already exists requires an explicit overwrite decision
/// so a misclick cannot silently replace a model.
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Opens the platform-default store, creating it on first use.
    ///
    /// - macOS: `~/Library/Application Support/SightPlay/models/`
    /// - Linux: `$XDG_DATA_HOME/SightPlay/models/` or `~/.local/share/...`
    /// - Windows: `%APPDATA%/SightPlay/models/`
    pub fn open_default() -> Result<Self, ModelStoreError> {
        let dir = dirs::data_dir()
            .map(|d| d.join("SightPlay").join("models"))
            .ok_or(ModelStoreError::NoDirectory)?;
        Self::open(dir)
    }

    /// Opens (and if needed creates) a store at an explicit location.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ModelStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ModelStoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of installed models, sorted.
    pub fn list(&self) -> Result<Vec<String>, ModelStoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| ModelStoreError::ReadDir {
            path: self.dir.clone(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_model_file(p))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Copies a model file into the store and returns its installed path.
    pub fn install(&self, source: &Path, overwrite: bool) -> Result<PathBuf, ModelStoreError> {
        if !is_model_file(source) {
            return Err(ModelStoreError::NotAModel {
                path: source.to_path_buf(),
            });
        }
        let name = source
            .file_name()
            .ok_or_else(|| ModelStoreError::NotAModel {
                path: source.to_path_buf(),
            })?;
        let dest = self.dir.join(name);

        if dest.exists() && !overwrite {
            return Err(ModelStoreError::AlreadyInstalled {
                name: name.to_string_lossy().into_owned(),
            });
        }

        fs::copy(source, &dest).map_err(|source| ModelStoreError::Copy {
            path: dest.clone(),
            source,
        })?;
        log::info!("installed model {}", dest.display());
        Ok(dest)
    }

    /// Resolves a model reference: an installed name, or a path used as-is.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let installed = self.dir.join(reference);
        if installed.is_file() {
            return Some(installed);
        }
        let direct = PathBuf::from(reference);
        if direct.is_file() {
            return Some(direct);
        }
        None
    }
}

fn is_model_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(MODEL_EXTENSION))
        .unwrap_or(false)
}
