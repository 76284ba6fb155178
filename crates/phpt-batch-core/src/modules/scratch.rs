//! Scratch files holding the code under test.
//!
//! Every [`CodeFile`] removes itself when dropped, including on early `?`
//! returns. Removal is best effort and only logged.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempPath};
use tracing::{debug, warn};

const CODE_FILE_PREFIX: &str = "phpt-batch-";
const CODE_FILE_SUFFIX: &str = ".php";

#[derive(Debug, thiserror::Error)]
pub enum ScratchError {
    #[error("failed to create scratch directory '{}': {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to allocate code file in '{}': {source}", directory.display())]
    CreateFile {
        directory: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write code file '{}': {source}", path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScratchError {
    pub const fn placeholder(&self) -> &'static str {
        match self {
            Self::CreateDirectory { .. } => "IO.SCRATCH_DIR",
            Self::CreateFile { .. } => "IO.SCRATCH_FILE_CREATE",
            Self::WriteFile { .. } => "IO.SCRATCH_FILE_WRITE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchDirectory {
    path: PathBuf,
}

impl ScratchDirectory {
    /// Creates the directory if needed. The stored path is absolute so that
    /// file paths handed to the analyzer match the paths it reports back.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ScratchError> {
        let requested = path.as_ref();
        fs::create_dir_all(requested).map_err(|source| ScratchError::CreateDirectory {
            path: requested.to_path_buf(),
            source,
        })?;
        let path = absolute_directory(requested).map_err(|source| ScratchError::CreateDirectory {
            path: requested.to_path_buf(),
            source,
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create_code_file(&self, contents: &str) -> Result<CodeFile, ScratchError> {
        let mut file = Builder::new()
            .prefix(CODE_FILE_PREFIX)
            .suffix(CODE_FILE_SUFFIX)
            .tempfile_in(&self.path)
            .map_err(|source| ScratchError::CreateFile {
                directory: self.path.clone(),
                source,
            })?;
        let path = file.path().to_path_buf();

        file.write_all(contents.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| ScratchError::WriteFile {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), bytes = contents.len(), "materialized code file");
        Ok(CodeFile {
            key: path.to_string_lossy().into_owned(),
            path,
            temp: Some(file.into_temp_path()),
        })
    }
}

#[cfg(not(windows))]
fn absolute_directory(path: &Path) -> std::io::Result<PathBuf> {
    fs::canonicalize(path)
}

#[cfg(windows)]
fn absolute_directory(path: &Path) -> std::io::Result<PathBuf> {
    std::path::absolute(path)
}

/// Owning guard for one materialized code file.
#[derive(Debug)]
pub struct CodeFile {
    path: PathBuf,
    key: String,
    temp: Option<TempPath>,
}

impl CodeFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path as the analyzer reports it in `file_path`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn delete(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(temp) = self.temp.take() else {
            return;
        };
        match temp.close() {
            Ok(()) => debug!(path = %self.path.display(), "removed code file"),
            Err(error) => warn!(
                path = %self.path.display(),
                %error,
                "failed to remove code file"
            ),
        }
    }
}

impl Drop for CodeFile {
    fn drop(&mut self) {
        self.release();
    }
}
