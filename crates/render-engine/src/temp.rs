//! Temporary artifacts owned by a single render.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::{NamedTempFile, TempPath};

use vidmark_common::error::{VidmarkError, VidmarkResult};

const FILE_PREFIX: &str = "vidmark-";

/// A temporary file exclusively owned by one render.
///
/// Consumed by [`TempArtifactManager::release`]. If it is dropped without being
/// released (a panic unwinding through the supervisor), the file is removed anyway.
#[derive(Debug)]
pub struct TempArtifact {
    path: TempPath,
    _claim: Claim,
}

impl TempArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One unit of the manager's outstanding count, returned on drop.
#[derive(Debug)]
struct Claim(Arc<AtomicUsize>);

impl Claim {
    fn new(outstanding: &Arc<AtomicUsize>) -> Self {
        outstanding.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(outstanding))
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Hands out unique temporary paths and removes them again.
#[derive(Debug, Clone)]
pub struct TempArtifactManager {
    dir: PathBuf,
    outstanding: Arc<AtomicUsize>,
}

impl TempArtifactManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Claim a fresh, empty file with the given extension.
    pub fn allocate(&self, extension_hint: &str) -> VidmarkResult<TempArtifact> {
        let file = self.create(extension_hint)?;
        Ok(self.claim(file))
    }

    /// Allocate an artifact and fill it with `bytes`.
    pub fn materialize(&self, bytes: &[u8], extension_hint: &str) -> VidmarkResult<TempArtifact> {
        let mut file = self.create(extension_hint)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(self.claim(file))
    }

    /// Delete the artifact. Failures are logged, never returned.
    pub fn release(&self, artifact: TempArtifact) {
        let TempArtifact { path, _claim } = artifact;
        let display_path = path.to_path_buf();
        match path.close() {
            Ok(()) => {
                tracing::debug!(path = %display_path.display(), "Released temp artifact");
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %display_path.display(), "Temp artifact already gone");
            }
            Err(err) => {
                let failure =
                    VidmarkError::cleanup(format!("failed to delete {}: {err}", display_path.display()));
                tracing::warn!(error = %failure, "Temp artifact cleanup failed");
            }
        }
    }

    /// Artifacts allocated and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn create(&self, extension_hint: &str) -> VidmarkResult<NamedTempFile> {
        std::fs::create_dir_all(&self.dir)?;
        let extension = extension_hint.trim_start_matches('.');
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{extension}")
        };
        let file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        Ok(file)
    }

    fn claim(&self, file: NamedTempFile) -> TempArtifact {
        let path = file.into_temp_path();
        tracing::debug!(path = %path.display(), "Allocated temp artifact");
        TempArtifact {
            path,
            _claim: Claim::new(&self.outstanding),
        }
    }
}
