//! Durable storage capability and its filesystem implementation.

use std::path::{Path, PathBuf};

use vidmark_common::error::{VidmarkError, VidmarkResult};
use vidmark_overlay_model::{DurableArtifactHandle, ResourceHandle};

const FILE_SCHEME: &str = "file://";

/// Platform storage the orchestrator reads sources from and commits renders to.
pub trait StorageResolver: Send + Sync {
    /// Locate a stored resource on the filesystem.
    fn resolve_to_path(&self, handle: &ResourceHandle) -> VidmarkResult<PathBuf>;

    /// Commit a finished temp file and return a handle to the durable copy.
    fn persist(
        &self,
        temp_file: &Path,
        suggested_name: &str,
        mime_type: &str,
    ) -> VidmarkResult<DurableArtifactHandle>;

    /// Remove a stored resource.
    fn delete(&self, handle: &ResourceHandle) -> VidmarkResult<()>;
}

/// Storage rooted at a local directory.
///
/// Handles are `file://` URIs or paths relative to the root. Renders land in
/// `<root>/<folder>/`.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
    folder: String,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>, folder: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            folder: folder.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory persisted renders are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.folder)
    }

    fn handle_path(&self, handle: &ResourceHandle) -> PathBuf {
        let raw = handle.as_str();
        match raw.strip_prefix(FILE_SCHEME) {
            Some(path) => PathBuf::from(path),
            None => {
                let path = Path::new(raw);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.root.join(path)
                }
            }
        }
    }

    fn unique_destination(&self, dir: &Path, name: &str, extension: &str) -> PathBuf {
        let file_name = |suffix: Option<u32>| match (suffix, extension.is_empty()) {
            (None, true) => name.to_string(),
            (None, false) => format!("{name}.{extension}"),
            (Some(n), true) => format!("{name}-{n}"),
            (Some(n), false) => format!("{name}-{n}.{extension}"),
        };

        let mut candidate = dir.join(file_name(None));
        let mut suffix = 1;
        while candidate.exists() {
            candidate = dir.join(file_name(Some(suffix)));
            suffix += 1;
        }
        candidate
    }
}

impl StorageResolver for FileSystemStorage {
    fn resolve_to_path(&self, handle: &ResourceHandle) -> VidmarkResult<PathBuf> {
        let path = self.handle_path(handle);
        if path.is_file() {
            Ok(path)
        } else {
            Err(VidmarkError::not_found(handle.as_str()))
        }
    }

    fn persist(
        &self,
        temp_file: &Path,
        suggested_name: &str,
        mime_type: &str,
    ) -> VidmarkResult<DurableArtifactHandle> {
        if !temp_file.is_file() {
            return Err(VidmarkError::persist(format!(
                "rendered file {} does not exist",
                temp_file.display()
            )));
        }

        let dir = self.output_dir();
        std::fs::create_dir_all(&dir).map_err(|e| {
            VidmarkError::persist(format!("cannot create {}: {e}", dir.display()))
        })?;

        let name = sanitize_name(suggested_name);
        let destination = self.unique_destination(&dir, &name, extension_for_mime(mime_type));

        // The temp artifact stays owned by the caller and is released afterwards.
        std::fs::copy(temp_file, &destination).map_err(|e| {
            VidmarkError::persist(format!(
                "cannot copy {} to {}: {e}",
                temp_file.display(),
                destination.display()
            ))
        })?;

        tracing::info!(
            path = %destination.display(),
            mime_type,
            "Persisted render"
        );
        Ok(DurableArtifactHandle::new(format!(
            "{FILE_SCHEME}{}",
            destination.display()
        )))
    }

    fn delete(&self, handle: &ResourceHandle) -> VidmarkResult<()> {
        let path = self.resolve_to_path(handle)?;
        std::fs::remove_file(&path)?;
        tracing::debug!(path = %path.display(), "Deleted stored resource");
        Ok(())
    }
}

/// File extension for the MIME types vidmark produces.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "",
    }
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "render".to_string()
    } else {
        cleaned.to_string()
    }
}
