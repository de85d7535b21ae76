//! Shared file registry
//!
//! Check-type parsers contribute helper files (entrypoints, shell function
//! libraries) that are exported next to the generated documents. Many
//! rules may contribute the same file; two entries sharing a name with
//! differing content or source are a hard error, because the exported
//! file could otherwise silently depend on rule order.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::registry::Registry;

/// A file exported alongside the generated documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    name: String,
    source: Option<PathBuf>,
    content: Option<String>,
    executable: bool,
}

impl SharedFile {
    /// Export name of the file
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source path to copy from, if the file is not inline
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Inline content, if any
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Whether the exported file is marked executable
    pub fn executable(&self) -> bool {
        self.executable
    }

    /// Mark the exported file executable
    pub fn set_executable(&mut self) -> &mut Self {
        self.executable = true;
        self
    }
}

/// Deduplicating registry of shared files
#[derive(Debug, Clone, Default)]
pub struct SharedFiles {
    files: Registry<SharedFile>,
}

impl SharedFiles {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file with inline content
    ///
    /// Re-registering the same name with identical content returns the
    /// existing entry; differing content is a collision.
    pub fn insert_content(
        &mut self,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<&mut SharedFile> {
        let name = name.into();
        let content = content.into();
        if let Some(existing) = self.files.get(&name) {
            if existing.content.as_deref() != Some(content.as_str()) {
                return Err(Error::collision(format!(
                    "shared file '{}' already registered with different content",
                    name
                )));
            }
            tracing::debug!(name = %name, "shared file deduplicated");
            return Ok(self
                .files
                .get_mut(&name)
                .unwrap_or_else(|| unreachable!("entry checked above")));
        }
        Ok(self.files.get_or_insert_with(name.clone(), || SharedFile {
            name,
            source: None,
            content: Some(content),
            executable: false,
        }))
    }

    /// Register a file copied from a source path
    ///
    /// The export name defaults to the source's file name. Re-registering
    /// the same name from the identical source returns the existing
    /// entry; a differing source is a collision.
    pub fn insert_source(
        &mut self,
        name: Option<&str>,
        source: impl Into<PathBuf>,
    ) -> Result<&mut SharedFile> {
        let source = source.into();
        let name = match name {
            Some(name) => name.to_string(),
            None => source
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::validation(format!(
                        "shared file source {:?} has no usable file name",
                        source
                    ))
                })?,
        };
        if let Some(existing) = self.files.get(&name) {
            if existing.source.as_deref() != Some(source.as_path()) {
                return Err(Error::collision(format!(
                    "shared file '{}' already registered from a different source",
                    name
                )));
            }
            tracing::debug!(name = %name, "shared file deduplicated");
            return Ok(self
                .files
                .get_mut(&name)
                .unwrap_or_else(|| unreachable!("entry checked above")));
        }
        Ok(self.files.get_or_insert_with(name.clone(), || SharedFile {
            name,
            source: Some(source),
            content: None,
            executable: false,
        }))
    }

    /// Borrow a registered file by name
    pub fn get(&self, name: &str) -> Option<&SharedFile> {
        self.files.get(name)
    }

    /// Files in registration order
    pub fn iter(&self) -> impl Iterator<Item = &SharedFile> {
        self.files.iter()
    }

    /// Number of registered files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files are registered
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every registered file under `output_dir`
    ///
    /// Source-backed files resolve relative paths against `workdir`, then
    /// `basedir`. Called only after the documents assembled successfully,
    /// so a failed conversion exports nothing.
    pub fn export(
        &self,
        output_dir: &Path,
        workdir: &Path,
        basedir: Option<&Path>,
    ) -> Result<()> {
        for file in self.files.iter() {
            let target = output_dir.join(&file.name);
            let bytes: Vec<u8> = match (&file.content, &file.source) {
                (Some(content), _) => content.clone().into_bytes(),
                (None, Some(source)) => {
                    let resolved = resolve_source(source, workdir, basedir);
                    std::fs::read(&resolved).map_err(|e| Error::io(&resolved, &e))?
                }
                (None, None) => {
                    return Err(Error::validation(format!(
                        "shared file '{}' has neither content nor source",
                        file.name
                    )))
                }
            };
            std::fs::write(&target, bytes).map_err(|e| Error::io(&target, &e))?;
            if file.executable {
                set_executable(&target)?;
            }
            tracing::debug!(name = %file.name, "shared file exported");
        }
        Ok(())
    }
}

fn resolve_source(source: &Path, workdir: &Path, basedir: Option<&Path>) -> PathBuf {
    if source.is_absolute() {
        return source.to_path_buf();
    }
    let from_workdir = workdir.join(source);
    if from_workdir.exists() {
        return from_workdir;
    }
    if let Some(basedir) = basedir {
        let from_basedir = basedir.join(source);
        if from_basedir.exists() {
            return from_basedir;
        }
    }
    from_workdir
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = std::fs::metadata(path).map_err(|e| Error::io(path, &e))?;
    let mut permissions = metadata.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    std::fs::set_permissions(path, permissions).map_err(|e| Error::io(path, &e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
