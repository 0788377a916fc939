//! Resolution of caller-supplied relative paths against a tenant storage root.

use std::io;
use std::path::{Component, Path, PathBuf};

use tenant_host_sdk::TenantId;

use super::error::DomainError;

/// A relative path verified to stay inside a tenant's storage root.
///
/// Resolution is lexical and touches no filesystem state, so a rejected path
/// never causes a filesystem operation. [`ScopedPath::check_links`] adds the
/// symlink check once the caller is about to touch the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedPath {
    root: PathBuf,
    relative: PathBuf,
}

impl ScopedPath {
    /// Resolve `raw` against `root`.
    ///
    /// Accepts `/`-separated relative paths; `.` segments and `..` segments
    /// that stay inside the root are folded away.
    ///
    /// # Errors
    /// `PathEscape` for absolute paths, NUL bytes, or `..` climbing above the root.
    pub fn resolve(tenant: &TenantId, root: &Path, raw: &str) -> Result<Self, DomainError> {
        let escape = || DomainError::PathEscape {
            tenant: tenant.clone(),
            path: raw.to_owned(),
        };

        if raw.contains('\0') {
            return Err(escape());
        }

        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        for component in Path::new(raw).components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(escape());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(escape()),
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            relative: parts.iter().collect(),
        })
    }

    /// Normalized path relative to the storage root; empty for the root itself.
    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    #[must_use]
    pub fn absolute(&self) -> PathBuf {
        self.root.join(&self.relative)
    }

    /// Logical path as recorded in audit events (`/`-separated).
    #[must_use]
    pub fn logical(&self) -> String {
        self.relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Verify that the deepest existing ancestor of this path, with symlinks
    /// resolved, is still inside the canonical storage root.
    ///
    /// Returns `Ok(false)` when a link leads outside the root.
    ///
    /// # Errors
    /// I/O errors other than missing path components.
    pub async fn check_links(&self) -> io::Result<bool> {
        let root = tokio::fs::canonicalize(&self.root).await?;

        let mut probe = self.absolute();
        loop {
            match tokio::fs::canonicalize(&probe).await {
                Ok(resolved) => return Ok(resolved.starts_with(&root)),
                Err(e) if is_missing(&e) => {
                    // a dangling link still escapes if its target lies outside
                    if let Ok(target) = tokio::fs::read_link(&probe).await {
                        let target = if target.is_absolute() {
                            target
                        } else {
                            probe.parent().map_or(target.clone(), |p| p.join(&target))
                        };
                        if !lexically_within(&target, &self.root) {
                            return Ok(false);
                        }
                    }
                    if !probe.pop() || !probe.starts_with(&self.root) {
                        return Ok(true);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// A missing component, or a regular file used as a directory.
pub(crate) fn is_missing(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

fn lexically_within(path: &Path, root: &Path) -> bool {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized.starts_with(root)
}
