//! PathGuard: confines user-supplied paths to a role's namespace roots.
//!
//! Resolution runs in two passes:
//!
//! 1. **Lexical**: reject empty or overlong input, control characters and any
//!    `..` segment; join relative input to the primary root; require absolute
//!    input to already sit under a root. Failures are [`GateError::InvalidPath`].
//! 2. **Canonical**: resolve symlinks and re-check containment. A path that
//!    only leaves the namespace through a symlink is [`GateError::PathEscape`].
//!
//! Paths that don't exist yet (mkdir targets, copy destinations) are resolved
//! by canonicalizing their deepest existing ancestor. A dangling symlink on the
//! way is followed through its stored target, so it can't be used to create a
//! file outside the namespace.

use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{GateError, GateResult, IoResultExt};

/// Upper bound on dangling-symlink hops during partial canonicalization.
const MAX_LINK_HOPS: usize = 40;

/// Validates and confines paths for one principal.
#[derive(Debug, Clone)]
pub struct PathGuard {
    roots: Vec<PathBuf>,
    max_path_len: usize,
}

impl PathGuard {
    /// `roots` must be non-empty; the first is where relative paths land.
    pub fn new(roots: Vec<PathBuf>, max_path_len: usize) -> Self {
        debug_assert!(!roots.is_empty());
        Self {
            roots,
            max_path_len,
        }
    }

    pub fn primary_root(&self) -> &Path {
        &self.roots[0]
    }

    /// Resolve `raw`, following symlinks all the way.
    pub fn resolve(&self, raw: &str) -> GateResult<PathBuf> {
        let lexical = self.lexical(raw)?;
        let canonical = canonicalize_partial(&lexical).at(&lexical)?;
        self.check_contained(&canonical)?;
        Ok(canonical)
    }

    /// Resolve `raw` without following its final component.
    ///
    /// Used where the operation acts on a link itself: the link path of
    /// `symlink`, the target of `rmtree`, the source of `move`.
    pub fn resolve_no_follow(&self, raw: &str) -> GateResult<PathBuf> {
        let lexical = self.lexical(raw)?;
        let (Some(parent), Some(name)) = (lexical.parent(), lexical.file_name()) else {
            return Err(GateError::invalid_path(raw, "path has no final component"));
        };
        let parent = canonicalize_partial(parent).at(parent)?;
        let full = parent.join(name);
        self.check_contained(&full)?;
        Ok(full)
    }

    /// Re-run the canonical pass on a path derived from validated ones,
    /// e.g. `dir/<name>` when copying into a directory.
    pub fn resolve_within(&self, path: &Path) -> GateResult<PathBuf> {
        let canonical = canonicalize_partial(path).at(path)?;
        self.check_contained(&canonical)?;
        Ok(canonical)
    }

    /// Check where a symlink stored at `link` pointing to `target` ends up.
    ///
    /// Relative targets are taken relative to the link's directory.
    pub fn check_link_target(&self, link: &Path, target: &str) -> GateResult<PathBuf> {
        let target = Path::new(target);
        let candidate = if target.is_absolute() {
            target.to_path_buf()
        } else {
            link.parent().unwrap_or(Path::new("/")).join(target)
        };
        let resolved = canonicalize_partial(&candidate).map_err(|_| GateError::PathEscape {
            path: candidate.clone(),
        })?;
        self.check_contained(&resolved)?;
        Ok(resolved)
    }

    /// Fail with `PathEscape` unless `path` lies under one of the roots.
    pub fn check_contained(&self, path: &Path) -> GateResult<()> {
        if self.contains(path) {
            Ok(())
        } else {
            Err(GateError::PathEscape {
                path: path.to_path_buf(),
            })
        }
    }

    /// True if the already-canonical `path` lies under a canonical root.
    pub fn contains(&self, path: &Path) -> bool {
        self.canonical_roots().iter().any(|root| path.starts_with(root))
    }

    /// True if `path` is one of the roots themselves.
    pub fn is_root(&self, path: &Path) -> bool {
        self.canonical_roots().iter().any(|root| root == path)
    }

    fn canonical_roots(&self) -> Vec<PathBuf> {
        self.roots
            .iter()
            .map(|root| root.canonicalize().unwrap_or_else(|_| root.clone()))
            .collect()
    }

    /// The lexical pass. Returns an absolute, `.`-free path.
    fn lexical(&self, raw: &str) -> GateResult<PathBuf> {
        if raw.is_empty() {
            return Err(GateError::invalid_path(raw, "empty path"));
        }
        if raw.len() > self.max_path_len {
            return Err(GateError::invalid_path(raw, "path too long"));
        }
        if raw.chars().any(char::is_control) {
            return Err(GateError::invalid_path(raw, "control character in path"));
        }

        let mut normalized = PathBuf::new();
        for component in Path::new(raw).components() {
            match component {
                Component::ParentDir => {
                    return Err(GateError::invalid_path(raw, "parent directory segment"));
                }
                Component::CurDir => {}
                Component::Prefix(_) => {
                    return Err(GateError::invalid_path(raw, "path prefix not supported"));
                }
                Component::RootDir | Component::Normal(_) => normalized.push(component),
            }
        }

        if normalized.is_absolute() {
            let under_root = self.roots.iter().any(|root| normalized.starts_with(root))
                || self.canonical_roots().iter().any(|root| normalized.starts_with(root));
            if !under_root {
                return Err(GateError::invalid_path(raw, "outside namespace"));
            }
            Ok(normalized)
        } else {
            Ok(self.primary_root().join(normalized))
        }
    }
}

/// Canonicalize a path that may not fully exist yet.
///
/// The deepest existing ancestor is canonicalized and the missing tail is
/// re-appended. Dangling symlinks are chased through their targets.
fn canonicalize_partial(path: &Path) -> io::Result<PathBuf> {
    let mut current = path.to_path_buf();
    let mut hops = 0;

    'restart: loop {
        let mut tail: Vec<OsString> = Vec::new();
        let mut probe = current.clone();

        loop {
            match probe.canonicalize() {
                Ok(mut base) => {
                    for name in tail.iter().rev() {
                        base.push(name);
                    }
                    return Ok(base);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let is_link = std::fs::symlink_metadata(&probe)
                        .map(|meta| meta.file_type().is_symlink())
                        .unwrap_or(false);
                    if is_link {
                        hops += 1;
                        if hops > MAX_LINK_HOPS {
                            return Err(io::Error::other("too many levels of symbolic links"));
                        }
                        let target = std::fs::read_link(&probe)?;
                        let mut next = match probe.parent() {
                            Some(parent) => parent.join(target),
                            None => target,
                        };
                        for name in tail.iter().rev() {
                            next.push(name);
                        }
                        current = next;
                        continue 'restart;
                    }

                    let Some(name) = probe.file_name() else {
                        return Err(e);
                    };
                    tail.push(name.to_os_string());
                    if !probe.pop() {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
