//! Recursive name search.
//!
//! [`Find`] is a reusable search description; every call to [`Find::iter`]
//! starts a fresh lazy walk. Symlinks are never followed. A symlink whose
//! canonical target lies outside the namespace ends the walk with
//! `PathEscape`.

use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use walkdir::WalkDir;

use crate::error::{GateError, GateResult};
use crate::guard::PathGuard;
use crate::role::Operation;

/// A glob search for base names under a root directory.
#[derive(Debug, Clone)]
pub struct Find {
    root: PathBuf,
    matcher: GlobMatcher,
    guard: PathGuard,
}

impl Find {
    /// `root` must already be validated by `guard`.
    pub fn new(root: PathBuf, pattern: &str, guard: PathGuard) -> GateResult<Self> {
        if pattern.is_empty() || pattern.contains('/') {
            return Err(GateError::invalid_argument(
                Operation::Find,
                "pattern must be a non-empty base-name glob",
            ));
        }
        let matcher = Glob::new(pattern)
            .map_err(|e| GateError::invalid_argument(Operation::Find, e.to_string()))?
            .compile_matcher();
        Ok(Self {
            root,
            matcher,
            guard,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pattern(&self) -> &str {
        self.matcher.glob().glob()
    }

    /// Start a new walk.
    pub fn iter(&self) -> FindIter<'_> {
        FindIter {
            find: self,
            walker: WalkDir::new(&self.root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter(),
            done: false,
        }
    }
}

/// Lazy iterator over matching paths.
pub struct FindIter<'a> {
    find: &'a Find,
    walker: walkdir::IntoIter,
    done: bool,
}

impl Iterator for FindIter<'_> {
    type Item = GateResult<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.find.root.clone());
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
                    return Some(Err(GateError::from_io(&path, source)));
                }
            };

            if entry.path_is_symlink() {
                // Dangling links can't lead anywhere; only live ones are checked.
                if let Ok(target) = entry.path().canonicalize() {
                    if !self.find.guard.contains(&target) {
                        self.done = true;
                        return Some(Err(GateError::PathEscape {
                            path: entry.into_path(),
                        }));
                    }
                }
            }

            if self.find.matcher.is_match(entry.file_name()) {
                return Some(Ok(entry.into_path()));
            }
        }
    }
}
