//! Directory entries returned by `list`.

use std::fs::Metadata;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::SystemTime;

/// Kind of directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirEntryKind {
    File,
    Directory,
    Symlink,
}

impl DirEntryKind {
    fn type_char(self) -> char {
        match self {
            DirEntryKind::File => '-',
            DirEntryKind::Directory => 'd',
            DirEntryKind::Symlink => 'l',
        }
    }
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name of the entry (not full path).
    pub name: String,
    pub kind: DirEntryKind,
    /// Size in bytes, as reported by lstat.
    pub size: u64,
    /// Permission bits (e.g. 0o644).
    pub mode: u32,
    pub modified: Option<SystemTime>,
    /// For symlinks, the stored target.
    pub symlink_target: Option<PathBuf>,
}

impl DirEntry {
    /// Build from lstat metadata. Special files count as `File`.
    pub(crate) fn from_metadata(
        name: impl Into<String>,
        meta: &Metadata,
        symlink_target: Option<PathBuf>,
    ) -> Self {
        let file_type = meta.file_type();
        let kind = if file_type.is_symlink() {
            DirEntryKind::Symlink
        } else if file_type.is_dir() {
            DirEntryKind::Directory
        } else {
            DirEntryKind::File
        };
        Self {
            name: name.into(),
            kind,
            size: meta.len(),
            mode: meta.permissions().mode() & 0o7777,
            modified: meta.modified().ok(),
            symlink_target,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == DirEntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == DirEntryKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == DirEntryKind::Symlink
    }

    /// `ls -l`-style line: `drwxr-xr-x  4096 name`.
    pub fn long_line(&self) -> String {
        let mut line = format!(
            "{}{}  {:>8} {}",
            self.kind.type_char(),
            mode_string(self.mode),
            self.size,
            self.name
        );
        if let Some(target) = &self.symlink_target {
            line.push_str(" -> ");
            line.push_str(&target.to_string_lossy());
        }
        line
    }
}

/// `rwxr-x---` for the lower nine permission bits.
pub fn mode_string(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|&(bit, c)| if mode & bit != 0 { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_strings() {
        assert_eq!(mode_string(0o755), "rwxr-xr-x");
        assert_eq!(mode_string(0o700), "rwx------");
        assert_eq!(mode_string(0o640), "rw-r-----");
    }

    #[test]
    fn test_long_line_shows_link_target() {
        let entry = DirEntry {
            name: "link".into(),
            kind: DirEntryKind::Symlink,
            size: 11,
            mode: 0o777,
            modified: None,
            symlink_target: Some(PathBuf::from("/etc/passwd")),
        };
        assert_eq!(entry.long_line(), "lrwxrwxrwx        11 link -> /etc/passwd");
    }
}
