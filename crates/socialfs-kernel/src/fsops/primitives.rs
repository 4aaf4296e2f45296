//! Filesystem primitives.
//!
//! Every function here takes paths that PathGuard has already validated and
//! calls the OS directly. No shell is involved anywhere: arguments are
//! structured values, never spliced into a command line.

use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::entry::DirEntry;
use crate::error::{GateError, GateResult, IoResultExt};
use crate::role::Operation;

/// List a directory, sorted by name. Entries are lstat'ed, not followed.
pub async fn list_directory(path: &Path) -> GateResult<Vec<DirEntry>> {
    let meta = fs::metadata(path).await.at(path)?;
    if !meta.is_dir() {
        return Err(GateError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    let mut dir = fs::read_dir(path).await.at(path)?;
    while let Some(entry) = dir.next_entry().await.at(path)? {
        let entry_path = entry.path();
        let meta = fs::symlink_metadata(&entry_path).await.at(&entry_path)?;
        let target = if meta.file_type().is_symlink() {
            fs::read_link(&entry_path).await.ok()
        } else {
            None
        };
        entries.push(DirEntry::from_metadata(
            entry.file_name().to_string_lossy(),
            &meta,
            target,
        ));
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// mkdir -p. Returns `true` if anything was created.
pub async fn create_directory(path: &Path) -> GateResult<bool> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => return Ok(false),
        Ok(_) => {
            return Err(GateError::PathExists {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(GateError::from_io(path, e)),
    }
    fs::create_dir_all(path).await.at(path)?;
    Ok(true)
}

/// Recursive delete.
///
/// A symlink is unlinked, never followed. `remove_dir_all` also unlinks
/// symlinks it meets below `path` instead of descending into them.
pub async fn remove_tree(path: &Path) -> GateResult<()> {
    let meta = fs::symlink_metadata(path).await.at(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path).await.at(path)
    } else {
        fs::remove_file(path).await.at(path)
    }
}

pub async fn change_mode(path: &Path, mode: u32) -> GateResult<()> {
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .at(path)
}

/// Create `link` pointing at `target`. The target is stored verbatim.
pub async fn create_symlink(target: &Path, link: &Path) -> GateResult<()> {
    if fs::symlink_metadata(link).await.is_ok() {
        return Err(GateError::PathExists {
            path: link.to_path_buf(),
        });
    }
    fs::symlink(target, link).await.at(link)
}

/// Byte-for-byte copy of a regular file, carrying over its mode bits.
pub async fn copy(src: &Path, dest: &Path, overwrite: bool) -> GateResult<u64> {
    let meta = fs::metadata(src).await.at(src)?;
    if meta.is_dir() {
        return Err(GateError::Io {
            path: src.to_path_buf(),
            source: io::Error::new(io::ErrorKind::IsADirectory, "is a directory"),
        });
    }
    // fs::copy truncates dest before reading src
    if let Ok(existing) = fs::metadata(dest).await {
        if existing.dev() == meta.dev() && existing.ino() == meta.ino() {
            return Err(GateError::invalid_argument(
                Operation::Copy,
                format!("{} and {} are the same file", src.display(), dest.display()),
            ));
        }
    }
    if !overwrite && fs::symlink_metadata(dest).await.is_ok() {
        return Err(GateError::PathExists {
            path: dest.to_path_buf(),
        });
    }
    fs::copy(src, dest).await.at(dest)
}

/// True if both paths exist and name the same file (device and inode).
///
/// Symlinks are followed, so a link and its target count as the same file.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

/// Rename `src` to `dest`.
///
/// Within one volume this is a single atomic rename. Across volumes a regular
/// file is copied and the source removed; anything else fails.
pub async fn move_path(src: &Path, dest: &Path, overwrite: bool) -> GateResult<()> {
    let meta = fs::symlink_metadata(src).await.at(src)?;
    if !overwrite && fs::symlink_metadata(dest).await.is_ok() {
        return Err(GateError::PathExists {
            path: dest.to_path_buf(),
        });
    }

    match fs::rename(src, dest).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices && meta.is_file() => {
            tracing::debug!(src = %src.display(), dest = %dest.display(), "cross-device move, copying");
            copy_then_remove(src, dest).await
        }
        Err(e) => Err(GateError::from_io(src, e)),
    }
}

/// Cross-device half of [`move_path`]. The source goes only after the copy landed.
///
/// Reaching it through `move_path` needs two mounts, so tests call it directly.
async fn copy_then_remove(src: &Path, dest: &Path) -> GateResult<()> {
    fs::copy(src, dest).await.at(dest)?;
    fs::remove_file(src).await.at(src)
}

/// Append `content` plus a newline, creating the file if absent.
///
/// The file is opened O_APPEND and the line goes out in one write, so
/// concurrent appenders never interleave inside a line.
pub async fn append_or_create(path: &Path, content: &str) -> GateResult<()> {
    let mut line = String::with_capacity(content.len() + 1);
    line.push_str(content);
    line.push('\n');

    let mut file = fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await
        .at(path)?;
    file.write_all(line.as_bytes()).await.at(path)?;
    file.flush().await.at(path)
}

pub async fn read_file(path: &Path) -> GateResult<Vec<u8>> {
    fs::read(path).await.at(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        (dir, root)
    }

    #[tokio::test]
    async fn test_append_creates_then_accumulates() {
        let (_dir, root) = setup();
        let p = root.join("post.txt");

        append_or_create(&p, "x").await.unwrap();
        assert_eq!(read_file(&p).await.unwrap(), b"x\n");

        append_or_create(&p, "y").await.unwrap();
        assert_eq!(read_file(&p).await.unwrap(), b"x\ny\n");
    }

    #[tokio::test]
    async fn test_mkdir_is_idempotent() {
        let (_dir, root) = setup();
        let p = root.join("a/b/c");

        assert!(create_directory(&p).await.unwrap());
        assert!(!create_directory(&p).await.unwrap());
    }

    #[tokio::test]
    async fn test_mkdir_over_file_fails() {
        let (_dir, root) = setup();
        let p = root.join("file");
        std::fs::write(&p, b"data").unwrap();

        let err = create_directory(&p).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathExists);
    }

    #[tokio::test]
    async fn test_list_sorted_with_modes() {
        let (_dir, root) = setup();
        std::fs::write(root.join("b.txt"), b"bb").unwrap();
        std::fs::write(root.join("a.txt"), b"a").unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();
        change_mode(&root.join("a.txt"), 0o640).await.unwrap();

        let entries = list_directory(&root).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
        assert_eq!(entries[0].mode, 0o640);
        assert_eq!(entries[1].size, 2);
        assert!(entries[2].is_dir());
    }

    #[tokio::test]
    async fn test_list_file_is_not_a_directory() {
        let (_dir, root) = setup();
        std::fs::write(root.join("f"), b"").unwrap();

        let err = list_directory(&root.join("f")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
        let err = list_directory(&root.join("missing")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_remove_tree_missing() {
        let (_dir, root) = setup();
        let err = remove_tree(&root.join("nope")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_remove_tree_does_not_follow_links() {
        let (dir, root) = setup();
        let keep = dir.path().join("keep");
        std::fs::create_dir(&keep).unwrap();
        std::fs::write(keep.join("precious"), b"!").unwrap();

        let doomed = root.join("doomed");
        std::fs::create_dir(&doomed).unwrap();
        std::os::unix::fs::symlink(&keep, doomed.join("link")).unwrap();

        remove_tree(&doomed).await.unwrap();
        assert!(!doomed.exists());
        assert!(keep.join("precious").exists());
    }

    #[tokio::test]
    async fn test_copy_keeps_source_and_mode() {
        let (_dir, root) = setup();
        let a = root.join("a");
        let b = root.join("b");
        std::fs::write(&a, b"payload").unwrap();
        change_mode(&a, 0o600).await.unwrap();

        copy(&a, &b, false).await.unwrap();
        assert_eq!(read_file(&a).await.unwrap(), b"payload");
        assert_eq!(read_file(&b).await.unwrap(), b"payload");
        let mode = std::fs::metadata(&b).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[tokio::test]
    async fn test_copy_refuses_overwrite_without_flag() {
        let (_dir, root) = setup();
        let a = root.join("a");
        let b = root.join("b");
        std::fs::write(&a, b"new").unwrap();
        std::fs::write(&b, b"old").unwrap();

        let err = copy(&a, &b, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathExists);
        assert_eq!(read_file(&b).await.unwrap(), b"old");

        copy(&a, &b, true).await.unwrap();
        assert_eq!(read_file(&b).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let (_dir, root) = setup();
        let err = copy(&root.join("a"), &root.join("b"), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_move_then_read() {
        let (_dir, root) = setup();
        let a = root.join("a");
        let b = root.join("b");
        std::fs::write(&a, b"moving").unwrap();

        move_path(&a, &b, false).await.unwrap();
        assert_eq!(read_file(&b).await.unwrap(), b"moving");
        assert_eq!(read_file(&a).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_copy_onto_itself_keeps_content() {
        let (_dir, root) = setup();
        let a = root.join("a");
        std::fs::write(&a, b"precious").unwrap();

        let err = copy(&a, &a, true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(read_file(&a).await.unwrap(), b"precious");
    }

    #[tokio::test]
    async fn test_copy_onto_hard_link_keeps_content() {
        let (_dir, root) = setup();
        let a = root.join("a");
        let b = root.join("b");
        std::fs::write(&a, b"precious").unwrap();
        std::fs::hard_link(&a, &b).unwrap();

        let err = copy(&a, &b, true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(read_file(&b).await.unwrap(), b"precious");
    }

    #[test]
    fn test_same_file_follows_links() {
        let (_dir, root) = setup();
        let a = root.join("a");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(root.join("b"), b"x").unwrap();
        std::os::unix::fs::symlink(&a, root.join("link")).unwrap();

        assert!(same_file(&a, &a));
        assert!(same_file(&a, &root.join("link")));
        assert!(!same_file(&a, &root.join("b")));
        assert!(!same_file(&a, &root.join("missing")));
    }

    #[tokio::test]
    async fn test_move_refuses_existing_without_flag() {
        let (_dir, root) = setup();
        let a = root.join("a");
        let b = root.join("b");
        std::fs::write(&a, b"new").unwrap();
        std::fs::write(&b, b"old").unwrap();

        let err = move_path(&a, &b, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathExists);
        assert_eq!(read_file(&a).await.unwrap(), b"new");

        move_path(&a, &b, true).await.unwrap();
        assert_eq!(read_file(&b).await.unwrap(), b"new");
        assert!(!a.exists());
    }

    #[tokio::test]
    async fn test_copy_then_remove_moves_content() {
        let (_dir, root) = setup();
        let a = root.join("a");
        let b = root.join("b");
        std::fs::write(&a, b"crossing").unwrap();
        change_mode(&a, 0o640).await.unwrap();

        copy_then_remove(&a, &b).await.unwrap();
        assert!(!a.exists());
        assert_eq!(read_file(&b).await.unwrap(), b"crossing");
        let mode = std::fs::metadata(&b).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[tokio::test]
    async fn test_copy_then_remove_keeps_source_on_failure() {
        let (_dir, root) = setup();
        let a = root.join("a");
        std::fs::write(&a, b"stay").unwrap();

        let err = copy_then_remove(&a, &root.join("missing/b")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(read_file(&a).await.unwrap(), b"stay");
    }

    #[tokio::test]
    async fn test_symlink_exists() {
        let (_dir, root) = setup();
        let link = root.join("link");
        create_symlink(Path::new("/etc/passwd"), &link).await.unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), PathBuf::from("/etc/passwd"));

        let err = create_symlink(Path::new("/etc/hosts"), &link)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathExists);
    }
}
