//! System abstraction for filesystem operations
//!
//! Every mutation the engine performs goes through the [`System`] trait so
//! that a dry run can record what would happen instead of doing it. Reads
//! always hit the real filesystem; a dry run needs the real state to plan.

use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

/// Abstraction over filesystem operations
///
/// Implementations are shared with the mover's worker threads.
pub trait System: Send + Sync {
    /// Whether mutations are only being recorded
    fn is_dry_run(&self) -> bool {
        false
    }

    /// Check if a path exists (following symlinks)
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Check if a path is a directory (following symlinks)
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    /// Check if a path is itself a symbolic link
    fn is_symlink(&self, path: &Path) -> bool {
        path.is_symlink()
    }

    /// Read a symbolic link
    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        fs::read_link(path).map_err(|e| Error::io_at("read link", path, e))
    }

    /// List a directory's entries, sorted by name
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path)
            .map_err(|e| Error::io_at("read directory", path, e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| Error::io_at("read directory", path, e))?;
        entries.sort();
        Ok(entries)
    }

    /// Create a directory and all its parents
    fn create_dir_all(&self, path: &Path, mode: Option<u32>) -> Result<()>;

    /// Remove an empty directory
    fn remove_dir(&self, path: &Path) -> Result<()>;

    /// Remove a file or symbolic link
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Create a symbolic link at `link` pointing to `target`
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Move a file or directory, copying across filesystems when needed
    fn move_path(&self, from: &Path, to: &Path) -> Result<()>;

    /// Copy a directory tree, returning the number of bytes copied
    fn copy_tree(&self, from: &Path, to: &Path) -> Result<u64>;
}

/// Real filesystem implementation
///
/// This implementation performs actual filesystem operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealSystem;

impl System for RealSystem {
    fn create_dir_all(&self, path: &Path, mode: Option<u32>) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| Error::io_at("create directory", path, e))?;

        #[cfg(unix)]
        if let Some(mode) = mode {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
                .map_err(|e| Error::io_at("set permissions on", path, e))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path).map_err(|e| Error::io_at("remove directory", path, e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        #[cfg(windows)]
        if path.is_symlink() && path.is_dir() {
            // Directory symlinks are removed as directories on Windows
            return fs::remove_dir(path).map_err(|e| Error::io_at("remove link", path, e));
        }
        fs::remove_file(path).map_err(|e| Error::io_at("remove", path, e))
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        make_symlink(target, link).map_err(|e| Error::io_at("create symlink", link, e))
    }

    fn move_path(&self, from: &Path, to: &Path) -> Result<()> {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                tracing::debug!(
                    from = %from.display(),
                    to = %to.display(),
                    "Rename crosses devices, falling back to copy+remove"
                );
                if from.is_dir() && !from.is_symlink() {
                    self.copy_tree(from, to)?;
                    fs::remove_dir_all(from).map_err(|e| Error::io_at("remove", from, e))
                } else {
                    copy_entry(from, to).map_err(|e| Error::io_at("copy", from, e))?;
                    fs::remove_file(from).map_err(|e| Error::io_at("remove", from, e))
                }
            }
            Err(e) => Err(Error::io_at("move", from, e)),
        }
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> Result<u64> {
        let mut bytes = 0;
        for entry in WalkDir::new(from).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(from).to_path_buf();
                Error::io_at("walk", &path, e.into())
            })?;
            let relative = entry.path().strip_prefix(from).unwrap_or(Path::new(""));
            let dest = to.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&dest).map_err(|e| Error::io_at("create directory", &dest, e))?;
            } else {
                bytes += copy_entry(entry.path(), &dest)
                    .map_err(|e| Error::io_at("copy", entry.path(), e))?;
            }
        }
        Ok(bytes)
    }
}

/// Copy one file or symlink, recreating links rather than following them
fn copy_entry(from: &Path, to: &Path) -> io::Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if from.is_symlink() {
        let target = fs::read_link(from)?;
        make_symlink(&target, to)?;
        Ok(0)
    } else {
        fs::copy(from, to)
    }
}

fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    {
        // Relative targets resolve against the link's directory
        let resolved = link.parent().map_or_else(|| target.to_path_buf(), |p| p.join(target));
        if resolved.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }
}

/// Total size in bytes of a file or directory tree (symlinks count as zero)
pub fn tree_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// An operation that would be performed on the filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a directory (and parents)
    CreateDir { path: PathBuf, mode: Option<u32> },
    /// Remove an empty directory
    RemoveDir { path: PathBuf },
    /// Remove a file or link
    RemoveFile { path: PathBuf },
    /// Create a symlink
    Symlink { link: PathBuf, target: PathBuf },
    /// Move a file or directory
    Move { from: PathBuf, to: PathBuf },
    /// Copy a directory tree
    CopyTree { from: PathBuf, to: PathBuf },
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateDir { path, .. } => write!(f, "create directory {}", path.display()),
            Self::RemoveDir { path } => write!(f, "remove directory {}", path.display()),
            Self::RemoveFile { path } => write!(f, "remove {}", path.display()),
            Self::Symlink { link, target } => {
                write!(f, "symlink {} -> {}", link.display(), target.display())
            }
            Self::Move { from, to } => write!(f, "move {} -> {}", from.display(), to.display()),
            Self::CopyTree { from, to } => write!(f, "copy {} -> {}", from.display(), to.display()),
        }
    }
}

/// Dry-run system that records operations without executing them
///
/// This is useful for showing what would be done without actually modifying the filesystem.
#[derive(Debug, Default)]
pub struct DryRunSystem {
    operations: Mutex<Vec<Operation>>,
}

impl DryRunSystem {
    /// Create a new dry-run system
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the list of operations that would be performed
    pub fn operations(&self) -> Vec<Operation> {
        self.operations
            .lock()
            .map(|ops| ops.clone())
            .unwrap_or_default()
    }

    /// Record an operation
    fn record(&self, op: Operation) {
        tracing::info!("[dry run] {op:?}");
        if let Ok(mut ops) = self.operations.lock() {
            ops.push(op);
        }
    }
}

impl System for DryRunSystem {
    fn is_dry_run(&self) -> bool {
        true
    }

    fn create_dir_all(&self, path: &Path, mode: Option<u32>) -> Result<()> {
        self.record(Operation::CreateDir {
            path: path.to_path_buf(),
            mode,
        });
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        self.record(Operation::RemoveDir {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.record(Operation::RemoveFile {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        self.record(Operation::Symlink {
            link: link.to_path_buf(),
            target: target.to_path_buf(),
        });
        Ok(())
    }

    fn move_path(&self, from: &Path, to: &Path) -> Result<()> {
        self.record(Operation::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> Result<u64> {
        self.record(Operation::CopyTree {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("a.bin"), b"12345").unwrap();
        fs::write(root.join("sub/b.bin"), b"678").unwrap();
        fs::write(root.join("sub/deeper/c.bin"), b"9").unwrap();
    }

    #[test]
    fn test_copy_tree_copies_everything() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        populate(&src);

        let bytes = RealSystem.copy_tree(&src, &temp.path().join("dst")).unwrap();
        assert_eq!(bytes, 9);
        assert_eq!(
            fs::read(temp.path().join("dst/sub/deeper/c.bin")).unwrap(),
            b"9"
        );
        // Source untouched
        assert!(src.join("a.bin").exists());
    }

    #[test]
    fn test_tree_size() {
        let temp = TempDir::new().unwrap();
        populate(temp.path());
        assert_eq!(tree_size(temp.path()), 9);
        assert_eq!(tree_size(&temp.path().join("a.bin")), 5);
        assert_eq!(tree_size(&temp.path().join("missing")), 0);
    }

    #[test]
    fn test_move_path_renames_directory() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        populate(&src);

        RealSystem.move_path(&src, &temp.path().join("moved")).unwrap();
        assert!(!src.exists());
        assert!(temp.path().join("moved/sub/b.bin").exists());
    }

    #[test]
    fn test_read_dir_sorted() {
        let temp = TempDir::new().unwrap();
        for name in ["c", "a", "b"] {
            fs::write(temp.path().join(name), name).unwrap();
        }
        let names: Vec<_> = RealSystem
            .read_dir(temp.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_and_remove() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target");
        let link = temp.path().join("link");
        fs::create_dir(&target).unwrap();

        RealSystem.symlink(&target, &link).unwrap();
        assert!(RealSystem.is_symlink(&link));
        assert_eq!(RealSystem.read_link(&link).unwrap(), target);

        RealSystem.remove_file(&link).unwrap();
        assert!(!link.exists());
        assert!(target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_create_dir_all_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/c");
        RealSystem.create_dir_all(&path, Some(0o700)).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_dry_run_records_and_leaves_disk_alone() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        populate(&src);
        let system = DryRunSystem::new();

        system.create_dir_all(&temp.path().join("new"), None).unwrap();
        system.move_path(&src, &temp.path().join("moved")).unwrap();
        system.symlink(&temp.path().join("moved"), &src).unwrap();

        assert!(system.is_dry_run());
        assert!(!temp.path().join("new").exists());
        assert!(src.join("a.bin").exists());
        // Reads still see the real filesystem
        assert!(system.is_dir(&src));

        let ops = system.operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[1], Operation::Move { .. }));
        assert!(ops[2].to_string().starts_with("symlink "));
    }
}
