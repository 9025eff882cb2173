// animfit/src/pipeline/scratch.rs
use crate::core::Result;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};
use uuid::Uuid;

/// Per-request home for intermediate artifacts.
///
/// Every intermediate lives in one uniquely named directory. Dropping the
/// store removes the directory and whatever is still in it, so nothing
/// survives an early return, an error or a panic. Only [`Scratch::persist`]
/// moves an artifact out.
pub struct Scratch {
    dir: TempDir,
    request_id: Uuid,
    next: u32,
}

impl Scratch {
    pub fn new(root: Option<&Path>, request_id: Uuid) -> Result<Self> {
        let prefix = format!("animfit-{}-", request_id);
        let mut builder = Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        log::debug!("[{}] scratch directory {}", request_id, dir.path().display());

        Ok(Self {
            dir,
            request_id,
            next: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Reserves a fresh path for the next intermediate produced by `label`.
    pub fn allocate(&mut self, label: &str) -> PathBuf {
        self.next += 1;
        self.dir.path().join(format!("{:02}-{}.gif", self.next, label))
    }

    pub fn owns(&self, path: &Path) -> bool {
        path.parent() == Some(self.dir.path())
    }

    /// Deletes a superseded intermediate. Paths outside the store (the
    /// caller's source asset) are left alone.
    pub fn discard(&self, path: &Path) {
        if !self.owns(path) {
            return;
        }

        if let Err(e) = fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                log::warn!(
                    "[{}] failed to remove intermediate {}: {}",
                    self.request_id,
                    path.display(),
                    e
                );
            }
        }
    }

    /// Moves `artifact` to `dest` (copying when it is the untouched source)
    /// and removes everything else.
    ///
    /// `dest` is only ever replaced by a rename, never opened for writing,
    /// so a destination that turns out to alias the source keeps its bytes.
    pub fn persist(self, artifact: &Path, dest: &Path) -> Result<()> {
        let parent = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        if self.owns(artifact) {
            match fs::rename(artifact, dest) {
                Ok(()) => {
                    log::debug!("[{}] persisted {}", self.request_id, dest.display());
                    return Ok(());
                }
                Err(e) => log::debug!("[{}] rename failed ({}), copying instead", self.request_id, e),
            }
        }

        let mut staged = Builder::new()
            .prefix(".animfit-")
            .suffix(".partial")
            .tempfile_in(parent)?;
        let mut reader = fs::File::open(artifact)?;
        io::copy(&mut reader, staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        staged.persist(dest).map_err(|e| e.error)?;

        log::debug!("[{}] persisted {}", self.request_id, dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let mut scratch = Scratch::new(Some(root.path()), Uuid::new_v4()).unwrap();
        let first = scratch.allocate("resize");
        let second = scratch.allocate("resize");
        assert_ne!(first, second);
        fs::write(&first, b"a").unwrap();
        fs::write(&second, b"b").unwrap();

        let dir = scratch.dir().to_path_buf();
        drop(scratch);

        assert!(!dir.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_persist_moves_only_the_result() {
        let root = tempfile::tempdir().unwrap();
        let mut scratch = Scratch::new(Some(root.path()), Uuid::new_v4()).unwrap();
        let keep = scratch.allocate("recolor-64");
        let other = scratch.allocate("recolor-48");
        fs::write(&keep, b"keep").unwrap();
        fs::write(&other, b"other").unwrap();

        let dest = root.path().join("out").join("final.gif");
        scratch.persist(&keep, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"keep");
        let leftovers: Vec<_> = fs::read_dir(root.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_persist_onto_source_keeps_its_bytes() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("source.gif");
        fs::write(&source, b"original bytes").unwrap();

        let work = root.path().join("work");
        let scratch = Scratch::new(Some(work.as_path()), Uuid::new_v4()).unwrap();
        let alias = root.path().join("sub").join("..").join("source.gif");
        fs::create_dir(root.path().join("sub")).unwrap();
        scratch.persist(&source, &alias).unwrap();

        assert_eq!(fs::read(&source).unwrap(), b"original bytes");
        let names: Vec<_> = fs::read_dir(root.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(names.iter().all(|n| !n.to_string_lossy().ends_with(".partial")));
    }

    #[test]
    fn test_discard_ignores_foreign_paths() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("source.gif");
        fs::write(&source, b"gif").unwrap();

        let work = root.path().join("work");
        let scratch = Scratch::new(Some(work.as_path()), Uuid::new_v4()).unwrap();
        scratch.discard(&source);
        assert!(source.exists());
    }
}
