//! Project persistence.
//!
//! The project aggregate lives in `.phasegate/project.json`. Every save
//! rewrites the whole file through a temp file and a rename, so a reader
//! never sees a half-written project.
//!
//! Processes sharing a project serialize through [`ProjectLock`]: the lock
//! is taken before the project and checkpoint log are loaded and released
//! after the commit.

use crate::errors::StorageError;
use crate::project::Project;
use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive advisory lock on `.phasegate/project.lock`.
///
/// Released when dropped.
#[derive(Debug)]
pub struct ProjectLock {
    file: fs::File,
    path: PathBuf,
}

impl ProjectLock {
    /// Block until the lock is held.
    pub fn acquire(path: &Path) -> Result<Self, StorageError> {
        let io_err = |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(io_err)?;
        file.lock_exclusive().map_err(io_err)?;
        debug!(path = %path.display(), "Project lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Storage for the project aggregate.
pub trait StateStore: Send {
    /// Load the saved project, `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<Project>, StorageError>;

    /// Replace the saved project.
    fn save(&mut self, project: &Project) -> Result<(), StorageError>;
}

/// `project.json` on disk, replaced atomically.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<Project>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
        let project = serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            line: source.line(),
            source,
        })?;
        Ok(Some(project))
    }

    fn save(&mut self, project: &Project) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(project).map_err(StorageError::Encode)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| self.io_err(e))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }
}

/// In-memory project snapshot for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshot: Option<Project>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<Project>, StorageError> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, project: &Project) -> Result<(), StorageError> {
        self.snapshot = Some(project.clone());
        Ok(())
    }
}
