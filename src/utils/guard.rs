use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("only one instance may run at a time")]
    AlreadyRunning,

    #[error("{}: не удалось открыть файл блокировки: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: не удалось заблокировать файл: {errno}", path.display())]
    Lock { path: PathBuf, errno: Errno },
}

/// Эксклюзивная advisory-блокировка на файле, живёт до конца процесса
pub struct ProcessGuard {
    _lock: Flock<File>,
    path: PathBuf,
}

impl ProcessGuard {
    /// Открыть (создав при необходимости) файл и взять неблокирующий flock
    pub fn acquire<P: AsRef<Path>>(lock_path: P) -> Result<Self, GuardError> {
        let path = lock_path.as_ref();
        let open_error = |source| GuardError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_error)?;
        }

        let file = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(open_error)?;

        let lock = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
            if errno == Errno::EWOULDBLOCK {
                GuardError::AlreadyRunning
            } else {
                GuardError::Lock {
                    path: path.to_path_buf(),
                    errno,
                }
            }
        })?;

        Ok(Self {
            _lock: lock,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.lock");

        let first = ProcessGuard::acquire(&path).unwrap();
        assert_eq!(first.path(), path.as_path());

        let second = ProcessGuard::acquire(&path);
        assert!(matches!(second, Err(GuardError::AlreadyRunning)));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.lock");

        drop(ProcessGuard::acquire(&path).unwrap());
        assert!(ProcessGuard::acquire(&path).is_ok());
    }

    #[test]
    fn test_creates_missing_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keyd").join("app.lock");

        let _guard = ProcessGuard::acquire(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_contention_leaves_existing_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.lock");
        fs::write(&path, "keep").unwrap();

        let _first = ProcessGuard::acquire(&path).unwrap();
        assert!(ProcessGuard::acquire(&path).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep");
    }
}
