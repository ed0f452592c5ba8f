//! Advisory write lock and atomic writes for configuration files.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

/// Advisory lock held while a configuration file is being rewritten.
///
/// The lock is a sibling file (`<name>.lock`) created with `create_new`, so a
/// second writer fails immediately instead of interleaving with the first.
/// The lock file is removed when the guard is dropped.
#[derive(Debug)]
pub struct EnvFileLock {
    lock_path: PathBuf,
}

impl EnvFileLock {
    /// Acquire the lock for `path`.
    pub fn acquire(path: &Path) -> ConfigResult<Self> {
        let lock_path = lock_path_for(path);
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                writeln!(file, "pid={}", std::process::id())?;
                writeln!(file, "acquired_at={}", Utc::now().to_rfc3339())?;
                debug!("Acquired configuration lock {:?}", lock_path);
                Ok(Self { lock_path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(ConfigError::Locked(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for EnvFileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            warn!("Failed to release configuration lock {:?}: {}", self.lock_path, e);
        }
    }
}

/// Lock file path for a configuration file: `.env` -> `.env.lock`.
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Write `bytes` to `path` through a temp file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path() {
        assert_eq!(lock_path_for(Path::new("/tmp/x/.env")), PathBuf::from("/tmp/x/.env.lock"));
    }

    #[test]
    fn test_second_lock_fails_until_released() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");

        let first = EnvFileLock::acquire(&path).unwrap();
        assert!(first.path().exists());
        assert!(matches!(EnvFileLock::acquire(&path), Err(ConfigError::Locked(_))));

        drop(first);
        assert!(!lock_path_for(&path).exists());
        assert!(EnvFileLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "OLD=1\n").unwrap();

        write_atomic(&path, b"NEW=2\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "NEW=2\n");
        assert!(!dir.path().join(".env.tmp").exists());
    }
}
