//! # Worker Process Identity
//!
//! The worker writes a JSON record on startup so operators (and the host)
//! can find the running instance, and removes it on shutdown after the
//! database handle is released.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-identity record for a running worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidRecord {
    pub pid: u32,
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

/// Handle to the on-disk record; removing it marks the worker gone
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the record for the current process
    pub fn write(path: impl AsRef<Path>, port: u16) -> io::Result<Self> {
        let record = PidRecord {
            pid: std::process::id(),
            port,
            started_at: Utc::now(),
        };
        let text = serde_json::to_string_pretty(&record)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(path.as_ref(), text)?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Read a record left by a worker, if one exists and parses
    pub fn read(path: impl AsRef<Path>) -> Option<PidRecord> {
        let text = fs::read_to_string(path.as_ref()).ok()?;
        serde_json::from_str(&text).ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort removal; a stale record is tolerated by readers
    pub fn remove(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.pid");

        let pid_file = PidFile::write(&path, 8091).unwrap();
        let record = PidFile::read(&path).unwrap();
        assert_eq!(record.pid, std::process::id());
        assert_eq!(record.port, 8091);

        pid_file.remove();
        assert!(PidFile::read(&path).is_none());
    }
}
