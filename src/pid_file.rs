use crate::error::LockError;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// PID file held while the bridge runs
///
/// The file is removed when the value is dropped.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Takes the PID file, writing the PID of the current process in it
    ///
    /// A file left by a dead process is replaced. A file held by a live process is an error.
    pub fn acquire(path: &Path) -> Result<PidFile, LockError> {
        if let Ok(content) = std::fs::read_to_string(path) {
            let content = content.trim();

            if let Ok(pid) = content.parse::<u32>()
                && is_running(pid)
            {
                return Err(LockError::AlreadyRunning(pid));
            }

            warn!("Removing stale PID file {}", path.display());
            std::fs::remove_file(path).map_err(|source| LockError::Stale {
                path: path.display().to_string(),
                pid: content.to_string(),
                source,
            })?;
        }

        let pid = std::process::id();
        std::fs::write(path, pid.to_string()).map_err(|source| LockError::Write {
            path: path.display().to_string(),
            source,
        })?;
        debug!("PID {pid} written to {}", path.display());

        Ok(PidFile {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Cannot remove PID file {}: {e}", self.path.display());
        }
    }
}

fn is_running(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}
