//! Device-model process count from procfs.
//!
//! Scans `<root>/<pid>/cmdline` and counts processes whose executable file
//! name equals the configured device-model name. Processes that exit during
//! the scan are skipped.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use lifecycle_core::{ProcessQueryError, ProcessRegistry};

#[derive(Debug, Clone)]
pub struct ProcFsRegistry {
    root: PathBuf,
    program: String,
}

impl ProcFsRegistry {
    pub fn new(root: impl Into<PathBuf>, program: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn is_device_model(&self, pid_dir: &Path) -> bool {
        let Ok(cmdline) = fs::read(pid_dir.join("cmdline")) else {
            return false;
        };
        let argv0 = cmdline.split(|b| *b == 0).next().unwrap_or_default();
        let argv0 = String::from_utf8_lossy(argv0);
        Path::new(argv0.as_ref()).file_name() == Some(OsStr::new(&self.program))
    }
}

impl ProcessRegistry for ProcFsRegistry {
    fn count_device_models(&self) -> Result<usize, ProcessQueryError> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            ProcessQueryError::Unavailable(format!("{}: {}", self.root.display(), e))
        })?;

        let count = entries
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.bytes().all(|b| b.is_ascii_digit()))
            })
            .filter(|entry| self.is_device_model(&entry.path()))
            .count();
        trace!("[lifecycle] {} {} process(es) in {}", count, self.program, self.root.display());
        Ok(count)
    }
}
