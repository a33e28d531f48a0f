//! Manual-disconnect marker shared between processes.
//!
//! An explicit disconnect from the CLI has to reach a dashboard or `watch`
//! running in another process, or that monitor would see the drop as
//! unattended and reconnect. The marker is an empty file in the config
//! directory: present while the user wants the VPN down.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::constants;

/// Marker file recording an explicit disconnect.
#[derive(Clone, Debug)]
pub struct ManualHold {
    path: PathBuf,
}

impl ManualHold {
    pub fn in_dir(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(constants::MANUAL_HOLD_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_set(&self) -> bool {
        self.path.exists()
    }

    /// Create the marker. Failures are logged; the in-process flag still holds.
    pub fn set(&self) {
        if let Err(e) = fs::write(&self.path, b"") {
            crate::log_warning!("MONITOR", "Could not write {}: {e}", self.path.display());
        }
    }

    /// Remove the marker if present.
    pub fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                crate::log_warning!("MONITOR", "Could not remove {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "kvc-hold-test-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_set_and_clear() {
        let dir = temp_dir("set-clear");
        let hold = ManualHold::in_dir(&dir);
        assert!(!hold.is_set());

        hold.set();
        assert!(hold.is_set());
        assert!(ManualHold::in_dir(&dir).is_set());

        hold.clear();
        assert!(!hold.is_set());
        // Clearing twice is fine.
        hold.clear();
        let _ = fs::remove_dir_all(&dir);
    }
}
