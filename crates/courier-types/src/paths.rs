//! State directory layout.
//!
//! All persisted documents live under a per-user state directory, by default
//! `$HOME/.courier`. Paths are fixed relative to that root; only the control
//! surface port is environment-overridable.

use std::path::{Path, PathBuf};

use crate::model::Provider;

/// Default control-surface port.
pub const DEFAULT_PORT: u16 = 8765;

/// Environment variable overriding the control-surface port.
pub const PORT_ENV_VAR: &str = "COURIER_PORT";

/// Resolved locations of every on-disk document the daemon owns.
#[derive(Debug, Clone)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    /// State paths rooted at the default per-user directory.
    pub fn default_root() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Self {
            root: PathBuf::from(home).join(".courier"),
        }
    }

    /// State paths rooted at an explicit directory (tests, overrides).
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The durable state store: queue + log + results.
    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.json")
    }

    /// The whitelist rule file.
    pub fn whitelist_file(&self) -> PathBuf {
        self.root.join("whitelist.json")
    }

    /// A provider's bridge request queue file.
    pub fn bridge_queue_file(&self, provider: Provider) -> PathBuf {
        self.root.join(format!("bridge_queue_{}.json", provider.key()))
    }

    /// The shared bridge result map.
    pub fn bridge_results_file(&self) -> PathBuf {
        self.root.join("bridge_results.json")
    }

    /// A provider's persistent browser profile directory.
    pub fn browser_profile_dir(&self, provider: Provider) -> PathBuf {
        self.root.join("browser").join(provider.key())
    }

    /// Create the root directory if it does not exist.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_are_fixed_relative_to_root() {
        let paths = StatePaths::rooted_at("/tmp/courier-test");
        assert_eq!(paths.state_file(), Path::new("/tmp/courier-test/state.json"));
        assert_eq!(
            paths.whitelist_file(),
            Path::new("/tmp/courier-test/whitelist.json")
        );
        assert_eq!(
            paths.bridge_queue_file(Provider::ChatGpt),
            Path::new("/tmp/courier-test/bridge_queue_chatgpt.json")
        );
        assert_eq!(
            paths.bridge_queue_file(Provider::Claude),
            Path::new("/tmp/courier-test/bridge_queue_claude.json")
        );
        assert_eq!(
            paths.bridge_results_file(),
            Path::new("/tmp/courier-test/bridge_results.json")
        );
        assert_eq!(
            paths.browser_profile_dir(Provider::Claude),
            Path::new("/tmp/courier-test/browser/claude")
        );
    }

    #[test]
    fn ensure_root_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StatePaths::rooted_at(tmp.path().join("nested").join("state"));
        paths.ensure_root().unwrap();
        assert!(paths.root().is_dir());
    }
}
