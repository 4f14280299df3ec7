//! The whitelist engine: load, match, replace.

use std::path::{Path, PathBuf};

use courier_types::{CourierError, WhitelistEntry};

use crate::builtin::default_entries;

/// The loaded whitelist plus the file it persists to.
///
/// Loaded once at daemon start; replaceable at runtime via [`replace`]
/// (a full replace, not a merge), which persists back to disk atomically.
///
/// [`replace`]: Whitelist::replace
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
    path: PathBuf,
}

impl Whitelist {
    /// Load the whitelist from `path`. A missing file falls back to the
    /// built-in starter set (and writes it out); an unparsable file is an
    /// error so a broken rule file can never silently widen to defaults.
    pub fn load_or_default(path: impl Into<PathBuf>) -> Result<Self, CourierError> {
        let path = path.into();
        match std::fs::read_to_string(&path) {
            Ok(data) => {
                let entries: Vec<WhitelistEntry> = serde_json::from_str(&data).map_err(|e| {
                    CourierError::Config(format!(
                        "failed to parse whitelist file {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(Self { entries, path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %path.display(),
                    "whitelist file not found, writing built-in defaults"
                );
                let wl = Self {
                    entries: default_entries(),
                    path,
                };
                wl.save()?;
                Ok(wl)
            }
            Err(e) => Err(CourierError::Config(format!(
                "failed to read whitelist file {}: {e}",
                path.display()
            ))),
        }
    }

    /// Whitelist backed by an explicit rule set (tests, embedding).
    pub fn from_entries(entries: Vec<WhitelistEntry>, path: impl Into<PathBuf>) -> Self {
        Self {
            entries,
            path: path.into(),
        }
    }

    /// Check a pre-tokenized command against the rules, in file order,
    /// returning true on the first structural match.
    pub fn is_allowed(&self, cmd: &str, args: &[String]) -> bool {
        self.entries.iter().any(|e| entry_matches(e, cmd, args))
    }

    pub fn entries(&self) -> &[WhitelistEntry] {
        &self.entries
    }

    /// Replace the entire rule set and persist it.
    pub fn replace(&mut self, entries: Vec<WhitelistEntry>) -> Result<(), CourierError> {
        self.entries = entries;
        self.save()
    }

    fn save(&self) -> Result<(), CourierError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CourierError::Config(format!("failed to create whitelist dir: {e}")))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| CourierError::Config(format!("failed to serialize whitelist: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json.as_bytes())
            .map_err(|e| CourierError::Config(format!("failed to write whitelist temp file: {e}")))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| CourierError::Config(format!("failed to rename whitelist file: {e}")))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Positional prefix match: every position present in the entry's `args`
/// must equal the corresponding position in the candidate's `args`. An
/// empty entry `args` accepts any arguments for that command name.
fn entry_matches(entry: &WhitelistEntry, cmd: &str, args: &[String]) -> bool {
    if entry.cmd != cmd {
        return false;
    }
    if entry.args.len() > args.len() {
        return false;
    }
    entry.args.iter().zip(args.iter()).all(|(want, got)| want == got)
}
