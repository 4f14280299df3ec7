//! Built-in starter whitelist.
//!
//! Used when no whitelist file exists yet: a read-only set of commands that
//! cannot modify the filesystem or the repository. Operators extend it via
//! the control surface, which persists the replacement to disk.

use courier_types::WhitelistEntry;

/// The default rule set written on first run.
pub fn default_entries() -> Vec<WhitelistEntry> {
    vec![
        WhitelistEntry::new("ls", &[]),
        WhitelistEntry::new("pwd", &[]),
        WhitelistEntry::new("echo", &[]),
        WhitelistEntry::new("whoami", &[]),
        WhitelistEntry::new("date", &[]),
        WhitelistEntry::new("uname", &[]),
        WhitelistEntry::new("git", &["status"]),
        WhitelistEntry::new("git", &["log"]),
        WhitelistEntry::new("git", &["diff"]),
        WhitelistEntry::new("git", &["branch"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_read_only() {
        let entries = default_entries();
        assert!(!entries.iter().any(|e| e.cmd == "rm"));
        assert!(!entries
            .iter()
            .any(|e| e.cmd == "git" && e.args.first().map(String::as_str) == Some("push")));
    }

    #[test]
    fn defaults_include_bare_ls() {
        let entries = default_entries();
        let ls = entries.iter().find(|e| e.cmd == "ls").unwrap();
        assert!(ls.args.is_empty(), "ls must accept any arguments");
    }
}
