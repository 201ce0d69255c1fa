//! Commands Module
//!
//! Programs the window manager can launch: the command menu (static entries
//! plus a scanned directory), `$PATH` executables for the exec prompt, and
//! spawning itself.

use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{CommandEntry, CommandsConfig};

/// Command menu source
#[derive(Debug, Default)]
pub struct CommandMenu {
    entries: Vec<CommandEntry>,
    directory: Option<PathBuf>,

    /// Executables found in `directory` at the last scan
    scanned: Vec<CommandEntry>,

    /// Directory mtime at the last scan
    scanned_at: Option<SystemTime>,
}

impl CommandMenu {
    pub fn new(config: &CommandsConfig) -> Self {
        let mut entries = vec![
            CommandEntry {
                name: "term".to_string(),
                path: config.terminal.clone(),
            },
            CommandEntry {
                name: "lock".to_string(),
                path: config.lock.clone(),
            },
        ];
        entries.extend(config.entries.iter().cloned());

        Self {
            entries,
            directory: config.directory.clone(),
            scanned: Vec::new(),
            scanned_at: None,
        }
    }

    /// Rescan the command directory if its mtime changed.
    ///
    /// Returns whether a scan happened.
    pub fn refresh(&mut self) -> Result<bool> {
        let Some(directory) = &self.directory else {
            return Ok(false);
        };

        let mtime = fs::metadata(directory)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat command directory {:?}", directory))?;
        if self.scanned_at == Some(mtime) {
            return Ok(false);
        }

        let mut scanned: Vec<CommandEntry> = executables(directory)?
            .into_iter()
            .map(|path| CommandEntry {
                name: file_name(&path),
                path: path.to_string_lossy().into_owned(),
            })
            .collect();
        scanned.sort_by(|a, b| a.name.cmp(&b.name));

        debug!("Scanned {} commands from {:?}", scanned.len(), directory);
        self.scanned = scanned;
        self.scanned_at = Some(mtime);
        Ok(true)
    }

    /// Static entries followed by scanned ones, refreshing first
    pub fn entries(&mut self) -> Vec<CommandEntry> {
        if let Err(e) = self.refresh() {
            warn!("{:#}", e);
        }
        self.entries.iter().chain(&self.scanned).cloned().collect()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(OsStr::to_string_lossy)
        .unwrap_or_default()
        .into_owned()
}

/// Executable regular files directly inside a directory
fn executables(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(directory)
        .with_context(|| format!("Failed to read command directory {:?}", directory))?
    {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
            found.push(path);
        }
    }
    Ok(found)
}

/// Names of executables reachable through `path` (a `$PATH`-style list),
/// sorted and deduplicated
pub fn path_executables(path: &OsStr) -> Vec<String> {
    let mut names: Vec<String> = std::env::split_paths(path)
        .filter_map(|dir| executables(&dir).ok())
        .flatten()
        .map(|p| file_name(&p))
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Run a command line through `sh -c` in its own process group.
///
/// A runtime task waits on the child so it is reaped when it exits. Must be
/// called from within the tokio runtime. Returns the child's pid.
pub fn spawn(command: &str, display: Option<&str>) -> Result<Option<u32>> {
    info!("Spawning {:?}", command);
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .process_group(0);
    if let Some(display) = display {
        cmd.env("DISPLAY", display);
    }
    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {:?}", command))?;
    let pid = child.id();

    let command = command.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!("{:?} exited with {}", command, status),
            Err(e) => warn!("Failed to wait for {:?}: {}", command, e),
        }
    });
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::File;
    use std::time::Duration;

    fn make_executable(dir: &Path, name: &str) {
        let path = dir.join(name);
        File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn config(dir: Option<&Path>) -> CommandsConfig {
        CommandsConfig {
            directory: dir.map(Path::to_path_buf),
            entries: vec![CommandEntry {
                name: "top".to_string(),
                path: "xterm -e top".to_string(),
            }],
            ..CommandsConfig::default()
        }
    }

    fn names(entries: &[CommandEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn static_entries_without_directory() {
        let mut menu = CommandMenu::new(&config(None));
        assert_eq!(names(&menu.entries()), vec!["term", "lock", "top"]);
        assert!(!menu.refresh().unwrap());
    }

    #[test]
    fn scans_only_executables() {
        let dir = tempfile::tempdir().unwrap();
        make_executable(dir.path(), "zeta");
        make_executable(dir.path(), "alpha");
        File::create(dir.path().join("notes.txt")).unwrap();

        let mut menu = CommandMenu::new(&config(Some(dir.path())));
        assert_eq!(names(&menu.entries()), vec!["term", "lock", "top", "alpha", "zeta"]);
    }

    #[test]
    fn rescans_only_when_mtime_changes() {
        let dir = tempfile::tempdir().unwrap();
        make_executable(dir.path(), "one");

        let mut menu = CommandMenu::new(&config(Some(dir.path())));
        assert!(menu.refresh().unwrap());
        assert!(!menu.refresh().unwrap());

        make_executable(dir.path(), "two");
        let later = SystemTime::now() + Duration::from_secs(5);
        File::open(dir.path()).unwrap().set_modified(later).unwrap();
        assert!(menu.refresh().unwrap());
        assert_eq!(menu.entries().len(), 5);
    }

    #[test]
    fn missing_directory_is_reported_not_fatal() {
        let mut menu = CommandMenu::new(&config(Some(Path::new("/nonexistent/sill-commands"))));
        assert!(menu.refresh().is_err());
        assert_eq!(menu.entries().len(), 3);
    }

    /// Whether `/proc/<pid>/stat` reports a zombie
    fn is_zombie(pid: u32) -> bool {
        let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
            return false;
        };
        // the state follows the parenthesized command name
        let after_comm = &stat[stat.rfind(')').unwrap() + 1..];
        after_comm.split_whitespace().next() == Some("Z")
    }

    #[tokio::test]
    async fn exited_children_are_reaped() {
        let pid = spawn("exit 0", None).unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!is_zombie(pid), "child {pid} left as a zombie");
    }

    #[test]
    fn path_executables_are_sorted_and_unique() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        make_executable(a.path(), "xterm");
        make_executable(b.path(), "xterm");
        make_executable(b.path(), "firefox");

        let path = std::env::join_paths([a.path(), b.path()]).unwrap();
        assert_eq!(path_executables(&path), vec!["firefox", "xterm"]);
    }
}
