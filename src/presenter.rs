use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Shows a file to the user in a file browser.
pub trait Reveal: Send + Sync {
    /// Highlights `path` in a browser rooted at `root`. Best effort.
    fn reveal(&self, path: &Path, root: &Path);
}

/// Reveals files with the platform's own file manager.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileBrowser;

impl Reveal for FileBrowser {
    fn reveal(&self, path: &Path, root: &Path) {
        let mut command = reveal_command(path, root);
        debug!(?command, "Revealing download");
        // Fire and forget; the child is not waited on.
        if let Err(e) = command.spawn() {
            warn!(error = %e, path = ?path, "Failed to reveal download");
        }
    }
}

#[cfg(target_os = "macos")]
fn reveal_command(path: &Path, _root: &Path) -> Command {
    let mut command = Command::new("open");
    command.arg("-R").arg(path);
    command
}

#[cfg(target_os = "windows")]
fn reveal_command(path: &Path, _root: &Path) -> Command {
    let mut command = Command::new("explorer");
    command.arg(format!("/select,{}", path.display()));
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn reveal_command(path: &Path, root: &Path) -> Command {
    // xdg-open cannot select a file, so open the folder that holds it.
    let folder = path.parent().unwrap_or(root);
    let mut command = Command::new("xdg-open");
    command.arg(folder);
    command
}
