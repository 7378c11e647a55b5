use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    #[error("empty path")]
    EmptyPath,
    #[error("path does not exist: {}", .0.display())]
    MissingPath(PathBuf),
    #[error("{message}")]
    LaunchFailed { message: String, code: Option<i32> },
}

/// Fire-and-forget hand-off to the operating system shell.
pub trait ShellOpener: Send + Sync {
    fn open_uri(&self, uri: &str) -> Result<(), LaunchError>;
    fn open_path(&self, path: &str) -> Result<(), LaunchError>;
    /// Opens a file through the file manager so its own association applies.
    fn open_in_file_manager(&self, path: &str) -> Result<(), LaunchError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl ShellOpener for SystemShell {
    fn open_uri(&self, uri: &str) -> Result<(), LaunchError> {
        let target = non_empty(uri)?;
        debug!(target, "shell open uri");
        shell_open(target)
    }

    fn open_path(&self, path: &str) -> Result<(), LaunchError> {
        let target = existing_path(path)?;
        debug!(target, "shell open path");
        shell_open(target)
    }

    fn open_in_file_manager(&self, path: &str) -> Result<(), LaunchError> {
        let target = existing_path(path)?;
        debug!(target, "file manager open");
        file_manager_open(target)
    }
}

fn non_empty(target: &str) -> Result<&str, LaunchError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(LaunchError::EmptyPath);
    }
    Ok(trimmed)
}

pub fn existing_path(path: &str) -> Result<&str, LaunchError> {
    let trimmed = non_empty(path)?;
    let candidate = Path::new(trimmed);
    if !candidate.exists() {
        return Err(LaunchError::MissingPath(candidate.to_path_buf()));
    }
    Ok(trimmed)
}

#[cfg(target_os = "windows")]
fn shell_open(target: &str) -> Result<(), LaunchError> {
    shell_execute(target, None)
}

#[cfg(target_os = "windows")]
fn file_manager_open(target: &str) -> Result<(), LaunchError> {
    shell_execute("explorer.exe", Some(target))
}

#[cfg(target_os = "windows")]
fn shell_execute(program: &str, parameters: Option<&str>) -> Result<(), LaunchError> {
    use windows_sys::Win32::UI::Shell::ShellExecuteW;
    use windows_sys::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

    let verb = to_wide("open");
    let program_wide = to_wide(program);
    let parameters_wide = parameters.map(|p| to_wide(&format!("\"{p}\"")));
    let parameters_ptr = parameters_wide
        .as_ref()
        .map(|p| p.as_ptr())
        .unwrap_or(std::ptr::null());

    let result = unsafe {
        ShellExecuteW(
            std::ptr::null_mut(),
            verb.as_ptr(),
            program_wide.as_ptr(),
            parameters_ptr,
            std::ptr::null(),
            SW_SHOWNORMAL,
        )
    } as isize;

    // ShellExecuteW reports success with values above 32.
    if result <= 32 {
        return Err(LaunchError::LaunchFailed {
            message: format!("shell open failed for '{program}'"),
            code: Some(result as i32),
        });
    }
    Ok(())
}

#[cfg(target_os = "windows")]
fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

#[cfg(not(target_os = "windows"))]
fn shell_open(target: &str) -> Result<(), LaunchError> {
    spawn_detached(opener_program(), target)
}

#[cfg(not(target_os = "windows"))]
fn file_manager_open(target: &str) -> Result<(), LaunchError> {
    spawn_detached(opener_program(), target)
}

#[cfg(target_os = "macos")]
fn opener_program() -> &'static str {
    "open"
}

#[cfg(all(not(target_os = "windows"), not(target_os = "macos")))]
fn opener_program() -> &'static str {
    "xdg-open"
}

#[cfg(not(target_os = "windows"))]
fn spawn_detached(program: &str, target: &str) -> Result<(), LaunchError> {
    let mut child = std::process::Command::new(program)
        .arg(target)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|error| LaunchError::LaunchFailed {
            message: format!("failed to start {program}: {error}"),
            code: error.raw_os_error(),
        })?;

    // Reap in the background; the caller never waits on the opened program.
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}
