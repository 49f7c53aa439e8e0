//! Windowless launcher: run the Backup Manager's entry point with a console-free
//! interpreter and wait for it to return.
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Entry point script inside the manager directory.
pub const ENTRY_POINT: &str = "main.py";

const CONSOLE_INTERPRETER: &str = "python.exe";
const WINDOWLESS_INTERPRETER: &str = "pythonw.exe";

/// Pick the console-free variant of `interpreter`.
///
/// `python.exe` becomes `pythonw.exe`, `pythonw.exe` is kept, anything else
/// is swapped for a `pythonw.exe` sitting next to it if there is one.
pub fn windowless_interpreter(interpreter: &Path) -> PathBuf {
    let file_name = interpreter
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if file_name == CONSOLE_INTERPRETER {
        return interpreter.with_file_name(WINDOWLESS_INTERPRETER);
    }
    if file_name == WINDOWLESS_INTERPRETER {
        return interpreter.to_path_buf();
    }

    let sibling = interpreter.with_file_name(WINDOWLESS_INTERPRETER);
    if interpreter.parent().is_some() && sibling.is_file() {
        return sibling;
    }
    interpreter.to_path_buf()
}

/// `PYTHONPATH` with `dir` in front of whatever is already set.
fn python_path_with(dir: &Path) -> Result<OsString, LaunchError> {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PYTHONPATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths).map_err(|e| LaunchError::PythonPath {
        dir: dir.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Run `<manager_dir>/main.py` and wait for it. Returns its exit code.
pub async fn launch(interpreter: &Path, manager_dir: &Path) -> Result<Option<i32>, LaunchError> {
    let entry = manager_dir.join(ENTRY_POINT);
    if !entry.is_file() {
        return Err(LaunchError::MissingEntry { path: entry });
    }

    let interpreter = windowless_interpreter(interpreter);
    let mut cmd = Command::new(&interpreter);
    cmd.arg(&entry)
        .current_dir(manager_dir)
        .env("PYTHONPATH", python_path_with(manager_dir)?)
        .stdin(Stdio::null());

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    tracing::info!(
        interpreter = %interpreter.display(),
        entry = %entry.display(),
        "launching backup manager"
    );

    let mut child = cmd.spawn().map_err(|e| LaunchError::Spawn {
        interpreter: interpreter.clone(),
        source: e,
    })?;

    let status = child
        .wait()
        .await
        .map_err(|e| LaunchError::Wait { source: e })?;

    let exit_code = status.code();
    tracing::info!(exit_code = ?exit_code, "backup manager exited");
    Ok(exit_code)
}

/// Errors from the launcher.
#[derive(Debug)]
pub enum LaunchError {
    MissingEntry {
        path: PathBuf,
    },
    PythonPath {
        dir: PathBuf,
        reason: String,
    },
    Spawn {
        interpreter: PathBuf,
        source: std::io::Error,
    },
    Wait {
        source: std::io::Error,
    },
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::MissingEntry { path } => {
                write!(f, "entry point not found: {}", path.display())
            }
            LaunchError::PythonPath { dir, reason } => {
                write!(f, "cannot add {} to PYTHONPATH: {}", dir.display(), reason)
            }
            LaunchError::Spawn {
                interpreter,
                source,
            } => {
                write!(f, "failed to start {}: {}", interpreter.display(), source)
            }
            LaunchError::Wait { source } => {
                write!(f, "failed waiting for backup manager: {}", source)
            }
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::Spawn { source, .. } => Some(source),
            LaunchError::Wait { source } => Some(source),
            LaunchError::MissingEntry { .. } | LaunchError::PythonPath { .. } => None,
        }
    }
}
