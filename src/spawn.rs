//! Fire-and-forget restart of the target: spawn the interpreter with the
//! launcher script, detach, drop the handle.
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Spawn `interpreter script` detached from the watchdog and return its PID.
pub fn spawn_detached(interpreter: &Path, script: &Path) -> Result<u32, SpawnError> {
    let mut cmd = Command::new(interpreter);
    cmd.arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    // New process group so the scheduler tearing down our group leaves it alone.
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|e| SpawnError {
        interpreter: interpreter.to_path_buf(),
        script: script.to_path_buf(),
        source: e,
    })?;

    let pid = child.id().unwrap_or(0);
    tracing::info!(
        pid,
        interpreter = %interpreter.display(),
        script = %script.display(),
        "target process spawned"
    );
    Ok(pid)
}

/// The target could not be started.
#[derive(Debug)]
pub struct SpawnError {
    pub interpreter: PathBuf,
    pub script: PathBuf,
    pub source: std::io::Error,
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to start {} {}: {}",
            self.interpreter.display(),
            self.script.display(),
            self.source
        )
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_detached_runs_script() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("ran");
        let script = dir.path().join("script.sh");
        std::fs::write(&script, format!("touch '{}'\n", marker.display())).unwrap();

        let pid = spawn_detached(Path::new("sh"), &script).unwrap();
        assert!(pid > 0);

        // Handle is not retained; poll for the side effect.
        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_spawn_missing_interpreter() {
        let err = spawn_detached(
            Path::new("/nonexistent-dir/pythonw.exe"),
            Path::new("launcher.pyw"),
        )
        .unwrap_err();
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
        let msg = err.to_string();
        assert!(msg.starts_with("failed to start /nonexistent-dir/pythonw.exe launcher.pyw"));
    }
}
