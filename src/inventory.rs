//! Process-presence check: ask an OS process-listing utility for its text
//! output and look for the target in it.
use regex::Regex;
use serde::Serialize;
use std::future::Future;
use std::process::Stdio;
use tokio::process::Command;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Result of a presence probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Running,
    NotRunning,
    /// Both listings failed; nothing is known.
    Unknown,
}

impl Presence {
    /// Only a positive hit counts. `Unknown` restarts the target.
    pub fn is_running(self) -> bool {
        self == Presence::Running
    }
}

/// Source of raw process-inventory text.
pub trait Inventory {
    /// Short label for logging.
    fn name(&self) -> &str;

    fn list(&self) -> impl Future<Output = Result<String, InventoryError>> + Send;
}

/// An inventory backed by an external command whose stdout is the listing.
#[derive(Debug, Clone)]
pub struct CommandInventory {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandInventory {
    pub fn new(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Processes filtered by image name, with full command lines.
    #[cfg(windows)]
    pub fn command_lines(image_name: &str) -> Self {
        let filter = format!("name='{image_name}'");
        Self::new(
            "command-lines",
            "wmic",
            &["process", "where", &filter, "get", "commandline"],
        )
    }

    #[cfg(not(windows))]
    pub fn command_lines(_image_name: &str) -> Self {
        Self::new("command-lines", "ps", &["-eo", "args"])
    }

    /// Processes filtered by image name, one CSV row per process.
    #[cfg(windows)]
    pub fn images(image_name: &str) -> Self {
        let filter = format!("IMAGENAME eq {image_name}");
        Self::new("images", "tasklist", &["/FI", &filter, "/FO", "CSV"])
    }

    #[cfg(not(windows))]
    pub fn images(_image_name: &str) -> Self {
        Self::new("images", "ps", &["-eo", "comm,args"])
    }
}

impl Inventory for CommandInventory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self) -> Result<String, InventoryError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let output = cmd.output().await.map_err(|e| InventoryError::Spawn {
            program: self.program.clone(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(InventoryError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Case-insensitive substring matcher over a set of markers.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    pattern: Option<Regex>,
}

impl MarkerSet {
    pub fn new<S: AsRef<str>>(markers: &[S]) -> Self {
        let alternatives: Vec<String> = markers
            .iter()
            .map(|m| m.as_ref().trim())
            .filter(|m| !m.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            return Self { pattern: None };
        }

        // Escaped literals always form a valid pattern.
        let pattern = Regex::new(&format!("(?i)(?:{})", alternatives.join("|"))).ok();
        Self { pattern }
    }

    pub fn matches(&self, text: &str) -> bool {
        match &self.pattern {
            Some(p) => p.is_match(text),
            None => false,
        }
    }
}

/// Look for `markers` in the command-line listing. Only if that listing
/// cannot be produced, look for `image` in the image listing instead.
///
/// A successful command-line listing decides the answer on its own. A
/// failing image listing makes the answer `Unknown`.
pub async fn probe<P, F>(
    command_lines: &P,
    markers: &MarkerSet,
    images: &F,
    image: &MarkerSet,
) -> Presence
where
    P: Inventory,
    F: Inventory,
{
    match command_lines.list().await {
        Ok(text) if markers.matches(&text) => {
            tracing::debug!(inventory = command_lines.name(), "marker found");
            return Presence::Running;
        }
        Ok(_) => {
            tracing::debug!(inventory = command_lines.name(), "no marker in listing");
            return Presence::NotRunning;
        }
        Err(e) => {
            tracing::debug!(
                inventory = command_lines.name(),
                error = %e,
                "inventory failed, checking image listing"
            );
        }
    }

    match images.list().await {
        Ok(text) if image.matches(&text) => {
            tracing::debug!(inventory = images.name(), "image found");
            Presence::Running
        }
        Ok(_) => {
            tracing::debug!(inventory = images.name(), "image not in listing");
            Presence::NotRunning
        }
        Err(e) => {
            tracing::debug!(inventory = images.name(), error = %e, "inventory failed");
            Presence::Unknown
        }
    }
}

/// Errors from running an inventory command.
#[derive(Debug)]
pub enum InventoryError {
    /// The listing utility could not be started.
    Spawn {
        program: String,
        source: std::io::Error,
    },
    /// The listing utility ran but reported failure.
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryError::Spawn { program, source } => {
                write!(f, "failed to run {}: {}", program, source)
            }
            InventoryError::Failed {
                program,
                code,
                stderr,
            } => match code {
                Some(c) => write!(f, "{} exited with status {}: {}", program, c, stderr),
                None => write!(f, "{} terminated by signal: {}", program, stderr),
            },
        }
    }
}

impl std::error::Error for InventoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InventoryError::Spawn { source, .. } => Some(source),
            InventoryError::Failed { .. } => None,
        }
    }
}
