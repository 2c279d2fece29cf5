//! External portrait generation
//!
//! Hands an exported avatar and its prompt to a user-configured executable.
//! Failures come back as a [`GenerationStatus`] for the caller to show; they
//! never abort the avatar pipeline.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

/// Outcome of one generator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStatus {
    /// No executable configured
    Disabled,
    /// The tool ran and exited successfully
    Completed { stderr: String },
    /// The tool ran and reported failure
    Failed { code: Option<i32>, stderr: String },
    /// The tool could not be started
    SpawnFailed(String),
}

impl GenerationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// One-line notification text
    pub fn message(&self) -> String {
        match self {
            Self::Disabled => "Portrait generation is not configured".to_string(),
            Self::Completed { .. } => "Portrait generated".to_string(),
            Self::Failed { code, stderr } => match code {
                Some(code) => format!("Portrait generator exited with {code}: {}", stderr.trim()),
                None => format!("Portrait generator was terminated: {}", stderr.trim()),
            },
            Self::SpawnFailed(reason) => format!("Could not start portrait generator: {reason}"),
        }
    }
}

/// Launcher for the configured generator executable
#[derive(Debug, Clone)]
pub struct PortraitGenerator {
    executable: String,
}

impl PortraitGenerator {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.executable.trim().is_empty()
    }

    /// Run `<executable> <image> <prompt>` to completion, collecting stderr
    pub fn run(&self, image: &Path, prompt: &str) -> GenerationStatus {
        if !self.is_enabled() {
            return GenerationStatus::Disabled;
        }
        info!(executable = %self.executable, image = %image.display(), "Starting portrait generator");

        let output = Command::new(&self.executable)
            .arg(image)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let status = match output {
            Err(e) => GenerationStatus::SpawnFailed(e.to_string()),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if output.status.success() {
                    GenerationStatus::Completed { stderr }
                } else {
                    GenerationStatus::Failed {
                        code: output.status.code(),
                        stderr,
                    }
                }
            }
        };
        if status.is_success() {
            info!("Portrait generator finished");
        } else {
            warn!(executable = %self.executable, "{}", status.message());
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_executable() {
        let generator = PortraitGenerator::new("  ");
        assert!(!generator.is_enabled());
        assert_eq!(
            generator.run(Path::new("a.png"), "prompt"),
            GenerationStatus::Disabled
        );
    }

    #[test]
    fn test_missing_executable_reports_spawn_failure() {
        let generator = PortraitGenerator::new("/nonexistent/limner-portrait-tool");
        let status = generator.run(Path::new("a.png"), "prompt");
        assert!(matches!(status, GenerationStatus::SpawnFailed(_)));
        assert!(status.message().starts_with("Could not start"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status() {
        let ok = PortraitGenerator::new("true").run(Path::new("a.png"), "prompt");
        assert!(ok.is_success());

        let failed = PortraitGenerator::new("false").run(Path::new("a.png"), "prompt");
        assert_eq!(
            failed,
            GenerationStatus::Failed {
                code: Some(1),
                stderr: String::new()
            }
        );
    }
}
