use crate::error::{PinupError, Result};
use crate::utils::path_validator::PathValidator;
use crate::utils::verbose::verbose;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// VersionControlAgent runs the git side of the local apply strategy inside a
/// validated repository root.
pub struct VersionControlAgent {
    repo_path: PathBuf,
}

impl VersionControlAgent {
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self> {
        let repo_path = Self::validate_git_path(repo_path.as_ref())?;
        Ok(Self { repo_path })
    }

    pub fn configure_identity(&self, name: &str, email: &str) -> Result<()> {
        self.git(&["config", "user.name", name])?;
        self.git(&["config", "user.email", email])?;
        Ok(())
    }

    /// Fetch `base` from origin and reset `branch` onto it.
    pub fn checkout_branch_from(&self, branch: &str, base: &str) -> Result<()> {
        Self::validate_ref_name(branch)?;
        Self::validate_ref_name(base)?;
        self.git(&["fetch", "origin", base])?;
        self.git(&["checkout", "-B", branch, &format!("origin/{base}")])?;
        Ok(())
    }

    /// Stage files given relative to the repository root.
    pub fn stage(&self, files: &[String]) -> Result<()> {
        for file in files {
            PathValidator::resolve_in_root(file, &self.repo_path).map_err(|err| {
                PinupError::GitOperation(format!("Refusing to stage unsafe path: {err}"))
            })?;
            self.git(&["add", "--", file])?;
        }
        Ok(())
    }

    pub fn has_staged_changes(&self) -> Result<bool> {
        let output = self.run_git(&["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(Self::failure(&output, "git diff --cached")),
        }
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "-m", message])?;
        Ok(())
    }

    pub fn force_push(&self, branch: &str) -> Result<()> {
        Self::validate_ref_name(branch)?;
        self.git(&["push", "--force", "origin", branch])?;
        Ok(())
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        let output = self.run_git(args)?;
        if output.status.success() {
            return Ok(output);
        }
        Err(Self::failure(&output, &format!("git {}", args.join(" "))))
    }

    fn run_git(&self, args: &[&str]) -> Result<Output> {
        verbose!("git {}", args.join(" "));
        Command::new("git")
            .current_dir(&self.repo_path)
            .args(args)
            .output()
            .map_err(|e| {
                PinupError::GitOperation(format!(
                    "Failed to execute git command '{}': {e}",
                    args.join(" ")
                ))
            })
    }

    fn failure(output: &Output, command: &str) -> PinupError {
        PinupError::GitOperation(format!(
            "{} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }

    fn validate_git_path(path: &Path) -> Result<PathBuf> {
        let dangerous = [';', '|', '&', '$', '`', '\n', '\r'];
        let path_str = path.to_string_lossy();
        if let Some(ch) = dangerous.iter().find(|c| path_str.contains(**c)) {
            return Err(PinupError::GitOperation(format!(
                "Path contains dangerous character: '{}'",
                ch
            )));
        }

        PathValidator::validate_repository_root(path)
            .map_err(|err| PinupError::GitOperation(format!("Invalid Git path: {}", err)))
    }

    fn validate_ref_name(name: &str) -> Result<()> {
        let valid = !name.is_empty()
            && !name.starts_with('-')
            && !name.contains("..")
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'));
        if valid {
            Ok(())
        } else {
            Err(PinupError::GitOperation(format!(
                "Invalid branch name: '{name}'"
            )))
        }
    }
}
