use crate::error::{PinupError, Result};
use std::path::{Component, Path, PathBuf};

/// Provides safe path validation helpers to avoid traversal and host intrusion.
pub struct PathValidator;

impl PathValidator {
    /// Validates and canonicalises the repository root.
    pub fn validate_repository_root(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            PinupError::ProjectValidation(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(PinupError::ProjectValidation(format!(
                "Path '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);

            if path.starts_with(forbidden_path) || canonical.starts_with(forbidden_path) {
                return Err(PinupError::ProjectValidation(format!(
                    "Access to system directory '{}' is not allowed",
                    forbidden
                )));
            }
        }

        Ok(canonical)
    }

    /// Resolves a report-relative file path against the repository root.
    ///
    /// The path must be relative and must not climb out of the root; the
    /// target does not need to exist yet.
    pub fn resolve_in_root(relative: &str, root: &Path) -> Result<PathBuf> {
        let candidate = Path::new(relative);
        if candidate.is_absolute() {
            return Err(PinupError::ProjectValidation(format!(
                "Refusing absolute path '{relative}'"
            )));
        }

        let escapes = candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(PinupError::ProjectValidation(format!(
                "Path '{relative}' is outside the repository root"
            )));
        }

        Ok(root.join(candidate))
    }
}
