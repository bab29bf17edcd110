use crate::error::{PinupError, Result};
use crate::repository::ImageRegistry;
use crate::utils::process::ExternalTool;
use crate::utils::verbose::verbose;
use std::time::Duration;

const CRANE_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry lookups through the `crane` CLI.
pub struct CraneRegistry {
    tool: ExternalTool,
}

impl CraneRegistry {
    pub fn new() -> Self {
        Self::with_tool(ExternalTool::new("crane", CRANE_TIMEOUT))
    }

    pub fn with_tool(tool: ExternalTool) -> Self {
        Self { tool }
    }
}

impl Default for CraneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageRegistry for CraneRegistry {
    fn latest_digest(&self, image: &str, tag: &str) -> Result<String> {
        let reference = format!("{image}:{tag}");
        verbose!("{} digest {}", self.tool.program(), reference);

        let digest = self
            .tool
            .run(&["digest", &reference])
            .map_err(|e| {
                PinupError::Resolution(format!(
                    "crane digest failed for {reference}: {}",
                    e.detail()
                ))
            })?;

        if digest.is_empty() {
            return Err(PinupError::Resolution(format!(
                "crane digest returned nothing for {reference}"
            )));
        }
        Ok(digest)
    }

    fn list_tags(&self, image: &str) -> Result<Vec<String>> {
        verbose!("{} ls {}", self.tool.program(), image);

        let output = self
            .tool
            .run(&["ls", image])
            .map_err(|e| {
                PinupError::Resolution(format!("crane ls failed for {image}: {}", e.detail()))
            })?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn fake_crane(script: &str) -> CraneRegistry {
        CraneRegistry::with_tool(
            ExternalTool::new("sh", Duration::from_secs(5)).with_prefix_args(["-c", script, "crane"]),
        )
    }

    #[test]
    fn digest_is_returned_verbatim() {
        let crane = fake_crane(r#"[ "$1" = digest ] && [ "$2" = "python:3.11" ] && echo sha256:bbbb"#);
        assert_eq!(crane.latest_digest("python", "3.11").unwrap(), "sha256:bbbb");
    }

    #[test]
    fn failed_lookup_is_a_resolution_error() {
        let crane = fake_crane("echo 'UNAUTHORIZED' >&2; exit 1");
        let err = crane.latest_digest("private/img", "1").unwrap_err();
        assert!(matches!(err, PinupError::Resolution(_)));
        assert!(err.to_string().contains("private/img:1"));
        assert!(err.detail().starts_with("crane digest failed for private/img:1: "));
        assert!(!err.detail().contains("External tool failed:"));
    }

    #[test]
    fn missing_binary_is_a_resolution_error() {
        let crane = CraneRegistry::with_tool(ExternalTool::new(
            "pinup-missing-crane",
            Duration::from_secs(1),
        ));
        let err = crane.latest_digest("alpine", "3.20").unwrap_err();
        assert!(err.to_string().contains("not found in PATH"));
    }

    #[test]
    fn tags_are_split_per_line() {
        let crane = fake_crane(r#"printf '1.21.0\n\n1.22.1\nlatest\n'"#);
        assert_eq!(
            crane.list_tags("golang").unwrap(),
            vec!["1.21.0", "1.22.1", "latest"]
        );
    }
}
