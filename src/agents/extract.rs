use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// A `FROM` line of a Dockerfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromCandidate {
    /// Reference exactly as written, before `${VAR}` substitution.
    pub reference: String,
    pub alias: Option<String>,
}

/// A `uses:` line of a workflow file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsesCandidate {
    pub action: String,
    pub git_ref: String,
    /// `v...` text of a trailing `# v...` comment on the same line.
    pub comment_tag: Option<String>,
}

/// Pulls candidate references out of file text. Implementations decide how
/// (regular expressions today); callers only see the candidates.
pub trait CandidateExtractor {
    /// `ARG name=value` defaults, in file order.
    fn build_args(&self, dockerfile: &str) -> Vec<(String, String)>;

    fn from_lines(&self, dockerfile: &str) -> Vec<FromCandidate>;

    fn uses_lines(&self, workflow: &str) -> Vec<UsesCandidate>;
}

static ARG_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^ARG\s+(\w+)=(.+)$").unwrap());
static FROM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^FROM\s+(?:--\S+\s+)*(\S+?)(?:\s+AS\s+(\S+))?\s*$").unwrap()
});
static USES_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*-?\s*uses:\s+([^@\s]+)@(\S+)(.*)$").unwrap());
static TAG_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\s*(v\S+)").unwrap());
static LINE_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[ \t]*\r?\n").unwrap());
static ARG_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{(\w+)\}").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct RegexExtractor;

impl CandidateExtractor for RegexExtractor {
    fn build_args(&self, dockerfile: &str) -> Vec<(String, String)> {
        ARG_LINE
            .captures_iter(&join_continuations(dockerfile))
            .map(|caps| (caps[1].to_string(), unquote(caps[2].trim()).to_string()))
            .collect()
    }

    fn from_lines(&self, dockerfile: &str) -> Vec<FromCandidate> {
        FROM_LINE
            .captures_iter(&join_continuations(dockerfile))
            .map(|caps| FromCandidate {
                reference: caps[1].to_string(),
                alias: caps.get(2).map(|m| m.as_str().to_string()),
            })
            .collect()
    }

    fn uses_lines(&self, workflow: &str) -> Vec<UsesCandidate> {
        USES_LINE
            .captures_iter(workflow)
            .map(|caps| UsesCandidate {
                action: caps[1].to_string(),
                git_ref: caps[2].to_string(),
                comment_tag: TAG_COMMENT
                    .captures(&caps[3])
                    .map(|tag| tag[1].to_string()),
            })
            .collect()
    }
}

/// Replace `${NAME}` tokens with their ARG defaults in one pass. Unknown
/// names stay as written; substituted values are not expanded again.
pub fn substitute_args(reference: &str, args: &HashMap<String, String>) -> String {
    ARG_TOKEN
        .replace_all(reference, |caps: &regex::Captures<'_>| {
            args.get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Fold `\`-continued instruction lines into one line.
fn join_continuations(dockerfile: &str) -> String {
    LINE_CONTINUATION.replace_all(dockerfile, " ").into_owned()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_lines_capture_reference_and_alias() {
        let text = "FROM golang:1.22 AS build\nRUN go build\nfrom --platform=$BUILDPLATFORM alpine:3.20\n";
        let found = RegexExtractor.from_lines(text);
        assert_eq!(
            found,
            vec![
                FromCandidate {
                    reference: "golang:1.22".into(),
                    alias: Some("build".into()),
                },
                FromCandidate {
                    reference: "alpine:3.20".into(),
                    alias: None,
                },
            ]
        );
    }

    #[test]
    fn continued_from_lines_are_joined() {
        let text = "FROM --platform=$BUILDPLATFORM \\\n    golang:1.22 AS build\nFROM \\  \r\n  alpine:3.20\n";
        let found = RegexExtractor.from_lines(text);
        assert_eq!(
            found,
            vec![
                FromCandidate {
                    reference: "golang:1.22".into(),
                    alias: Some("build".into()),
                },
                FromCandidate {
                    reference: "alpine:3.20".into(),
                    alias: None,
                },
            ]
        );
    }

    #[test]
    fn arg_keyword_is_case_insensitive() {
        let args = RegexExtractor.build_args("arg PY=3.12\nArg NODE=22\n");
        assert_eq!(
            args,
            vec![
                ("PY".to_string(), "3.12".to_string()),
                ("NODE".to_string(), "22".to_string()),
            ]
        );
    }

    #[test]
    fn dockerfile_without_from_has_no_candidates() {
        assert!(RegexExtractor.from_lines("RUN echo hi\n").is_empty());
    }

    #[test]
    fn args_keep_file_order_and_strip_quotes() {
        let args = RegexExtractor.build_args("ARG A=1\nARG B=\"two\"\nARG A=3\nARG NODEFAULT\n");
        assert_eq!(
            args,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two".to_string()),
                ("A".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn substitution_is_single_pass() {
        let args: HashMap<String, String> = [
            ("BASE".to_string(), "python:${PY}".to_string()),
            ("PY".to_string(), "3.12".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(substitute_args("${BASE}", &args), "python:${PY}");
        assert_eq!(substitute_args("python:${PY}-${MISSING}", &args), "python:3.12-${MISSING}");
    }

    #[test]
    fn uses_lines_pick_up_trailing_tag_comment() {
        let text = "    steps:\n      - uses: actions/checkout@0123456789abcdef0123456789abcdef01234567 # v4.2.2\n      - uses: actions/setup-go@main\n        uses: ./local/action@x\n";
        let found = RegexExtractor.uses_lines(text);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].comment_tag.as_deref(), Some("v4.2.2"));
        assert_eq!(found[1].git_ref, "main");
        assert_eq!(found[1].comment_tag, None);
        assert_eq!(found[2].action, "./local/action");
    }
}
