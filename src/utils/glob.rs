use crate::error::{PinupError, Result};
use regex::Regex;

/// Shell-style wildcard matcher (`*`, `?` and `[...]` sets), anchored at both ends.
pub struct GlobMatcher {
    regex: Regex,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut regex = String::from("^");
        let mut i = 0;
        while i < chars.len() {
            let ch = chars[i];
            match ch {
                '*' => regex.push_str(".*"),
                '?' => regex.push('.'),
                '[' => match char_class(&chars[i + 1..]) {
                    Some((class, consumed)) => {
                        regex.push_str(&class);
                        i += consumed;
                    }
                    None => regex.push_str("\\["),
                },
                '.' | '+' | '(' | ')' | '|' | '^' | '$' | '{' | '}' | ']' | '\\' => {
                    regex.push('\\');
                    regex.push(ch);
                }
                _ => regex.push(ch),
            }
            i += 1;
        }
        regex.push('$');

        let regex = Regex::new(&regex).map_err(|e| {
            PinupError::Config(format!("Invalid glob pattern '{}': {}", pattern, e))
        })?;
        Ok(Self { regex })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Translate the body of a `[...]` set (text after the `[`) into a regex
/// class. `[!...]` negates and a `]` right after the opening is literal.
/// Returns the class and how many characters it consumed, or `None` when the
/// set is never closed.
fn char_class(rest: &[char]) -> Option<(String, usize)> {
    let mut class = String::from("[");
    let mut i = 0;
    if rest.first() == Some(&'!') {
        class.push('^');
        i += 1;
    }
    let body_start = i;
    while i < rest.len() {
        let ch = rest[i];
        if ch == ']' && i > body_start {
            class.push(']');
            return Some((class, i + 1));
        }
        match ch {
            '\\' | '[' | ']' | '^' | '&' | '~' => {
                class.push('\\');
                class.push(ch);
            }
            _ => class.push(ch),
        }
        i += 1;
    }
    None
}
