//! Translation of simplified glob patterns into anchored regexes.

use regex_lite::Regex;

use crate::error::PatternError;

/// Compile a glob pattern into an anchored regex.
///
/// Supported syntax:
/// - `**` matches any sequence, including `/`
/// - `*` matches any sequence not containing `/`
/// - `?` matches one character other than `/`
/// - `[abc]`, `[a-z]`, `[!abc]` character classes
///
/// Every other character matches itself.
pub fn compile_pattern(pattern: &str) -> Result<Regex, PatternError> {
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                re.push_str(".*");
                i += 2;
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '[' => {
                i = push_class(pattern, &chars, i, &mut re)?;
                continue;
            }
            c => {
                let mut buf = [0u8; 4];
                re.push_str(&regex_lite::escape(c.encode_utf8(&mut buf)));
            }
        }
        i += 1;
    }

    re.push('$');

    Regex::new(&re).map_err(|e| PatternError::Invalid {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Append the character class starting at `start` and return the index
/// just past its closing bracket.
fn push_class(
    pattern: &str,
    chars: &[char],
    start: usize,
    re: &mut String,
) -> Result<usize, PatternError> {
    let mut i = start + 1;
    re.push('[');

    if matches!(chars.get(i), Some('!') | Some('^')) {
        re.push('^');
        i += 1;
    }

    // A leading `]` is a literal member of the class.
    if chars.get(i) == Some(&']') {
        re.push_str("\\]");
        i += 1;
    }

    while let Some(&c) = chars.get(i) {
        match c {
            ']' => {
                re.push(']');
                return Ok(i + 1);
            }
            '\\' | '[' => {
                re.push('\\');
                re.push(c);
            }
            _ => re.push(c),
        }
        i += 1;
    }

    Err(PatternError::UnterminatedClass(pattern.to_string()))
}
