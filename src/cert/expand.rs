//! `$NAME` placeholder expansion for certificate references.
//!
//! Grammar: a placeholder is `$` followed by one or more characters from
//! `[A-Z0-9_]`, taken greedily. It is replaced by the value of the variable
//! of that name, or by the empty string when the variable is unset. A `$`
//! not followed by such a character is kept literally.

/// A placeholder found in a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Variable name, without the leading `$`.
    pub name: String,
    /// Byte range of `$NAME` in the input.
    pub start: usize,
    pub end: usize,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_'
}

/// Find every placeholder in `input`, left to right.
pub fn find_placeholders(input: &str) -> Vec<Placeholder> {
    let bytes = input.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let name_start = i + 1;
        let mut end = name_start;
        while end < bytes.len() && is_name_byte(bytes[end]) {
            end += 1;
        }
        if end > name_start {
            found.push(Placeholder {
                name: input[name_start..end].to_string(),
                start: i,
                end,
            });
            i = end;
        } else {
            i += 1;
        }
    }

    found
}

/// Expand placeholders using `lookup` to resolve variable names.
pub fn expand_placeholders_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let placeholders = find_placeholders(input);
    if placeholders.is_empty() {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    for placeholder in &placeholders {
        out.push_str(&input[cursor..placeholder.start]);
        if let Some(value) = lookup(&placeholder.name) {
            out.push_str(&value);
        }
        cursor = placeholder.end;
    }
    out.push_str(&input[cursor..]);
    out
}

/// Expand placeholders from the process environment.
pub fn expand_env(input: &str) -> String {
    expand_placeholders_with(input, |name| std::env::var(name).ok())
}
