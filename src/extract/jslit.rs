//! Tolerant JavaScript-literal grammar.
//!
//! The dashboard embeds rendering parameters as JS literals, not JSON:
//! unquoted keys, single quotes, trailing commas, `undefined`, comments.
//! This module normalizes exactly those constructs into strict JSON and
//! hands the rest to serde_json. It is scoped to the known call-site
//! shapes and is deliberately not a JavaScript engine — anything outside
//! the tolerated grammar fails instead of being guessed at.

use serde_json::Value;

/// Split a call expression's argument list into top-level argument texts.
///
/// `src` must start at the character immediately after the opening `(`.
/// Nesting and string literals (single, double, backtick) are respected.
/// Returns the argument texts and the offset of the matching `)`, or
/// `None` if the call never closes or closes malformed.
pub fn split_call_args(src: &str) -> Option<(Vec<String>, usize)> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 1usize;
    let mut in_str: Option<char> = None;
    let mut escaped = false;

    for (i, c) in src.char_indices() {
        if let Some(quote) = in_str {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_str = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                in_str = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let last = current.trim().to_string();
                    if !(last.is_empty() && args.is_empty()) {
                        args.push(last);
                    }
                    return Some((args, i));
                }
                current.push(c);
            }
            ']' | '}' => {
                // A closer that would unbalance the call is malformed input.
                if depth == 1 {
                    return None;
                }
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 1 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    None
}

/// Normalize a tolerated JS literal into strict JSON text.
///
/// Handles: single/backtick-quoted strings, bareword keys, bareword values
/// (quoted as strings), trailing commas, `undefined`/`NaN` (both become
/// `null`), hex integers, leading `+`, `.5` / `5.` number forms, and
/// line/block comments. Template interpolation (`${…}`) is rejected.
pub fn normalize(src: &str) -> Option<String> {
    let chars: Vec<char> = src.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 16);
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => i = copy_string(&chars, i, &mut out)?,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            ',' => {
                // Trailing comma: drop it when the next token closes.
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if !matches!(chars.get(j), Some('}') | Some(']')) {
                    out.push(',');
                }
                i += 1;
            }
            '{' | '}' | '[' | ']' | ':' => {
                out.push(c);
                i += 1;
            }
            _ if c.is_whitespace() => i += 1,
            _ if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                i = copy_number(&chars, i, &mut out)?
            }
            _ if c.is_alphabetic() || c == '_' || c == '$' => i = copy_word(&chars, i, &mut out),
            _ => return None,
        }
    }
    Some(out)
}

/// Normalize and parse a tolerated JS literal into a JSON value.
pub fn parse(src: &str) -> Option<Value> {
    serde_json::from_str(&normalize(src)?).ok()
}

fn copy_string(chars: &[char], start: usize, out: &mut String) -> Option<usize> {
    let quote = chars[start];
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            let next = *chars.get(i + 1)?;
            match next {
                '\'' => out.push('\''),
                '"' => out.push_str("\\\""),
                '\\' | '/' | 'n' | 't' | 'r' | 'b' | 'f' | 'u' => {
                    out.push('\\');
                    out.push(next);
                }
                other => out.push(other), // lenient: unknown escape, keep the char
            }
            i += 2;
            continue;
        }
        if c == quote {
            out.push('"');
            return Some(i + 1);
        }
        if quote == '`' && c == '$' && chars.get(i + 1) == Some(&'{') {
            return None; // template interpolation is a computation, not a literal
        }
        match c {
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
        i += 1;
    }
    None
}

fn copy_number(chars: &[char], start: usize, out: &mut String) -> Option<usize> {
    let mut i = start;
    let mut buf = String::new();

    if chars[i] == '+' {
        i += 1; // JSON has no unary plus
    } else if chars[i] == '-' {
        buf.push('-');
        i += 1;
    }

    // Hex integers occur in render configs (colors); emit decimal.
    if chars.get(i) == Some(&'0') && matches!(chars.get(i + 1), Some('x') | Some('X')) {
        let mut j = i + 2;
        let mut hex = String::new();
        while j < chars.len() && chars[j].is_ascii_hexdigit() {
            hex.push(chars[j]);
            j += 1;
        }
        let mut v = i64::from_str_radix(&hex, 16).ok()?;
        if buf.starts_with('-') {
            v = -v;
        }
        out.push_str(&v.to_string());
        return Some(j);
    }

    if chars.get(i) == Some(&'.') {
        buf.push('0'); // .5 → 0.5
    }
    let mut seen_digit = false;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            seen_digit = true;
            buf.push(c);
        } else if c == '.' || c == 'e' || c == 'E' {
            buf.push(c);
        } else if (c == '+' || c == '-') && matches!(buf.chars().last(), Some('e') | Some('E')) {
            buf.push(c);
        } else {
            break;
        }
        i += 1;
    }
    if !seen_digit {
        return None;
    }
    if buf.ends_with('.') {
        buf.push('0'); // 5. → 5.0
    }
    out.push_str(&buf);
    Some(i)
}

fn copy_word(chars: &[char], start: usize, out: &mut String) -> usize {
    let mut i = start;
    let mut word = String::new();
    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
        word.push(chars[i]);
        i += 1;
    }

    // Peek past whitespace: a bareword followed by ':' is an object key.
    let mut j = i;
    while j < chars.len() && chars[j].is_whitespace() {
        j += 1;
    }
    let is_key = chars.get(j) == Some(&':');

    match (word.as_str(), is_key) {
        ("true" | "false" | "null", false) => out.push_str(&word),
        ("undefined" | "NaN", false) => out.push_str("null"),
        _ => {
            out.push('"');
            out.push_str(&word);
            out.push('"');
        }
    }
    i
}
