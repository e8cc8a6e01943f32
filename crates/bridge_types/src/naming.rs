//! Case-convention translation for member names crossing the boundary.
//!
//! Host members are usually PascalCase (or snake_case when they come straight
//! from a Rust identifier), UI members are camelCase. Both functions are total:
//! any string maps to a string, and an empty input stays empty.

/// Convert an identifier to PascalCase (`get_name` / `getName` -> `GetName`).
pub fn to_pascal(name: &str) -> String {
    convert(name, true)
}

/// Convert an identifier to camelCase (`GetName` / `get_name` -> `getName`).
pub fn to_camel(name: &str) -> String {
    convert(name, false)
}

fn convert(name: &str, upper_first: bool) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_boundary = false;

    for ch in name.chars() {
        if is_separator(ch) {
            // Leading separators are dropped, interior ones start a new word
            at_boundary = !out.is_empty();
            continue;
        }

        if out.is_empty() {
            if upper_first {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
        } else if at_boundary {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_boundary = false;
    }

    out
}

fn is_separator(ch: char) -> bool {
    ch == '_' || ch == '-' || ch.is_whitespace()
}
