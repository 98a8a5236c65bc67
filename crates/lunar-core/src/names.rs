//! Target-language naming: reserved words, identifier sanitizing, and the
//! fixed local names that lowered templates share with the emitter.

use std::borrow::Cow;

/// Receiver parameter of methods.
pub const SELF: &str = "self";
/// Placeholder for an ignored positional parameter or loop index.
pub const PLACEHOLDER: &str = "_";

/// Locals of the protected-call template.
pub const TRY_OK: &str = "__ok";
pub const TRY_FLOW: &str = "__flow";
pub const TRY_VALUE: &str = "__value";
/// Signal returned from a protected region that executed `return`.
pub const RETURN_SIGNAL: &str = "return";

/// Local holding an evaluated `switch` discriminant.
pub const SWITCH_VALUE: &str = "__switch";

/// Class template members.
pub const CONSTRUCTOR: &str = "constructor";
pub const NEW: &str = "new";
pub const INDEX: &str = "__index";
pub const NEWINDEX: &str = "__newindex";
pub const GETTERS: &str = "__get";
pub const SETTERS: &str = "__set";

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Globals the emitted code relies on. Source bindings with these names are
/// renamed so they cannot shadow them.
const RESERVED_GLOBALS: &[&str] = &[
    "_", "_ENV", "_G", "coroutine", "error", "getmetatable", "ipairs", "math", "pairs", "pcall",
    "print", "rawget", "rawset", "self", "setmetatable", "string", "table", "tonumber", "tostring",
    "type",
];

pub fn is_keyword(name: &str) -> bool {
    LUA_KEYWORDS.contains(&name)
}

/// True if `name` can be written as a bare field name (`t.name`).
pub fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_keyword(name)
}

fn replace_chars(name: &str) -> Cow<'_, str> {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Cow::Borrowed(name);
    }
    let mut s = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        match c {
            c if c.is_ascii_alphanumeric() || c == '_' => s.push(c),
            '$' => s.push_str("_S"),
            c => s.push_str(&format!("_u{:X}", c as u32)),
        }
    }
    Cow::Owned(s)
}

/// Map a source identifier onto a valid target identifier.
///
/// `$` becomes `_S`, other non-ASCII characters become `_u<hex>`, and
/// keywords or reserved globals get a trailing underscore.
pub fn sanitize(name: &str) -> Cow<'_, str> {
    let mut out = replace_chars(name);
    if is_keyword(&out) || RESERVED_GLOBALS.contains(&out.as_ref()) {
        out.to_mut().push('_');
    }
    out
}

/// Sanitize a property name.
///
/// Names shaped like source identifiers get the same character mapping as
/// bindings, and keywords get a trailing underscore; reserved globals are fine
/// as field names. Any other string is kept verbatim and ends up written as
/// `t["..."]`.
pub fn sanitize_field(name: &str) -> Cow<'_, str> {
    let identifier_shaped = name.chars().next().is_some_and(|c| !c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if !identifier_shaped {
        return Cow::Borrowed(name);
    }
    let mut out = replace_chars(name);
    if is_keyword(&out) {
        out.to_mut().push('_');
    }
    out
}

pub fn temp(n: u32) -> String {
    format!("__t{n}")
}

pub fn break_label(target: u32) -> String {
    format!("__break{target}")
}

pub fn continue_label(target: u32) -> String {
    format!("__continue{target}")
}

pub fn break_signal(target: u32) -> String {
    format!("break{target}")
}

pub fn continue_signal(target: u32) -> String {
    format!("continue{target}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keywords_and_globals() {
        assert_eq!(sanitize("end"), "end_");
        assert_eq!(sanitize("local"), "local_");
        assert_eq!(sanitize("table"), "table_");
        assert_eq!(sanitize("self"), "self_");
        assert_eq!(sanitize("count"), "count");
    }

    #[test]
    fn test_sanitize_symbols() {
        assert_eq!(sanitize("$el"), "_Sel");
        assert_eq!(sanitize("café"), "caf_uE9");
    }

    #[test]
    fn test_field_names() {
        assert!(is_field_name("value"));
        assert!(is_field_name("_private"));
        assert!(!is_field_name("end"));
        assert!(!is_field_name("my-key"));
        assert!(!is_field_name("1st"));
        assert_eq!(sanitize_field("end"), "end_");
        assert_eq!(sanitize_field("table"), "table");
        assert_eq!(sanitize_field("$x"), "_Sx");
        assert_eq!(sanitize_field("my-key"), "my-key");
        assert_eq!(sanitize_field("0"), "0");
    }
}
