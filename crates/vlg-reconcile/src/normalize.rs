//! Description normalization.
//!
//! Detector descriptions frequently embed the reporting line ("... (line 10)").
//! Between runs that number drifts while the finding stays the same, so the
//! store compares descriptions through a pattern in which every `line N`
//! number is a wildcard.
//!
//! Two renderings of the same pattern are produced:
//! - [`description_pattern`]: regex syntax, used for the authoritative
//!   full-span comparison.
//! - [`description_like_pattern`]: SQL `LIKE` syntax, used only to prefilter
//!   rows in the database before the regex comparison.
//!
//! Everything here is a pure function of its input.

use lazy_static::lazy_static;
use regex::Regex;
use vlg_schemas::NOT_AVAILABLE;

lazy_static! {
    /// Numeric component of an embedded `line N` reference.
    static ref LINE_REFERENCE: Regex = Regex::new(r"(line\s+)[0-9]+").expect("static regex");
    static ref SPACE_RUN: Regex = Regex::new(r" {2,}").expect("static regex");
}

/// Characters escaped for regex use. Backslash is part of the set, so the
/// single left-to-right pass never re-escapes an inserted escape.
const REGEX_META: &[char] = &[
    '\\', '.', '^', '$', '*', '+', '?', '{', '}', '[', ']', '|', '(', ')',
];

const LIKE_META: &[char] = &['\\', '%', '_'];

/// Wildcard substituted for a line number in regex mode.
pub const DIGITS_WILDCARD: &str = "[0-9]+";

/// Wildcard substituted for a line number in SQL prefilter mode.
pub const SQL_WILDCARD: &str = "%";

/// Empty function names are stored as `N/A`.
pub fn normalize_function(function: &str) -> String {
    if function.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        function.to_string()
    }
}

/// Empty details are stored as `N/A`; otherwise runs of spaces collapse to one.
pub fn normalize_details(details: &str) -> String {
    if details.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    SPACE_RUN.replace_all(details, " ").into_owned()
}

/// Escape regex metacharacters so the description matches itself literally.
pub fn escape_description(description: &str) -> String {
    escape_with(description, REGEX_META)
}

/// Regex pattern (unanchored) that matches `description` with any line number.
pub fn description_pattern(description: &str) -> String {
    let escaped = escape_description(description);
    LINE_REFERENCE
        .replace_all(&escaped, format!("${{1}}{DIGITS_WILDCARD}").as_str())
        .into_owned()
}

/// SQL `LIKE` pattern (backslash escape) that matches `description` with any
/// line number. Looser than the regex pattern; callers must still confirm
/// candidates with [`description_regex`].
pub fn description_like_pattern(description: &str) -> String {
    let escaped = escape_with(description, LIKE_META);
    LINE_REFERENCE
        .replace_all(&escaped, format!("${{1}}{SQL_WILDCARD}").as_str())
        .into_owned()
}

/// Anchored regex for full-span comparison against stored descriptions.
pub fn description_regex(description: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", description_pattern(description)))
}

fn escape_with(s: &str, meta: &[char]) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if meta.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
