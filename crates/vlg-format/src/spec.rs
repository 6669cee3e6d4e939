//! FormatSpec compiler.
//!
//! A format spec is a line-oriented list of regex descriptions that an input
//! file must contain, in order. Each description line may end in one marker:
//!
//! - `:N:` (N ≥ 1): extends the previous item's group. The line must match
//!   N lines after the group's prior line; the group span grows by N and may
//!   not exceed [`MAX_GROUP_SPAN`].
//! - `:D:`: starts a new item that only becomes eligible once the previous
//!   item has matched.
//!
//! `<Name>` placeholders (capitalized identifiers) declare keywords: the
//! placeholder matches anything and the name becomes a capture region owned
//! by the item. An item made only of placeholders is merged into its
//! neighbour before matching.
//!
//! Compilation fails closed: one bad line rejects the whole spec.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use tracing::debug;

lazy_static! {
    static ref TRAILING_MARKER: Regex =
        Regex::new(r"^(?s)(.*?):([0-9]+|D):\s*$").expect("static regex");
    static ref KEYWORD: Regex = Regex::new(r"<([A-Z][A-Za-z0-9_]*)>").expect("static regex");
    static ref VARIABLE: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex");
}

/// Pattern substituted for a keyword placeholder.
pub const MATCH_ANYTHING: &str = ".*";

/// Upper bound on an item's group span. The matcher window is this wide at
/// most, so a larger `:N:` is rejected at compile time.
pub const MAX_GROUP_SPAN: usize = 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSpecError {
    /// `lines` and `raw_lines` differ in length.
    LengthMismatch { lines: usize, raw_lines: usize },
    /// The description does not compile as a regex.
    InvalidRegex {
        line: usize,
        raw: String,
        message: String,
    },
    /// `:0:`, or a `:N:` that pushes the group past [`MAX_GROUP_SPAN`].
    InvalidSpanMarker { line: usize, raw: String },
    /// `:N:` on a line with no previous item to extend.
    ExtendsNothing { line: usize, raw: String },
    /// `:D:` on a line with no previous item to depend on.
    DependsOnNothing { line: usize, raw: String },
    /// `${name}` with no value supplied.
    UndefinedVariable { line: usize, name: String },
}

impl fmt::Display for FormatSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatSpecError::LengthMismatch { lines, raw_lines } => write!(
                f,
                "format spec has {lines} processed line(s) but {raw_lines} raw line(s)"
            ),
            FormatSpecError::InvalidRegex { line, raw, message } => {
                write!(f, "format spec line {line} is not a valid pattern: '{raw}': {message}")
            }
            FormatSpecError::InvalidSpanMarker { line, raw } => {
                write!(f, "format spec line {line} has an invalid span marker ")?;
                write!(f, "(1..={MAX_GROUP_SPAN}): '{raw}'")
            }
            FormatSpecError::ExtendsNothing { line, raw } => write!(
                f,
                "format spec line {line} extends a group but no item precedes it: '{raw}'"
            ),
            FormatSpecError::DependsOnNothing { line, raw } => write!(
                f,
                "format spec line {line} declares a dependency but no item precedes it: '{raw}'"
            ),
            FormatSpecError::UndefinedVariable { line, name } => {
                write!(f, "format spec line {line} uses undefined variable '${{{name}}}'")
            }
        }
    }
}

impl std::error::Error for FormatSpecError {}

// ---------------------------------------------------------------------------
// Compiled types
// ---------------------------------------------------------------------------

/// One description line of an item's group.
#[derive(Debug, Clone)]
pub struct GroupLine {
    /// Spec text as authored, for messages.
    pub raw: String,
    /// Pattern text after marker, placeholder and variable processing.
    pub pattern: String,
    /// Offset from the group's first line (0 for the first line).
    pub offset: usize,
    /// The pattern reduces to "match anything".
    pub matches_anything: bool,
    regex: Regex,
}

impl GroupLine {
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

/// Named capture region. Filled while its owning item is the active one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyword {
    pub(crate) first_line: Option<usize>,
    pub(crate) lines: Vec<String>,
}

impl Keyword {
    /// 0-based index of the first captured line.
    pub fn first_line(&self) -> Option<usize> {
        self.first_line
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub(crate) fn clear(&mut self) {
        self.first_line = None;
        self.lines.clear();
    }
}

/// One matchable group of description lines.
#[derive(Debug, Clone)]
pub struct Item {
    /// Spec line number (1-based) of the group's first line.
    pub declared_line: usize,
    pub lines: Vec<GroupLine>,
    /// Number of input lines the group covers.
    pub span: usize,
    /// Position (in [`FormatSpec::items`]) of the item that must match first.
    pub depends_on: Option<usize>,
    pub keywords: BTreeMap<String, Keyword>,
    pub(crate) index: Option<usize>,
}

impl Item {
    /// 0-based input line where the item matched in the current session.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn raw_lines(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.raw.as_str()).collect()
    }

    fn is_degenerate(&self) -> bool {
        self.lines.iter().all(|l| l.matches_anything)
    }

    /// Every group line matches at its offset within `window`.
    pub(crate) fn matches_window(&self, window: &VecDeque<String>) -> bool {
        self.lines.iter().all(|l| {
            window
                .get(l.offset)
                .map(|text| l.is_match(text))
                .unwrap_or(false)
        })
    }
}

/// A compiled spec: retained items in declared order plus the window size.
#[derive(Debug, Clone)]
pub struct FormatSpec {
    pub(crate) items: Vec<Item>,
    max_span: usize,
}

struct Entry {
    line: usize,
    /// Line text before variable substitution.
    text: String,
    raw: String,
}

impl FormatSpec {
    /// Compile processed `lines` with their unprocessed `raw_lines`
    /// counterparts (one logical line per entry).
    pub fn compile<S: AsRef<str>, R: AsRef<str>>(
        lines: &[S],
        raw_lines: &[R],
    ) -> Result<Self, FormatSpecError> {
        if lines.len() != raw_lines.len() {
            return Err(FormatSpecError::LengthMismatch {
                lines: lines.len(),
                raw_lines: raw_lines.len(),
            });
        }
        let entries = lines
            .iter()
            .zip(raw_lines.iter())
            .enumerate()
            .map(|(i, (l, r))| Entry {
                line: i + 1,
                text: l.as_ref().to_string(),
                raw: r.as_ref().to_string(),
            })
            .collect();
        Self::compile_entries(entries, None)
    }

    /// Compile spec source text. Blank lines and `#` comments are skipped and
    /// `${name}` references are replaced by the regex-escaped value. Markers
    /// and placeholders are read from the authored text only, so a value can
    /// never add a `:N:`, `:D:` or `<Keyword>`.
    pub fn from_text(
        text: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<Self, FormatSpecError> {
        let mut entries = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
                continue;
            }
            entries.push(Entry {
                line,
                text: raw.to_string(),
                raw: raw.to_string(),
            });
        }
        Self::compile_entries(entries, Some(variables))
    }

    fn compile_entries(
        entries: Vec<Entry>,
        variables: Option<&BTreeMap<String, String>>,
    ) -> Result<Self, FormatSpecError> {
        let mut items: Vec<Item> = Vec::new();

        for entry in entries {
            let (body, marker) = split_marker(&entry.text);

            let mut keywords = BTreeMap::new();
            for cap in KEYWORD.captures_iter(body) {
                keywords.insert(cap[1].to_string(), Keyword::default());
            }
            let template = KEYWORD.replace_all(body, MATCH_ANYTHING);
            let pattern = match variables {
                Some(vars) => substitute_variables(&template, entry.line, vars)?,
                None => template.into_owned(),
            };
            let matches_anything = pattern.replace(MATCH_ANYTHING, "").trim().is_empty();

            let regex = RegexBuilder::new(&pattern)
                .dot_matches_new_line(true)
                .build()
                .map_err(|e| FormatSpecError::InvalidRegex {
                    line: entry.line,
                    raw: entry.raw.clone(),
                    message: e.to_string(),
                })?;

            let mut group_line = GroupLine {
                raw: entry.raw.clone(),
                pattern,
                offset: 0,
                matches_anything,
                regex,
            };

            match marker {
                Marker::Extend(0) => {
                    return Err(FormatSpecError::InvalidSpanMarker {
                        line: entry.line,
                        raw: entry.raw,
                    });
                }
                Marker::Extend(n) => {
                    let item = items.last_mut().ok_or_else(|| FormatSpecError::ExtendsNothing {
                        line: entry.line,
                        raw: entry.raw.clone(),
                    })?;
                    let span = item
                        .span
                        .checked_add(n)
                        .filter(|&s| s <= MAX_GROUP_SPAN)
                        .ok_or_else(|| FormatSpecError::InvalidSpanMarker {
                            line: entry.line,
                            raw: entry.raw.clone(),
                        })?;
                    let prior = item.lines.last().map(|l| l.offset).unwrap_or(0);
                    group_line.offset = prior + n;
                    item.span = span;
                    item.lines.push(group_line);
                    for (name, kw) in keywords {
                        item.keywords.entry(name).or_insert(kw);
                    }
                }
                Marker::Depends => {
                    if items.is_empty() {
                        return Err(FormatSpecError::DependsOnNothing {
                            line: entry.line,
                            raw: entry.raw,
                        });
                    }
                    let dep = items.len() - 1;
                    items.push(Item {
                        declared_line: entry.line,
                        lines: vec![group_line],
                        span: 1,
                        depends_on: Some(dep),
                        keywords,
                        index: None,
                    });
                }
                Marker::None => items.push(Item {
                    declared_line: entry.line,
                    lines: vec![group_line],
                    span: 1,
                    depends_on: None,
                    keywords,
                    index: None,
                }),
            }
        }

        let items = prune_degenerate(items);
        let max_span = items.iter().map(|i| i.span).max().unwrap_or(1);
        Ok(Self { items, max_span })
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Largest retained span; the matcher's window size.
    pub fn max_span(&self) -> usize {
        self.max_span
    }
}

enum Marker {
    None,
    Extend(usize),
    Depends,
}

fn split_marker(text: &str) -> (&str, Marker) {
    let Some(caps) = TRAILING_MARKER.captures(text) else {
        return (text.trim_end(), Marker::None);
    };
    let body = caps.get(1).map(|m| m.as_str()).unwrap_or("").trim_end();
    let marker = match &caps[2] {
        "D" => Marker::Depends,
        // Digits only; a value past usize parses as 0 and is rejected.
        digits => Marker::Extend(digits.parse().unwrap_or(0)),
    };
    (body, marker)
}

fn substitute_variables(
    raw: &str,
    line: usize,
    variables: &BTreeMap<String, String>,
) -> Result<String, FormatSpecError> {
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for cap in VARIABLE.captures_iter(raw) {
        let Some(whole) = cap.get(0) else {
            continue;
        };
        let name = &cap[1];
        let value = variables
            .get(name)
            .ok_or_else(|| FormatSpecError::UndefinedVariable {
                line,
                name: name.to_string(),
            })?;
        out.push_str(&raw[last..whole.start()]);
        out.push_str(&regex::escape(value));
        last = whole.end();
    }
    out.push_str(&raw[last..]);
    Ok(out)
}

/// Drop keyword-only items, handing their keywords to the nearest retained
/// item before them (or after them, for a leading one). Dependencies are
/// remapped onto retained positions.
fn prune_degenerate(items: Vec<Item>) -> Vec<Item> {
    let degenerate: Vec<bool> = items.iter().map(Item::is_degenerate).collect();

    // Declared position -> retained declared position that absorbs it.
    let mut absorbed_by: Vec<Option<usize>> = (0..items.len()).map(Some).collect();
    for i in 0..items.len() {
        if !degenerate[i] {
            continue;
        }
        let before = (0..i).rev().find(|&j| !degenerate[j]);
        let after = (i + 1..items.len()).find(|&j| !degenerate[j]);
        absorbed_by[i] = before.or(after);
    }

    let mut moved: Vec<(usize, BTreeMap<String, Keyword>)> = Vec::new();
    let mut kept: Vec<(usize, Item)> = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        if degenerate[i] {
            match absorbed_by[i] {
                Some(target) => moved.push((target, item.keywords)),
                None => debug!(
                    declared_line = item.declared_line,
                    "keyword-only item has no neighbour; keywords dropped"
                ),
            }
        } else {
            kept.push((i, item));
        }
    }

    for (target, keywords) in moved {
        if let Some((_, item)) = kept.iter_mut().find(|(i, _)| *i == target) {
            for (name, kw) in keywords {
                item.keywords.entry(name).or_insert(kw);
            }
        }
    }

    let position_of = |declared: usize| kept.iter().position(|(i, _)| *i == declared);
    let remapped: Vec<Option<usize>> = kept
        .iter()
        .map(|(own, item)| {
            let dep = item.depends_on?;
            let target = absorbed_by[dep]?;
            if target == *own {
                return None;
            }
            position_of(target)
        })
        .collect();

    kept.into_iter()
        .zip(remapped)
        .map(|((_, mut item), dep)| {
            item.depends_on = dep;
            item
        })
        .collect()
}
