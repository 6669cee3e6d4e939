//! Sliding-window sequence matcher.
//!
//! One session walks an input line stream through a window of
//! `FormatSpec::max_span` lines. At every window position the retained items
//! are tried in declared order and the first eligible match claims the
//! position. The session owns its `FormatSpec`; match indexes and keyword
//! captures are mutated in place, so one compiled spec serves one session at
//! a time. `reset` starts the next session.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::spec::FormatSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatcherState {
    Idle,
    /// Window not yet full.
    Filling,
    /// Window full; one buffer check per incoming line.
    Scanning,
    /// End of input; window drained with synthetic blank lines.
    Flushing,
    /// Terminal until the next `reset`.
    Reported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatcherError {
    /// Input was offered after the session was finished.
    Finished,
}

impl fmt::Display for MatcherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatcherError::Finished => write!(f, "matcher session already finished; reset first"),
        }
    }
}

impl std::error::Error for MatcherError {}

/// Lines captured for one keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeywordCapture {
    /// 0-based input line where the capture starts.
    pub first_line: Option<usize>,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingItem {
    /// 1-based declared position.
    pub position: usize,
    pub total: usize,
    pub raw: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutOfSequence {
    pub raw: Vec<String>,
    /// 1-based position among matched items in declared order.
    pub expected_position: usize,
    /// 1-based position among matched items in discovered order.
    pub actual_position: usize,
    /// Number of matched items.
    pub total: usize,
    /// 0-based input line where the item was discovered.
    pub line: usize,
}

/// Everything a finished session found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchOutcome {
    pub lines_seen: usize,
    pub missing: Vec<MissingItem>,
    pub out_of_sequence: Vec<OutOfSequence>,
    pub captures: BTreeMap<String, KeywordCapture>,
}

impl MatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.out_of_sequence.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SequenceMatcher {
    spec: FormatSpec,
    window: VecDeque<String>,
    /// Lines pushed through the window, synthetic flush lines included.
    lines_seen: usize,
    /// Real input lines.
    real_lines: usize,
    active: Option<usize>,
    state: MatcherState,
}

impl SequenceMatcher {
    pub fn new(spec: FormatSpec) -> Self {
        Self {
            spec,
            window: VecDeque::new(),
            lines_seen: 0,
            real_lines: 0,
            active: None,
            state: MatcherState::Idle,
        }
    }

    /// Clear match indexes, keyword captures and the window; re-enter Filling.
    pub fn reset(&mut self) {
        for item in self.spec.items.iter_mut() {
            item.index = None;
            for kw in item.keywords.values_mut() {
                kw.clear();
            }
        }
        self.window.clear();
        self.lines_seen = 0;
        self.real_lines = 0;
        self.active = None;
        self.state = MatcherState::Filling;
        debug!(max_span = self.spec.max_span(), "matcher reset");
    }

    /// Offer one input line.
    pub fn check(&mut self, line: &str) -> Result<(), MatcherError> {
        match self.state {
            MatcherState::Flushing | MatcherState::Reported => return Err(MatcherError::Finished),
            MatcherState::Idle => self.reset(),
            MatcherState::Filling | MatcherState::Scanning => {}
        }

        self.window.push_back(line.trim_end().to_string());
        self.lines_seen += 1;
        self.real_lines = self.lines_seen;

        if self.window.len() >= self.spec.max_span() {
            if self.state == MatcherState::Filling {
                debug!(lines_seen = self.lines_seen, "matcher window full");
            }
            self.state = MatcherState::Scanning;
            self.buffer_check();
        }
        Ok(())
    }

    pub fn check_all<I, S>(&mut self, lines: I) -> Result<(), MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.check(line.as_ref())?;
        }
        Ok(())
    }

    /// Drain the window with blank lines so items near the end of input can
    /// still match. Idempotent once finished.
    pub fn finish(&mut self) {
        match self.state {
            MatcherState::Flushing | MatcherState::Reported => return,
            MatcherState::Idle => self.reset(),
            MatcherState::Filling | MatcherState::Scanning => {}
        }
        self.state = MatcherState::Flushing;

        let real = self.real_lines;
        let pending = self.window.len();
        for _ in 0..pending {
            while self.window.len() < self.spec.max_span() {
                self.window.push_back(String::new());
                self.lines_seen += 1;
            }
            self.buffer_check();
        }
        self.window.clear();
        self.lines_seen = real;
        debug!(lines_seen = real, "matcher flushed");
    }

    /// Finish if needed and collect missing items, ordering violations and
    /// keyword captures.
    pub fn report(&mut self) -> MatchOutcome {
        self.finish();
        self.state = MatcherState::Reported;

        let items = &self.spec.items;
        let total = items.len();

        let missing: Vec<MissingItem> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.index.is_none())
            .map(|(pos, item)| MissingItem {
                position: pos + 1,
                total,
                raw: item.raw_lines().into_iter().map(str::to_string).collect(),
            })
            .collect();

        // (declared position, discovered index) of every matched item, in
        // declared order.
        let matched: Vec<(usize, usize)> = items
            .iter()
            .enumerate()
            .filter_map(|(pos, item)| item.index.map(|idx| (pos, idx)))
            .collect();
        let mut discovered = matched.clone();
        discovered.sort_by_key(|&(pos, idx)| (idx, pos));

        let mut out_of_sequence = Vec::new();
        for (actual, pair) in discovered.windows(2).enumerate() {
            let (prev_pos, _) = pair[0];
            let (pos, idx) = pair[1];
            if prev_pos < pos {
                continue;
            }
            let expected = matched.iter().position(|&(p, _)| p == pos).unwrap_or(0);
            out_of_sequence.push(OutOfSequence {
                raw: items[pos].raw_lines().into_iter().map(str::to_string).collect(),
                expected_position: expected + 1,
                actual_position: actual + 2,
                total: matched.len(),
                line: idx,
            });
        }

        debug!(
            missing = missing.len(),
            out_of_sequence = out_of_sequence.len(),
            "matcher reported"
        );

        MatchOutcome {
            lines_seen: self.lines_seen,
            missing,
            out_of_sequence,
            captures: self.captures(),
        }
    }

    /// Keyword name -> captured lines, across all retained items.
    pub fn captures(&self) -> BTreeMap<String, KeywordCapture> {
        let mut out = BTreeMap::new();
        for item in &self.spec.items {
            for (name, kw) in &item.keywords {
                out.entry(name.clone()).or_insert_with(|| KeywordCapture {
                    first_line: kw.first_line(),
                    lines: kw.lines().to_vec(),
                });
            }
        }
        out
    }

    pub fn state(&self) -> MatcherState {
        self.state
    }

    /// Real input lines seen this session.
    pub fn lines_seen(&self) -> usize {
        self.real_lines
    }

    pub fn spec(&self) -> &FormatSpec {
        &self.spec
    }

    fn buffer_check(&mut self) {
        let start = self.lines_seen - self.window.len();

        let hit = (0..self.spec.items.len()).find(|&pos| {
            let item = &self.spec.items[pos];
            item.index.is_none()
                && item
                    .depends_on
                    .map(|dep| self.spec.items[dep].index.is_some())
                    .unwrap_or(true)
                && item.matches_window(&self.window)
        });

        match hit {
            Some(pos) => {
                let real_tail = self.real_lines.saturating_sub(start);
                let item = &mut self.spec.items[pos];
                item.index = Some(start);
                let take = item.span.min(real_tail);
                let seed: Vec<String> = self.window.iter().take(take).cloned().collect();
                for kw in item.keywords.values_mut() {
                    kw.first_line = Some(start);
                    kw.lines = seed.clone();
                }
                self.active = Some(pos);
                debug!(item = pos, line = start, "item matched");
            }
            None => {
                // The newest window line is the one just handed to `check`;
                // while flushing it is synthetic and never captured.
                let newest_is_real = self.lines_seen <= self.real_lines;
                if let (Some(pos), true) = (self.active, newest_is_real) {
                    if let Some(line) = self.window.back() {
                        for kw in self.spec.items[pos].keywords.values_mut() {
                            kw.lines.push(line.clone());
                        }
                    }
                }
            }
        }

        self.window.pop_front();
    }
}
