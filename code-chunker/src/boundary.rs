//! Heuristic detection of top-level function/class regions.
//!
//! Detectors see a file as a slice of lines and return non-overlapping,
//! ascending spans. Nothing here parses the language properly; a real
//! parser can be dropped in behind [`BoundaryDetector`] without touching
//! chunk packing.

use crate::language::{Language, Scoping};
use serde::{Deserialize, Serialize};

/// What a detected region most likely is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Function,
    Class,
    Impl,
    Module,
    Block,
}

/// A detected region of a file; `start`/`end` are 0-based inclusive line
/// indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
}

impl Span {
    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Finds semantic boundaries in a file.
pub trait BoundaryDetector: Send + Sync {
    /// Returns top-level spans sorted by `start`, never overlapping.
    fn detect(&self, lines: &[&str]) -> Vec<Span>;
}

/// Pick the detector for a language, if it has one
pub fn detector_for(language: Language) -> Option<Box<dyn BoundaryDetector>> {
    match language.scoping() {
        Scoping::Brace => Some(Box::new(BraceBoundaryDetector::for_language(language))),
        Scoping::Indent => Some(Box::new(IndentBoundaryDetector)),
        Scoping::Plain => None,
    }
}

const CLASS_WORDS: &[&str] = &[
    "class",
    "struct",
    "enum",
    "interface",
    "trait",
    "record",
    "union",
    "object",
];
const MODULE_WORDS: &[&str] = &["mod", "module", "namespace", "package"];
const FUNCTION_WORDS: &[&str] = &["fn", "function", "def", "func", "fun", "sub"];

/// Classify a block header by the first keyword it contains.
fn classify_header(header: &[&str]) -> SpanKind {
    let text = header
        .iter()
        .map(|line| line.trim())
        .filter(|line| {
            !(line.starts_with("//")
                || line.starts_with("/*")
                || line.starts_with('*')
                || line.starts_with("#[")
                || line.starts_with('@'))
        })
        .collect::<Vec<_>>()
        .join(" ");

    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
    {
        if word == "impl" {
            return SpanKind::Impl;
        }
        if CLASS_WORDS.contains(&word) {
            return SpanKind::Class;
        }
        if MODULE_WORDS.contains(&word) {
            return SpanKind::Module;
        }
        if FUNCTION_WORDS.contains(&word) {
            return SpanKind::Function;
        }
    }

    if text.contains('(') {
        SpanKind::Function
    } else {
        SpanKind::Block
    }
}

/// Brace-depth counting for `{ ... }` languages.
#[derive(Debug, Clone, Default)]
pub struct BraceBoundaryDetector {
    /// `'...'` delimits strings (JS, PHP) rather than char literals or
    /// lifetimes
    single_quote_strings: bool,
}

impl BraceBoundaryDetector {
    pub fn for_language(language: Language) -> Self {
        Self {
            single_quote_strings: matches!(
                language,
                Language::JavaScript | Language::TypeScript | Language::Php | Language::Bash
            ),
        }
    }
}

/// Per-file scanner state carried between lines.
struct BraceScanner {
    in_block_comment: bool,
    single_quote_strings: bool,
}

impl BraceScanner {
    /// Braces on a line that sit outside strings and comments, in order
    fn braces(&mut self, line: &str) -> Vec<char> {
        let chars: Vec<char> = line.chars().collect();
        let mut braces = Vec::new();
        let mut in_string: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if self.in_block_comment {
                if c == '*' && next == Some('/') {
                    self.in_block_comment = false;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }

            if let Some(quote) = in_string {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == quote {
                    in_string = None;
                }
                i += 1;
                continue;
            }

            match c {
                '/' if next == Some('/') => break,
                '/' if next == Some('*') => {
                    self.in_block_comment = true;
                    i += 2;
                    continue;
                }
                '"' | '`' => in_string = Some(c),
                '\'' => {
                    if let Some(len) = char_literal_len(&chars[i..]) {
                        i += len;
                        continue;
                    }
                    if self.single_quote_strings {
                        in_string = Some('\'');
                    }
                }
                '{' | '}' => braces.push(c),
                _ => {}
            }
            i += 1;
        }

        braces
    }
}

/// Length of a char literal (`'x'`, `'\n'`, `'\u{1F600}'`) starting at
/// `chars[0]`. `None` for lifetimes and longer quoted text.
fn char_literal_len(chars: &[char]) -> Option<usize> {
    match (chars.get(1), chars.get(2)) {
        (Some('\\'), _) => chars
            .iter()
            .enumerate()
            .skip(3)
            .take(10)
            .find(|(_, c)| **c == '\'')
            .map(|(idx, _)| idx + 1),
        (Some(_), Some('\'')) => Some(3),
        _ => None,
    }
}

/// Walk back from the line holding `{` over the rest of its header
/// (signature continuation, attributes, doc comments).
fn header_start(lines: &[&str], open_line: usize, floor: usize) -> usize {
    let mut start = open_line;
    while start > floor {
        let prev = lines[start - 1].trim();
        if prev.is_empty() || prev.ends_with(';') || prev.ends_with('}') || prev.ends_with('{') {
            break;
        }
        start -= 1;
    }
    start
}

impl BoundaryDetector for BraceBoundaryDetector {
    fn detect(&self, lines: &[&str]) -> Vec<Span> {
        let mut scanner = BraceScanner {
            in_block_comment: false,
            single_quote_strings: self.single_quote_strings,
        };
        let mut spans: Vec<Span> = Vec::new();
        let mut depth = 0usize;
        // (header start, line of the opening brace)
        let mut open: Option<(usize, usize)> = None;

        for (idx, line) in lines.iter().enumerate() {
            for brace in scanner.braces(line) {
                if brace == '{' {
                    if depth == 0 && open.is_none() {
                        let floor = spans.last().map_or(0, |span| span.end + 1);
                        open = Some((header_start(lines, idx, floor), idx));
                    }
                    depth += 1;
                } else {
                    depth = depth.saturating_sub(1);
                }
            }

            // `} else {` keeps the depth up, so both halves end in one span
            if depth == 0
                && let Some((start, open_line)) = open.take()
            {
                spans.push(Span {
                    start,
                    end: idx,
                    kind: classify_header(&lines[start..=open_line]),
                });
            }
        }

        // unterminated block runs to EOF
        if let Some((start, open_line)) = open {
            spans.push(Span {
                start,
                end: lines.len().saturating_sub(1),
                kind: classify_header(&lines[start..=open_line]),
            });
        }

        spans
    }
}

/// Indentation tracking for Python-like languages.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndentBoundaryDetector;

fn is_indented(line: &str) -> bool {
    line.starts_with(char::is_whitespace)
}

fn is_definition(trimmed: &str) -> Option<SpanKind> {
    if trimmed.starts_with("class ") {
        Some(SpanKind::Class)
    } else if trimmed.starts_with("def ") || trimmed.starts_with("async def ") {
        Some(SpanKind::Function)
    } else {
        None
    }
}

/// Advance bracket depth and triple-quote state over one line.
fn scan_python_line(line: &str, depth: &mut usize, triple: &mut Option<&'static [u8]>) {
    let bytes = line.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(quote) = *triple {
            if bytes[i..].starts_with(quote) {
                *triple = None;
                i += quote.len();
            } else {
                i += 1;
            }
            continue;
        }

        match bytes[i] {
            b'#' => break,
            quote @ (b'"' | b'\'') => {
                let delimiter: &'static [u8] = if quote == b'"' { b"\"\"\"" } else { b"'''" };
                if bytes[i..].starts_with(delimiter) {
                    *triple = Some(delimiter);
                    i += delimiter.len();
                    continue;
                }
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'(' | b'[' | b'{' => *depth += 1,
            b')' | b']' | b'}' => *depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
}

/// First line of the logical statement containing `idx`
fn statement_head(continuation: &[bool], mut idx: usize, floor: usize) -> usize {
    while idx > floor && continuation[idx] {
        idx -= 1;
    }
    idx
}

impl BoundaryDetector for IndentBoundaryDetector {
    fn detect(&self, lines: &[&str]) -> Vec<Span> {
        // continuation[i]: line i starts inside brackets or a triple-quoted string
        let mut continuation = Vec::with_capacity(lines.len());
        let mut depth = 0usize;
        let mut triple = None;
        for line in lines {
            continuation.push(depth > 0 || triple.is_some());
            scan_python_line(line, &mut depth, &mut triple);
        }

        let mut spans: Vec<Span> = Vec::new();
        let mut idx = 0;

        while idx < lines.len() {
            let line = lines[idx];
            let kind = match is_definition(line) {
                Some(kind) if !continuation[idx] && !is_indented(line) => kind,
                _ => {
                    idx += 1;
                    continue;
                }
            };

            // absorb decorators, including multi-line ones
            let floor = spans.last().map_or(0, |span| span.end + 1);
            let mut start = idx;
            while start > floor {
                let head = statement_head(&continuation, start - 1, floor);
                if lines[head].starts_with('@') {
                    start = head;
                } else {
                    break;
                }
            }

            let mut end = idx;
            for (next, body_line) in lines.iter().enumerate().skip(idx + 1) {
                let trimmed = body_line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if continuation[next] || is_indented(body_line) {
                    end = next;
                    continue;
                }
                if trimmed.starts_with('#') {
                    continue;
                }
                break;
            }

            spans.push(Span { start, end, kind });
            idx = end + 1;
        }

        spans
    }
}
