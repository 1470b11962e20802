use crate::boundary::{Span, SpanKind};
use crate::config::ChunkerConfig;

/// A planned chunk: 0-based inclusive line range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineRange {
    pub start: usize,
    pub end: usize,
    pub kind: Option<SpanKind>,
}

impl LineRange {
    fn new(start: usize, end: usize, kind: Option<SpanKind>) -> Self {
        Self { start, end, kind }
    }
}

/// Fixed-size windows with overlap, used when no boundaries are known.
pub(crate) struct FixedWindowStrategy<'a> {
    config: &'a ChunkerConfig,
}

impl<'a> FixedWindowStrategy<'a> {
    pub fn new(config: &'a ChunkerConfig) -> Self {
        Self { config }
    }

    /// Windows of `chunk_size` lines advancing by `chunk_size - overlap`.
    ///
    /// A trailing window that adds fewer than `min_chunk_lines` new lines is
    /// folded into its predecessor, so every line stays covered.
    pub fn windows(&self, total_lines: usize) -> Vec<LineRange> {
        let mut windows: Vec<LineRange> = Vec::new();
        if total_lines == 0 {
            return windows;
        }

        let step = self
            .config
            .chunk_size
            .saturating_sub(self.config.overlap)
            .max(1);
        let mut start = 0;

        loop {
            let end = (start + self.config.chunk_size).min(total_lines) - 1;
            match windows.last_mut() {
                Some(last) if end - last.end < self.config.min_chunk_lines => last.end = end,
                _ => windows.push(LineRange::new(start, end, None)),
            }

            if end + 1 >= total_lines {
                break;
            }
            start += step;
        }

        windows
    }
}

/// Greedy packing of detected spans into chunks of at most `chunk_size`
/// lines, with bounded overlap between neighbours.
pub(crate) struct SpanPackingStrategy<'a> {
    config: &'a ChunkerConfig,
}

impl<'a> SpanPackingStrategy<'a> {
    pub fn new(config: &'a ChunkerConfig) -> Self {
        Self { config }
    }

    /// Cut the file into segments: every span, plus the gaps between them.
    /// Blank gaps stick to the preceding segment; long code gaps are split
    /// so they can never turn into an oversized chunk.
    fn segments(&self, spans: &[Span], lines: &[&str]) -> Vec<LineRange> {
        let step = self
            .config
            .chunk_size
            .saturating_sub(self.config.overlap)
            .max(1);
        let mut segments: Vec<LineRange> = Vec::new();

        let push_gap = |segments: &mut Vec<LineRange>, start: usize, end: usize| {
            let blank = lines[start..=end].iter().all(|line| line.trim().is_empty());
            if blank && let Some(last) = segments.last_mut() {
                last.end = end;
                return;
            }
            let mut piece = start;
            while piece <= end {
                let piece_end = (piece + step - 1).min(end);
                segments.push(LineRange::new(piece, piece_end, None));
                piece = piece_end + 1;
            }
        };

        let mut cursor = 0;
        for span in spans {
            if span.start > cursor {
                push_gap(&mut segments, cursor, span.start - 1);
            }
            segments.push(LineRange::new(span.start, span.end, Some(span.kind)));
            cursor = span.end + 1;
        }
        if cursor < lines.len() {
            push_gap(&mut segments, cursor, lines.len() - 1);
        }

        segments
    }

    pub fn pack(&self, spans: &[Span], lines: &[&str]) -> Vec<LineRange> {
        let chunk_size = self.config.chunk_size;
        let mut chunks = Vec::new();
        let mut segments = self.segments(spans, lines).into_iter();

        let Some(first) = segments.next() else {
            return chunks;
        };
        let mut window = first;

        for segment in segments {
            if segment.end - window.start + 1 <= chunk_size {
                window.end = segment.end;
                window.kind = window.kind.or(segment.kind);
                continue;
            }

            chunks.push(window);

            // carry the tail of the closed chunk, unless that would push the
            // next segment over the limit on its own
            let carry = self.config.overlap.min(window.end - window.start);
            let carried_start = window.end + 1 - carry;
            let start = if segment.end + 1 - carried_start <= chunk_size {
                carried_start
            } else {
                segment.start
            };
            window = LineRange::new(start, segment.end, segment.kind);
        }

        chunks.push(window);
        chunks
    }
}
