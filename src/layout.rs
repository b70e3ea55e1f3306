//! Styled format trees and width-aware wrapping.
//!
//! A `Fmt` describes content declaratively (text, concatenation, colour
//! overrides, no-break runs, and spans hidden from search). `Fmt::wrap`
//! lays it out at a display width, producing a `Wrapped`: the styled output
//! lines (span vectors), the raw searchable text split into chunks at every
//! `Skip` boundary, and an anchor map from raw rune offsets to on-screen
//! (line, column) positions. Substring search runs over the raw chunks and
//! reports highlight ranges through the anchor map, so matches survive
//! styling, tab expansion, wide runes, and soft wraps.

use std::collections::BTreeMap;

use unicode_width::UnicodeWidthChar;

use crate::style::{self, Color, Paint, Style};

const TAB_WIDTH: usize = 4;

/// A declarative piece of styled content.
#[derive(Debug, Clone)]
pub enum Fmt {
    /// Raw text; may contain newlines, tabs, and arbitrary runes.
    Text(String),
    /// In-order composition.
    Seq(Vec<Fmt>),
    /// Paint one style slot of the child.
    Painted(Paint, Box<Fmt>),
    /// Keep the child on a single output line, wrapping before it if needed.
    NoBreak(Box<Fmt>),
    /// Render the child but omit it from the searchable raw text.
    Skip(Box<Fmt>),
}

pub fn text(s: &str) -> Fmt {
    Fmt::Text(s.to_string())
}

pub fn seq(children: Vec<Fmt>) -> Fmt {
    Fmt::Seq(children)
}

pub fn fg(color: Color, child: Fmt) -> Fmt {
    Fmt::Painted(Paint::Fg(color), Box::new(child))
}

pub fn bg(color: Color, child: Fmt) -> Fmt {
    Fmt::Painted(Paint::Bg(color), Box::new(child))
}

pub fn nobreak(child: Fmt) -> Fmt {
    Fmt::NoBreak(Box::new(child))
}

pub fn skip(child: Fmt) -> Fmt {
    Fmt::Skip(Box::new(child))
}

impl Fmt {
    /// Substring check without laying anything out. `Skip` subtrees never
    /// match, mirroring their absence from the raw text.
    pub fn contains(&self, q: &str) -> bool {
        match self {
            Fmt::Text(s) => s.contains(q),
            Fmt::Seq(children) => children.iter().any(|c| c.contains(q)),
            Fmt::Painted(_, child) | Fmt::NoBreak(child) => child.contains(q),
            Fmt::Skip(_) => false,
        }
    }

    /// Lays this format out at the given display width (0 = unbounded).
    pub fn wrap(&self, width: usize) -> Wrapped {
        let mut out = Wrapped::new(width);
        lay(&mut out, self, 0, Style::default(), true);
        if out.raw.len() > 1 && out.raw.last().map_or(false, |c| c.is_empty()) {
            out.raw.pop();
        }
        out
    }
}

/// A run of text drawn with a single style.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub style: Style,
}

/// One on-screen occurrence of a search query: a half-open range of
/// (line, rune-column) positions over the styled lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub start: (usize, usize),
    pub end: (usize, usize),
}

/// The result of wrapping a `Fmt` at a width.
#[derive(Debug)]
pub struct Wrapped {
    width: usize,
    lines: Vec<Vec<Span>>,
    raw: Vec<String>,
    /// (chunk, rune offset) -> (line, rune column). Covers the first rune
    /// after every line break, both sides of every tab and control-rune
    /// expansion, and the first rune of every text run; positions between
    /// anchors resolve by rune-count delta.
    anchors: BTreeMap<(usize, usize), (usize, usize)>,
    // Incremental rune counts for the open line and chunk.
    line_runes: usize,
    chunk_runes: usize,
}

impl Wrapped {
    fn new(width: usize) -> Self {
        Wrapped {
            width,
            lines: vec![Vec::new()],
            raw: vec![String::new()],
            anchors: BTreeMap::new(),
            line_runes: 0,
            chunk_runes: 0,
        }
    }

    /// Number of output rows. Always at least 1.
    pub fn rows(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, i: usize) -> &[Span] {
        &self.lines[i]
    }

    /// The unstyled text of one output line.
    pub fn plain_line(&self, i: usize) -> String {
        self.lines[i].iter().map(|s| s.text.as_str()).collect()
    }

    pub fn raw_chunks(&self) -> &[String] {
        &self.raw
    }

    /// Maps a raw position to its on-screen position: nearest anchor at or
    /// before the offset, plus the rune-count difference.
    pub fn translate(&self, chunk: usize, off: usize) -> Option<(usize, usize)> {
        let ((ac, ao), (line, col)) = self.anchors.range(..=(chunk, off)).next_back()?;
        if *ac != chunk {
            return None;
        }
        Some((*line, col + (off - ao)))
    }

    /// Finds every occurrence of `q` in the raw text and maps it to screen
    /// ranges, in document order.
    pub fn search(&self, q: &str) -> Vec<Hit> {
        if q.is_empty() || self.anchors.is_empty() {
            return Vec::new();
        }
        let qrunes = q.chars().count();
        let mut hits = Vec::new();
        for (ci, chunk) in self.raw.iter().enumerate() {
            let mut runes = 0;
            let mut scanned = 0;
            for (bpos, _) in chunk.match_indices(q) {
                runes += chunk[scanned..bpos].chars().count();
                scanned = bpos;
                let (start, end) = match (
                    self.translate(ci, runes),
                    self.translate(ci, runes + qrunes),
                ) {
                    (Some(s), Some(e)) => (s, e),
                    _ => continue,
                };
                hits.push(Hit { start, end });
            }
        }
        hits
    }

    /// The rune ranges of `hits` that fall on one output line, clamped to
    /// the line's length.
    pub fn ranges_on(&self, hits: &[Hit], line: usize) -> Vec<(usize, usize)> {
        let total: usize = self.lines[line].iter().map(|s| s.text.chars().count()).sum();
        let mut out = Vec::new();
        for h in hits {
            if line < h.start.0 || line > h.end.0 {
                continue;
            }
            let s = if h.start.0 == line { h.start.1.min(total) } else { 0 };
            let e = if h.end.0 == line { h.end.1.min(total) } else { total };
            if s < e {
                out.push((s, e));
            }
        }
        out
    }

    /// The set of output lines touched by any of `hits`.
    pub fn match_lines(&self, hits: &[Hit]) -> Vec<usize> {
        (0..self.rows())
            .filter(|&l| !self.ranges_on(hits, l).is_empty())
            .collect()
    }

    fn push_line(&mut self) {
        self.lines.push(Vec::new());
        self.line_runes = 0;
    }

    fn put_str(&mut self, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        self.line_runes += text.chars().count();
        let line = self.lines.last_mut().expect("wrapped output has no open line");
        match line.last_mut() {
            Some(span) if span.style == style => span.text.push_str(text),
            _ => line.push(Span { text: text.to_string(), style }),
        }
    }

    fn record(&mut self, c: char) -> usize {
        let off = self.chunk_runes;
        self.raw.last_mut().expect("wrapped output has no open chunk").push(c);
        self.chunk_runes += 1;
        off
    }

    fn anchor(&mut self, off: usize, col: usize) {
        let chunk = self.raw.len() - 1;
        let line = self.lines.len() - 1;
        self.anchors.insert((chunk, off), (line, col));
    }
}

fn is_ctrl(c: char) -> bool {
    matches!(c as u32, 0..=8 | 11..=31 | 127)
}

/// Recursive layout pass. `col` is the current column in cells; returns the
/// column after this subtree. `record` is false inside `Skip` subtrees.
fn lay(out: &mut Wrapped, fmt: &Fmt, col: usize, style: Style, record: bool) -> usize {
    match fmt {
        Fmt::Text(value) => lay_text(out, value, col, style, record),
        Fmt::Seq(children) => {
            let mut col = col;
            for child in children {
                col = lay(out, child, col, style, record);
            }
            col
        }
        Fmt::Painted(paint, child) => lay(out, child, col, style.with(*paint), record),
        Fmt::NoBreak(child) => lay_nobreak(out, child, col, style, record),
        Fmt::Skip(child) => {
            if !out.raw.last().map_or(true, |c| c.is_empty()) {
                out.raw.push(String::new());
                out.chunk_runes = 0;
            }
            lay(out, child, col, style, false)
        }
    }
}

fn lay_text(out: &mut Wrapped, value: &str, startcol: usize, style: Style, record: bool) -> usize {
    let width = out.width;
    let mut col = startcol;
    let mut pending_anchor = true;
    for c in value.chars() {
        match c {
            '\n' => {
                // Trailing space keeps the break visible to highlighting.
                out.put_str(" ", style);
                out.push_line();
                col = 0;
                pending_anchor = true;
                if record {
                    out.record('\n');
                }
            }
            '\t' => {
                if width > 0 && col + TAB_WIDTH >= width {
                    out.push_line();
                    col = 0;
                }
                let eff = if width == 0 || width > TAB_WIDTH { TAB_WIDTH } else { width };
                let before = out.line_runes;
                out.put_str(&" ".repeat(eff), style);
                if record {
                    let off = out.record('\t');
                    out.anchor(off, before);
                    out.anchor(off + 1, out.line_runes);
                }
                col += TAB_WIDTH;
                pending_anchor = false;
            }
            c if is_ctrl(c) => {
                if width > 0 && col + 2 > width {
                    out.push_line();
                    col = 0;
                }
                let shown = char::from_u32((c as u32 + 64) % 128).unwrap_or('?');
                let before = out.line_runes;
                out.put_str(&format!("^{}", shown), style.with(Paint::Fg(style::KEYWORD)));
                if record {
                    let off = out.record(c);
                    out.anchor(off, before);
                    out.anchor(off + 1, out.line_runes);
                }
                col += 2;
                pending_anchor = false;
            }
            c => {
                let cw = c.width().unwrap_or(0);
                if width > 0 && col + cw > width {
                    out.push_line();
                    col = 0;
                    pending_anchor = true;
                }
                let before = out.line_runes;
                out.put_str(&c.to_string(), style);
                col += cw;
                if record {
                    let off = out.record(c);
                    if pending_anchor && col > 0 {
                        out.anchor(off, before);
                        pending_anchor = false;
                    }
                }
            }
        }
    }
    col
}

fn lay_nobreak(out: &mut Wrapped, child: &Fmt, col: usize, style: Style, record: bool) -> usize {
    let mut sub = Wrapped::new(0);
    let sublen = lay(&mut sub, child, 0, style, record);
    if sub.lines.len() != 1 {
        // A hard newline inside a no-break run: degrade to normal layout.
        return lay(out, child, col, style, record);
    }
    let chunk_base = out.raw.len() - 1;
    let off_base = out.chunk_runes;

    let fits = out.width == 0 || sublen <= out.width.saturating_sub(col);
    let (line_base, col_base, endcol) = if fits {
        (out.lines.len() - 1, out.line_runes, col + sublen)
    } else {
        out.push_line();
        (out.lines.len() - 1, 0, sublen.min(out.width))
    };

    for ((c, o), (l, k)) in sub.anchors {
        let key = (c + chunk_base, if c == 0 { o + off_base } else { o });
        let val = (l + line_base, if l == 0 { k + col_base } else { k });
        out.anchors.insert(key, val);
    }

    let mut chunks = sub.raw.into_iter();
    if let Some(first) = chunks.next() {
        out.chunk_runes += first.chars().count();
        out.raw.last_mut().expect("wrapped output has no open chunk").push_str(&first);
    }
    for chunk in chunks {
        out.chunk_runes = chunk.chars().count();
        out.raw.push(chunk);
    }

    let mut spans = sub.lines.into_iter().next().unwrap_or_default();
    if !fits && out.width > 0 && sublen > out.width {
        clip_spans(&mut spans, out.width);
    }
    for span in spans {
        out.put_str(&span.text, span.style);
    }
    endcol
}

/// Truncates a span run to at most `width` display cells.
fn clip_spans(spans: &mut Vec<Span>, width: usize) {
    let mut used = 0;
    for idx in 0..spans.len() {
        let mut cut = None;
        for (i, c) in spans[idx].text.char_indices() {
            let cw = c.width().unwrap_or(0);
            if used + cw > width {
                cut = Some(i);
                break;
            }
            used += cw;
        }
        if let Some(i) = cut {
            spans[idx].text.truncate(i);
            let keep = if spans[idx].text.is_empty() { idx } else { idx + 1 };
            spans.truncate(keep);
            return;
        }
    }
}

/// Splits spans at highlight boundaries, painting the given background over
/// the ranges (rune offsets into the line).
pub fn overlay(spans: &[Span], ranges: &[(usize, usize)], bg: Color) -> Vec<Span> {
    if ranges.is_empty() {
        return spans.to_vec();
    }
    let mut out: Vec<Span> = Vec::new();
    let mut pos = 0;
    for span in spans {
        let len = span.text.chars().count();
        let mut cuts = vec![0, len];
        for &(s, e) in ranges {
            if s > pos && s < pos + len {
                cuts.push(s - pos);
            }
            if e > pos && e < pos + len {
                cuts.push(e - pos);
            }
        }
        cuts.sort_unstable();
        cuts.dedup();
        for w in cuts.windows(2) {
            let (a, b) = (w[0], w[1]);
            let abs = pos + a;
            let lit = ranges.iter().any(|&(s, e)| abs >= s && abs < e);
            let text: String = span.text.chars().skip(a).take(b - a).collect();
            let style = if lit { span.style.with(Paint::Bg(bg)) } else { span.style };
            match out.last_mut() {
                Some(prev) if prev.style == style => prev.text.push_str(&text),
                _ => out.push(Span { text, style }),
            }
        }
        pos += len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{KEY, KEYWORD, MUTED, STRING};
    use unicode_width::UnicodeWidthStr;

    fn widths(w: &Wrapped) -> Vec<usize> {
        (0..w.rows()).map(|i| w.plain_line(i).width()).collect()
    }

    #[test]
    fn plain_text_single_line() {
        let w = text("hello").wrap(20);
        assert_eq!(w.rows(), 1);
        assert_eq!(w.plain_line(0), "hello");
        assert_eq!(w.raw_chunks(), &["hello".to_string()]);
    }

    #[test]
    fn soft_wrap_keeps_lines_within_width() {
        let w = text("abcdefghij").wrap(4);
        assert_eq!(w.rows(), 3);
        assert_eq!(w.plain_line(0), "abcd");
        assert_eq!(w.plain_line(1), "efgh");
        assert_eq!(w.plain_line(2), "ij");
        assert!(widths(&w).iter().all(|&x| x <= 4));
        // Soft wraps do not split the raw chunk.
        assert_eq!(w.raw_chunks(), &["abcdefghij".to_string()]);
    }

    #[test]
    fn wide_runes_wrap_early() {
        // Each CJK rune is two cells; three fit in width 7, the rest wrap.
        let w = text("你好世界").wrap(7);
        assert_eq!(w.plain_line(0), "你好世");
        assert_eq!(w.plain_line(1), "界");
        assert!(widths(&w).iter().all(|&x| x <= 7));
    }

    #[test]
    fn hard_newline_breaks_line_and_keeps_raw() {
        let w = text("ab\ncd").wrap(10);
        assert_eq!(w.rows(), 2);
        assert_eq!(w.plain_line(0), "ab ");
        assert_eq!(w.plain_line(1), "cd");
        assert_eq!(w.raw_chunks(), &["ab\ncd".to_string()]);
    }

    #[test]
    fn tab_expands_and_wraps_at_boundary() {
        let w = text("hello\tworld").wrap(9);
        assert_eq!(w.plain_line(0), "hello");
        assert_eq!(w.plain_line(1), "    world");
        assert!(widths(&w).iter().all(|&x| x <= 9));
    }

    #[test]
    fn tab_in_place_when_it_fits() {
        let w = text("ab\tcd").wrap(20);
        assert_eq!(w.rows(), 1);
        assert_eq!(w.plain_line(0), "ab    cd");
    }

    #[test]
    fn control_rune_renders_as_caret_pair() {
        let w = text("a\u{1}b").wrap(20);
        assert_eq!(w.plain_line(0), "a^Ab");
        let ctrl = &w.line(0)[1];
        assert_eq!(ctrl.text, "^A");
        assert_eq!(ctrl.style.fg, Some(KEYWORD));
    }

    #[test]
    fn del_renders_as_caret_question() {
        let w = text("\u{7f}").wrap(20);
        assert_eq!(w.plain_line(0), "^?");
    }

    #[test]
    fn paint_nests_by_slot() {
        let f = fg(MUTED, seq(vec![text("a"), fg(KEY, text("b")), text("c")]));
        let w = f.wrap(20);
        let spans = w.line(0);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].style.fg, Some(MUTED));
        assert_eq!(spans[1].style.fg, Some(KEY));
        assert_eq!(spans[2].style.fg, Some(MUTED));
    }

    #[test]
    fn background_paint_fills_its_slot() {
        let f = bg(style::SELECT_BG, fg(STRING, text("x")));
        let w = f.wrap(10);
        let span = &w.line(0)[0];
        assert_eq!(span.style.bg, Some(style::SELECT_BG));
        assert_eq!(span.style.fg, Some(STRING));
    }

    #[test]
    fn skip_is_visible_but_unsearchable() {
        let f = seq(vec![text("key"), skip(text(": ")), text("value")]);
        let w = f.wrap(40);
        assert_eq!(w.plain_line(0), "key: value");
        // The skip opens a fresh chunk; its own text is absent.
        assert_eq!(w.raw_chunks(), &["key".to_string(), "value".to_string()]);
        assert!(w.search(": ").is_empty());
        assert_eq!(w.search("value").len(), 1);
    }

    #[test]
    fn contains_respects_skip() {
        let f = seq(vec![text("key"), skip(text("hidden"))]);
        assert!(f.contains("key"));
        assert!(!f.contains("hidden"));
    }

    #[test]
    fn search_finds_every_occurrence_in_order() {
        let w = text("abcabcabc").wrap(4);
        let hits = w.search("ab");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].start, (0, 0));
        assert_eq!(hits[0].end, (0, 2));
        // Second occurrence straddles the soft wrap after "abca".
        assert_eq!(hits[1].start, (0, 3));
        assert_eq!(hits[1].end, (1, 1));
        assert_eq!(hits[2].start, (1, 2));
        assert_eq!(hits[2].end, (2, 0));
        // Ranges are disjoint and ordered.
        for pair in hits.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn translate_recovers_every_recorded_rune() {
        let f = seq(vec![text("ab\tc你d\ne"), skip(text("xx")), text("fg")]);
        let w = f.wrap(6);
        for (ci, chunk) in w.raw_chunks().iter().enumerate() {
            for (off, c) in chunk.chars().enumerate() {
                if c == '\n' {
                    continue;
                }
                let (line, col) = w.translate(ci, off).expect("raw rune has no mapping");
                let shown: Vec<char> = w.plain_line(line).chars().collect();
                if c == '\t' {
                    assert_eq!(shown[col], ' ');
                } else {
                    assert_eq!(shown[col], c, "chunk {} offset {}", ci, off);
                }
            }
        }
    }

    #[test]
    fn search_across_hard_newline() {
        let w = text("one\ntwo").wrap(20);
        let hits = w.search("e\nt");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].start, (0, 2));
        assert_eq!(hits[0].end, (1, 1));
        // Per-line ranges cover the tail of line 0 and the head of line 1.
        assert_eq!(w.ranges_on(&hits, 0), vec![(2, 4)]);
        assert_eq!(w.ranges_on(&hits, 1), vec![(0, 1)]);
    }

    #[test]
    fn nobreak_fits_in_place() {
        let f = seq(vec![text("ab"), nobreak(text("cd"))]);
        let w = f.wrap(10);
        assert_eq!(w.rows(), 1);
        assert_eq!(w.plain_line(0), "abcd");
    }

    #[test]
    fn nobreak_moves_to_fresh_line_when_tight() {
        let f = seq(vec![text("abcd"), nobreak(text("efg"))]);
        let w = f.wrap(6);
        assert_eq!(w.rows(), 2);
        assert_eq!(w.plain_line(0), "abcd");
        assert_eq!(w.plain_line(1), "efg");
    }

    #[test]
    fn nobreak_wider_than_width_is_clipped() {
        let f = seq(vec![text("x"), nobreak(text("abcdefgh"))]);
        let w = f.wrap(5);
        assert_eq!(w.plain_line(0), "x");
        assert_eq!(w.plain_line(1), "abcde");
        // The raw text keeps the full run.
        assert_eq!(w.raw_chunks(), &["xabcdefgh".to_string()]);
    }

    #[test]
    fn nobreak_search_positions_survive_the_merge() {
        let f = seq(vec![text("abcd"), nobreak(fg(STRING, text("efg")))]);
        let w = f.wrap(6);
        let hits = w.search("efg");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].start, (1, 0));
        let hits = w.search("cd");
        assert_eq!(hits[0].start, (0, 2));
    }

    #[test]
    fn search_reports_rune_columns_after_wide_runes() {
        let w = text("你x").wrap(20);
        let hits = w.search("x");
        // Column is a rune index, not a cell offset.
        assert_eq!(hits[0].start, (0, 1));
    }

    #[test]
    fn match_lines_lists_touched_rows() {
        let w = text("abcabc").wrap(3);
        let hits = w.search("cab");
        assert_eq!(w.match_lines(&hits), vec![0, 1]);
    }

    #[test]
    fn overlay_splits_spans_at_range_edges() {
        let spans = vec![Span { text: "hello world".to_string(), style: Style::default() }];
        let out = overlay(&spans, &[(6, 11)], style::MATCH_BG);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "hello ");
        assert_eq!(out[0].style.bg, None);
        assert_eq!(out[1].text, "world");
        assert_eq!(out[1].style.bg, Some(style::MATCH_BG));
    }

    #[test]
    fn overlay_spanning_multiple_spans() {
        let spans = vec![
            Span { text: "ab".to_string(), style: Style::default() },
            Span { text: "cd".to_string(), style: Style { fg: Some(KEY), bg: None } },
        ];
        let out = overlay(&spans, &[(1, 3)], style::MATCH_BG);
        let lit: String = out
            .iter()
            .filter(|s| s.style.bg == Some(style::MATCH_BG))
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(lit, "bc");
    }

    #[test]
    fn empty_format_still_has_one_row() {
        let w = seq(vec![]).wrap(10);
        assert_eq!(w.rows(), 1);
        assert_eq!(w.plain_line(0), "");
        assert!(w.search("x").is_empty());
    }
}
