//! The viewport controller and interactive loop.
//!
//! The controller tracks which row of which node sits at the top of the
//! screen (`start`), the selected node, and the screen row of the
//! selection's anchor (`offset`): the selection's last row while `down` is
//! set, its first row otherwise. Every operation repaints the smallest
//! region it can — scrolls shift already-drawn rows with delete/insert-line
//! sequences and repaint only what they expose, plus the old and new
//! selection rows.

use std::collections::HashMap;
use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

use super::node::{NodeId, Tree};
use super::pos::RowPos;
use crate::keymap::{self, Keymap, Lookup};
use crate::layout::{self, Span};
use crate::prompt;
use crate::style::{self, Palette};
use crate::term::{self, DeleteLines, InsertLines};

/// Minimum workable canvas, below which painting is suspended.
const MIN_WIDTH: usize = 24;
/// Rows scrolled per mouse-wheel notch.
const WHEEL_LINES: isize = 4;
/// Window for the second click of a double-click.
const DOUBLE_CLICK: Duration = Duration::from_secs(1);
/// Digits accepted into the count buffer.
const NUM_DIGITS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    Redraw,
    Next,
    Prev,
    NextSib,
    PrevSib,
    Parent,
    First,
    Last,
    Top,
    Middle,
    Bottom,
    LineFwd,
    LineBack,
    PageFwd,
    PageBack,
    HalfFwd,
    HalfBack,
    Center,
    Toggle,
    Expand,
    Collapse,
    ExpandAll,
    SearchFwd,
    SearchBack,
    MatchNext,
    MatchPrev,
    ClearQuery,
    Digit(u8),
}

pub struct Browser {
    tree: Tree,
    sel: NodeId,
    start: RowPos,
    /// Screen row of the selection anchor.
    offset: isize,
    /// Anchor on the last row of the selection instead of the first.
    down: bool,
    width: usize,
    height: usize,
    query: Option<String>,
    history: Vec<String>,
    search_fwd: bool,
    last_click: Instant,
    numbuf: String,
    /// Absolute document row currently at the top of the screen.
    lineno: usize,
    palette: Palette,
}

impl Browser {
    /// `rows` is the full terminal height; one row is reserved for the
    /// status line.
    pub fn new(tree: Tree, width: usize, rows: usize, palette: Palette) -> Self {
        let sel = tree.first_visible();
        let start = RowPos::at(tree.root());
        Browser {
            sel,
            start,
            offset: 0,
            down: false,
            width,
            height: rows.saturating_sub(1),
            query: None,
            history: Vec::new(),
            search_fwd: true,
            last_click: Instant::now()
                .checked_sub(Duration::from_secs(60))
                .unwrap_or_else(Instant::now),
            numbuf: String::new(),
            lineno: 0,
            palette,
            tree,
        }
    }

    fn size_ok(&self) -> bool {
        self.width >= MIN_WIDTH && self.height >= 1
    }

    // ------------------------------------------------------------------
    // Painting
    // ------------------------------------------------------------------

    fn paint_spans<W: Write>(&self, out: &mut W, spans: &[Span], base_bg: Option<style::Color>) -> Result<()> {
        for span in spans {
            write!(
                out,
                "{}{}{}",
                self.palette.fg(Some(span.style.fg.unwrap_or(style::REGULAR))),
                self.palette.bg(span.style.bg.or(base_bg)),
                span.text
            )?;
        }
        Ok(())
    }

    fn draw_row<W: Write>(&mut self, out: &mut W, row: usize, pos: RowPos) -> Result<()> {
        queue!(out, MoveTo(0, row as u16), Clear(ClearType::UntilNewLine))?;
        let Some(node) = pos.node else { return Ok(()) };
        self.tree.ensure_search(node, self.query.as_deref());
        let selected = node == self.sel;

        write!(
            out,
            "{}{}",
            self.palette.fg(Some(style::MUTED)),
            self.tree.prefix(node, pos.line == 0)
        )?;

        let wrapped = self.tree.displayed(node);
        let mut spans = wrapped.line(pos.line).to_vec();
        if let Some(hits) = self.tree.hits(node) {
            let ranges = wrapped.ranges_on(hits, pos.line);
            spans = layout::overlay(&spans, &ranges, style::MATCH_BG);
        }
        let base_bg = if selected { Some(style::SELECT_BG) } else { None };
        self.paint_spans(out, &spans, base_bg)?;
        if selected {
            write!(out, "{}", self.palette.bg(Some(style::SELECT_BG)))?;
            queue!(out, Clear(ClearType::UntilNewLine))?;
        }
        write!(out, "{}{}", self.palette.fg(None), self.palette.bg(None))?;
        Ok(())
    }

    fn draw_rows<W: Write>(&mut self, out: &mut W, first: usize, last: usize) -> Result<()> {
        if !self.size_ok() {
            return Ok(());
        }
        let mut cur = self.start.ahead(&self.tree, first, false);
        for row in first..last.min(self.height) {
            self.draw_row(out, row, cur)?;
            cur = cur.ahead(&self.tree, 1, false);
        }
        Ok(())
    }

    fn status_line<W: Write>(&self, out: &mut W) -> Result<()> {
        if !self.size_ok() {
            return Ok(());
        }
        let row = self.height as u16;
        queue!(out, MoveTo(0, row), Clear(ClearType::UntilNewLine))?;
        write!(out, "{}{}", self.palette.fg(Some(style::MUTED)), self.lineno + 1)?;
        if !self.numbuf.is_empty() {
            queue!(out, MoveTo((self.width - 8) as u16, row))?;
            write!(out, "{}", self.numbuf)?;
        }
        write!(out, "{}", self.palette.fg(None))?;
        Ok(())
    }

    fn redraw_all<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if !self.size_ok() {
            queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
            write!(out, "Terminal too small!")?;
            return Ok(());
        }
        queue!(out, Clear(ClearType::All))?;
        self.draw_rows(out, 0, self.height)?;
        self.status_line(out)
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Screen rows the selection currently covers, clamped to the canvas.
    fn sel_rows(&self) -> (usize, usize) {
        let h = self.height as isize;
        let lines = self.tree.height(self.sel) as isize;
        let (a, b) = if self.down {
            (self.offset - lines + 1, self.offset + 1)
        } else {
            (self.offset, self.offset + lines)
        };
        (a.clamp(0, h) as usize, b.clamp(0, h) as usize)
    }

    /// Moves the top of the screen by `by` rows and returns the distance
    /// actually travelled. The selection is dragged along screen edges,
    /// bouncing its anchor (`down`) before stepping node to node.
    fn scroll<W: Write>(&mut self, out: &mut W, by: isize) -> Result<isize> {
        if !self.size_ok() || by == 0 {
            return Ok(0);
        }
        let oldsel = self.sel;
        let newstart = self.start.shift(&self.tree, by, true);
        let diff = if by > 0 {
            self.start
                .distance_to(&self.tree, newstart)
                .expect("forward scroll target precedes start") as isize
        } else {
            -(newstart
                .distance_to(&self.tree, self.start)
                .expect("backward scroll target follows start") as isize)
        };
        let dist = diff.unsigned_abs();
        self.start = newstart;
        self.offset -= diff;
        self.lineno = (self.lineno as isize + diff).max(0) as usize;

        if by > 0 {
            while self.offset < 0 {
                if !self.down {
                    self.offset += self.tree.height(self.sel) as isize - 1;
                    self.down = true;
                } else {
                    let Some(next) = self.tree.next(self.sel) else { break };
                    self.sel = next;
                    self.offset += self.tree.height(next) as isize;
                }
            }
        } else {
            while self.offset >= self.height as isize {
                if self.down {
                    self.offset -= self.tree.height(self.sel) as isize - 1;
                    self.down = false;
                } else {
                    let Some(prev) = self.tree.prev(self.sel) else { break };
                    if self.tree.height(prev) == 0 {
                        break;
                    }
                    self.sel = prev;
                    self.offset -= self.tree.height(prev) as isize;
                }
            }
        }

        if dist >= self.height {
            self.draw_rows(out, 0, self.height)?;
        } else if diff != 0 {
            if diff > 0 {
                queue!(out, MoveTo(0, 0), DeleteLines(dist as u16))?;
                self.draw_rows(out, self.height - dist, self.height)?;
            } else {
                queue!(out, MoveTo(0, 0), InsertLines(dist as u16))?;
                self.draw_rows(out, 0, dist)?;
            }
            if self.sel != oldsel {
                let (lo, hi) = self.sel_rows();
                if lo < hi {
                    self.draw_rows(out, lo, hi)?;
                }
            }
        }
        self.status_line(out)?;
        Ok(diff)
    }

    /// Moves the selection, scrolling it into view by the minimal amount,
    /// and repaints the old and new selection rows.
    fn select<W: Write>(&mut self, out: &mut W, target: NodeId) -> Result<isize> {
        if !self.size_ok() {
            return Ok(0);
        }
        let oldsel = self.sel;
        let same = oldsel == target;
        let down = self.tree.precedes(oldsel, target);
        let oldrows = self.sel_rows();
        let curline = if self.down {
            self.tree.height(oldsel).saturating_sub(1)
        } else {
            0
        };
        if down {
            let anchor = RowPos::new(target, self.tree.height(target).saturating_sub(1));
            self.offset += RowPos::new(oldsel, curline)
                .distance_to(&self.tree, anchor)
                .expect("selection target does not follow current") as isize;
        } else {
            self.offset -= RowPos::at(target)
                .distance_to(&self.tree, RowPos::new(oldsel, curline))
                .expect("selection target does not precede current") as isize;
        }
        self.down = down;
        self.sel = target;

        let h = self.height as isize;
        let scrolldist = if self.offset < 0 {
            let by = self.offset;
            self.scroll(out, by)?
        } else if self.offset >= h {
            let by = self.offset - h + 1;
            self.scroll(out, by)?
        } else {
            self.status_line(out)?;
            0
        };

        if !same {
            let lo = (oldrows.0 as isize - scrolldist).max(0);
            let hi = (oldrows.1 as isize - scrolldist).min(h);
            if lo < hi {
                self.draw_rows(out, lo as usize, hi as usize)?;
            }
            if scrolldist.unsigned_abs() < self.height {
                let (mut lo, mut hi) = self.sel_rows();
                if scrolldist > 0 {
                    let edge = self.height - scrolldist as usize;
                    lo = lo.min(edge);
                    hi = hi.min(edge);
                } else if scrolldist < 0 {
                    let edge = scrolldist.unsigned_abs();
                    lo = lo.max(edge);
                    hi = hi.max(edge);
                }
                if lo < hi {
                    self.draw_rows(out, lo, hi)?;
                }
            }
        }
        Ok(scrolldist)
    }

    fn selpos<W: Write>(&mut self, out: &mut W, row: usize) -> Result<()> {
        let target = self.start.ahead(&self.tree, row, true);
        if let Some(node) = target.node {
            if self.tree.height(node) > 0 {
                self.select(out, node)?;
            }
        }
        Ok(())
    }

    /// Runs `op` on the selection (expansion changes only) and repaints the
    /// affected region: everything from the selection's first row to the
    /// document end or the bottom of the screen.
    fn adjust_after<W: Write>(
        &mut self,
        out: &mut W,
        op: impl FnOnce(&mut Tree, NodeId, usize),
    ) -> Result<()> {
        let sel = self.sel;
        let start_in_subtree = self.tree.expanded(sel)
            && self.start.node.map_or(false, |s| self.tree.is_ancestor(sel, s));
        let lines_before = self.tree.height(sel) as isize;
        let mut span = 0;
        if self.tree.expanded(sel) {
            span = RowPos::at(sel)
                .distance_to(&self.tree, RowPos::NIL)
                .expect("document end unreachable");
        }
        op(&mut self.tree, sel, self.width);
        let lines_after = self.tree.height(sel) as isize;
        if self.tree.expanded(sel) {
            span = span.max(
                RowPos::at(sel)
                    .distance_to(&self.tree, RowPos::NIL)
                    .expect("document end unreachable"),
            );
        }
        if start_in_subtree {
            // The row under the top of the screen was just freed; restart
            // the viewport at the selection.
            self.start = RowPos::at(sel);
            self.offset = 0;
            self.down = false;
            self.lineno = RowPos::at(self.tree.root())
                .distance_to(&self.tree, self.start)
                .unwrap_or(0);
            return self.redraw_all(out);
        }
        if self.down {
            self.offset += lines_after - lines_before;
        }
        let first = if self.down {
            self.offset - lines_after + 1
        } else {
            self.offset
        };
        let lo = first.max(0);
        let hi = (first + span as isize).min(self.height as isize);
        if lo < hi {
            self.draw_rows(out, lo as usize, hi as usize)?;
        }
        Ok(())
    }

    fn toggle_sel<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.adjust_after(out, |tree, sel, width| tree.toggle(sel, width))
    }

    fn expand_all_sel<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.adjust_after(out, |tree, sel, width| tree.expand_all(sel, width))
    }

    /// Re-queries the size, reflows every visible node, clamps the
    /// selection back onto the screen, and repaints everything.
    fn resize<W: Write>(&mut self, out: &mut W, cols: usize, rows: usize) -> Result<()> {
        self.width = cols;
        self.height = rows.saturating_sub(1);
        if !self.size_ok() {
            return self.redraw_all(out);
        }
        self.tree.reformat_all(self.width);
        let anchor = self.start;
        if let Some(node) = anchor.node {
            self.start = RowPos::at(node).ahead(&self.tree, anchor.line, true);
        }
        let curline = if self.down {
            self.tree.height(self.sel).saturating_sub(1)
        } else {
            0
        };
        let sel_anchor = RowPos::new(self.sel, curline);
        // A wider screen can unwrap the start node beneath the selection.
        self.offset = match self.start.distance_to(&self.tree, sel_anchor) {
            Some(d) => d as isize,
            None => {
                -(sel_anchor
                    .distance_to(&self.tree, self.start)
                    .expect("selection unreachable from start") as isize)
            }
        };
        self.lineno = RowPos::at(self.tree.root())
            .distance_to(&self.tree, self.start)
            .unwrap_or(0);
        let sel = self.sel;
        self.select(out, sel)?;
        self.redraw_all(out)
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Swaps the active query and repaints exactly the on-screen rows whose
    /// match set changed.
    fn set_query<W: Write>(&mut self, out: &mut W, query: Option<&str>) -> Result<()> {
        fn collect(tree: &Tree, node: NodeId, base: isize, height: isize, stale: &mut HashMap<usize, RowPos>) {
            for m in tree.match_lines(node) {
                let row = base + m as isize;
                if row >= 0 && row < height {
                    stale.insert(row as usize, RowPos::new(node, m));
                }
            }
        }
        self.query = query.map(String::from);
        let h = self.height as isize;
        let mut stale: HashMap<usize, RowPos> = HashMap::new();
        let mut cur = self.start.node;
        let mut base = -(self.start.line as isize);
        while let Some(node) = cur {
            if base >= h {
                break;
            }
            collect(&self.tree, node, base, h, &mut stale);
            self.tree.ensure_search(node, self.query.as_deref());
            collect(&self.tree, node, base, h, &mut stale);
            base += self.tree.height(node) as isize;
            cur = self.tree.next(node);
        }
        for (row, pos) in stale {
            self.draw_row(out, row, pos)?;
        }
        Ok(())
    }

    /// Jumps to the `count`-th match in the search direction, expanding
    /// collapsed ancestors along the way and compensating `offset`/`lineno`
    /// so unaffected rows keep their place.
    fn search_next<W: Write>(&mut self, out: &mut W, count: isize) -> Result<()> {
        let Some(query) = self.query.clone() else { return Ok(()) };
        if count == 0 || !self.size_ok() {
            return Ok(());
        }
        let forward = (count > 0) == self.search_fwd;
        let mut target = self.tree.doc_id(self.sel);
        for _ in 0..count.unsigned_abs() {
            match self.tree.doc().search_step(target, &query, forward) {
                Some(next) => target = next,
                None => break,
            }
        }
        let path = self.tree.doc().path(target);
        let mut node = self.tree.root();
        let mut firstline: Option<isize> = None;
        for &idx in &path {
            if self.tree.expandable(node) && !self.tree.expanded(node) {
                let succ = match self.tree.next_sib(node) {
                    Some(s) => RowPos::at(s),
                    None => RowPos::NIL,
                };
                if firstline.is_none() {
                    firstline = self
                        .start
                        .distance_to(&self.tree, succ)
                        .map(|d| d as isize - 1);
                }
                let before = RowPos::at(node)
                    .distance_to(&self.tree, succ)
                    .expect("successor does not follow node") as isize;
                self.tree.expand(node, self.width);
                let after = RowPos::at(node)
                    .distance_to(&self.tree, succ)
                    .expect("successor does not follow node") as isize;
                let added = after - before;
                if self.tree.precedes(node, self.sel) {
                    let above_start = self
                        .start
                        .node
                        .map_or(false, |s| node != s && self.tree.precedes(node, s));
                    if above_start {
                        self.lineno = (self.lineno as isize + added).max(0) as usize;
                    } else {
                        self.offset += added;
                    }
                }
            }
            node = self.tree.child(node, idx);
        }
        // Expansion may have re-rendered the start node; keep its line valid.
        if let Some(s) = self.start.node {
            let h = self.tree.height(s);
            if h > 0 && self.start.line >= h {
                self.start.line = h - 1;
            }
        }
        let lastline = self
            .start
            .distance_to(&self.tree, RowPos::NIL)
            .map_or(self.height, |d| d.min(self.height)) as isize;
        let scrolldist = self.select(out, node)?;
        if let Some(first) = firstline {
            if scrolldist.unsigned_abs() < self.height {
                let lo = (first - scrolldist).max(0);
                let hi = (lastline - scrolldist).min(self.height as isize);
                if lo < hi {
                    self.draw_rows(out, lo as usize, hi as usize)?;
                }
            }
        }
        self.status_line(out)
    }

    /// Prompts for a query with live highlighting. ESC or an empty entry
    /// restores the previous query and leaves the viewport untouched.
    fn search<W: Write>(&mut self, out: &mut W, forward: bool) -> Result<()> {
        if !self.size_ok() {
            return Ok(());
        }
        let oldquery = self.query.clone();
        self.set_query(out, None)?;
        let label = if forward { "/" } else { "?" };
        let at = (0u16, self.height as u16);
        let field = self.width.saturating_sub(20);
        let history = self.history.clone();
        let entered = prompt::read_line(self, out, at, field, label, history, |me, q, o| {
            let q = if q.is_empty() { None } else { Some(q) };
            me.set_query(o, q)
        })?;
        match entered {
            Some(q) if !q.is_empty() => {
                self.history.push(q.clone());
                self.search_fwd = forward;
                self.tree.ensure_search(self.sel, Some(q.as_str()));
                if !self.tree.has_matches(self.sel) {
                    self.search_next(out, 1)?;
                }
            }
            _ => self.set_query(out, oldquery.as_deref())?,
        }
        self.status_line(out)
    }

    // ------------------------------------------------------------------
    // Mouse and count prefix
    // ------------------------------------------------------------------

    fn click<W: Write>(&mut self, out: &mut W, row: usize) -> Result<()> {
        let now = Instant::now();
        let oldsel = self.sel;
        self.selpos(out, row)?;
        if oldsel == self.sel && now.duration_since(self.last_click) < DOUBLE_CLICK {
            self.toggle_sel(out)?;
            self.last_click = now
                .checked_sub(Duration::from_secs(60))
                .unwrap_or(now);
        } else {
            self.last_click = now;
        }
        Ok(())
    }

    fn mouse<W: Write>(&mut self, out: &mut W, ev: MouseEvent) -> Result<()> {
        match ev.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let row = ev.row as usize;
                if row < self.height {
                    self.click(out, row)?;
                }
            }
            MouseEventKind::ScrollUp => {
                self.scroll(out, -WHEEL_LINES)?;
            }
            MouseEventKind::ScrollDown => {
                self.scroll(out, WHEEL_LINES)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn push_num<W: Write>(&mut self, out: &mut W, digit: u8) -> Result<()> {
        let c = (b'0' + digit) as char;
        if c != '0' || !self.numbuf.is_empty() {
            while self.numbuf.len() >= NUM_DIGITS {
                self.numbuf.remove(0);
            }
            self.numbuf.push(c);
        }
        self.status_line(out)
    }

    fn clear_num<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.numbuf.clear();
        self.status_line(out)
    }

    fn count(&self) -> usize {
        self.numbuf.parse().unwrap_or(1)
    }

    /// Applies `step` to the selection `count` times, stopping at the ends
    /// and at the hidden root.
    fn seek(&self, step: impl Fn(&Tree, NodeId) -> Option<NodeId>) -> NodeId {
        let mut cur = self.sel;
        for _ in 0..self.count() {
            match step(&self.tree, cur) {
                Some(next) if self.tree.height(next) > 0 => cur = next,
                _ => break,
            }
        }
        cur
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn perform<W: Write>(&mut self, out: &mut W, action: Action) -> Result<bool> {
        match action {
            Action::Quit => return Ok(true),
            Action::Redraw => self.redraw_all(out)?,
            Action::Next => {
                let t = self.seek(|tree, n| tree.next(n));
                self.select(out, t)?;
            }
            Action::Prev => {
                let t = self.seek(|tree, n| tree.prev(n));
                self.select(out, t)?;
            }
            Action::NextSib => {
                let t = self.seek(|tree, n| tree.next_sib(n));
                self.select(out, t)?;
            }
            Action::PrevSib => {
                let t = self.seek(|tree, n| tree.prev_sib(n));
                self.select(out, t)?;
            }
            Action::Parent => {
                let t = self.seek(|tree, n| tree.parent(n));
                self.select(out, t)?;
            }
            Action::First => {
                let t = self.tree.first_visible();
                self.select(out, t)?;
            }
            Action::Last => {
                let t = self.tree.last_visible();
                self.select(out, t)?;
            }
            Action::Top => self.selpos(out, 0)?,
            Action::Middle => self.selpos(out, self.height / 2)?,
            Action::Bottom => self.selpos(out, self.height.saturating_sub(1))?,
            Action::LineFwd => {
                self.scroll(out, 1)?;
            }
            Action::LineBack => {
                self.scroll(out, -1)?;
            }
            Action::PageFwd => {
                let by = (self.count() * self.height) as isize;
                self.scroll(out, by)?;
            }
            Action::PageBack => {
                let by = (self.count() * self.height) as isize;
                self.scroll(out, -by)?;
            }
            Action::HalfFwd => {
                let by = (self.count() * self.height / 2) as isize;
                self.scroll(out, by)?;
            }
            Action::HalfBack => {
                let by = (self.count() * self.height / 2) as isize;
                self.scroll(out, -by)?;
            }
            Action::Center => {
                let first = if self.down {
                    self.offset - self.tree.height(self.sel) as isize + 1
                } else {
                    self.offset
                };
                let by = first - self.height as isize / 2;
                self.scroll(out, by)?;
            }
            Action::Toggle => self.toggle_sel(out)?,
            Action::Expand => {
                self.adjust_after(out, |tree, sel, width| tree.expand(sel, width))?;
            }
            Action::Collapse => {
                self.adjust_after(out, |tree, sel, _| tree.collapse(sel))?;
            }
            Action::ExpandAll => self.expand_all_sel(out)?,
            Action::SearchFwd => self.search(out, true)?,
            Action::SearchBack => self.search(out, false)?,
            Action::MatchNext => {
                let n = self.count() as isize;
                self.search_next(out, n)?;
            }
            Action::MatchPrev => {
                let n = -(self.count() as isize);
                self.search_next(out, n)?;
            }
            Action::ClearQuery => self.set_query(out, None)?,
            Action::Digit(d) => self.push_num(out, d)?,
        }
        Ok(false)
    }

    /// The interactive loop: polls events with a short timeout so the quit
    /// flag set by signals is observed promptly.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let keymap = default_keymap();
        self.redraw_all(out)?;
        out.flush()?;
        let mut pending = Vec::new();
        loop {
            if term::quit_requested() {
                return Ok(());
            }
            if !event::poll(Duration::from_millis(100))? {
                continue;
            }
            match event::read()? {
                Event::Resize(w, h) => {
                    pending.clear();
                    self.resize(out, w as usize, h as usize)?;
                }
                Event::Mouse(m) => {
                    pending.clear();
                    self.mouse(out, m)?;
                    self.clear_num(out)?;
                }
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    if let Some(chord) = keymap::normalize(key) {
                        pending.push(chord);
                        match keymap.lookup(&pending) {
                            Lookup::Pending => {}
                            Lookup::Unbound => pending.clear(),
                            Lookup::Bound(action) => {
                                pending.clear();
                                if self.perform(out, action)? {
                                    return Ok(());
                                }
                                if !matches!(action, Action::Digit(_)) {
                                    self.clear_num(out)?;
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
            out.flush()?;
        }
    }

    #[cfg(test)]
    fn visible_rows(&self) -> Vec<Option<(NodeId, usize)>> {
        (0..self.height)
            .map(|r| {
                let p = self.start.ahead(&self.tree, r, false);
                p.node.map(|n| (n, p.line))
            })
            .collect()
    }
}

fn default_keymap() -> Keymap<Action> {
    use crossterm::event::KeyCode::*;
    use crate::keymap::{chord, ctrl, key};
    let mut map = Keymap::new();
    map.bind(&[chord('q')], Action::Quit);
    map.bind(&[ctrl('c')], Action::Quit);
    map.bind(&[ctrl('l')], Action::Redraw);
    map.bind(&[chord('j')], Action::Next);
    map.bind(&[key(Down)], Action::Next);
    map.bind(&[chord('k')], Action::Prev);
    map.bind(&[key(Up)], Action::Prev);
    map.bind(&[chord('J')], Action::NextSib);
    map.bind(&[chord('K')], Action::PrevSib);
    map.bind(&[chord('p')], Action::Parent);
    map.bind(&[chord('g')], Action::First);
    map.bind(&[key(Home)], Action::First);
    map.bind(&[chord('G')], Action::Last);
    map.bind(&[key(End)], Action::Last);
    map.bind(&[chord('H')], Action::Top);
    map.bind(&[chord('M')], Action::Middle);
    map.bind(&[chord('L')], Action::Bottom);
    map.bind(&[ctrl('e')], Action::LineFwd);
    map.bind(&[ctrl('y')], Action::LineBack);
    map.bind(&[ctrl('f')], Action::PageFwd);
    map.bind(&[key(PageDown)], Action::PageFwd);
    map.bind(&[ctrl('b')], Action::PageBack);
    map.bind(&[key(PageUp)], Action::PageBack);
    map.bind(&[ctrl('d')], Action::HalfFwd);
    map.bind(&[ctrl('u')], Action::HalfBack);
    map.bind(&[chord('z'), chord('z')], Action::Center);
    map.bind(&[chord(' ')], Action::Toggle);
    map.bind(&[chord('w')], Action::ExpandAll);
    map.bind(&[key(Right)], Action::Expand);
    map.bind(&[key(Left)], Action::Collapse);
    map.bind(&[chord('/')], Action::SearchFwd);
    map.bind(&[chord('?')], Action::SearchBack);
    map.bind(&[chord('n')], Action::MatchNext);
    map.bind(&[chord('N')], Action::MatchPrev);
    map.bind(&[chord('c')], Action::ClearQuery);
    for d in 0..=9u8 {
        map.bind(&[chord((b'0' + d) as char)], Action::Digit(d));
    }
    map
}
