//! One-line modal input with history and a live callback.
//!
//! The editing state (buffer, cursor, horizontal window, history) lives in
//! a plain struct so it can be exercised without a terminal; `read_line`
//! wraps it in a thin draw/poll loop. Wide runes take their display width
//! and control runes take two cells (`^X`), matching the canvas renderer.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use unicode_width::UnicodeWidthChar;

use crate::style::{self, Palette};
use crate::term;

fn rune_cells(c: char) -> usize {
    if c.is_ascii_control() {
        2
    } else {
        c.width().unwrap_or(0)
    }
}

fn cells(runes: &[char]) -> usize {
    runes.iter().map(|&c| rune_cells(c)).sum()
}

/// Line-editor state, independent of any terminal.
#[derive(Debug)]
pub struct Editor {
    buf: Vec<char>,
    pos: usize,
    window: usize,
    history: Vec<String>,
    hist_idx: usize,
}

impl Editor {
    pub fn new(mut history: Vec<String>) -> Self {
        history.push(String::new());
        let hist_idx = history.len() - 1;
        Editor { buf: Vec::new(), pos: 0, window: 0, history, hist_idx }
    }

    pub fn text(&self) -> String {
        self.buf.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.pos
    }

    pub fn insert(&mut self, c: char) {
        self.buf.insert(self.pos, c);
        self.pos += 1;
    }

    pub fn backspace(&mut self) -> bool {
        if self.pos == 0 {
            return false;
        }
        self.pos -= 1;
        self.buf.remove(self.pos);
        true
    }

    pub fn delete(&mut self) -> bool {
        if self.pos >= self.buf.len() {
            return false;
        }
        self.buf.remove(self.pos);
        true
    }

    pub fn seek(&mut self, by: isize) {
        let pos = self.pos as isize + by;
        self.pos = pos.clamp(0, self.buf.len() as isize) as usize;
    }

    pub fn seek_start(&mut self) {
        self.pos = 0;
    }

    pub fn seek_end(&mut self) {
        self.pos = self.buf.len();
    }

    /// Moves through history, stashing the in-progress entry so it can be
    /// returned to. True when the buffer changed.
    pub fn hist_seek(&mut self, by: isize) -> bool {
        let idx = (self.hist_idx as isize + by).clamp(0, self.history.len() as isize - 1) as usize;
        if idx == self.hist_idx {
            return false;
        }
        self.history[self.hist_idx] = self.text();
        self.hist_idx = idx;
        self.buf = self.history[idx].chars().collect();
        self.pos = self.buf.len();
        self.window = 0;
        true
    }

    /// First visible rune index after sliding the window to keep the
    /// cursor inside `width` cells.
    pub fn visible_from(&mut self, width: usize) -> usize {
        if self.pos < self.window {
            self.window = self.pos;
        }
        while cells(&self.buf[self.window..self.pos]) >= width {
            self.window += 1;
        }
        self.window
    }

    /// The runes that fit in `width` cells from the window start, and the
    /// cursor's cell offset within them.
    pub fn view(&mut self, width: usize) -> (Vec<char>, usize) {
        let from = self.visible_from(width);
        let mut shown = Vec::new();
        let mut used = 0;
        for &c in &self.buf[from..] {
            let w = rune_cells(c);
            if used + w > width {
                break;
            }
            used += w;
            shown.push(c);
        }
        let cursor = cells(&self.buf[from..self.pos]);
        (shown, cursor)
    }
}

fn draw<W: Write>(
    out: &mut W,
    palette: &Palette,
    at: (u16, u16),
    width: usize,
    label: &str,
    ed: &mut Editor,
) -> Result<()> {
    let (shown, cursor) = ed.view(width);
    queue!(out, MoveTo(at.0, at.1), Clear(ClearType::UntilNewLine))?;
    write!(out, "{}{}", palette.fg(None), label)?;
    let mut used = 0;
    for c in shown {
        if c.is_ascii_control() {
            let caret = char::from_u32((c as u32 + 64) % 128).unwrap_or('?');
            write!(out, "{}^{}{}", palette.fg(Some(style::MUTED)), caret, palette.fg(None))?;
        } else {
            write!(out, "{}", c)?;
        }
        used += rune_cells(c);
    }
    write!(out, "{}", " ".repeat(width.saturating_sub(used)))?;
    let label_cells: usize = label.chars().map(|c| c.width().unwrap_or(0)).sum();
    queue!(out, MoveTo(at.0 + (label_cells + cursor) as u16, at.1))?;
    Ok(())
}

/// Reads one line at the given position. `on_change` runs after every edit
/// with the current text. Enter accepts, ESC cancels (returns `None`).
pub fn read_line<T, W: Write>(
    t: &mut T,
    out: &mut W,
    at: (u16, u16),
    width: usize,
    label: &str,
    history: Vec<String>,
    mut on_change: impl FnMut(&mut T, &str, &mut W) -> Result<()>,
) -> Result<Option<String>> {
    let palette = Palette::detect();
    let mut ed = Editor::new(history);
    queue!(out, Show)?;
    let entered = loop {
        draw(out, &palette, at, width, label, &mut ed)?;
        out.flush()?;
        if term::quit_requested() {
            break None;
        }
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else { continue };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match (key.code, ctrl) {
            (KeyCode::Enter, _) => break Some(ed.text()),
            (KeyCode::Esc, _) => break None,
            (KeyCode::Backspace, _) => {
                if ed.backspace() {
                    on_change(t, &ed.text(), out)?;
                }
            }
            (KeyCode::Delete, _) => {
                if ed.delete() {
                    on_change(t, &ed.text(), out)?;
                }
            }
            (KeyCode::Left, _) => ed.seek(-1),
            (KeyCode::Right, _) => ed.seek(1),
            (KeyCode::Home, _) | (KeyCode::Char('a'), true) => ed.seek_start(),
            (KeyCode::End, _) | (KeyCode::Char('e'), true) => ed.seek_end(),
            (KeyCode::Up, _) => {
                if ed.hist_seek(-1) {
                    on_change(t, &ed.text(), out)?;
                }
            }
            (KeyCode::Down, _) => {
                if ed.hist_seek(1) {
                    on_change(t, &ed.text(), out)?;
                }
            }
            (KeyCode::Char(c), false) => {
                ed.insert(c);
                on_change(t, &ed.text(), out)?;
            }
            _ => {}
        }
    };
    queue!(out, Hide)?;
    Ok(entered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_delete_edit_around_the_cursor() {
        let mut ed = Editor::new(vec![]);
        for c in "abc".chars() {
            ed.insert(c);
        }
        assert_eq!(ed.text(), "abc");
        ed.seek(-1);
        ed.insert('x');
        assert_eq!(ed.text(), "abxc");
        assert!(ed.backspace());
        assert_eq!(ed.text(), "abc");
        ed.seek_start();
        assert!(!ed.backspace());
        assert!(ed.delete());
        assert_eq!(ed.text(), "bc");
    }

    #[test]
    fn seek_clamps_to_the_buffer() {
        let mut ed = Editor::new(vec![]);
        ed.insert('a');
        ed.seek(-10);
        assert_eq!(ed.cursor(), 0);
        ed.seek(10);
        assert_eq!(ed.cursor(), 1);
    }

    #[test]
    fn history_recall_round_trips_the_working_entry() {
        let mut ed = Editor::new(vec!["first".into(), "second".into()]);
        for c in "draft".chars() {
            ed.insert(c);
        }
        assert!(ed.hist_seek(-1));
        assert_eq!(ed.text(), "second");
        assert!(ed.hist_seek(-1));
        assert_eq!(ed.text(), "first");
        assert!(!ed.hist_seek(-1));
        assert!(ed.hist_seek(1));
        assert!(ed.hist_seek(1));
        assert_eq!(ed.text(), "draft");
    }

    #[test]
    fn wide_runes_scroll_the_window_by_cells() {
        let mut ed = Editor::new(vec![]);
        for c in "你好世界".chars() {
            ed.insert(c);
        }
        // Four two-cell runes in a six-cell field: window slides.
        let (shown, cursor) = ed.view(6);
        assert!(cells(&shown) <= 6);
        assert!(cursor <= 6);
        ed.seek_start();
        let (shown, cursor) = ed.view(6);
        assert_eq!(cursor, 0);
        assert_eq!(shown, vec!['你', '好', '世']);
    }

    #[test]
    fn control_runes_count_two_cells() {
        assert_eq!(rune_cells('\u{1}'), 2);
        assert_eq!(rune_cells('\u{7f}'), 2);
        assert_eq!(rune_cells('a'), 1);
        let mut ed = Editor::new(vec![]);
        ed.insert('\u{1}');
        ed.insert('b');
        let (shown, cursor) = ed.view(10);
        assert_eq!(shown.len(), 2);
        assert_eq!(cursor, 3);
    }
}
