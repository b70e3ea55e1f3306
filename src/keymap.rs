//! Prefix-keyed command lookup.
//!
//! Bindings map chord sequences ("zz", or a single key) to actions. The
//! dispatcher feeds keystrokes in one at a time: a sequence that is a
//! proper prefix of some binding is `Pending`, an exact match is `Bound`,
//! anything else is `Unbound` and resets the pending buffer.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// A normalized keystroke.
pub type Chord = (KeyCode, KeyModifiers);

pub fn chord(c: char) -> Chord {
    (KeyCode::Char(c), KeyModifiers::NONE)
}

pub fn ctrl(c: char) -> Chord {
    (KeyCode::Char(c), KeyModifiers::CONTROL)
}

pub fn key(code: KeyCode) -> Chord {
    (code, KeyModifiers::NONE)
}

/// Reduces a key event to the modifier bits bindings care about. Shift is
/// dropped (shifted characters already arrive uppercase); alt chords are
/// not bound and return `None`.
pub fn normalize(ev: KeyEvent) -> Option<Chord> {
    if ev.modifiers.contains(KeyModifiers::ALT) {
        return None;
    }
    let mods = ev.modifiers & KeyModifiers::CONTROL;
    Some((ev.code, mods))
}

#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<A> {
    Unbound,
    Pending,
    Bound(A),
}

pub struct Keymap<A> {
    binds: Vec<(Vec<Chord>, A)>,
}

impl<A: Copy> Keymap<A> {
    pub fn new() -> Self {
        Keymap { binds: Vec::new() }
    }

    pub fn bind(&mut self, seq: &[Chord], action: A) {
        self.binds.push((seq.to_vec(), action));
    }

    pub fn lookup(&self, seq: &[Chord]) -> Lookup<A> {
        for (bound, action) in &self.binds {
            if bound[..] == seq[..] {
                return Lookup::Bound(*action);
            }
        }
        if self.binds.iter().any(|(bound, _)| bound.len() > seq.len() && bound[..seq.len()] == seq[..]) {
            return Lookup::Pending;
        }
        Lookup::Unbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_key_binding_resolves() {
        let mut map = Keymap::new();
        map.bind(&[chord('j')], 1);
        assert_eq!(map.lookup(&[chord('j')]), Lookup::Bound(1));
        assert_eq!(map.lookup(&[chord('x')]), Lookup::Unbound);
    }

    #[test]
    fn chord_sequences_report_pending() {
        let mut map = Keymap::new();
        map.bind(&[chord('z'), chord('z')], 7);
        assert_eq!(map.lookup(&[chord('z')]), Lookup::Pending);
        assert_eq!(map.lookup(&[chord('z'), chord('z')]), Lookup::Bound(7));
        assert_eq!(map.lookup(&[chord('z'), chord('q')]), Lookup::Unbound);
    }

    #[test]
    fn control_and_plain_keys_are_distinct() {
        let mut map = Keymap::new();
        map.bind(&[chord('e')], 1);
        map.bind(&[ctrl('e')], 2);
        assert_eq!(map.lookup(&[chord('e')]), Lookup::Bound(1));
        assert_eq!(map.lookup(&[ctrl('e')]), Lookup::Bound(2));
    }

    #[test]
    fn normalize_strips_shift_and_rejects_alt() {
        let ev = KeyEvent::new(KeyCode::Char('J'), KeyModifiers::SHIFT);
        assert_eq!(normalize(ev), Some(chord('J')));
        let ev = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(normalize(ev), None);
        let ev = KeyEvent::new(KeyCode::Char('f'), KeyModifiers::CONTROL);
        assert_eq!(normalize(ev), Some(ctrl('f')));
    }
}
