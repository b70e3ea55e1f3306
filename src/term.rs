//! Terminal lifecycle and raw ANSI plumbing.
//!
//! `Term` opens the controlling terminal read-write (so piping a document
//! into stdin leaves the keyboard usable), switches it to raw mode, enters
//! the alternate screen, hides the cursor, and enables SGR mouse tracking.
//! All of that is undone on every exit path: normal drop, signal-driven
//! quit, and panic (via a hook installed before setup).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, Show};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, Command};

static QUIT: AtomicBool = AtomicBool::new(false);
static HOOKS: Once = Once::new();

/// True once SIGTERM (or a ctrl-c signal outside raw mode) has fired. The
/// event loop observes this between commands.
pub fn quit_requested() -> bool {
    QUIT.load(Ordering::SeqCst)
}

fn restore(out: &mut impl Write) {
    let _ = execute!(out, DisableMouseCapture, Show, LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Deletes n lines at the cursor row (`CSI n M`); rows below shift up.
pub struct DeleteLines(pub u16);

impl Command for DeleteLines {
    fn write_ansi(&self, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        write!(f, "\x1b[{}M", self.0)
    }
}

/// Inserts n blank lines at the cursor row (`CSI n L`); rows below shift down.
pub struct InsertLines(pub u16);

impl Command for InsertLines {
    fn write_ansi(&self, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        write!(f, "\x1b[{}L", self.0)
    }
}

/// The interactive terminal, restored on drop.
pub struct Term {
    out: BufWriter<File>,
}

impl Term {
    pub fn new() -> Result<Term> {
        let tty = File::options()
            .read(true)
            .write(true)
            .open("/dev/tty")
            .context("could not open controlling terminal")?;
        HOOKS.call_once(|| {
            let original = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                if let Ok(tty) = File::options().write(true).open("/dev/tty") {
                    let mut out = BufWriter::new(tty);
                    restore(&mut out);
                }
                original(info);
            }));
            let _ = ctrlc::set_handler(|| QUIT.store(true, Ordering::SeqCst));
        });
        enable_raw_mode().context("could not enable raw mode")?;
        let mut out = BufWriter::new(tty);
        execute!(out, EnterAlternateScreen, Hide, EnableMouseCapture)
            .context("could not initialize the terminal")?;
        Ok(Term { out })
    }

    /// Current terminal size as (columns, rows).
    pub fn size() -> Result<(usize, usize)> {
        let (w, h) = crossterm::terminal::size().context("could not query terminal size")?;
        Ok((w as usize, h as usize))
    }
}

impl Write for Term {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for Term {
    fn drop(&mut self) {
        restore(&mut self.out);
    }
}
