mod browse;
mod cli;
mod doc;
mod keymap;
mod layout;
mod prompt;
mod style;
mod term;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use crate::browse::{Browser, Tree};
use crate::cli::Cli;
use crate::doc::Doc;
use crate::style::Palette;
use crate::term::Term;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let value = load(cli.file.as_deref())?;
    let doc = Doc::from_value(&value);
    drop(value);

    // Everything fallible about the input happens before the terminal is
    // touched, so startup errors stay on a normal screen.
    let mut term = Term::new()?;
    let (cols, rows) = Term::size()?;
    let tree = Tree::new(doc, cols.max(1));
    let mut browser = Browser::new(tree, cols, rows, Palette::detect());
    browser.run(&mut term)
}

fn load(path: Option<&Path>) -> Result<serde_json::Value> {
    let value = match path {
        Some(p) => {
            let file = File::open(p).with_context(|| format!("could not open {}", p.display()))?;
            serde_json::from_reader(BufReader::new(file))
        }
        None => serde_json::from_reader(io::stdin().lock()),
    };
    value.context("could not parse input as JSON")
}
