use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "twig")]
#[command(version)]
#[command(about = "Browse JSON documents interactively")]
pub struct Cli {
    /// File to browse; reads standard input when omitted
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,
}
