//! Server options.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "karat-ls", about = "Language server for the Karat dialect", version)]
pub struct Options {
    /// Workspace root; relative input paths resolve against it.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Source files indexed when the session initializes.
    #[arg(long = "input", value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Built-in stub files, entered with the payload kind.
    #[arg(long = "payload", value_name = "FILE")]
    pub payloads: Vec<PathBuf>,

    /// Worker threads for fingerprinting and indexing.
    #[arg(long, default_value_t = 4)]
    pub threads: usize,

    /// Log verbosity; repeat for more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            root: None,
            inputs: Vec::new(),
            payloads: Vec::new(),
            threads: 4,
            verbose: 0,
        }
    }
}
