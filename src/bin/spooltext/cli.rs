use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI над SpoolText: правка, бенчмарк и статистика раскладки
#[derive(Parser, Debug)]
#[command(name = "spooltext", version, about = "SpoolText CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Load a text file, apply a JSON edit script, write the result
    Edit {
        #[arg(long)]
        input: PathBuf,
        /// JSON array of {"offset": N, "delete": N, "insert": "..."} (char offsets)
        #[arg(long)]
        ops: PathBuf,
        /// Write the edited text here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the summary as one JSON object
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Random replaces against a String model; checks equality and reports timings
    Bench {
        #[arg(long, default_value_t = 100_000)]
        chars: usize,
        #[arg(long, default_value_t = 10_000)]
        edits: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Load a text file and print the store layout (after the swap settles)
    Stats {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
