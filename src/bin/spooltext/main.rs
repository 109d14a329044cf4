use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod util;
mod cmd_edit;
mod cmd_bench;
mod cmd_stats;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт info.
    // Пример: RUST_LOG=debug spooltext bench --chars 100000
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Edit { input, ops, out, json } =>
            cmd_edit::exec(input, ops, out, json),

        cli::Cmd::Bench { chars, edits, seed, json } =>
            cmd_bench::exec(chars, edits, seed, json),

        cli::Cmd::Stats { input, json } =>
            cmd_stats::exec(input, json),
    }
}
