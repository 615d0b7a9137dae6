//! `ftree`: edit and lay out a family tree from the command line.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
