//! Completions command - generate shell completion scripts

use crate::cli::args::{Cli, CompletionsArgs};
use crate::error::MillResult;
use clap::CommandFactory;
use clap_complete::generate;
use std::io;

/// Execute the completions command
pub fn execute(args: CompletionsArgs) -> MillResult<()> {
    let mut command = Cli::command();
    generate(args.shell, &mut command, "imagemill", &mut io::stdout());
    Ok(())
}
