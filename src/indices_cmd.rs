//! Indices command: print the pre-order listing used to author SRE deltas.

use anyhow::Result;

use stochex_text::format_indices;

use crate::cli::IndicesArgs;
use crate::input;

pub fn run(args: IndicesArgs) -> Result<()> {
    let sre = input::read_sre(&args.sre)?;
    println!("{}", format_indices(&sre));
    Ok(())
}
