//! Sample command: draw strings from a DTMC file.

use anyhow::{Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, info_span, warn};

use crate::cli::SampleArgs;
use crate::config::StochexConfig;
use crate::input;

pub fn run(args: SampleArgs, config: &StochexConfig) -> Result<()> {
    let _cmd = info_span!("sample").entered();
    if args.max_steps == 0 {
        bail!("--max-steps must be positive");
    }

    let dtmc = input::read_dtmc(&args.dtmc)?;
    if let Err(e) = dtmc.validate() {
        warn!(error = %e, "chain is not stochastic, some draws may fail");
    }

    let mut rng = match args.seed.or(config.seed) {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    };

    let mut abandoned = 0usize;
    for _ in 0..args.count {
        match dtmc.sample(&mut rng, args.max_steps) {
            Some(s) if s.is_empty() => println!("ε"),
            Some(s) => println!("{s}"),
            None => abandoned += 1,
        }
    }
    info!(count = args.count, abandoned, "sampling finished");
    if abandoned > 0 {
        warn!(abandoned, "some walks did not reach a final node");
    }
    Ok(())
}
