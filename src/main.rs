use std::path::PathBuf;
use std::process::ExitCode;

use cachesim::sim::read_trace_dir;
use cachesim::{simulate, Protocol, SimError, SystemSpec};
use clap::Parser;
use env_logger::Env;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "cachesim",
    version,
    about = "Snooping bus multiprocessor cache-coherence simulator"
)]
struct Cli {
    /// Coherence protocol: MSI, MESI, MOSI or MOESI (case-insensitive).
    protocol: Protocol,

    /// Directory of `*.trace` files, one per processor.
    trace_dir: PathBuf,

    /// Give up after this many cycles.
    #[arg(default_value_t = SystemSpec::default().max_cycles)]
    max_cycles: u64,
}

fn run(cli: Cli) -> Result<(), SimError> {
    let specs = SystemSpec {
        protocol: cli.protocol,
        max_cycles: cli.max_cycles,
    };

    let insts = read_trace_dir(&cli.trace_dir)?;
    info!("loaded {} traces", insts.len());
    let report = simulate(specs, insts)?;
    println!("{report}");
    Ok(())
}

fn main() -> ExitCode {
    // logging
    let env = Env::default()
        .filter_or("CACHESIM_LOG", "info")
        .write_style_or("CACHESIM_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_positional_arguments() {
        let cli = Cli::try_parse_from(["cachesim", "moesi", "traces", "500"]).unwrap();
        assert_eq!(cli.protocol, Protocol::Moesi);
        assert_eq!(cli.trace_dir, PathBuf::from("traces"));
        assert_eq!(cli.max_cycles, 500);

        let cli = Cli::try_parse_from(["cachesim", "MSI", "traces"]).unwrap();
        assert_eq!(cli.max_cycles, SystemSpec::default().max_cycles);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(Cli::try_parse_from(["cachesim", "dragon", "traces"]).is_err());
        assert!(Cli::try_parse_from(["cachesim", "MESI", "traces", "ten"]).is_err());
        assert!(Cli::try_parse_from(["cachesim", "MESI", "traces", "10", "extra"]).is_err());
        assert!(Cli::try_parse_from(["cachesim", "MESI"]).is_err());
    }
}
