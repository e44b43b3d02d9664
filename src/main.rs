//! forkpool - run units of work in forked worker processes

mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr};

use cli::{Cli, Commands, PoolArgs};
use forkpool::logging::{self, LogConfig};
use forkpool::pool::{Orchestrator, Producer, RunReport, Transport};
use forkpool::producers::{HttpFetch, ShellCommand};
use std::time::Duration;

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }
    init_logging(&cli);

    let result = match &cli.command {
        Commands::Exec(args) => {
            let producers = args
                .commands
                .iter()
                .map(|cmd| Box::new(ShellCommand::new(cmd.as_str())) as Box<dyn Producer>)
                .collect();
            run_pool(&cli, &args.pool, producers)
        }
        Commands::Fetch(args) => {
            let timeout = Duration::from_secs(args.timeout);
            let producers = args
                .urls
                .iter()
                .map(|url| {
                    Box::new(HttpFetch::new(url.as_str()).with_timeout(timeout)) as Box<dyn Producer>
                })
                .collect();
            run_pool(&cli, &args.pool, producers)
        }
        Commands::Completions(args) => {
            args.generate();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let mut config = LogConfig::for_cli(cli.verbose, cli.quiet).with_ansi(!cli.no_color);
    if let Some(ref path) = cli.log_file {
        config = config.with_file(path.clone());
    }
    logging::init(config.with_env_overrides());
}

/// Validate the pool options, run every producer, and print what was delivered.
fn run_pool(cli: &Cli, args: &PoolArgs, producers: Vec<Box<dyn Producer>>) -> Result<()> {
    let config = args.to_config().context("invalid pool options")?;

    if let Transport::Rendezvous { dir, .. } = config.transport() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create socket directory {}", dir.display()))?;
    }

    let mut orchestrator = Orchestrator::new(Vec::<Vec<u8>>::new(), producers).with_config(config);
    let report = orchestrator.run().context("pool run failed")?;
    let payloads = orchestrator.into_consumer();

    output::print_payloads(&payloads, &report, args.format.into());

    if !cli.quiet {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    let delivered = format!("{}/{}", report.delivered, report.units);
    eprintln!(
        "{} {} delivered ({} failed, {} evicted, {} not started, peak {} workers) in {}ms",
        "done".if_supports_color(Stderr, |text| text.green()),
        delivered.if_supports_color(Stderr, |text| text.bold()),
        report.failed,
        report.evicted,
        report.spawn_failures,
        report.peak_workers,
        report.elapsed_ms
    );
}
