//! `hostcheck`: validate a provisioned host against its state snapshot.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use hostcheck::core::report::{readable, render_record};
use hostcheck::core::types::{Policy, RunStatus};
use hostcheck::exit_codes;
use hostcheck::io::config::{CheckConfig, DEFAULT_CONFIG_PATH, load_config};
use hostcheck::io::fetch::HttpFetcher;
use hostcheck::logging;
use hostcheck::registry::Registry;
use hostcheck::run::{Plan, Runner};

#[derive(Parser, Debug)]
#[command(
    name = "hostcheck",
    version,
    about = "Dependency-ordered validation of a provisioned host"
)]
struct Cli {
    /// Keep running after failures and errors instead of halting.
    #[arg(long = "continue")]
    keep_going: bool,

    /// Config file; missing means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the snapshot path from the config.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Override the units directory from the config.
    #[arg(long)]
    units: Option<PathBuf>,

    /// Print the resolved execution plan without running anything.
    #[arg(long)]
    list: bool,
}

impl Cli {
    fn apply(&self, mut cfg: CheckConfig) -> CheckConfig {
        if let Some(path) = &self.snapshot {
            cfg.snapshot_path = path.clone();
        }
        if let Some(dir) = &self.units {
            cfg.units_dir = dir.clone();
        }
        if self.keep_going {
            cfg.continue_on_failure = true;
        }
        cfg
    }
}

fn main() {
    if let Err(err) = logging::init() {
        eprintln!("{err:#}");
    }
    match run(Cli::parse()) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let cfg = cli.apply(load_config(&cli.config)?);
    let policy: Policy = cfg.policy();
    let registry = Registry::load(&cfg.units_dir)?;
    let fetcher = HttpFetcher::new(cfg.http_timeout());
    let mut runner = Runner::new(&fetcher, policy);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.list {
        let (_, plan) = runner.prepare(&registry, &cfg.snapshot_path)?;
        write_plan(&plan, &mut out).context("write plan")?;
        return Ok(exit_codes::OK);
    }

    let report = runner.run(&registry, &cfg.snapshot_path, &mut out)?;
    out.flush().context("flush report")?;
    Ok(match report.status() {
        RunStatus::Completed => exit_codes::OK,
        RunStatus::Halted => exit_codes::HALTED,
    })
}

fn write_plan(plan: &Plan, out: &mut dyn Write) -> io::Result<()> {
    for record in &plan.skipped {
        writeln!(out, "{}", render_record(record))?;
    }
    for descriptor in plan.descriptors() {
        writeln!(out, "{}", descriptor.name)?;
        for method in &descriptor.methods {
            writeln!(out, "  {}", readable(method))?;
        }
    }
    Ok(())
}
