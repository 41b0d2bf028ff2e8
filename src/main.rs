use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use simplelog::{Config as LogConfig, SimpleLogger};

use cuelight::easing::Easing;
use cuelight::fixture::select::Target;
use cuelight::fixture::Group;
use cuelight::{
    BlendMode, Effect, EffectStep, FixtureRegistry, NullTransport, RootConfig, Rgbio, Sequencer,
    WaitFor,
};

#[derive(Parser)]
#[command(about = "Tick-driven layered DMX effect sequencer")]
struct Cli {
    /// If true, provide verbose logging.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sequencer against a fixture configuration, driving a demo
    /// effect at a null transport.
    Run(RunArgs),

    /// Check that the provided configuration file is valid, then quit.
    Check(CheckArgs),

    /// List the fixtures a group/target selection would resolve to.
    Targets(TargetsArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to a YAML file containing the fixture configuration.
    config_file: PathBuf,

    /// Tick cadence, in milliseconds.
    #[arg(long, default_value_t = 20)]
    cadence_ms: u64,

    /// How long to run the demo before exiting, in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    run_for_ms: u64,
}

#[derive(Args)]
struct CheckArgs {
    /// Path to a YAML file containing the fixture configuration.
    config_file: PathBuf,
}

#[derive(Args)]
struct TargetsArgs {
    /// Path to a YAML file containing the fixture configuration.
    config_file: PathBuf,

    /// Group to select from (front, back, strobe).
    group: Group,

    /// Target within that group (all, even, odd, half-1, third-2, ...).
    target: String,
}

fn main() -> Result<()> {
    let args = Cli::try_parse()?;

    let log_level = if args.debug { LevelFilter::Debug } else { LevelFilter::Warn };
    SimpleLogger::init(log_level, LogConfig::default())?;

    match args.command {
        Command::Run(args) => run_demo(args),
        Command::Check(args) => check_config(args),
        Command::Targets(args) => list_targets(args),
    }
}

fn run_demo(args: RunArgs) -> Result<()> {
    let config = RootConfig::from_file(&args.config_file)?;
    let registry = Arc::new(FixtureRegistry::load(&config)?);

    let fixtures: Vec<_> = registry.all().into_iter().map(|f| f.id).collect();
    if fixtures.is_empty() {
        bail!("configuration has no patched fixtures");
    }

    let sequencer = Sequencer::new(
        Duration::from_millis(args.cadence_ms),
        registry,
        vec![Box::new(NullTransport)],
    );
    let handle = sequencer.handle();

    let demo = Effect::new(
        "demo fade to white and back",
        vec![
            EffectStep {
                fixtures: fixtures.clone(),
                layer: 0,
                wait_for: WaitFor::None,
                target: Rgbio::new(255, 255, 255, 255, 1.0, BlendMode::Replace),
                duration_ms: 1_000,
                easing: Easing::SinInOut,
                wait_until: WaitFor::None,
            },
            EffectStep {
                fixtures,
                layer: 0,
                wait_for: WaitFor::None,
                target: Rgbio::BLACK,
                duration_ms: 1_000,
                easing: Easing::SinInOut,
                wait_until: WaitFor::None,
            },
        ],
    );
    handle.set("demo", demo, true)?;

    println!("Running demo for {} ms against a null transport.", args.run_for_ms);
    let join = sequencer.start();
    std::thread::sleep(Duration::from_millis(args.run_for_ms));
    handle.shutdown()?;
    let _ = join.join();

    Ok(())
}

fn check_config(args: CheckArgs) -> Result<()> {
    let config = RootConfig::from_file(&args.config_file)?;
    let fixture_count: usize = config.groups.iter().map(|g| g.fixtures.len()).sum();
    println!("Configuration OK: {} group(s), {} fixture(s).", config.groups.len(), fixture_count);
    Ok(())
}

fn list_targets(args: TargetsArgs) -> Result<()> {
    let config = RootConfig::from_file(&args.config_file)
        .with_context(|| format!("loading {}", args.config_file.display()))?;
    let registry = FixtureRegistry::load(&config)?;

    let target = parse_target(&args.target)?;
    let fixtures = registry.select(&[args.group], &[target])?;
    if fixtures.is_empty() {
        println!("No fixtures matched.");
        return Ok(());
    }
    for fixture in fixtures {
        println!("{} (position {})", fixture.id, fixture.position);
    }
    Ok(())
}

/// `random-k` carries a numeric payload (`random-k:2`) that a plain
/// `FromStr` derive can't parse; every other target is a bare kebab-case name.
fn parse_target(raw: &str) -> Result<Target> {
    if let Some(k) = raw.strip_prefix("random-k:") {
        let k: u8 = k.parse().with_context(|| format!("invalid random-k count {k:?}"))?;
        return Ok(Target::RandomK(k));
    }
    raw.parse()
        .map_err(|_| anyhow::anyhow!("unknown target {raw:?}"))
}
