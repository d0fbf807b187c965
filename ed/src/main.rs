//! elevatord - multi-elevator dispatch coordinator
//!
//! CLI entry point for simulated runs and scenario tooling.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use elevatord::cli::{self, Cli, Command, ScenarioCommand};
use elevatord::config::Config;
use elevatord::scenario;
use elevatord::sim::{SimulationReport, run_simulation};

fn setup_logging(level: tracing::Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))?;

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli::log_level(cli.verbose, cli.log_level.as_deref())).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            scenario,
            generate,
            seed,
        } => cmd_run(&config, scenario, generate, seed).await,
        Command::Scenario { command } => match command {
            ScenarioCommand::Check { file } => cmd_scenario_check(&config, &file),
            ScenarioCommand::Generate { out, seed } => cmd_scenario_generate(&config, out, seed),
        },
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_run(config: &Config, path: Option<std::path::PathBuf>, generate: bool, seed: Option<u64>) -> Result<()> {
    let mut rng = rng_for(seed);
    let entries = if generate {
        scenario::generate(config, &mut rng)
    } else {
        let path = path.unwrap_or_else(|| config.scenario.file.clone());
        scenario::load_or_generate(&path, config, &mut rng)
            .context(format!("Failed to load scenario from {}", path.display()))?
    };

    info!(requests = entries.len(), "Scenario ready");
    let report = run_simulation(config, entries).await.context("Simulation failed")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &SimulationReport) {
    let summary = &report.summary;
    let check = |ok: bool| if ok { "✓".green() } else { "✗".red() };

    println!(
        "{} ({} ms, started {})",
        "Simulation summary".bold(),
        report.elapsed().num_milliseconds(),
        report.started_at.format("%H:%M:%S")
    );
    println!("  requests received  {}", summary.requests_received.to_string().cyan());
    println!(
        "  {} delivered        {}",
        check(summary.delivered as u64 + summary.stranded == summary.requests_received),
        summary.delivered.to_string().green()
    );
    if summary.stranded > 0 {
        println!("  {} stranded         {}", "!".yellow(), summary.stranded.to_string().yellow());
    }
    if summary.awaiting > 0 {
        println!("  {} awaiting         {}", check(false), summary.awaiting.to_string().red());
    }
    if !summary.dead_cars.is_empty() {
        let ids: Vec<String> = summary.dead_cars.iter().map(|id| id.to_string()).collect();
        println!("  {} dead cars        {}", "!".yellow(), ids.join(", ").red());
    }

    for car in &report.cars {
        let status = if car.dead { "DEAD".red() } else { "ok".green() };
        println!(
            "  car {} at floor {:<3} {} ({} commands)",
            car.car_id,
            car.floor,
            status,
            car.commands.to_string().dimmed()
        );
    }
    if !report.lit_calls.is_empty() {
        println!("  {} call lamps still lit: {:?}", "!".yellow(), report.lit_calls);
    }
}

fn cmd_scenario_check(config: &Config, file: &std::path::Path) -> Result<()> {
    let entries = scenario::load(file, &config.building).context(format!("Invalid scenario file {}", file.display()))?;
    let duration = entries.last().map(|e| e.offset_ms).unwrap_or(0);
    let faults = entries.iter().filter(|e| e.request.fault.is_some()).count();
    println!(
        "{} {} requests, {} ms, {} faults",
        "✓".green(),
        entries.len().to_string().cyan(),
        duration,
        faults
    );
    Ok(())
}

fn cmd_scenario_generate(config: &Config, out: Option<std::path::PathBuf>, seed: Option<u64>) -> Result<()> {
    let path = out.unwrap_or_else(|| config.scenario.file.clone());
    let entries = scenario::generate(config, &mut rng_for(seed));
    scenario::write(&path, &entries).context("Failed to write scenario")?;
    println!(
        "{} Wrote {} requests to {}",
        "✓".green(),
        entries.len(),
        path.display().to_string().cyan()
    );
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
