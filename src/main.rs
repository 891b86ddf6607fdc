use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use ring_traffic::simulation::{
    CruiseRule, LaneId, RandomSlowdownRule, Rule, Simulation, SlowToStartRule, DEFAULT_ITERATIONS,
};

/// Global movement rule selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RuleKind {
    /// Advance by the speed cap, clamped to the gap ahead
    None,
    /// Same as `none`, but as an explicit global rule
    Cruise,
    /// Wait near a jam while there is room behind, otherwise creep forward
    SlowToStart,
    /// Advance by the speed cap and randomly dawdle one cell
    RandomSlowdown,
}

#[derive(Parser)]
#[command(name = "ring_traffic")]
#[command(about = "Cellular-automaton traffic on circular lanes")]
struct Cli {
    /// Lane descriptor (■/1 occupied, □/0 free); repeat for more lanes.
    /// Without it the simulation runs interactively.
    #[arg(long = "lane")]
    lanes: Vec<String>,

    /// Number of steps to run in non-interactive mode
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    steps: usize,

    /// Global movement rule
    #[arg(long, value_enum, default_value = "slow-to-start")]
    rule: RuleKind,

    /// Dawdling probability for the random-slowdown rule
    #[arg(long, default_value = "0.2")]
    slowdown: f64,

    /// Speed cap applied to every vehicle after the lanes are built
    #[arg(long)]
    speed_cap: Option<isize>,

    /// Seed for reproducible random rules
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn global_rule(&self) -> Option<Arc<dyn Rule>> {
        match self.rule {
            RuleKind::None => None,
            RuleKind::Cruise => Some(Arc::new(CruiseRule)),
            RuleKind::SlowToStart => Some(Arc::new(SlowToStartRule)),
            RuleKind::RandomSlowdown => Some(Arc::new(RandomSlowdownRule::new(self.slowdown))),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut simulation = match cli.seed {
        Some(seed) => Simulation::new_with_seed(seed),
        None => Simulation::new(),
    };
    simulation.set_global_rule(cli.global_rule());

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.lanes.is_empty() {
        let stdin = io::stdin();
        run_interactive(&mut simulation, &cli, &mut stdin.lock(), &mut out)
    } else {
        run_headless(&mut simulation, &cli, &mut out)
    }
}

fn print_lanes(simulation: &Simulation, out: &mut impl Write) -> Result<()> {
    for lane in simulation.lanes() {
        writeln!(out, "{}", lane).context("Failed to write lane")?;
    }
    Ok(())
}

/// Run every `--lane` for `--steps` steps and print all lanes after each one
fn run_headless(simulation: &mut Simulation, cli: &Cli, out: &mut impl Write) -> Result<()> {
    for descriptor in &cli.lanes {
        simulation
            .add_lane(descriptor)
            .with_context(|| format!("Failed to add lane {:?}", descriptor))?;
    }
    if let Some(speed_cap) = cli.speed_cap {
        simulation.set_speed_cap(speed_cap);
    }

    print_lanes(simulation, out)?;
    for step in 1..=cli.steps {
        let report = simulation
            .step()
            .with_context(|| format!("Step {} failed", step))?;
        info!(
            "step {}: moved={}, distance={}, lane_changes={}",
            step, report.moved, report.distance, report.lane_changes
        );
        if simulation.lanes().len() > 1 {
            writeln!(out).context("Failed to write separator")?;
        }
        print_lanes(simulation, out)?;
    }

    simulation.log_summary();
    Ok(())
}

/// Read one line; `None` at end of input
fn read_line(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    let read = input.read_line(&mut line).context("Failed to read input")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Read a lane, a step count, print the run, and offer to go again
fn run_interactive(
    simulation: &mut Simulation,
    cli: &Cli,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    loop {
        simulation.clear();

        writeln!(out, "Enter a lane")?;
        writeln!(out, "  e.g. □■■□□■□ or 0110010")?;
        writeln!(out, "  vehicle: ■ or 1, free: □ or 0")?;
        out.flush()?;
        let Some(descriptor) = read_line(input)? else {
            break;
        };
        let lane = simulation.add_lane(&descriptor)?;
        if let Some(speed_cap) = cli.speed_cap {
            simulation.set_speed_cap(speed_cap);
        }

        writeln!(out, "Enter the number of steps")?;
        writeln!(out, "  e.g. {}", DEFAULT_ITERATIONS)?;
        out.flush()?;
        let steps = read_line(input)?
            .and_then(|line| line.parse::<usize>().ok())
            .unwrap_or(DEFAULT_ITERATIONS);

        print_lane(simulation, lane, out)?;
        for _ in 0..steps {
            simulation.step()?;
            print_lane(simulation, lane, out)?;
        }
        simulation.log_summary();

        writeln!(out, "Run again? (y/n)")?;
        out.flush()?;
        match read_line(input)? {
            Some(answer) if answer.starts_with('y') => continue,
            _ => break,
        }
    }

    Ok(())
}

fn print_lane(simulation: &Simulation, lane: LaneId, out: &mut impl Write) -> Result<()> {
    let lane = simulation
        .lane(lane)
        .with_context(|| format!("{} disappeared", lane))?;
    writeln!(out, "{}", lane).context("Failed to write lane")?;
    Ok(())
}
