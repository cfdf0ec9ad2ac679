//! Skirmish command-line runner.
//!
//! Runs one Marines-vs-Bugs battle and prints the post-battle report, either
//! as text or as JSON. Troop counts not given on the command line or in a
//! config file are asked for on stdin.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use skirmish_core::{run_battle_with, BattleConfig, BattleResult, Faction, FactionReport};

/// Marines vs Bugs battle simulation on a bounded worker pool
#[derive(Parser, Debug)]
#[command(name = "skirmish", version)]
#[command(about = "Run a concurrent Marines-vs-Bugs battle and report the results")]
struct Args {
    /// Number of Marines (prompted for when absent)
    #[arg(long)]
    marines: Option<usize>,

    /// Number of Bugs (prompted for when absent)
    #[arg(long)]
    bugs: Option<usize>,

    /// Worker threads; defaults to min(combatants, cores - 1)
    #[arg(long, short = 't')]
    threads: Option<usize>,

    /// Pause between two attacks of one combatant, in milliseconds
    #[arg(long)]
    attack_interval_ms: Option<u64>,

    /// Pause between two scheduling sweeps, in milliseconds
    #[arg(long)]
    coordination_interval_ms: Option<u64>,

    /// Seed for reproducible dice
    #[arg(long)]
    seed: Option<u64>,

    /// TOML file with a full battle config; flags override its values
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Print the result as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("skirmish=info,skirmish_core=info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&args)?;
    config.validate().context("invalid battle setup")?;

    if !args.json {
        println!(
            "This fight is between {} Marines and {} Bugs!",
            config.marines, config.bugs
        );
    }
    let result = run_battle_with(&config).context("battle failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result);
    }
    Ok(())
}

// =============================================================================
// Configuration
// =============================================================================

fn build_config(args: &Args) -> Result<BattleConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<BattleConfig>(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let marines = match args.marines {
                Some(count) => count,
                None => prompt_count(&mut input, "Marines")?,
            };
            let bugs = match args.bugs {
                Some(count) => count,
                None => prompt_count(&mut input, "Bugs")?,
            };
            BattleConfig::new(marines, bugs)
        }
    };

    if let Some(marines) = args.marines {
        config.marines = marines;
    }
    if let Some(bugs) = args.bugs {
        config.bugs = bugs;
    }
    if let Some(threads) = args.threads {
        config.pool_size = Some(threads);
    }
    if let Some(ms) = args.attack_interval_ms {
        config.attack_interval_ms = ms;
    }
    if let Some(ms) = args.coordination_interval_ms {
        config.coordination_interval_ms = ms;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    tracing::debug!(?config, "battle config resolved");
    Ok(config)
}

/// Asks for a troop count until a positive integer is entered.
fn prompt_count(input: &mut impl BufRead, side: &str) -> Result<usize> {
    loop {
        print!("How many {side} should fight today? ");
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("stdin closed before a {side} count was entered");
        }
        match line.trim().parse::<usize>() {
            Ok(count) if count > 0 => return Ok(count),
            _ => println!("Troop count must be a whole number greater than 0."),
        }
    }
}

// =============================================================================
// Report
// =============================================================================

fn print_report(result: &BattleResult) {
    println!();
    match result.winner {
        Faction::Marines => println!("Marine victory!"),
        Faction::Bugs => println!("Bugs triumphant!"),
    }

    println!();
    println!("Post-battle stats");
    println!("Total Marine hits: {}", result.marines.total_hits);
    println!("Total Bug hits: {}", result.bugs.total_hits);
    println!("{}.", result.accuracy);

    print_side("Marine performance", &result.marines);
    print_side("Bug performance", &result.bugs);

    println!();
    if result.top_kill_count == 0 {
        println!("Nobody scored a kill.");
    } else {
        let names: Vec<_> = result.top_killers.iter().map(ToString::to_string).collect();
        println!(
            "Top killers with {} kills: {}",
            result.top_kill_count,
            names.join(", ")
        );
    }
}

fn print_side(title: &str, report: &FactionReport) {
    println!();
    println!("{title}:");
    for record in &report.records {
        let status = if record.alive { "" } else { " (fallen)" };
        if record.victims.is_empty() {
            println!("{}{status} killed: None", record.id);
        } else {
            let victims: Vec<_> = record.victims.iter().map(ToString::to_string).collect();
            println!("{}{status} killed: {}", record.id, victims.join(" "));
        }
    }
    println!(
        "{} survivors, {} kills, {} hits",
        report.survivors, report.total_kills, report.total_hits
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(std::iter::once("skirmish").chain(extra.iter().copied()))
    }

    #[test]
    fn flags_fill_the_config() {
        let args = args(&[
            "--marines",
            "4",
            "--bugs",
            "6",
            "--threads",
            "2",
            "--attack-interval-ms",
            "3",
            "--seed",
            "9",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!((config.marines, config.bugs), (4, 6));
        assert_eq!(config.pool_size, Some(2));
        assert_eq!(config.attack_interval(), Duration::from_millis(3));
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn prompt_skips_invalid_answers() {
        let mut input = Cursor::new("zero\n0\n-3\n7\n");
        assert_eq!(prompt_count(&mut input, "Bugs").unwrap(), 7);
    }

    #[test]
    fn prompt_fails_on_eof() {
        let mut input = Cursor::new("");
        assert!(prompt_count(&mut input, "Marines").is_err());
    }

    #[test]
    fn config_file_values_are_overridden_by_flags() {
        let path = std::env::temp_dir().join(format!("skirmish-{}.toml", std::process::id()));
        fs::write(
            &path,
            "marines = 3\nbugs = 5\ncoordination_interval_ms = 20\n\n[bug_profile]\naccuracy = 6\ndamage = 40\ncarapace = false\n",
        )
        .unwrap();
        let args = args(&["--config", path.to_str().unwrap(), "--bugs", "2"]);
        let config = build_config(&args).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.marines, 3);
        assert_eq!(config.bugs, 2);
        assert_eq!(config.coordination_interval(), Duration::from_millis(20));
        assert_eq!(config.bug_profile.accuracy, 6);
        assert!(!config.bug_profile.carapace);
    }
}
