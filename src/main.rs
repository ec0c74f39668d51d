//! actfit CLI: run one fit session headlessly.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use actfit::session::{FitSession, SessionConfig};
use actfit::source::{SourceEnvironment, DEMO_SOURCE};
use actfit::store::{FitStore, DEFAULT_FIT_FILE};

#[derive(Parser)]
#[command(name = "actfit")]
#[command(about = "actfit - Interactive curve fitting, headless")]
#[command(version)]
struct Cli {
    /// Source file defining the model function and data. Defaults to a
    /// sine model with noisy demo data.
    source: Option<PathBuf>,

    /// Function to fit. Defaults to the first function defined.
    #[arg(short, long)]
    function: Option<String>,

    /// Sequence holding the x values. Defaults to the first sequence defined.
    #[arg(long)]
    xs: Option<String>,

    /// Sequence holding the y values. Defaults to the second sequence defined.
    #[arg(long)]
    ys: Option<String>,

    /// Fit only points with MIN < x < MAX
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    range: Option<Vec<f64>>,

    /// Initial value, as NAME=VALUE. Repeatable.
    #[arg(short, long, value_parser = parse_guess)]
    guess: Vec<(String, f64)>,

    /// Parameter bounds, as NAME=LOWER:UPPER. Repeatable.
    #[arg(short, long, value_parser = parse_bounds)]
    bounds: Vec<(String, f64, f64)>,

    /// Start from the values in the fit file written by an earlier run
    #[arg(long)]
    reuse: bool,

    /// Session and solver settings (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for rand()/randn() in the source
    #[arg(long)]
    seed: Option<u64>,

    /// Write a reloadable fit artifact (function source plus parameters)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Write optimal values and covariance in the fit file format
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_FIT_FILE)]
    save_fits: Option<PathBuf>,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

fn parse_guess(s: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("{}: {}", value, e))?;
    Ok((name.trim().to_string(), value))
}

fn parse_bounds(s: &str) -> std::result::Result<(String, f64, f64), String> {
    let (name, range) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=LOWER:UPPER, got '{}'", s))?;
    let (lower, upper) = range
        .split_once(':')
        .ok_or_else(|| format!("expected LOWER:UPPER, got '{}'", range))?;
    let lower = lower.trim().parse::<f64>().map_err(|e| format!("{}: {}", lower, e))?;
    let upper = upper.trim().parse::<f64>().map_err(|e| format!("{}: {}", upper, e))?;
    Ok((name.trim().to_string(), lower, upper))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    let config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<SessionConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => SessionConfig::default(),
    };

    let source = match &cli.source {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading source {}", path.display()))?,
        None => DEMO_SOURCE.to_string(),
    };

    let mut env = match cli.seed {
        Some(seed) => SourceEnvironment::with_seed(seed),
        None => SourceEnvironment::new(),
    };
    env.exec(&source)?;

    let function_name = match &cli.function {
        Some(name) => name.clone(),
        None => env
            .callables()
            .first()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("source defines no functions"))?,
    };
    let sequences = env.non_callables();
    let xs = cli
        .xs
        .clone()
        .or_else(|| sequences.first().map(|s| s.to_string()))
        .ok_or_else(|| anyhow!("source defines no x sequence"))?;
    let ys = cli
        .ys
        .clone()
        .or_else(|| sequences.get(1).map(|s| s.to_string()))
        .ok_or_else(|| anyhow!("source defines no y sequence"))?;

    let mut session = FitSession::new(config);
    session.on_data_loaded(env.dataset(&xs, &ys)?)?;
    session.on_function_selected(env.function(&function_name)?)?;

    if let Some(range) = &cli.range {
        if let [min, max] = range.as_slice() {
            session.on_range_selected(*min, *max)?;
        }
    }
    for (name, lower, upper) in &cli.bounds {
        session.on_bounds_edited(name, *lower, *upper)?;
    }

    let store = FitStore::new(cli.save_fits.clone().unwrap_or_else(|| DEFAULT_FIT_FILE.into()));
    if cli.reuse {
        if store.exists() {
            let previous = store.load()?;
            let names: Vec<String> = session.parameters().names().into_iter().map(String::from).collect();
            for name in names {
                if let Some(value) = previous.get(&name) {
                    session.on_parameter_edited(&name, value)?;
                }
            }
        } else {
            bail!("no previous fit at {}", store.path().display());
        }
    }
    for (name, value) in &cli.guess {
        session.on_parameter_edited(name, *value)?;
    }

    session.on_run_fit()?;
    let accepted = session.on_accept()?;
    println!(
        "{} fitted to {} vs {} on ({}, {})",
        function_name, ys, xs, accepted.range.min, accepted.range.max
    );
    print!("{}", accepted.result);

    if let Some(path) = &cli.save {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        actfit::artifact::dump(&accepted.function, &accepted.parameters, &mut writer)?;
        writer.flush()?;
        println!("Saved fit artifact to {}", path.display());
    }
    if cli.save_fits.is_some() {
        store.save_result(&accepted.result)?;
        println!("Saved fit values to {}", store.path().display());
    }

    Ok(())
}
