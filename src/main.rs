use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;

use sales_report::{
    preferences::{CURRENCY, DATE_FORMAT, OUTPUT_TYPE},
    BatchStats, Outcome, SalesSystem,
};

#[derive(Parser)]
#[command(version, about)]
/// Writes per-user monthly and yearly sales reports from CSV and JSON sales data.
struct Args {
    /// Sales data files (.csv or .json)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory to write reports to
    #[arg(short, long, default_value = "reports")]
    output_dir: PathBuf,

    /// User to report on (repeatable; default: every user in the data)
    #[arg(short, long = "user")]
    users: Vec<String>,

    /// Report output type
    #[arg(long)]
    format: Option<String>,

    /// Currency code shown in the printed summary
    #[arg(long)]
    currency: Option<String>,

    /// Input date format, in chrono strftime syntax
    #[arg(long)]
    date_format: Option<String>,

    /// Set a preference by name (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_pref)]
    prefs: Vec<(String, String)>,

    /// Also write dataset statistics to summary.json in the output directory
    #[arg(long)]
    summary: bool,

    /// Print the N users with the highest revenue
    #[arg(long, value_name = "N")]
    top: Option<usize>,

    /// Log debug messages
    #[arg(short, long)]
    verbose: bool,
}

fn parse_pref(s: &str) -> Result<(String, String)> {
    let Some((key, value)) = s.split_once('=') else {
        bail!("expected KEY=VALUE, got {s:?}");
    };
    Ok((key.trim().to_string(), value.to_string()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("sales_report={level}").parse()?),
        )
        .init();

    let mut system = SalesSystem::new();
    let mut prefs = args.prefs;
    for (key, value) in [
        (CURRENCY, args.currency),
        (DATE_FORMAT, args.date_format),
        (OUTPUT_TYPE, args.format),
    ] {
        if let Some(value) = value {
            prefs.push((key.to_string(), value));
        }
    }
    system.set_preferences(prefs);

    let summary = system.load_data(&args.files);
    for (path, err) in &summary.failed {
        eprintln!("skipped {}: {err}", path.display());
    }
    if system.loader().is_empty() {
        bail!("no sales records loaded");
    }

    let users = if args.users.is_empty() {
        system.loader().user_ids()
    } else {
        args.users
    };
    let outcomes = system
        .generate_reports(&args.output_dir, Some(&users))
        .with_context(|| format!("writing reports to {}", args.output_dir.display()))?;

    let currency = system.preferences().currency.clone();
    for outcome in &outcomes {
        match outcome {
            Outcome::Written {
                user_id,
                path,
                invalid_records,
            } => {
                if let Some(report) = system.analyzer().report(user_id) {
                    println!("{}", report.summary(&currency));
                }
                if !invalid_records.is_empty() {
                    println!("({} invalid records skipped)", invalid_records.len());
                }
                println!("Written to {}\n", path.display());
            }
            Outcome::Skipped { user_id, reason } => {
                eprintln!("skipped user {user_id}: {reason}");
            }
            Outcome::Failed { user_id, error } => {
                eprintln!("failed user {user_id}: {error}");
            }
        }
    }
    let stats = BatchStats::from_outcomes(&outcomes);
    println!(
        "{} reports written, {} skipped, {} failed",
        stats.written, stats.skipped, stats.failed
    );

    if let Some(n) = args.top {
        println!("\nTop {n} users by revenue ({currency})");
        for (rank, user) in system.top_users(n).iter().enumerate() {
            println!(
                "{:>3}. {:<12} {:>14} {:>6} sales",
                rank + 1,
                user.user_id,
                user.revenue,
                user.transactions
            );
        }
    }
    if args.summary {
        let path = system
            .generate_summary(&args.output_dir)
            .context("writing dataset summary")?;
        println!("\n{}", system.statistics());
        println!("Summary written to {}", path.display());
    }
    Ok(())
}
