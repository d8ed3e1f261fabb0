//! Backtest CLI
//!
//! Replay candle files through strategies.
//! Usage:
//!   cargo run --bin backtest -- run --data candles.csv --strategy ma_crossover
//!   cargo run --bin backtest -- compare --data candles.csv --strategies all

use anyhow::{anyhow, Context, Result};
use candle_backtester::backtest::{
    compare_strategies, BacktestEngine, BacktestResult, ComparisonResult, DataLoader,
    PerformanceMetrics, PositionLedger,
};
use candle_backtester::config::Config;
use candle_backtester::strategy::{parse_strategy_list, Strategy, StrategyRegistry};
use clap::{Parser, Subcommand};
use rust_decimal::prelude::ToPrimitive;
use std::fs::File;

#[derive(Parser, Debug)]
#[command(name = "backtest")]
#[command(about = "Replay historical candles through trading strategies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single strategy backtest
    Run {
        /// Candle CSV file (defaults to backtest.data_file from config)
        #[arg(short, long)]
        data: Option<String>,

        /// Strategy to run
        #[arg(short, long, default_value = "ma_crossover")]
        strategy: String,

        /// Show individual positions
        #[arg(long)]
        positions: bool,

        /// Print the report as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Export the position ledger to a CSV file
        #[arg(long)]
        export: Option<String>,
    },

    /// Compare multiple strategies
    Compare {
        /// Candle CSV file (defaults to backtest.data_file from config)
        #[arg(short, long)]
        data: Option<String>,

        /// Strategies to compare (comma-separated, or "all")
        #[arg(short = 'S', long, default_value = "all")]
        strategies: String,

        /// Export results to CSV file
        #[arg(long)]
        export: Option<String>,
    },

    /// List available strategies
    List,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("candle_backtester=info".parse()?)
                .add_directive("backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Run {
            data,
            strategy,
            positions,
            json,
            export,
        } => run_single_backtest(&config, data, &strategy, positions, json, export.as_deref()),

        Commands::Compare {
            data,
            strategies,
            export,
        } => run_comparison(&config, data, &strategies, export.as_deref()),

        Commands::List => {
            let registry = StrategyRegistry::with_builtins(&config.strategy);
            println!("\nAvailable strategies:");
            for name in registry.names() {
                println!("  - {}", name);
            }
            println!("\nUsage: backtest compare --strategies ma_crossover,rsi");
            println!("       backtest compare --strategies all");
            Ok(())
        }
    }
}

fn data_path(config: &Config, data: Option<String>) -> Result<String> {
    data.or_else(|| config.backtest.data_file.clone())
        .ok_or_else(|| anyhow!("No candle file given; pass --data or set backtest.data_file"))
}

fn run_single_backtest(
    config: &Config,
    data: Option<String>,
    strategy: &str,
    show_positions: bool,
    json: bool,
    export: Option<&str>,
) -> Result<()> {
    let path = data_path(config, data)?;
    let registry = StrategyRegistry::with_builtins(&config.strategy);
    let strategy = registry
        .create(strategy)
        .ok_or_else(|| anyhow!("Unknown strategy: {}", strategy))?;

    let series = DataLoader::load(&path)?;
    let engine = BacktestEngine::from_settings(&config.backtest);
    let result = engine.run(&series, strategy.as_ref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.metrics)?);
    } else {
        print_header(&result.strategy);
        println!(
            "Data: {} | Candles: {} | {} → {}",
            path,
            series.len(),
            series.first().timestamp.format("%Y-%m-%d %H:%M"),
            series.last().timestamp.format("%Y-%m-%d %H:%M")
        );
        println!();
        print_performance(&result.metrics);
        print_pnl(&result);
        print_footer();

        if show_positions && !result.ledger.is_empty() {
            println!();
            print_positions(&result.ledger);
        }
    }

    if let Some(path) = export {
        export_ledger(&result.ledger, path)?;
        println!("\nExported positions to: {}", path);
    }

    Ok(())
}

fn run_comparison(
    config: &Config,
    data: Option<String>,
    strategies: &str,
    export: Option<&str>,
) -> Result<()> {
    let path = data_path(config, data)?;
    let registry = StrategyRegistry::with_builtins(&config.strategy);

    let strategy_list: Vec<Box<dyn Strategy>> = parse_strategy_list(strategies)
        .iter()
        .map(|name| {
            registry
                .create(name)
                .ok_or_else(|| anyhow!("Unknown strategy: {}", name))
        })
        .collect::<Result<_>>()?;

    let series = DataLoader::load(&path)?;
    let engine = BacktestEngine::from_settings(&config.backtest);
    let comparison = compare_strategies(&series, &strategy_list, &engine);

    print_comparison_results(&comparison, &path);

    if let Some(path) = export {
        comparison.export_csv(path)?;
        println!("\nExported to: {}", path);
    }

    Ok(())
}

fn format_ratio(value: f64) -> String {
    if value.is_nan() || value.is_infinite() {
        "N/A".to_string()
    } else {
        format!("{:.2}", value)
    }
}

fn format_pct(value: f64) -> String {
    if value.is_nan() || value.is_infinite() {
        "N/A".to_string()
    } else {
        format!("{:+.2}%", value)
    }
}

fn print_comparison_results(result: &ComparisonResult, path: &str) {
    println!();
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(80));
    println!("\x1b[1;36m                         STRATEGY COMPARISON\x1b[0m");
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(80));
    println!("Data: {} | Candles: {}", path, result.candles_count);
    println!();

    // Table header
    println!(
        "┌{:─<17}┬{:─>11}┬{:─>10}┬{:─>11}┬{:─>12}┬{:─>9}┬{:─>9}┐",
        "", "", "", "", "", "", ""
    );
    println!(
        "│ {:15} │ {:>9} │ {:>8} │ {:>9} │ {:>10} │ {:>7} │ {:>7} │",
        "Strategy", "Positions", "Win Rate", "Cum Ret", "Annual Ret", "Sharpe", "Sortino"
    );
    println!(
        "├{:─<17}┼{:─>11}┼{:─>10}┼{:─>11}┼{:─>12}┼{:─>9}┼{:─>9}┤",
        "", "", "", "", "", "", ""
    );

    for backtest_result in &result.results {
        let m = &backtest_result.metrics;

        let return_color = if m.cumulative_return >= 0.0 {
            "\x1b[32m"
        } else if m.cumulative_return < 0.0 {
            "\x1b[31m"
        } else {
            ""
        };

        let win_rate = if m.win_rate.is_nan() {
            "N/A".to_string()
        } else {
            format!("{:.1}%", m.win_rate * 100.0)
        };

        println!(
            "│ {:15} │ {:>9} │ {:>8} │ {}{:>9}\x1b[0m │ {:>10} │ {:>7} │ {:>7} │",
            backtest_result.strategy,
            m.total_positions,
            win_rate,
            return_color,
            format_pct(m.cumulative_return),
            format_pct(m.annualized_return),
            format_ratio(m.sharpe_ratio),
            format_ratio(m.sortino_ratio)
        );
    }

    println!(
        "└{:─<17}┴{:─>11}┴{:─>10}┴{:─>11}┴{:─>12}┴{:─>9}┴{:─>9}┘",
        "", "", "", "", "", "", ""
    );

    for (name, error) in &result.failures {
        println!("\x1b[31m{} failed: {}\x1b[0m", name, error);
    }

    // Best strategy
    if let Some(best) = result.best_by_return() {
        println!();
        let m = &best.metrics;
        println!(
            "\x1b[1;32mBest Strategy: {} ({} cumulative return, {} Sharpe)\x1b[0m",
            best.strategy,
            format_pct(m.cumulative_return),
            format_ratio(m.sharpe_ratio)
        );
    }

    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(80));
}

fn print_header(strategy: &str) {
    println!();
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(55));
    println!("\x1b[1;36m         BACKTEST RESULTS: {}\x1b[0m", strategy);
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(55));
}

fn print_performance(metrics: &PerformanceMetrics) {
    println!("\x1b[1;33mPERFORMANCE\x1b[0m");
    for (name, value) in metrics.entries() {
        let shown = match name {
            "Number of positions" => format!("{}", value),
            "Win Rate" if !value.is_nan() => format!("{:.1}%", value * 100.0),
            "Cumulative Return" | "Annualized Return" => format_pct(value),
            _ => format_ratio(value),
        };
        println!("  {:<20} {}", format!("{}:", name), shown);
    }
    println!();
}

fn print_pnl(result: &BacktestResult) {
    let metrics = &result.metrics;
    println!("\x1b[1;33mP&L\x1b[0m");

    match metrics.total_pnl {
        Some(total) => {
            let pnl_color = if total.is_sign_negative() {
                "\x1b[31m"
            } else {
                "\x1b[32m"
            };
            println!(
                "  Total P&L:           {}{:.2}\x1b[0m",
                pnl_color,
                total.to_f64().unwrap_or(0.0)
            );
        }
        None => println!("  Total P&L:           N/A"),
    }
    println!(
        "  Wins / Losses:       {} / {}",
        metrics.winning_trades, metrics.losing_trades
    );
    println!(
        "  Profit Factor:       {}",
        format_ratio(metrics.profit_factor)
    );
    println!(
        "  Largest Win:         {:.2}",
        metrics.largest_win.to_f64().unwrap_or(0.0)
    );
    println!(
        "  Largest Loss:        {:.2}",
        metrics.largest_loss.to_f64().unwrap_or(0.0)
    );
    let holding = metrics
        .avg_holding_period
        .map(format_duration)
        .unwrap_or_else(|| "N/A".to_string());
    println!("  Avg Holding:         {}", holding);
    println!("  Still Open:          {}", result.open_positions());
}

fn print_footer() {
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(55));
}

fn print_positions(ledger: &PositionLedger) {
    println!("\x1b[1;33mPOSITIONS\x1b[0m");
    println!(
        "{:>4} {:>6} {:<17} {:>12} {:<17} {:>12} {:>12}",
        "#", "Side", "Entry", "Price", "Exit", "Price", "P&L"
    );
    println!("{}", "-".repeat(86));

    for position in ledger.positions() {
        let side_color = if position.direction.sign() > 0 {
            "\x1b[32m"
        } else {
            "\x1b[31m"
        };

        let exit_time = position
            .exit_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "open".to_string());
        let exit_price = position
            .exit_price
            .map(|p| format!("{:.2}", p.to_f64().unwrap_or(0.0)))
            .unwrap_or_else(|| "-".to_string());
        let pnl = position
            .realized_pnl
            .map(|p| format!("{:+.2}", p.to_f64().unwrap_or(0.0)))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:>4} {}{:>6}\x1b[0m {:<17} {:>12.2} {:<17} {:>12} {:>12}",
            position.id,
            side_color,
            position.direction.to_string(),
            position.entry_time.format("%Y-%m-%d %H:%M"),
            position.entry_price.to_f64().unwrap_or(0.0),
            exit_time,
            exit_price,
            pnl
        );
    }
}

fn export_ledger(ledger: &PositionLedger, path: &str) -> Result<()> {
    let file = File::create(path).context("Failed to create CSV file")?;
    let mut writer = csv::Writer::from_writer(file);
    for position in ledger.positions() {
        writer.serialize(position)?;
    }
    writer.flush()?;
    Ok(())
}

fn format_duration(duration: chrono::Duration) -> String {
    let total_secs = duration.num_seconds();

    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    } else if total_secs < 86400 {
        format!("{}h {}m", total_secs / 3600, (total_secs % 3600) / 60)
    } else {
        format!("{}d {}h", total_secs / 86400, (total_secs % 86400) / 3600)
    }
}
