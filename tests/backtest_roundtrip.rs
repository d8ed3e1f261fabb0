use candle_backtester::backtest::{Direction, PositionLedger};
use candle_backtester::config::StrategyConfig;
use candle_backtester::data::Candle;
use candle_backtester::strategy::{create_strategy, strategy_fn, Signal};
use candle_backtester::{run_backtest, BacktestError};
use rust_decimal_macros::dec;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DAY_MS: i64 = 86_400_000;

fn write_candles(dir: &Path, opens: &[f64]) -> PathBuf {
    let path = dir.join("candles.csv");
    let mut file = File::create(&path).unwrap();
    writeln!(file, "start,fillLow,fillHigh,fillOpen,fillClose,baseVolume,oracleClose").unwrap();
    for (i, open) in opens.iter().enumerate() {
        writeln!(
            file,
            "{},{},{},{},{},100,{}",
            1_704_067_200_000 + i as i64 * DAY_MS,
            open - 1.0,
            open + 2.0,
            open,
            open + 0.5,
            open
        )
        .unwrap();
    }
    path
}

#[test]
fn silent_strategy_reports_undefined_metrics() {
    let dir = TempDir::new().unwrap();
    let path = write_candles(dir.path(), &[100.0, 101.0, 102.0]);
    let strategy = strategy_fn("silent", |_: &[Candle], _: &PositionLedger| Ok(None));

    let (metrics, ledger) = run_backtest(&path, &strategy).unwrap();

    assert!(ledger.is_empty());
    assert_eq!(metrics.total_positions, 0);
    assert!(metrics.cumulative_return.is_nan());
    assert!(metrics.sharpe_ratio.is_nan());
    assert!(metrics.win_rate.is_nan());
}

#[test]
fn scripted_round_trip_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_candles(dir.path(), &[100.0, 105.0, 95.0, 110.0]);
    let strategy = strategy_fn("scripted", |window: &[Candle], _: &PositionLedger| {
        Ok(match window.len() {
            2 => Signal::at_last_open(Direction::Long, window),
            4 => Signal::at_last_open(Direction::Short, window),
            _ => None,
        })
    });

    let (metrics, ledger) = run_backtest(&path, &strategy).unwrap();

    assert_eq!(ledger.len(), 1);
    let position = &ledger.positions()[0];
    assert_eq!(position.entry_price, dec!(105));
    assert_eq!(position.exit_price, Some(dec!(110)));
    assert_eq!(position.realized_pnl, Some(dec!(5)));
    assert_eq!(metrics.total_positions, 1);
    assert_eq!(metrics.win_rate, 1.0);
    assert!(metrics.cumulative_return > 0.0);
}

#[test]
fn ma_crossover_trades_a_reversing_market() {
    let dir = TempDir::new().unwrap();
    // Flat, then a rally, then a slide: one golden cross and one death cross
    let mut opens = vec![100.0; 35];
    opens.extend((1..=20).map(|i| 100.0 + i as f64 * 2.0));
    opens.extend((1..=30).map(|i| 140.0 - i as f64 * 3.0));
    let path = write_candles(dir.path(), &opens);

    let strategy = create_strategy("ma_crossover", &StrategyConfig::default()).unwrap();
    let (metrics, ledger) = run_backtest(&path, strategy.as_ref()).unwrap();

    assert!(!ledger.is_empty());
    let first = &ledger.positions()[0];
    assert_eq!(first.direction, Direction::Long);
    assert!(first.is_closed());
    assert!(first.exit_price.unwrap() > first.entry_price);
    assert!(metrics.total_positions >= 1);
    assert!(metrics.win_rate > 0.0);
}

#[test]
fn malformed_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "start,fillOpen\n1000,1\n").unwrap();
    let strategy = strategy_fn("silent", |_: &[Candle], _: &PositionLedger| Ok(None));

    let err = run_backtest(&path, &strategy).unwrap_err();
    assert!(matches!(err, BacktestError::MalformedData { .. }));
}
