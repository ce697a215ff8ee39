//! End-to-end episodes: data port, environment, decision functions and
//! the episode report.

mod common;

use approx::assert_relative_eq;
use candlegym::adapters::csv_adapter::{write_equity_curve, write_trades, CsvDatasetAdapter};
use candlegym::domain::action::{Action, ActionSet, Side};
use candlegym::domain::environment::{Environment, Termination, TradingEnvironment};
use candlegym::domain::episode::{
    run_episode, HoldPolicy, RandomPolicy, ScriptedPolicy, ThresholdRule,
};
use candlegym::domain::error::GymError;
use candlegym::domain::metrics::EpisodeReport;
use candlegym::ports::data_port::DataPort;
use common::*;
use std::sync::Arc;
use std::thread;

mod full_episode {
    use super::*;

    #[test]
    fn mock_data_port_to_report() {
        let port = MockDataPort::new(generate_prices(60, 100.0, 0.5));
        let data = Arc::new(port.load_market_data().unwrap());
        let mut env = TradingEnvironment::new(data, small_config()).unwrap();

        let mut script = ScriptedPolicy::new(vec![Action::Buy, Action::Hold, Action::Hold, Action::Close]);
        let run = run_episode(&mut env, &mut script).unwrap();
        let report = EpisodeReport::compute(&run, 252.0);

        assert_eq!(run.termination, Termination::EndOfData);
        assert_eq!(run.steps(), env.tradable_steps() + 1);
        assert_eq!(report.trades, 1);
        assert_eq!(report.trades_won, 1);
        assert_eq!(report.direction_changes, 2);
        assert!(report.total_return_pct > 0.0);
        assert_relative_eq!(report.final_net_worth, *run.equity_curve.last().unwrap());
    }

    #[test]
    fn data_port_error_surfaces() {
        let port = MockDataPort::new(vec![]).with_error("exchange offline");
        let err = port.load_market_data().unwrap_err();
        assert!(matches!(err, GymError::Dataset { reason } if reason == "exchange offline"));
    }

    #[test]
    fn hold_policy_report_is_flat() {
        let mut env = make_env(&generate_prices(40, 100.0, 1.0));
        let run = run_episode(&mut env, &mut HoldPolicy).unwrap();
        let report = EpisodeReport::compute(&run, 252.0);
        assert_relative_eq!(report.total_return_pct, 0.0);
        assert_relative_eq!(report.max_drawdown_pct, 0.0);
        assert_eq!(report.direction_changes, 0);
        assert_eq!(report.trades, 0);
    }

    #[test]
    fn open_position_at_end_is_left_open() {
        let mut env = make_env(&generate_prices(20, 100.0, 1.0));
        let mut script = ScriptedPolicy::new(vec![Action::Buy]);
        let run = run_episode(&mut env, &mut script).unwrap();
        assert!(run.trades.is_empty());
        assert_eq!(*run.sides.last().unwrap(), Side::Long);
        assert!(run.final_net_worth() > 10_000.0);
    }

    #[test]
    fn crash_path_ends_bankrupt() {
        let mut prices = generate_prices(10, 100.0, 0.0);
        prices.extend(generate_prices(20, 100.0, -4.0));
        let mut env = make_env(&prices);
        let mut script = ScriptedPolicy::new(vec![Action::Buy]);
        let run = run_episode(&mut env, &mut script).unwrap();
        let report = EpisodeReport::compute(&run, 252.0);

        assert_eq!(run.termination, Termination::Bankrupt);
        assert!(report.max_drawdown_pct >= 50.0);
        assert!(run.final_net_worth() <= 5_000.0);
        assert_relative_eq!(*run.rewards.last().unwrap(), -100.0);
    }

    #[test]
    fn threshold_rule_trades_momentum() {
        let prices: Vec<f64> = (0..80)
            .map(|i| 100.0 + if (i / 5) % 2 == 0 { i as f64 * 0.1 } else { -(i as f64) * 0.05 })
            .collect();
        let mut env = make_env(&prices);
        let mut rule = ThresholdRule {
            column: 0,
            threshold: 0.001,
            action_set: ActionSet::FourWay,
        };
        let run = run_episode(&mut env, &mut rule).unwrap();
        assert!(!run.trades.is_empty());
        assert!(EpisodeReport::compute(&run, 252.0).direction_changes > 0);
    }
}

mod shared_data {
    use super::*;

    #[test]
    fn independent_environments_share_read_only_data() {
        let data = Arc::new(make_market(&generate_prices(120, 100.0, 0.25), 3));

        let handles: Vec<_> = (0..4u64)
            .map(|seed| {
                let data = Arc::clone(&data);
                thread::spawn(move || {
                    let mut env = TradingEnvironment::new(data, small_config()).unwrap();
                    let mut policy = RandomPolicy::new(seed, ActionSet::FourWay);
                    run_episode(&mut env, &mut policy).unwrap()
                })
            })
            .collect();

        let runs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for run in &runs {
            assert_eq!(run.equity_curve[0], 10_000.0);
        }

        let mut env = TradingEnvironment::new(Arc::clone(&data), small_config()).unwrap();
        let replay = run_episode(&mut env, &mut RandomPolicy::new(2, ActionSet::FourWay)).unwrap();
        assert_eq!(replay, runs[2]);
    }

    #[test]
    fn reset_replays_identically() {
        let mut env = make_env(&generate_prices(50, 100.0, 0.3));
        let first = run_episode(&mut env, &mut RandomPolicy::new(9, ActionSet::ThreeWay)).unwrap();
        let second = run_episode(&mut env, &mut RandomPolicy::new(9, ActionSet::ThreeWay)).unwrap();
        assert_eq!(first, second);
        assert_eq!(env.observation_shape().element_count(), 9);
    }
}

mod exports {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn csv_dataset_runs_and_exports() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(40, 50.0, 0.2));
        let adapter = CsvDatasetAdapter::new(dataset).with_exclude(vec!["timestamp".into()]);
        let data = Arc::new(adapter.load_market_data().unwrap());
        assert_eq!(data.frame().columns(), &["close", "momentum", "volume"]);

        let mut env = TradingEnvironment::new(data, small_config()).unwrap();
        let mut script = ScriptedPolicy::new(vec![
            Action::Buy,
            Action::Hold,
            Action::Sell,
            Action::Hold,
            Action::Close,
        ]);
        let run = run_episode(&mut env, &mut script).unwrap();
        assert_eq!(run.trades.len(), 2);

        let equity_path = dir.path().join("equity.csv");
        let trades_path = dir.path().join("trades.csv");
        write_equity_curve(&equity_path, &run).unwrap();
        write_trades(&trades_path, &run.trades).unwrap();

        let equity = std::fs::read_to_string(&equity_path).unwrap();
        let mut lines = equity.lines();
        assert_eq!(lines.next(), Some("step,net_worth,position,reward"));
        assert!(lines.next().unwrap().starts_with("0,10000"));
        assert_eq!(equity.lines().count(), run.equity_curve.len() + 1);

        let trades = std::fs::read_to_string(&trades_path).unwrap();
        let rows: Vec<&str> = trades.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("entry_step,exit_step,side"));
        assert!(rows[1].contains(",LONG,"));
        assert!(rows[2].contains(",SHORT,"));
    }
}
