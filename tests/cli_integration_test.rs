//! Drives the command line surface end to end against temp files.

mod common;

use candlegym::cli::{self, build_dataset_adapter, build_env_config, load_config, Cli};
use candlegym::domain::action::ActionSet;
use candlegym::domain::frame::ObservationLayout;
use candlegym::domain::reward::RewardPolicyKind;
use candlegym::ports::data_port::DataPort;
use clap::Parser;
use common::*;
use std::path::Path;
use tempfile::TempDir;

fn config_for(dataset: &Path, extra: &str) -> tempfile::NamedTempFile {
    write_temp_ini(&format!(
        "[environment]\nlookback_window = 4\ninitial_balance = 5000\n{extra}\n\
         [data]\npath = {}\nexclude = timestamp\n",
        dataset.display()
    ))
}

fn run_args(args: &[&str]) -> std::process::ExitCode {
    cli::run(Cli::try_parse_from(args).unwrap())
}

mod config_loading {
    use super::*;

    #[test]
    fn env_config_from_ini_file() {
        let file = write_temp_ini(
            "[environment]\nlookback_window = 12\naction_set = 3\nobservation = flat\nleverage = 2\n\
             [reward]\npolicy = mark_to_market_v1\n",
        );
        let adapter = load_config(file.path()).unwrap();
        let config = build_env_config(&adapter).unwrap();
        assert_eq!(config.lookback_window, 12);
        assert_eq!(config.action_set, ActionSet::ThreeWay);
        assert_eq!(config.observation, ObservationLayout::Flat);
        assert_eq!(config.reward.kind, RewardPolicyKind::MarkToMarketV1);
        assert_eq!(config.min_rows(), 15);
    }

    #[test]
    fn dataset_adapter_follows_data_section() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(20, 100.0, 1.0));
        let file = config_for(&dataset, "");
        let adapter = load_config(file.path()).unwrap();
        let data = build_dataset_adapter(&adapter, None)
            .unwrap()
            .load_market_data()
            .unwrap();
        assert_eq!(data.len(), 20);
        assert_eq!(data.frame().width(), 3);
        assert_eq!(data.prices().get(5), 105.0);
    }

    #[test]
    fn missing_config_file_is_exit_2() {
        let code = load_config(Path::new("/nonexistent/candlegym.ini")).err().unwrap();
        assert!(is_exit(code, 2));
    }
}

mod commands {
    use super::*;

    #[test]
    fn validate_accepts_good_config() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(20, 100.0, 1.0));
        let file = config_for(&dataset, "fee_rate = 0.001");
        let path = file.path().to_str().unwrap();
        assert!(is_exit(run_args(&["candlegym", "validate", "-c", path]), 0));
    }

    #[test]
    fn validate_rejects_bad_value() {
        let file = write_temp_ini("[environment]\nfee_rate = 2\n");
        let path = file.path().to_str().unwrap();
        assert!(is_exit(run_args(&["candlegym", "validate", "-c", path]), 2));
    }

    #[test]
    fn info_reports_dataset() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(30, 100.0, 1.0));
        let file = config_for(&dataset, "");
        let path = file.path().to_str().unwrap();
        assert!(is_exit(run_args(&["candlegym", "info", "-c", path]), 0));
    }

    #[test]
    fn backtest_writes_exports() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(40, 100.0, 0.5));
        let file = config_for(&dataset, "");
        let equity = dir.path().join("equity.csv");
        let trades = dir.path().join("trades.csv");

        let code = run_args(&[
            "candlegym",
            "backtest",
            "-c",
            file.path().to_str().unwrap(),
            "--policy",
            "scripted",
            "--script",
            "buy,hold,hold,close",
            "--equity-out",
            equity.to_str().unwrap(),
            "--trades-out",
            trades.to_str().unwrap(),
        ]);
        assert!(is_exit(code, 0));
        assert!(equity.exists());
        let trades = std::fs::read_to_string(trades).unwrap();
        assert_eq!(trades.lines().count(), 2);
    }

    #[test]
    fn backtest_threshold_policy_by_column_name() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(40, 100.0, 0.5));
        let file = config_for(&dataset, "");
        let code = run_args(&[
            "candlegym",
            "backtest",
            "-c",
            file.path().to_str().unwrap(),
            "--policy",
            "threshold",
            "--column",
            "momentum",
            "--threshold",
            "0.5",
        ]);
        assert!(is_exit(code, 0));
    }

    #[test]
    fn backtest_unknown_column_is_config_error() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(40, 100.0, 0.5));
        let file = config_for(&dataset, "");
        let code = run_args(&[
            "candlegym",
            "backtest",
            "-c",
            file.path().to_str().unwrap(),
            "--policy",
            "threshold",
            "--column",
            "sentiment",
        ]);
        assert!(is_exit(code, 2));
    }

    #[test]
    fn backtest_bad_script_is_config_error() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(40, 100.0, 0.5));
        let file = config_for(&dataset, "");
        let code = run_args(&[
            "candlegym",
            "backtest",
            "-c",
            file.path().to_str().unwrap(),
            "--policy",
            "scripted",
            "--script",
            "buy,moon",
        ]);
        assert!(is_exit(code, 2));
    }

    #[test]
    fn text_feature_column_is_dataset_error() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(40, 100.0, 0.5));
        let file = write_temp_ini(&format!("[data]\npath = {}\n", dataset.display()));
        let path = file.path().to_str().unwrap();
        assert!(is_exit(run_args(&["candlegym", "backtest", "-c", path]), 4));
    }

    #[test]
    fn short_dataset_is_data_error() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(6, 100.0, 0.5));
        let file = config_for(&dataset, "");
        let path = file.path().to_str().unwrap();
        assert!(is_exit(run_args(&["candlegym", "backtest", "-c", path]), 3));
    }

    #[test]
    fn data_override_replaces_configured_path() {
        let dir = TempDir::new().unwrap();
        let dataset = write_dataset(dir.path(), &generate_prices(40, 100.0, 0.5));
        let file = config_for(Path::new("/nonexistent/data.csv"), "");
        let code = run_args(&[
            "candlegym",
            "info",
            "-c",
            file.path().to_str().unwrap(),
            "-d",
            dataset.to_str().unwrap(),
        ]);
        assert!(is_exit(code, 0));
    }
}

mod wallet {
    use super::*;

    fn wallet_config(dir: &Path) -> tempfile::NamedTempFile {
        write_temp_ini(&format!(
            "[wallet]\npath = {}\nopening_balance = 100\nmin_reserve = 5\n",
            dir.join("wallet.json").display()
        ))
    }

    #[test]
    fn reserve_then_release_round_trip() {
        let dir = TempDir::new().unwrap();
        let file = wallet_config(dir.path());
        let path = file.path().to_str().unwrap();

        assert!(is_exit(run_args(&["candlegym", "wallet", "-c", path, "reserve"]), 0));
        let saved = std::fs::read_to_string(dir.path().join("wallet.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&saved).unwrap();
        assert_eq!(json["in_use"], 100.0);
        assert_eq!(json["balance"], 0.0);

        assert!(is_exit(run_args(&["candlegym", "wallet", "-c", path, "release", "103.5"]), 0));
        let saved = std::fs::read_to_string(dir.path().join("wallet.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&saved).unwrap();
        assert_eq!(json["balance"], 103.5);
    }

    #[test]
    fn missing_wallet_path_is_exit_2() {
        let file = write_temp_ini("[wallet]\nmin_reserve = 5\n");
        let path = file.path().to_str().unwrap();
        assert!(is_exit(run_args(&["candlegym", "wallet", "-c", path, "show"]), 2));
    }

    #[test]
    fn corrupt_wallet_is_exit_5() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("wallet.json"), "[]").unwrap();
        let file = wallet_config(dir.path());
        let path = file.path().to_str().unwrap();
        assert!(is_exit(run_args(&["candlegym", "wallet", "-c", path, "show"]), 5));
    }
}
