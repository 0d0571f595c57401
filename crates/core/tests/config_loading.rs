use std::io::Write;

use mptcp_lia::config::{Config, ConfigArgs};
use mptcp_lia::simulation::{MultipathSimulation, Scenario};
use mptcp_lia::{CongestionControlAlgorithm, CongestionStrategy, LiaError};
use testresult::TestResult;
use tracing::level_filters::LevelFilter;

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn file_then_arguments_then_build() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        &dir,
        "config.toml",
        r#"
        log-level = "trace"

        [congestion-control]
        algorithm = "reno"
        initial-cwnd = 2
        "#,
    );

    let config = ConfigArgs {
        config: Some(path),
        initial_cwnd: Some(3),
        ..Default::default()
    }
    .build()?;

    assert_eq!(config.log_level, LevelFilter::TRACE);
    assert_eq!(config.algorithm(), CongestionControlAlgorithm::Reno);
    assert_eq!(config.congestion_control.initial_cwnd, 3);

    let controller = config.congestion_control.build();
    assert_eq!(controller.name(), "reno");
    Ok(())
}

#[test]
fn saved_config_loads_back() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = Config::default();
    let path = write_file(&dir, "saved.toml", &config.to_toml_string()?);
    assert_eq!(Config::load(&path)?, config);
    Ok(())
}

#[test]
fn scenario_file_drives_a_simulation() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_file(
        &dir,
        "scenario.toml",
        r#"
        seed = 11
        rounds = 40

        [[path]]
        name = "fiber"
        rtt-us = 8000
        capacity = 80

        [[path]]
        name = "satellite"
        rtt-us = 600000
        capacity = 30
        loss-rate = 0.02
        join-round = 10
        "#,
    );

    let scenario = Scenario::load(&path)?;
    assert_eq!(scenario.seed, 11);
    assert_eq!(scenario.paths.len(), 2);

    let mut sim = MultipathSimulation::from_scenario(Default::default(), &scenario)?;
    let report = sim.run(scenario.rounds);
    assert_eq!(report.paths[0].active_rounds, 40);
    assert_eq!(report.paths[1].active_rounds, 30);
    Ok(())
}

#[test]
fn empty_scenario_is_rejected() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = write_file(&dir, "empty.toml", "rounds = 10\npath = []\n");
    let err = Scenario::load(&path).unwrap_err();
    assert!(matches!(err, LiaError::Config(_)));
    Ok(())
}
