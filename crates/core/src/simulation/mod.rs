//! Deterministic multipath simulation.
//!
//! Drives a [`CongestionController`] over a [`Connection`] the way a host
//! transport stack would, one round trip at a time:
//!
//! 1. Subflows join or leave according to their [`PathProfile`].
//! 2. Every subflow sends a full window and samples a fresh RTT.
//! 3. ACKs are delivered one packet at a time, interleaved across paths.
//! 4. Losses trigger fast recovery (reliability hook, ssthresh, window
//!    reduction); a fully lost window is a retransmission timeout.
//!
//! All randomness comes from one seeded [`SimulationRng`], so a seed and a
//! set of profiles fully determine the [`SimulationReport`].

mod network;
mod rng;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::transport::{
    Alpha, CaState, CongestionControlAlgorithm, CongestionControlConfig, CongestionController,
    CongestionStrategy, Connection, CwndEvent, LiaError, LiaStats, PathIndex, Subflow,
    SubflowState,
};

pub use network::{PathProfile, RoundOutcome};
pub use rng::SimulationRng;

/// Default seed of scenarios that do not specify one.
pub const DEFAULT_SEED: u64 = 0x5eed_11a;

/// Paths, seed and length of one simulation run, loadable from TOML.
///
/// ```toml
/// seed = 7
/// rounds = 200
///
/// [[path]]
/// name = "wifi"
/// rtt-us = 20000
/// capacity = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Scenario {
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub rounds: u32,
    #[serde(rename = "path")]
    pub paths: Vec<PathProfile>,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for Scenario {
    /// A Wi-Fi and a cellular path sharing one connection.
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            rounds: 300,
            paths: vec![PathProfile::wifi(), PathProfile::cellular()],
        }
    }
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LiaError> {
        let content = std::fs::read_to_string(path)?;
        let scenario: Self =
            toml::from_str(&content).map_err(|e| LiaError::Config(e.message().to_string()))?;
        if scenario.paths.is_empty() {
            return Err(LiaError::Config("scenario has no paths".into()));
        }
        Ok(scenario)
    }
}

/// Per-path outcome of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PathReport {
    pub name: String,
    pub path: Option<PathIndex>,
    pub delivered: u64,
    pub lost: u64,
    pub recoveries: u32,
    pub timeouts: u32,
    pub active_rounds: u32,
    pub max_cwnd: u32,
    /// Window at the end of the run, `None` if the subflow had left.
    pub final_cwnd: Option<u32>,
    #[serde(skip)]
    cwnd_sum: u64,
}

impl PathReport {
    /// Mean window over the rounds the path was active.
    pub fn mean_cwnd(&self) -> f64 {
        if self.active_rounds == 0 {
            0.0
        } else {
            self.cwnd_sum as f64 / f64::from(self.active_rounds)
        }
    }

    fn sample(&mut self, cwnd: u32) {
        self.active_rounds += 1;
        self.cwnd_sum += u64::from(cwnd);
        self.max_cwnd = self.max_cwnd.max(cwnd);
    }
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub algorithm: CongestionControlAlgorithm,
    pub multipath: bool,
    pub seed: u64,
    pub rounds: u32,
    pub paths: Vec<PathReport>,
    /// Raw coupling coefficient at the end of every round.
    pub alpha_trace: Vec<u64>,
    pub final_alpha: Alpha,
    /// Coupling statistics, for LIA runs.
    pub lia: Option<LiaStats>,
}

impl SimulationReport {
    pub fn total_delivered(&self) -> u64 {
        self.paths.iter().map(|p| p.delivered).sum()
    }

    pub fn total_lost(&self) -> u64 {
        self.paths.iter().map(|p| p.lost).sum()
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "algorithm={} multipath={} seed={:#x} rounds={}",
            self.algorithm, self.multipath, self.seed, self.rounds
        )?;
        writeln!(
            f,
            "{:<12} {:>10} {:>8} {:>6} {:>6} {:>9} {:>8} {:>6}",
            "path", "delivered", "lost", "recov", "rto", "mean-cwnd", "max-cwnd", "final"
        )?;
        for p in &self.paths {
            let final_cwnd = p
                .final_cwnd
                .map_or_else(|| "-".to_string(), |c| c.to_string());
            writeln!(
                f,
                "{:<12} {:>10} {:>8} {:>6} {:>6} {:>9.1} {:>8} {:>6}",
                p.name,
                p.delivered,
                p.lost,
                p.recoveries,
                p.timeouts,
                p.mean_cwnd(),
                p.max_cwnd,
                final_cwnd
            )?;
        }
        writeln!(
            f,
            "delivered={} lost={} alpha={}",
            self.total_delivered(),
            self.total_lost(),
            self.final_alpha
        )?;
        if let Some(lia) = &self.lia {
            write!(
                f,
                "recomputations={} zero-denominator={}",
                lia.recomputations, lia.zero_denominator_events
            )?;
        }
        Ok(())
    }
}

/// Round-based driver of one connection.
#[derive(Debug)]
pub struct MultipathSimulation {
    config: CongestionControlConfig,
    controller: CongestionController,
    conn: Connection,
    profiles: Vec<PathProfile>,
    rng: SimulationRng,
    round: u32,
    paths: Vec<PathReport>,
    alpha_trace: Vec<u64>,
}

fn path_index(i: usize) -> PathIndex {
    PathIndex(i as u8 + 1)
}

impl MultipathSimulation {
    /// A multipath connection over `profiles`.
    pub fn new(
        config: CongestionControlConfig,
        profiles: Vec<PathProfile>,
        seed: u64,
    ) -> Result<Self, LiaError> {
        config.validate()?;
        if profiles.is_empty() {
            return Err(LiaError::Config("at least one path is required".into()));
        }
        if profiles.len() > usize::from(u8::MAX) {
            return Err(LiaError::Config(format!(
                "at most {} paths are supported",
                u8::MAX
            )));
        }
        Ok(Self::with_connection(
            config,
            Connection::new_multipath(),
            profiles,
            seed,
        ))
    }

    /// A conventional single-path connection over `profile`.
    ///
    /// The subflow exists for the whole run; join and leave rounds are
    /// ignored.
    pub fn single_path(
        config: CongestionControlConfig,
        profile: PathProfile,
        seed: u64,
    ) -> Result<Self, LiaError> {
        config.validate()?;
        let profile = PathProfile {
            join_round: 0,
            leave_round: None,
            ..profile
        };
        let subflow = Subflow::established(path_index(0), &config.subflow_config(), profile.rtt_us);
        let mut sim =
            Self::with_connection(config, Connection::single_path(subflow), vec![profile], seed);
        sim.controller.initialize(&mut sim.conn, path_index(0));
        Ok(sim)
    }

    pub fn from_scenario(
        config: CongestionControlConfig,
        scenario: &Scenario,
    ) -> Result<Self, LiaError> {
        Self::new(config, scenario.paths.clone(), scenario.seed)
    }

    fn with_connection(
        config: CongestionControlConfig,
        conn: Connection,
        profiles: Vec<PathProfile>,
        seed: u64,
    ) -> Self {
        let paths = profiles
            .iter()
            .map(|p| PathReport {
                name: p.name.clone(),
                ..Default::default()
            })
            .collect();
        Self {
            controller: config.build(),
            config,
            conn,
            profiles,
            rng: SimulationRng::new(seed),
            round: 0,
            paths,
            alpha_trace: Vec::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Runs `rounds` more round trips and reports on the whole run so far.
    pub fn run(&mut self, rounds: u32) -> SimulationReport {
        for _ in 0..rounds {
            self.step();
        }
        let report = self.report();
        tracing::info!(
            algorithm = %report.algorithm,
            rounds = report.rounds,
            delivered = report.total_delivered(),
            lost = report.total_lost(),
            alpha = report.final_alpha.raw(),
            "Simulation finished"
        );
        report
    }

    /// Simulates one round trip.
    pub fn step(&mut self) {
        self.sync_membership();
        self.finish_recovery();

        let mut fates = Vec::with_capacity(self.profiles.len());
        for (i, profile) in self.profiles.iter().enumerate() {
            let path = path_index(i);
            let Some(subflow) = self.conn.subflow_mut(path) else {
                continue;
            };
            subflow.set_srtt_us(profile.sample_rtt_us(&self.rng));
            subflow.new_window();
            let window = subflow.cwnd().saturating_sub(subflow.packets_out());
            subflow.on_send(window);
            fates.push((i, path, profile.transmit(window, &self.rng)));
        }

        let most_delivered = fates
            .iter()
            .map(|(_, _, outcome)| outcome.delivered)
            .max()
            .unwrap_or(0);
        for k in 0..most_delivered {
            for &(i, path, outcome) in &fates {
                if k >= outcome.delivered {
                    continue;
                }
                if let Some(subflow) = self.conn.subflow_mut(path) {
                    subflow.on_acked(1);
                }
                self.controller.on_ack(&mut self.conn, path, 1);
                self.paths[i].delivered += 1;
            }
        }

        for &(i, path, outcome) in &fates {
            if outcome.lost == 0 {
                continue;
            }
            if let Some(subflow) = self.conn.subflow_mut(path) {
                subflow.on_acked(outcome.lost);
            }
            self.paths[i].lost += u64::from(outcome.lost);
            if outcome.is_timeout() {
                self.enter_loss(path);
                self.paths[i].timeouts += 1;
            } else {
                self.enter_recovery(path);
                self.paths[i].recoveries += 1;
            }
        }

        for (i, report) in self.paths.iter_mut().enumerate() {
            if let Some(subflow) = self.conn.subflow(path_index(i)) {
                report.sample(subflow.cwnd());
            }
        }
        self.alpha_trace.push(self.conn.alpha().raw());
        tracing::trace!(
            round = self.round,
            alpha = self.conn.alpha().raw(),
            "Round complete"
        );
        self.round += 1;
    }

    pub fn report(&self) -> SimulationReport {
        let mut paths = self.paths.clone();
        for (i, report) in paths.iter_mut().enumerate() {
            let path = path_index(i);
            report.final_cwnd = self.conn.subflow(path).map(Subflow::cwnd);
            if report.active_rounds > 0 {
                report.path = Some(path);
            }
        }
        SimulationReport {
            algorithm: self.config.algorithm,
            multipath: self.conn.is_multipath(),
            seed: self.rng.seed(),
            rounds: self.round,
            paths,
            alpha_trace: self.alpha_trace.clone(),
            final_alpha: self.conn.alpha(),
            lia: self.controller.lia_stats(&self.conn),
        }
    }

    /// Admits subflows whose join round arrived and tears down those whose
    /// leave round did.
    fn sync_membership(&mut self) {
        if !self.conn.is_multipath() {
            return;
        }
        let subflow_config = self.config.subflow_config();
        for (i, profile) in self.profiles.iter().enumerate() {
            let path = path_index(i);
            let present = self.conn.subflow(path).is_some();
            let active = profile.is_active(self.round);
            if active && !present {
                let srtt_us = profile.sample_rtt_us(&self.rng);
                let subflow = Subflow::established(path, &subflow_config, srtt_us);
                if let Err(error) = self.conn.add_subflow(subflow) {
                    tracing::error!(%path, %error, "Failed to admit subflow");
                    continue;
                }
                self.controller.initialize(&mut self.conn, path);
            } else if !active && present {
                if let Some(subflow) = self.conn.subflow_mut(path) {
                    subflow.set_state(SubflowState::Closing);
                }
                self.conn.remove_subflow(path);
            }
        }
    }

    /// Recovery episodes last one round trip.
    fn finish_recovery(&mut self) {
        let recovering: Vec<_> = self
            .conn
            .subflows()
            .iter()
            .filter(|s| s.ca_state() != CaState::Open)
            .map(Subflow::path_index)
            .collect();
        for path in recovering {
            self.set_ca_state(path, CaState::Open);
        }
    }

    fn set_ca_state(&mut self, path: PathIndex, state: CaState) {
        self.controller
            .on_reliability_state_change(&mut self.conn, path, state);
        if let Some(subflow) = self.conn.subflow_mut(path) {
            subflow.set_ca_state(state);
        }
    }

    /// Loss detected by duplicate ACKs: halve into fast recovery.
    fn enter_recovery(&mut self, path: PathIndex) {
        self.set_ca_state(path, CaState::Recovery);
        let Some(ssthresh) = self.controller.compute_ssthresh(&self.conn, path) else {
            return;
        };
        if let Some(subflow) = self.conn.subflow_mut(path) {
            subflow.set_ssthresh(ssthresh);
            subflow.set_cwnd(ssthresh);
            tracing::debug!(%path, ssthresh, "Fast recovery");
        }
    }

    /// Retransmission timeout: back to a one-packet window.
    fn enter_loss(&mut self, path: PathIndex) {
        let Some(ssthresh) = self.controller.compute_ssthresh(&self.conn, path) else {
            return;
        };
        if let Some(subflow) = self.conn.subflow_mut(path) {
            subflow.set_ssthresh(ssthresh);
            subflow.set_cwnd(1);
            subflow.cwnd_cnt = 0;
        }
        self.controller
            .on_cwnd_event(&mut self.conn, path, CwndEvent::Loss);
        self.set_ca_state(path, CaState::Loss);
        tracing::debug!(%path, ssthresh, "Retransmission timeout");
    }
}
