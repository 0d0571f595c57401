//! Path models for the multipath simulation.
//!
//! A path is reduced to what a window-based sender observes per round trip:
//! a base RTT (with optional jitter), a capacity in packets beyond which the
//! bottleneck queue overflows, and a random loss rate on top of that.

use serde::{Deserialize, Serialize};

use super::rng::SimulationRng;

/// Static description of one simulated path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathProfile {
    /// Label used in reports.
    pub name: String,
    /// Base round-trip time in microseconds.
    pub rtt_us: u32,
    /// Maximum RTT deviation added or removed per round, in microseconds.
    #[serde(default)]
    pub jitter_us: u32,
    /// Packets the path carries per round trip (bandwidth-delay product plus
    /// bottleneck buffer). Packets beyond it are dropped.
    pub capacity: u32,
    /// Probability that any single packet is lost.
    #[serde(default)]
    pub loss_rate: f64,
    /// Round at which the subflow joins the connection.
    #[serde(default)]
    pub join_round: u32,
    /// Round at which the subflow is torn down, if any.
    #[serde(default)]
    pub leave_round: Option<u32>,
}

impl PathProfile {
    pub fn new(name: impl Into<String>, rtt_us: u32, capacity: u32) -> Self {
        Self {
            name: name.into(),
            rtt_us,
            jitter_us: 0,
            capacity,
            loss_rate: 0.0,
            join_round: 0,
            leave_round: None,
        }
    }

    /// Short RTT, moderate capacity, some random loss.
    pub fn wifi() -> Self {
        Self::new("wifi", 20_000, 60)
            .with_jitter_us(4_000)
            .with_loss_rate(0.002)
    }

    /// Long RTT, lower capacity, nearly lossless.
    pub fn cellular() -> Self {
        Self::new("cellular", 70_000, 40)
            .with_jitter_us(10_000)
            .with_loss_rate(0.0005)
    }

    pub fn with_jitter_us(mut self, jitter_us: u32) -> Self {
        self.jitter_us = jitter_us;
        self
    }

    pub fn with_loss_rate(mut self, loss_rate: f64) -> Self {
        self.loss_rate = loss_rate;
        self
    }

    pub fn with_join_round(mut self, round: u32) -> Self {
        self.join_round = round;
        self
    }

    pub fn with_leave_round(mut self, round: u32) -> Self {
        self.leave_round = Some(round);
        self
    }

    /// Whether the subflow belongs to the connection during `round`.
    pub fn is_active(&self, round: u32) -> bool {
        round >= self.join_round && self.leave_round.map_or(true, |leave| round < leave)
    }

    /// RTT sample for one round, never zero.
    pub fn sample_rtt_us(&self, rng: &SimulationRng) -> u32 {
        let low = self.rtt_us.saturating_sub(self.jitter_us);
        let high = self.rtt_us.saturating_add(self.jitter_us);
        rng.gen_inclusive(low, high).max(1)
    }

    /// Decides the fate of a window of `sent` packets.
    pub fn transmit(&self, sent: u32, rng: &SimulationRng) -> RoundOutcome {
        let mut outcome = RoundOutcome::default();
        for i in 0..sent {
            if i >= self.capacity || rng.gen_bool(self.loss_rate) {
                outcome.lost += 1;
            } else {
                outcome.delivered += 1;
            }
        }
        outcome
    }
}

/// Fate of one window on one path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    pub delivered: u32,
    pub lost: u32,
}

impl RoundOutcome {
    /// Nothing got through: the sender only learns about it by timeout.
    pub fn is_timeout(&self) -> bool {
        self.delivered == 0 && self.lost > 0
    }
}
