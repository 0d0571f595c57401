//! Pluggable congestion control interface.
//!
//! The host stack drives every strategy through the same small set of hooks
//! ([`CongestionStrategy`]). Strategies are stateless: all per-connection state
//! lives on the [`Connection`] handed to each hook, so one strategy instance
//! serves any number of connections.
//!
//! ## Supported Algorithms
//!
//! - **LIA** (default): coupled congestion control for multipath connections.
//!   Single-path connections fall back to Reno behaviour.
//! - **Reno**: standard single-path slow start and additive increase.
//!
//! ## Usage
//!
//! ```
//! use mptcp_lia::{
//!     CongestionControlConfig, CongestionStrategy, Connection, PathIndex, Subflow,
//! };
//!
//! let config = CongestionControlConfig::default();
//! let controller = config.build();
//!
//! let mut conn = Connection::new_multipath();
//! let subflow = Subflow::established(PathIndex(1), &config.subflow_config(), 40_000);
//! conn.add_subflow(subflow).unwrap();
//! controller.initialize(&mut conn, PathIndex(1));
//!
//! controller.on_ack(&mut conn, PathIndex(1), 1);
//! assert_eq!(controller.name(), "lia");
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::connection::{
    CaState, Connection, CwndEvent, PathIndex, SubflowConfig, DEFAULT_INITIAL_CWND,
    INFINITE_SSTHRESH,
};
use super::errors::LiaError;
use super::lia::{self, LiaController, LiaStats};
use super::reno::{self, RenoController};

// =============================================================================
// Algorithm Identification
// =============================================================================

/// Identifies a congestion control algorithm in configuration and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum CongestionControlAlgorithm {
    /// Standard single-path Reno.
    Reno,

    /// Linked Increase Algorithm (RFC 6356).
    ///
    /// Couples congestion avoidance growth across the subflows of a
    /// multipath connection.
    #[default]
    Lia,
}

impl CongestionControlAlgorithm {
    /// Name the algorithm registers under.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reno => reno::STRATEGY_NAME,
            Self::Lia => lia::STRATEGY_NAME,
        }
    }
}

impl fmt::Display for CongestionControlAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CongestionControlAlgorithm {
    type Err = LiaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            reno::STRATEGY_NAME => Ok(Self::Reno),
            lia::STRATEGY_NAME => Ok(Self::Lia),
            _ => Err(LiaError::UnknownAlgorithm(s.to_string())),
        }
    }
}

// =============================================================================
// Congestion Strategy Trait
// =============================================================================

/// Hooks the host stack invokes on a congestion control strategy.
///
/// Every hook receives the connection exclusively, which makes the exclusive
/// borrow the per-connection critical section. Hooks addressing a path the
/// connection does not know are ignored.
///
/// The trait is object safe so strategies can be looked up by name at
/// runtime (see [`StrategyRegistry`](super::registry::StrategyRegistry)).
pub trait CongestionStrategy: Send + Sync {
    /// Name the strategy registers under.
    fn name(&self) -> &'static str;

    /// A subflow on `path` was created.
    fn initialize(&self, conn: &mut Connection, path: PathIndex);

    /// Slow start threshold to apply after a loss on `path`.
    ///
    /// Returns `None` when the connection has no such path.
    fn compute_ssthresh(&self, conn: &Connection, path: PathIndex) -> Option<u32>;

    /// `acked` packets were newly acknowledged on `path`.
    fn on_ack(&self, conn: &mut Connection, path: PathIndex, acked: u32);

    /// Window lifecycle event on `path`.
    fn on_cwnd_event(&self, conn: &mut Connection, path: PathIndex, event: CwndEvent);

    /// The reliability machinery is about to move `path` into `new_state`.
    fn on_reliability_state_change(
        &self,
        conn: &mut Connection,
        path: PathIndex,
        new_state: CaState,
    );
}

fn reno_ssthresh(conn: &Connection, path: PathIndex) -> Option<u32> {
    let ssthresh = conn.subflow(path).map(RenoController::ssthresh);
    if ssthresh.is_none() {
        tracing::trace!(%path, "ssthresh requested for unknown path");
    }
    ssthresh
}

// =============================================================================
// LiaController Implementation of CongestionStrategy
// =============================================================================

impl CongestionStrategy for LiaController {
    fn name(&self) -> &'static str {
        lia::STRATEGY_NAME
    }

    fn initialize(&self, conn: &mut Connection, path: PathIndex) {
        LiaController::on_initialize(self, conn, path)
    }

    fn compute_ssthresh(&self, conn: &Connection, path: PathIndex) -> Option<u32> {
        reno_ssthresh(conn, path)
    }

    fn on_ack(&self, conn: &mut Connection, path: PathIndex, acked: u32) {
        LiaController::on_ack(self, conn, path, acked)
    }

    fn on_cwnd_event(&self, conn: &mut Connection, path: PathIndex, event: CwndEvent) {
        if event == CwndEvent::Loss {
            LiaController::on_loss_event(self, conn, path);
        }
    }

    fn on_reliability_state_change(
        &self,
        conn: &mut Connection,
        path: PathIndex,
        new_state: CaState,
    ) {
        LiaController::on_reliability_state_change(self, conn, path, new_state)
    }
}

// =============================================================================
// RenoController Implementation of CongestionStrategy
// =============================================================================

impl CongestionStrategy for RenoController {
    fn name(&self) -> &'static str {
        reno::STRATEGY_NAME
    }

    fn initialize(&self, _conn: &mut Connection, _path: PathIndex) {}

    fn compute_ssthresh(&self, conn: &Connection, path: PathIndex) -> Option<u32> {
        reno_ssthresh(conn, path)
    }

    fn on_ack(&self, conn: &mut Connection, path: PathIndex, acked: u32) {
        RenoController::on_ack(self, conn, path, acked)
    }

    fn on_cwnd_event(&self, _conn: &mut Connection, _path: PathIndex, _event: CwndEvent) {}

    fn on_reliability_state_change(
        &self,
        _conn: &mut Connection,
        _path: PathIndex,
        _new_state: CaState,
    ) {
    }
}

// =============================================================================
// Congestion Controller Enum (Dispatch)
// =============================================================================

/// Congestion controller that dispatches to the configured algorithm.
///
/// Pattern matching gives access to algorithm-specific features such as
/// [`LiaController::stats`].
#[derive(Clone, Copy)]
pub enum CongestionController {
    Reno(RenoController),
    Lia(LiaController),
}

impl fmt::Debug for CongestionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CongestionController")
            .field(&self.algorithm())
            .finish()
    }
}

impl CongestionStrategy for CongestionController {
    fn name(&self) -> &'static str {
        self.algorithm().name()
    }

    fn initialize(&self, conn: &mut Connection, path: PathIndex) {
        match self {
            Self::Reno(c) => c.initialize(conn, path),
            Self::Lia(c) => c.initialize(conn, path),
        }
    }

    fn compute_ssthresh(&self, conn: &Connection, path: PathIndex) -> Option<u32> {
        match self {
            Self::Reno(c) => c.compute_ssthresh(conn, path),
            Self::Lia(c) => c.compute_ssthresh(conn, path),
        }
    }

    fn on_ack(&self, conn: &mut Connection, path: PathIndex, acked: u32) {
        match self {
            Self::Reno(c) => c.on_ack(conn, path, acked),
            Self::Lia(c) => c.on_ack(conn, path, acked),
        }
    }

    fn on_cwnd_event(&self, conn: &mut Connection, path: PathIndex, event: CwndEvent) {
        match self {
            Self::Reno(c) => c.on_cwnd_event(conn, path, event),
            Self::Lia(c) => c.on_cwnd_event(conn, path, event),
        }
    }

    fn on_reliability_state_change(
        &self,
        conn: &mut Connection,
        path: PathIndex,
        new_state: CaState,
    ) {
        match self {
            Self::Reno(c) => c.on_reliability_state_change(conn, path, new_state),
            Self::Lia(c) => c.on_reliability_state_change(conn, path, new_state),
        }
    }
}

impl CongestionController {
    pub fn algorithm(&self) -> CongestionControlAlgorithm {
        match self {
            Self::Reno(_) => CongestionControlAlgorithm::Reno,
            Self::Lia(_) => CongestionControlAlgorithm::Lia,
        }
    }

    /// Get a reference to the inner LIA controller if applicable.
    pub fn as_lia(&self) -> Option<&LiaController> {
        match self {
            Self::Reno(_) => None,
            Self::Lia(c) => Some(c),
        }
    }

    /// Get a reference to the inner Reno controller if applicable.
    pub fn as_reno(&self) -> Option<&RenoController> {
        match self {
            Self::Reno(c) => Some(c),
            Self::Lia(_) => None,
        }
    }

    /// Get LIA coupling statistics for `conn` if this is a LIA controller.
    pub fn lia_stats(&self, conn: &Connection) -> Option<LiaStats> {
        self.as_lia().map(|c| c.stats(conn))
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for creating congestion controllers and their subflows.
///
/// Loadable from TOML with kebab-case keys; missing keys take their defaults.
///
/// ```toml
/// algorithm = "lia"
/// initial-cwnd = 10
/// cwnd-clamp = 500
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CongestionControlConfig {
    /// Which algorithm to use.
    pub algorithm: CongestionControlAlgorithm,
    /// Initial congestion window (packets).
    pub initial_cwnd: u32,
    /// Initial slow start threshold (packets).
    pub initial_ssthresh: u32,
    /// Maximum congestion window (packets).
    pub cwnd_clamp: u32,
}

impl Default for CongestionControlConfig {
    fn default() -> Self {
        Self {
            algorithm: CongestionControlAlgorithm::default(),
            initial_cwnd: DEFAULT_INITIAL_CWND,
            initial_ssthresh: INFINITE_SSTHRESH,
            cwnd_clamp: u32::MAX,
        }
    }
}

impl CongestionControlConfig {
    /// Create a new configuration for the specified algorithm with defaults.
    pub fn new(algorithm: CongestionControlAlgorithm) -> Self {
        Self {
            algorithm,
            ..Default::default()
        }
    }

    /// Set the initial congestion window.
    pub fn with_initial_cwnd(mut self, cwnd: u32) -> Self {
        self.initial_cwnd = cwnd;
        self
    }

    /// Set the initial slow start threshold.
    pub fn with_initial_ssthresh(mut self, ssthresh: u32) -> Self {
        self.initial_ssthresh = ssthresh;
        self
    }

    /// Set the maximum congestion window.
    pub fn with_cwnd_clamp(mut self, clamp: u32) -> Self {
        self.cwnd_clamp = clamp;
        self
    }

    /// Rejects values no subflow could start with.
    pub fn validate(&self) -> Result<(), LiaError> {
        if self.cwnd_clamp == 0 {
            return Err(LiaError::Config("cwnd-clamp must be at least 1".into()));
        }
        if self.initial_cwnd == 0 {
            return Err(LiaError::Config("initial-cwnd must be at least 1".into()));
        }
        if self.initial_cwnd > self.cwnd_clamp {
            return Err(LiaError::Config(format!(
                "initial-cwnd {} exceeds cwnd-clamp {}",
                self.initial_cwnd, self.cwnd_clamp
            )));
        }
        if self.initial_ssthresh == 0 {
            return Err(LiaError::Config("initial-ssthresh must be at least 1".into()));
        }
        Ok(())
    }

    /// Window parameters for subflows created under this configuration.
    pub fn subflow_config(&self) -> SubflowConfig {
        SubflowConfig {
            initial_cwnd: self.initial_cwnd,
            initial_ssthresh: self.initial_ssthresh,
            cwnd_clamp: self.cwnd_clamp,
        }
    }

    /// Build a congestion controller from this configuration.
    pub fn build(&self) -> CongestionController {
        match self.algorithm {
            CongestionControlAlgorithm::Reno => CongestionController::Reno(RenoController),
            CongestionControlAlgorithm::Lia => CongestionController::Lia(LiaController),
        }
    }

    /// Build a congestion controller wrapped in `Arc` for shared ownership.
    pub fn build_arc(&self) -> Arc<CongestionController> {
        Arc::new(self.build())
    }
}
