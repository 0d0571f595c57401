//! LIA statistics and telemetry.

use serde::Serialize;

use crate::transport::connection::{Connection, PathIndex, SubflowStats};

use super::fixed_point::Alpha;

/// Snapshot of a connection's coupling state.
#[derive(Debug, Clone, Serialize)]
pub struct LiaStats {
    /// Current coupling coefficient.
    pub alpha: Alpha,
    /// Whether the next congestion avoidance ACK recomputes alpha.
    pub forced_update: bool,
    /// Total coefficient recomputations.
    pub recomputations: u64,
    /// Recomputations that hit a zero denominator.
    pub zero_denominator_events: u64,
    /// Path that anchored the last recomputation.
    pub best_path: Option<PathIndex>,
    /// Subflows usable for sending.
    pub established_count: usize,
    /// Per-subflow snapshots.
    pub subflows: Vec<SubflowStats>,
}

impl LiaStats {
    pub fn from_connection(conn: &Connection) -> Self {
        let coupling = conn.coupling();
        Self {
            alpha: coupling.alpha(),
            forced_update: coupling.forced_update(),
            recomputations: coupling.recomputations(),
            zero_denominator_events: coupling.zero_denominator_events(),
            best_path: coupling.best_path(),
            established_count: conn.established_count(),
            subflows: conn.subflows().iter().map(|s| s.stats()).collect(),
        }
    }

    /// Sum of the subflow windows, in packets.
    pub fn total_cwnd(&self) -> u64 {
        self.subflows.iter().map(|s| u64::from(s.cwnd)).sum()
    }
}
