//! Per-subflow coupled window growth.

use crate::transport::connection::{CaState, Connection, PathIndex};
use crate::transport::reno::RenoController;

use super::fixed_point::Alpha;
use super::stats::LiaStats;

/// LIA subflow congestion controller.
///
/// Stateless: the coupling coefficient and the forced-recompute flag live on
/// the [`Connection`], the growth counter on each subflow. Connections that
/// are not multipath are handed to [`RenoController`] untouched.
///
/// ## Window growth
///
/// - **Slow start** (`cwnd <= ssthresh`): the window grows by the ACKed
///   packet count and alpha is recomputed on every ACK.
/// - **Congestion avoidance**: ACKed packets accumulate in the subflow's
///   growth counter. Once it reaches [`LiaController::growth_target`], the
///   window grows by one packet (up to the clamp) and the counter restarts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiaController;

impl LiaController {
    /// Resets the coupling state when a subflow joins a multipath connection.
    pub fn on_initialize(&self, conn: &mut Connection, path: PathIndex) {
        if !conn.is_multipath() {
            return;
        }
        conn.coupling.reset();
        tracing::debug!(%path, "Coupling state initialized");
    }

    /// Retransmission timeout on any subflow.
    pub fn on_loss_event(&self, conn: &mut Connection, path: PathIndex) {
        if !conn.is_multipath() {
            return;
        }
        let outcome = conn.recompute_alpha();
        tracing::debug!(%path, ?outcome, "Alpha recomputed after loss");
    }

    /// Called before the host changes the subflow's reliability state.
    pub fn on_reliability_state_change(
        &self,
        conn: &mut Connection,
        path: PathIndex,
        new_state: CaState,
    ) {
        if !conn.is_multipath() {
            return;
        }
        conn.coupling.forced_update = true;
        tracing::trace!(%path, ?new_state, "Forced alpha update scheduled");
    }

    /// Per-ACK window growth for `path`.
    pub fn on_ack(&self, conn: &mut Connection, path: PathIndex, acked: u32) {
        let Some(idx) = conn.position(path) else {
            tracing::trace!(%path, "ACK for unknown path ignored");
            return;
        };

        if !conn.is_multipath() {
            RenoController::cong_avoid(conn.subflow_at_mut(idx), acked);
            return;
        }

        let subflow = conn.subflow_at_mut(idx);
        if !subflow.is_cwnd_limited() {
            return;
        }

        if subflow.in_slow_start() {
            subflow.grow_cwnd(acked);
            conn.recompute_alpha();
            return;
        }

        if conn.coupling.take_forced() {
            let outcome = conn.recompute_alpha();
            tracing::debug!(%path, ?outcome, "Forced alpha recompute");
        }

        let established = conn.established_count();
        let alpha = conn.alpha();
        let subflow = conn.subflow_at_mut(idx);
        let target = Self::growth_target(alpha, established, subflow.cwnd());

        subflow.cwnd_cnt = subflow.cwnd_cnt.saturating_add(acked);
        if u64::from(subflow.cwnd_cnt) < target {
            return;
        }
        subflow.cwnd_cnt = 0;
        if subflow.increment_cwnd() {
            tracing::debug!(
                %path,
                cwnd = subflow.cwnd(),
                target,
                alpha = alpha.raw(),
                "Coupled window increment"
            );
            conn.recompute_alpha();
        }
    }

    /// ACKed packets needed for one window increment in congestion avoidance.
    ///
    /// With several usable paths this is `2^ALPHA_SCALE / alpha`, never less
    /// than the subflow's own window. With one path it is the window itself.
    pub fn growth_target(alpha: Alpha, established_count: usize, cwnd: u32) -> u64 {
        let cwnd = u64::from(cwnd);
        if established_count > 1 {
            alpha.growth_target().max(cwnd)
        } else {
            cwnd
        }
    }

    pub fn stats(&self, conn: &Connection) -> LiaStats {
        conn.stats()
    }
}
