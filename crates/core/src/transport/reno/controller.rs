//! Reno window growth.

use crate::transport::connection::{Connection, PathIndex, Subflow};

/// Name the strategy registers under.
pub const STRATEGY_NAME: &str = "reno";

/// Smallest slow start threshold handed out after a loss.
const MIN_SSTHRESH: u32 = 2;

/// Stateless Reno controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenoController;

impl RenoController {
    /// Slow start threshold after a loss: half the window, at least two.
    pub fn ssthresh(subflow: &Subflow) -> u32 {
        (subflow.cwnd() >> 1).max(MIN_SSTHRESH)
    }

    /// Per-ACK window growth for `path`.
    pub fn on_ack(&self, conn: &mut Connection, path: PathIndex, acked: u32) {
        match conn.subflow_mut(path) {
            Some(subflow) => Self::cong_avoid(subflow, acked),
            None => tracing::trace!(%path, "ACK for unknown path ignored"),
        }
    }

    /// Slow start, then additive increase with the leftover ACKed packets.
    ///
    /// Reno leaves slow start once `cwnd` reaches `ssthresh`, so the flight
    /// guard follows the same boundary.
    pub fn cong_avoid(subflow: &mut Subflow, acked: u32) {
        let slow_start = subflow.cwnd() < subflow.ssthresh();
        if !subflow.is_cwnd_limited_in(slow_start) {
            return;
        }

        let mut acked = acked;
        if slow_start {
            acked = Self::slow_start(subflow, acked);
            if acked == 0 {
                return;
            }
        }
        let w = subflow.cwnd();
        Self::cong_avoid_ai(subflow, w, acked);
    }

    /// Grows the window by `acked` up to `ssthresh`.
    ///
    /// Returns the ACKed packets left over once `ssthresh` is reached.
    pub fn slow_start(subflow: &mut Subflow, acked: u32) -> u32 {
        let before = subflow.cwnd();
        let target = before.saturating_add(acked).min(subflow.ssthresh());
        let used = target.saturating_sub(before).min(acked);
        subflow.set_cwnd(target.max(before));
        acked - used
    }

    /// Additive increase: one packet per `w` ACKed packets.
    pub fn cong_avoid_ai(subflow: &mut Subflow, w: u32, acked: u32) {
        let w = w.max(1);
        if subflow.cwnd_cnt >= w {
            subflow.cwnd_cnt = 0;
            subflow.grow_cwnd(1);
        }

        subflow.cwnd_cnt = subflow.cwnd_cnt.saturating_add(acked);
        if subflow.cwnd_cnt >= w {
            let delta = subflow.cwnd_cnt / w;
            subflow.cwnd_cnt -= delta * w;
            subflow.grow_cwnd(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::connection::SubflowConfig;

    fn subflow(cwnd: u32, ssthresh: u32) -> Subflow {
        let mut sf = Subflow::established(PathIndex(0), &SubflowConfig::default(), 50_000)
            .with_cwnd(cwnd)
            .with_ssthresh(ssthresh);
        // Keep the window fully used so growth is not suppressed.
        sf.on_send(cwnd);
        sf
    }

    #[test]
    fn test_ssthresh_halves_window() {
        assert_eq!(RenoController::ssthresh(&subflow(40, 100)), 20);
        assert_eq!(RenoController::ssthresh(&subflow(3, 100)), 2);
        assert_eq!(RenoController::ssthresh(&subflow(1, 100)), 2);
    }

    #[test]
    fn test_slow_start_growth() {
        let mut sf = subflow(10, 100);
        RenoController::cong_avoid(&mut sf, 4);
        assert_eq!(sf.cwnd(), 14);
        assert_eq!(sf.cwnd_cnt(), 0);
    }

    #[test]
    fn test_slow_start_stops_at_ssthresh() {
        let mut sf = subflow(10, 12);
        let leftover = RenoController::slow_start(&mut sf, 5);
        assert_eq!(sf.cwnd(), 12);
        assert_eq!(leftover, 3);
    }

    #[test]
    fn test_leftover_feeds_additive_increase() {
        let mut sf = subflow(10, 12);
        RenoController::cong_avoid(&mut sf, 5);
        assert_eq!(sf.cwnd(), 12);
        assert_eq!(sf.cwnd_cnt(), 3);
    }

    #[test]
    fn test_additive_increase_one_per_window() {
        let mut sf = subflow(10, 5);
        for _ in 0..9 {
            RenoController::cong_avoid(&mut sf, 1);
        }
        assert_eq!(sf.cwnd(), 10);
        RenoController::cong_avoid(&mut sf, 1);
        assert_eq!(sf.cwnd(), 11);
        assert_eq!(sf.cwnd_cnt(), 0);
    }

    #[test]
    fn test_large_ack_grows_multiple_packets() {
        let mut sf = subflow(10, 5);
        RenoController::cong_avoid_ai(&mut sf, 10, 25);
        assert_eq!(sf.cwnd(), 12);
        assert_eq!(sf.cwnd_cnt(), 5);
    }

    #[test]
    fn test_not_cwnd_limited_no_growth() {
        let mut sf = Subflow::established(PathIndex(0), &SubflowConfig::default(), 50_000)
            .with_cwnd(10)
            .with_ssthresh(5);
        RenoController::cong_avoid(&mut sf, 10);
        assert_eq!(sf.cwnd(), 10);
    }

    #[test]
    fn test_window_at_ssthresh_needs_full_use() {
        // Six of ten packets in flight: enough for the slow start guard,
        // not for congestion avoidance.
        let mut sf = Subflow::established(PathIndex(0), &SubflowConfig::default(), 50_000)
            .with_cwnd(10)
            .with_ssthresh(10);
        sf.on_send(6);
        RenoController::cong_avoid(&mut sf, 20);
        assert_eq!(sf.cwnd(), 10);
        assert_eq!(sf.cwnd_cnt(), 0);

        sf.on_send(4);
        RenoController::cong_avoid(&mut sf, 10);
        assert_eq!(sf.cwnd(), 11);
    }

    #[test]
    fn test_growth_respects_clamp() {
        let config = SubflowConfig {
            cwnd_clamp: 11,
            ..Default::default()
        };
        let mut sf = Subflow::established(PathIndex(0), &config, 50_000)
            .with_cwnd(10)
            .with_ssthresh(100);
        sf.on_send(10);
        RenoController::cong_avoid(&mut sf, 50);
        assert_eq!(sf.cwnd(), 11);
    }

    #[test]
    fn test_unknown_path_ignored() {
        let mut conn = Connection::single_path(subflow(10, 100));
        RenoController.on_ack(&mut conn, PathIndex(9), 5);
        assert_eq!(conn.subflow(PathIndex(0)).unwrap().cwnd(), 10);
    }
}
