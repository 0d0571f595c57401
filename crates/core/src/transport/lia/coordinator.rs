//! Coupling coefficient computation.

use crate::transport::connection::{CouplingState, PathIndex, SubflowView};

use super::config::{ALPHA_SCALE_DEN, ALPHA_SCALE_NUM};
use super::fixed_point::{Alpha, Wide};

/// What a recomputation did to the coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// At most one usable path: alpha pinned to neutral.
    SingleFlow,
    /// No subflow was send-eligible: alpha left unchanged.
    NoEligibleSubflow,
    /// Alpha recomputed from the eligible subflows.
    Updated { best_path: PathIndex, alpha: Alpha },
    /// The denominator vanished; alpha fell back to neutral.
    ZeroDenominator { best_path: PathIndex },
}

/// The path maximizing `cwnd / srtt²`.
#[derive(Debug, Clone, Copy)]
struct BestPath {
    path_index: PathIndex,
    cwnd: u32,
    srtt_us: u32,
    candidate: Wide,
}

/// Stateless coefficient computation over a connection's subflows.
pub struct AlphaCoordinator;

impl AlphaCoordinator {
    /// Recomputes alpha from `subflows` and stores it in `coupling`.
    ///
    /// `subflows` is walked at most three times and must yield every member
    /// of the connection, eligible or not. Never fails: degenerate inputs
    /// leave a stale or neutral coefficient.
    pub fn recompute<I>(
        coupling: &mut CouplingState,
        established_count: usize,
        subflows: I,
    ) -> RecomputeOutcome
    where
        I: Iterator<Item = SubflowView> + Clone,
    {
        coupling.recomputations += 1;

        if established_count <= 1 {
            coupling.alpha = Alpha::NEUTRAL;
            tracing::trace!(established_count, "Single usable path, alpha neutral");
            return RecomputeOutcome::SingleFlow;
        }

        let Some(best) = Self::best_path(subflows.clone()) else {
            tracing::trace!(
                established_count,
                alpha = coupling.alpha.raw(),
                "No send-eligible subflow, keeping alpha"
            );
            return RecomputeOutcome::NoEligibleSubflow;
        };

        let denominator = Self::denominator(subflows.clone(), best.srtt_us);
        let (alpha, outcome) = match Self::coefficient(best.cwnd, denominator) {
            Some(alpha) => (
                alpha,
                RecomputeOutcome::Updated {
                    best_path: best.path_index,
                    alpha,
                },
            ),
            None => {
                Self::report_zero_denominator(established_count, subflows);
                coupling.zero_denominator_events += 1;
                (
                    Alpha::NEUTRAL,
                    RecomputeOutcome::ZeroDenominator {
                        best_path: best.path_index,
                    },
                )
            }
        };

        coupling.alpha = alpha;
        coupling.best_path = Some(best.path_index);
        tracing::trace!(
            best_path = %best.path_index,
            best_cwnd = best.cwnd,
            best_rtt_us = best.srtt_us,
            alpha = alpha.raw(),
            "Alpha recomputed"
        );
        outcome
    }

    /// Scans eligible subflows for the largest `cwnd / srtt²`.
    ///
    /// Ties keep the first subflow encountered.
    fn best_path<I>(subflows: I) -> Option<BestPath>
    where
        I: Iterator<Item = SubflowView>,
    {
        let mut best: Option<BestPath> = None;
        for view in subflows.filter(SubflowView::is_send_eligible) {
            let candidate = Wide::scaled(view.cwnd, ALPHA_SCALE_NUM)
                .checked_div(Wide::squared(view.srtt_us))
                .unwrap_or(Wide::ZERO);
            if best.is_some_and(|b| candidate <= b.candidate) {
                continue;
            }
            best = Some(BestPath {
                path_index: view.path_index,
                cwnd: view.cwnd,
                srtt_us: view.srtt_us,
                candidate,
            });
        }
        best
    }

    /// `(Σ (cwnd_i << DEN) * best_rtt / rtt_i)²` over eligible subflows.
    fn denominator<I>(subflows: I, best_rtt_us: u32) -> Wide
    where
        I: Iterator<Item = SubflowView>,
    {
        subflows
            .filter(SubflowView::is_send_eligible)
            .map(|view| {
                Wide::scaled(view.cwnd, ALPHA_SCALE_DEN)
                    .saturating_mul(best_rtt_us)
                    .checked_div_u32(view.srtt_us)
                    .unwrap_or(Wide::ZERO)
            })
            .fold(Wide::ZERO, Wide::saturating_add)
            .saturating_square()
    }

    /// `(best_cwnd << NUM) / denominator`, floored at the neutral value.
    ///
    /// `None` when the denominator is zero.
    pub(crate) fn coefficient(best_cwnd: u32, denominator: Wide) -> Option<Alpha> {
        if denominator.is_zero() {
            return None;
        }
        Wide::scaled(best_cwnd, ALPHA_SCALE_NUM)
            .checked_div(denominator)
            .map(|q| q.to_alpha().or_neutral())
    }

    pub(crate) fn report_zero_denominator<I>(established_count: usize, subflows: I)
    where
        I: Iterator<Item = SubflowView>,
    {
        tracing::error!(established_count, "Coupling denominator is zero");
        for view in subflows {
            tracing::error!(
                path = %view.path_index,
                state = ?view.state,
                srtt_us = view.srtt_us,
                cwnd = view.cwnd,
                "Subflow state at zero coupling denominator"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::connection::SubflowState;

    fn view(path: u8, cwnd: u32, srtt_us: u32) -> SubflowView {
        SubflowView {
            path_index: PathIndex(path),
            state: SubflowState::Established,
            cwnd,
            srtt_us,
            can_send: true,
        }
    }

    #[test]
    fn test_single_flow_pins_neutral() {
        let mut coupling = CouplingState {
            alpha: Alpha::from_raw(500),
            ..Default::default()
        };
        let views = [view(1, 10, 100), view(2, 50, 100)];
        let outcome = AlphaCoordinator::recompute(&mut coupling, 1, views.iter().copied());
        assert_eq!(outcome, RecomputeOutcome::SingleFlow);
        assert_eq!(coupling.alpha(), Alpha::NEUTRAL);
        assert_eq!(coupling.recomputations(), 1);
    }

    #[test]
    fn test_two_paths_known_value() {
        let mut coupling = CouplingState::default();
        let views = [view(1, 10, 100), view(2, 10, 200)];
        let outcome = AlphaCoordinator::recompute(&mut coupling, 2, views.iter().copied());
        assert_eq!(
            outcome,
            RecomputeOutcome::Updated {
                best_path: PathIndex(1),
                alpha: Alpha::from_raw(182),
            }
        );
        assert_eq!(coupling.best_path(), Some(PathIndex(1)));
    }

    #[test]
    fn test_identical_paths() {
        // alpha = cwnd / (n * cwnd)² scaled by 2^12: 4096 / (2² * 10) = 102
        let mut coupling = CouplingState::default();
        let views = [view(1, 10, 1_000), view(2, 10, 1_000)];
        AlphaCoordinator::recompute(&mut coupling, 2, views.iter().copied());
        assert_eq!(coupling.alpha(), Alpha::from_raw(102));
    }

    #[test]
    fn test_tie_keeps_first_subflow() {
        let mut coupling = CouplingState::default();
        let views = [view(3, 20, 500), view(7, 20, 500), view(9, 5, 500)];
        let outcome = AlphaCoordinator::recompute(&mut coupling, 3, views.iter().copied());
        assert!(matches!(
            outcome,
            RecomputeOutcome::Updated {
                best_path: PathIndex(3),
                ..
            }
        ));
    }

    #[test]
    fn test_zero_candidate_still_seeds_best_path() {
        // cwnd << 32 < srtt², so the candidate truncates to zero.
        let mut coupling = CouplingState::default();
        let views = [view(1, 1, u32::MAX), view(2, 1, u32::MAX)];
        let outcome = AlphaCoordinator::recompute(&mut coupling, 2, views.iter().copied());
        assert!(matches!(
            outcome,
            RecomputeOutcome::Updated {
                best_path: PathIndex(1),
                ..
            }
        ));
        assert!(coupling.alpha() >= Alpha::NEUTRAL);
    }

    #[test]
    fn test_ineligible_subflows_skipped() {
        let mut coupling = CouplingState::default();
        let mut blocked = view(1, 1_000, 10);
        blocked.can_send = false;
        let views = [blocked, view(2, 10, 100), view(3, 10, 0)];
        let outcome = AlphaCoordinator::recompute(&mut coupling, 3, views.iter().copied());
        // Only path 2 is eligible: alpha = (10 << 32) / (10 << 10)² = 4096 / 10
        assert_eq!(
            outcome,
            RecomputeOutcome::Updated {
                best_path: PathIndex(2),
                alpha: Alpha::from_raw(409),
            }
        );
    }

    #[test]
    fn test_no_eligible_subflow_keeps_alpha() {
        let mut coupling = CouplingState {
            alpha: Alpha::from_raw(77),
            ..Default::default()
        };
        let views = [view(1, 10, 0), view(2, 10, 0)];
        let outcome = AlphaCoordinator::recompute(&mut coupling, 2, views.iter().copied());
        assert_eq!(outcome, RecomputeOutcome::NoEligibleSubflow);
        assert_eq!(coupling.alpha(), Alpha::from_raw(77));
        assert_eq!(coupling.best_path(), None);
    }

    #[test]
    fn test_vanishing_quotient_floors_at_neutral() {
        let mut coupling = CouplingState::default();
        let views = [view(1, u32::MAX, 1), view(2, u32::MAX, 1)];
        AlphaCoordinator::recompute(&mut coupling, 2, views.iter().copied());
        assert_eq!(coupling.alpha(), Alpha::NEUTRAL);
    }

    #[test]
    fn test_coefficient_zero_denominator() {
        assert_eq!(AlphaCoordinator::coefficient(10, Wide::ZERO), None);
        assert_eq!(
            AlphaCoordinator::coefficient(1, Wide::scaled(1, 100)),
            Some(Alpha::NEUTRAL)
        );
    }

    #[test_log::test]
    fn test_report_zero_denominator_does_not_panic() {
        let views = [view(1, 10, 0), view(2, 0, 100)];
        AlphaCoordinator::report_zero_denominator(2, views.iter().copied());
    }
}
