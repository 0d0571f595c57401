//! Connection and subflow state shared between the host stack and strategies.
//!
//! A [`Connection`] is the meta-connection of one logical session. It owns
//! its member [`Subflow`]s and the per-connection [`CouplingState`]. Strategies
//! never keep state of their own: every hook receives `&mut Connection`, which
//! is also the per-connection critical section.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::LiaError;
use super::lia::{Alpha, AlphaCoordinator, LiaStats, RecomputeOutcome};

/// Slow start threshold of a fresh subflow ("infinite").
pub const INFINITE_SSTHRESH: u32 = 0x7fff_ffff;

/// Default initial congestion window, in packets (RFC 6928 IW10).
pub(crate) const DEFAULT_INITIAL_CWND: u32 = 10;

/// Identifier of a path within its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathIndex(pub u8);

impl fmt::Display for PathIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pi:{}", self.0)
    }
}

/// Lifecycle state of a subflow, owned by the subflow lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubflowState {
    /// Admitted but the handshake has not completed.
    #[default]
    PreEstablished,
    /// Usable for sending.
    Established,
    /// Being torn down.
    Closing,
}

/// Loss-recovery state of a subflow, owned by the reliability machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaState {
    #[default]
    Open,
    Disorder,
    /// Window reduced after an ECN or local congestion signal.
    Cwr,
    /// Fast recovery.
    Recovery,
    /// Retransmission timeout recovery.
    Loss,
}

/// Window lifecycle events signalled by the host.
///
/// Only [`CwndEvent::Loss`] is consumed by the coupled strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CwndEvent {
    /// First transmission with nothing in flight.
    TxStart,
    /// Window restart after idle.
    CwndRestart,
    /// End of congestion window reduction.
    CompleteCwr,
    /// Retransmission timeout.
    Loss,
    /// ECT set, but not CE marked.
    EcnNoCe,
    /// CE marked packet received.
    EcnIsCe,
    DelayedAck,
    NonDelayedAck,
}

/// Window growth phase, derived from `cwnd` and `ssthresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubflowPhase {
    SlowStart,
    CongestionAvoidance,
}

/// Initial window parameters for new subflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubflowConfig {
    /// Initial congestion window (packets).
    pub initial_cwnd: u32,
    /// Initial slow start threshold (packets).
    pub initial_ssthresh: u32,
    /// Hard ceiling on the congestion window (packets).
    pub cwnd_clamp: u32,
}

impl Default for SubflowConfig {
    fn default() -> Self {
        Self {
            initial_cwnd: DEFAULT_INITIAL_CWND,
            initial_ssthresh: INFINITE_SSTHRESH,
            cwnd_clamp: u32::MAX,
        }
    }
}

/// Read-only projection of the subflow fields the coupling computation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubflowView {
    pub path_index: PathIndex,
    pub state: SubflowState,
    pub cwnd: u32,
    /// Smoothed RTT in microseconds, `0` when unknown.
    pub srtt_us: u32,
    /// Whether the path is currently allowed to transmit.
    pub can_send: bool,
}

impl SubflowView {
    /// A subflow takes part in the coupling only when its RTT is known and it
    /// may transmit.
    pub fn is_send_eligible(&self) -> bool {
        self.can_send && self.srtt_us != 0
    }
}

/// One physical path of a connection.
#[derive(Debug, Clone)]
pub struct Subflow {
    path_index: PathIndex,
    state: SubflowState,
    ca_state: CaState,
    cwnd: u32,
    ssthresh: u32,
    cwnd_clamp: u32,
    srtt_us: u32,
    /// Window growth credit accumulated across ACKs.
    pub(crate) cwnd_cnt: u32,
    packets_out: u32,
    max_packets_out: u32,
    /// Whether the window was fully used at some point in the current window.
    cwnd_limited: bool,
    send_blocked: bool,
}

impl Subflow {
    pub fn new(path_index: PathIndex, config: &SubflowConfig) -> Self {
        let cwnd_clamp = config.cwnd_clamp.max(1);
        Self {
            path_index,
            state: SubflowState::PreEstablished,
            ca_state: CaState::Open,
            cwnd: config.initial_cwnd.clamp(1, cwnd_clamp),
            ssthresh: config.initial_ssthresh.max(1),
            cwnd_clamp,
            srtt_us: 0,
            cwnd_cnt: 0,
            packets_out: 0,
            max_packets_out: 0,
            cwnd_limited: false,
            send_blocked: false,
        }
    }

    /// Shorthand for an established subflow with a known RTT.
    pub fn established(path_index: PathIndex, config: &SubflowConfig, srtt_us: u32) -> Self {
        let mut subflow = Self::new(path_index, config);
        subflow.state = SubflowState::Established;
        subflow.srtt_us = srtt_us;
        subflow
    }

    pub fn with_cwnd(mut self, cwnd: u32) -> Self {
        self.set_cwnd(cwnd);
        self
    }

    pub fn with_ssthresh(mut self, ssthresh: u32) -> Self {
        self.set_ssthresh(ssthresh);
        self
    }

    pub fn path_index(&self) -> PathIndex {
        self.path_index
    }

    pub fn state(&self) -> SubflowState {
        self.state
    }

    pub fn set_state(&mut self, state: SubflowState) {
        self.state = state;
    }

    pub fn ca_state(&self) -> CaState {
        self.ca_state
    }

    /// Records the reliability state. Hosts call the strategy's
    /// `on_reliability_state_change` hook *before* this.
    pub fn set_ca_state(&mut self, ca_state: CaState) {
        self.ca_state = ca_state;
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    /// Sets the congestion window, bounded by `[1, cwnd_clamp]`.
    pub fn set_cwnd(&mut self, cwnd: u32) {
        self.cwnd = cwnd.clamp(1, self.cwnd_clamp);
    }

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    pub fn set_ssthresh(&mut self, ssthresh: u32) {
        self.ssthresh = ssthresh.max(1);
    }

    pub fn cwnd_clamp(&self) -> u32 {
        self.cwnd_clamp
    }

    /// Lowers or raises the clamp; the window is pulled down if needed.
    pub fn set_cwnd_clamp(&mut self, clamp: u32) {
        self.cwnd_clamp = clamp.max(1);
        self.cwnd = self.cwnd.min(self.cwnd_clamp);
    }

    /// Smoothed RTT in microseconds, `0` when no sample is available yet.
    pub fn srtt_us(&self) -> u32 {
        self.srtt_us
    }

    pub fn set_srtt_us(&mut self, srtt_us: u32) {
        self.srtt_us = srtt_us;
    }

    pub fn cwnd_cnt(&self) -> u32 {
        self.cwnd_cnt
    }

    pub fn packets_out(&self) -> u32 {
        self.packets_out
    }

    pub fn set_send_blocked(&mut self, blocked: bool) {
        self.send_blocked = blocked;
    }

    /// Whether the transport layer may send on this path at all.
    pub fn can_send(&self) -> bool {
        self.state == SubflowState::Established && !self.send_blocked
    }

    pub fn view(&self) -> SubflowView {
        SubflowView {
            path_index: self.path_index,
            state: self.state,
            cwnd: self.cwnd,
            srtt_us: self.srtt_us,
            can_send: self.can_send(),
        }
    }

    pub fn phase(&self) -> SubflowPhase {
        if self.cwnd <= self.ssthresh {
            SubflowPhase::SlowStart
        } else {
            SubflowPhase::CongestionAvoidance
        }
    }

    pub fn in_slow_start(&self) -> bool {
        self.phase() == SubflowPhase::SlowStart
    }

    /// Whether the sender is actually limited by the window.
    ///
    /// In slow start the window may keep growing as long as it is below twice
    /// the largest flight of the current window. In congestion avoidance the
    /// window must have been fully used.
    pub fn is_cwnd_limited(&self) -> bool {
        self.is_cwnd_limited_in(self.in_slow_start())
    }

    /// [`Subflow::is_cwnd_limited`] for a caller that decides the phase
    /// itself.
    pub(crate) fn is_cwnd_limited_in(&self, slow_start: bool) -> bool {
        if slow_start {
            u64::from(self.cwnd) < 2 * u64::from(self.max_packets_out)
        } else {
            self.cwnd_limited
        }
    }

    /// Accounts for packets put on the wire.
    pub fn on_send(&mut self, packets: u32) {
        self.packets_out = self.packets_out.saturating_add(packets);
        self.max_packets_out = self.max_packets_out.max(self.packets_out);
        self.cwnd_limited |= self.packets_out >= self.cwnd;
    }

    /// Accounts for packets leaving the network (acknowledged or lost).
    pub fn on_acked(&mut self, packets: u32) {
        self.packets_out = self.packets_out.saturating_sub(packets);
    }

    /// Starts a new window validation period.
    pub fn new_window(&mut self) {
        self.max_packets_out = self.packets_out;
        self.cwnd_limited = self.packets_out >= self.cwnd;
    }

    /// Increments the window by one packet if below the clamp.
    ///
    /// Returns whether the window actually grew.
    pub(crate) fn increment_cwnd(&mut self) -> bool {
        if self.cwnd < self.cwnd_clamp {
            self.cwnd += 1;
            true
        } else {
            false
        }
    }

    /// Grows the window by `packets`, saturating at the clamp.
    pub(crate) fn grow_cwnd(&mut self, packets: u32) {
        self.cwnd = self.cwnd.saturating_add(packets).min(self.cwnd_clamp);
    }

    pub fn stats(&self) -> SubflowStats {
        SubflowStats {
            path_index: self.path_index,
            state: self.state,
            ca_state: self.ca_state,
            phase: self.phase(),
            cwnd: self.cwnd,
            ssthresh: self.ssthresh,
            srtt_us: self.srtt_us,
            cwnd_cnt: self.cwnd_cnt,
        }
    }
}

/// Snapshot of one subflow for telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubflowStats {
    pub path_index: PathIndex,
    pub state: SubflowState,
    pub ca_state: CaState,
    pub phase: SubflowPhase,
    pub cwnd: u32,
    pub ssthresh: u32,
    pub srtt_us: u32,
    pub cwnd_cnt: u32,
}

/// Coupling state private to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouplingState {
    pub(crate) alpha: Alpha,
    pub(crate) forced_update: bool,
    pub(crate) recomputations: u64,
    pub(crate) zero_denominator_events: u64,
    pub(crate) best_path: Option<PathIndex>,
}

impl Default for CouplingState {
    fn default() -> Self {
        Self {
            alpha: Alpha::NEUTRAL,
            forced_update: false,
            recomputations: 0,
            zero_denominator_events: 0,
            best_path: None,
        }
    }
}

impl CouplingState {
    pub fn alpha(&self) -> Alpha {
        self.alpha
    }

    pub fn forced_update(&self) -> bool {
        self.forced_update
    }

    /// Number of coefficient recomputations since the connection was created.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    pub fn zero_denominator_events(&self) -> u64 {
        self.zero_denominator_events
    }

    /// Path that anchored the last successful recomputation.
    pub fn best_path(&self) -> Option<PathIndex> {
        self.best_path
    }

    /// Back to "behave like a single standard flow".
    pub(crate) fn reset(&mut self) {
        self.alpha = Alpha::NEUTRAL;
        self.forced_update = false;
    }

    /// Clears the forced flag, returning whether it was set.
    pub(crate) fn take_forced(&mut self) -> bool {
        std::mem::take(&mut self.forced_update)
    }
}

/// Meta-connection binding the subflows of one logical session.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    multipath: bool,
    subflows: Vec<Subflow>,
    pub(crate) coupling: CouplingState,
}

impl Connection {
    /// A multipath connection with no subflows yet.
    pub fn new_multipath() -> Self {
        Self {
            multipath: true,
            ..Default::default()
        }
    }

    /// A conventional connection carried by a single subflow.
    pub fn single_path(subflow: Subflow) -> Self {
        Self {
            multipath: false,
            subflows: vec![subflow],
            coupling: CouplingState::default(),
        }
    }

    pub fn is_multipath(&self) -> bool {
        self.multipath
    }

    /// Admits a subflow into the connection.
    pub fn add_subflow(&mut self, subflow: Subflow) -> Result<(), LiaError> {
        let path = subflow.path_index();
        if self.position(path).is_some() {
            return Err(LiaError::DuplicatePath(path));
        }
        if !self.multipath && !self.subflows.is_empty() {
            return Err(LiaError::NotMultipath);
        }
        tracing::debug!(%path, cwnd = subflow.cwnd(), "Subflow admitted");
        self.subflows.push(subflow);
        Ok(())
    }

    /// Removes a subflow from the connection, returning it.
    pub fn remove_subflow(&mut self, path: PathIndex) -> Option<Subflow> {
        let idx = self.position(path)?;
        tracing::debug!(%path, "Subflow removed");
        Some(self.subflows.remove(idx))
    }

    pub fn subflow(&self, path: PathIndex) -> Option<&Subflow> {
        self.subflows.iter().find(|s| s.path_index() == path)
    }

    pub fn subflow_mut(&mut self, path: PathIndex) -> Option<&mut Subflow> {
        self.subflows.iter_mut().find(|s| s.path_index() == path)
    }

    pub fn subflows(&self) -> &[Subflow] {
        &self.subflows
    }

    pub fn subflows_mut(&mut self) -> impl Iterator<Item = &mut Subflow> {
        self.subflows.iter_mut()
    }

    /// Number of subflows currently usable for sending.
    pub fn established_count(&self) -> usize {
        self.subflows
            .iter()
            .filter(|s| s.state() == SubflowState::Established)
            .count()
    }

    /// Current coupling coefficient.
    pub fn alpha(&self) -> Alpha {
        self.coupling.alpha
    }

    pub fn coupling(&self) -> &CouplingState {
        &self.coupling
    }

    pub fn stats(&self) -> LiaStats {
        LiaStats::from_connection(self)
    }

    /// Recomputes the coupling coefficient from the current member subflows.
    pub fn recompute_alpha(&mut self) -> RecomputeOutcome {
        let established = self.established_count();
        AlphaCoordinator::recompute(
            &mut self.coupling,
            established,
            self.subflows.iter().map(Subflow::view),
        )
    }

    pub(crate) fn position(&self, path: PathIndex) -> Option<usize> {
        self.subflows.iter().position(|s| s.path_index() == path)
    }

    pub(crate) fn subflow_at_mut(&mut self, idx: usize) -> &mut Subflow {
        &mut self.subflows[idx]
    }
}
