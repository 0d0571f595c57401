//! Multipath transport congestion control.
//!
//! The host transport stack owns a [`Connection`] per logical session and
//! calls into a [`CongestionStrategy`] on subflow admission, on every ACK, on
//! window lifecycle events and before reliability state transitions. Two
//! strategies are provided:
//!
//! - **Reno**: the standard single-path slow start / AIMD controller.
//! - **LIA**: linked-increase coupled congestion control. Window growth on
//!   each subflow is throttled by a per-connection coupling coefficient so
//!   the aggregate is no more aggressive than one flow on the best path.
//!
//! Strategies are looked up by name through a [`StrategyRegistry`].

pub mod congestion_control;
mod connection;
mod errors;
pub mod lia;
pub mod registry;
pub mod reno;

pub use self::congestion_control::{
    CongestionControlAlgorithm, CongestionControlConfig, CongestionController,
    CongestionStrategy,
};
pub use self::connection::{
    CaState, Connection, CouplingState, CwndEvent, PathIndex, Subflow, SubflowConfig,
    SubflowPhase, SubflowState, SubflowStats, SubflowView, INFINITE_SSTHRESH,
};
pub use self::errors::LiaError;
pub use self::lia::{Alpha, LiaController, LiaStats};
pub use self::registry::StrategyRegistry;
pub use self::reno::RenoController;
