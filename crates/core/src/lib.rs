//! Linked-increase coupled congestion control for multipath connections.
//!
//! The crate couples the window growth of every subflow of a multipath
//! connection so that the connection as a whole is no more aggressive than a
//! single flow on its best path, while each subflow still reacts to its own
//! loss and RTT signals. See [`transport::lia`] for the algorithm and
//! [`transport::congestion_control`] for the pluggable strategy interface.

/// Crate configuration and logger setup.
pub mod config;

/// Deterministic multipath simulation used to drive strategies end to end.
pub mod simulation;

/// Connection model and congestion control strategies.
pub mod transport;

pub use transport::{
    Alpha, CaState, Connection, CongestionControlAlgorithm, CongestionControlConfig,
    CongestionController, CongestionStrategy, CwndEvent, LiaController, LiaError, LiaStats,
    PathIndex, RenoController, StrategyRegistry, Subflow, SubflowConfig, SubflowState,
    SubflowView,
};
