//! LIA (Linked Increase Algorithm) coupled congestion control.
//!
//! Based on RFC 6356. Every subflow keeps its own window and reacts to its
//! own losses, but congestion-avoidance growth is coupled through a single
//! per-connection coefficient `alpha` so that the connection as a whole takes
//! no more capacity than a single standard flow would on the best path.
//!
//! ## Coefficient
//!
//! With `best` the subflow maximizing `cwnd / srtt²`:
//!
//! ```text
//!             best_cwnd / best_rtt²               (cwnd << 32) / rtt²
//! alpha = ------------------------------  =  -----------------------------------
//!          (Σ cwnd_i / rtt_i)²                 (Σ (cwnd_i << 10) * best_rtt / rtt_i)²
//! ```
//!
//! The result carries `2^32 / 2^20 = 2^12` of fixed-point scale. A subflow in
//! congestion avoidance grows its window by one packet after
//! `max(2^12 / alpha, cwnd)` acknowledged packets, so alpha only ever slows a
//! subflow down relative to its own standard rate.
//!
//! ## Recompute triggers
//!
//! | Event | Recompute |
//! |-------|-----------|
//! | slow start growth | every window-limited ACK |
//! | congestion avoidance increment | when the window actually grows |
//! | reliability state change | on the next congestion avoidance ACK |
//! | retransmission timeout | immediately |

mod config;
mod controller;
mod coordinator;
mod fixed_point;
mod stats;


pub use config::{ALPHA_SCALE, ALPHA_SCALE_DEN, ALPHA_SCALE_NUM, STRATEGY_NAME};
pub use controller::LiaController;
pub use coordinator::{AlphaCoordinator, RecomputeOutcome};
pub use fixed_point::Alpha;
pub use stats::LiaStats;
