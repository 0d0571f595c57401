//! Standard single-path Reno congestion control.
//!
//! Slow start while `cwnd < ssthresh`, then additive increase of one packet
//! per window of acknowledged packets. Loss response is owned by the host:
//! it asks for [`RenoController::ssthresh`] and shrinks the window itself.

mod controller;

pub use controller::{RenoController, STRATEGY_NAME};
