//! LIA constants.

/// Name the strategy registers under.
pub const STRATEGY_NAME: &str = "lia";

/// Left shift applied to the numerator terms (`cwnd << 32`).
pub const ALPHA_SCALE_NUM: u32 = 32;

/// Left shift applied to each denominator term before it is squared.
pub const ALPHA_SCALE_DEN: u32 = 10;

/// Net fixed-point scale carried by `alpha`: `2^NUM / (2^DEN)²`.
pub const ALPHA_SCALE: u32 = 12;

const _: () = assert!(ALPHA_SCALE == ALPHA_SCALE_NUM - 2 * ALPHA_SCALE_DEN);
