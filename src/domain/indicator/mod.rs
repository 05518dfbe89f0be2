//! Indicators used by the strategies and the risk sizer.
//!
//! Each function works on the current bar window only and returns `None`
//! (or an empty series) when the window is too short to say anything.

pub mod atr;
pub mod sma;
pub mod stochastic;

pub use atr::calculate_atr;
pub use sma::{mean, sma_last};
pub use stochastic::{StochasticParams, StochasticSeries, calculate_stochastic};
