//! Implied volatility surface module
//!
//! Cross-sectional interpolation of IV over standardized moneyness for one
//! snapshot, plus term-structure interpolation of ATM IV across expiries.

pub mod interp;
pub mod temporal;
pub mod types;

pub use interp::*;
pub use temporal::*;
pub use types::*;
