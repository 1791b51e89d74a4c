//! # Quantile Horizon
//!
//! Workspace root re-exporting the member crates.
//!
//! ## Example
//!
//! ```
//! use quantile_horizon_workspace::quantile_forecast::engine::resolve_horizon;
//!
//! let resolution = resolve_horizon(&[5, 10], 7).unwrap();
//! assert_eq!(resolution.horizon, 10);
//! assert!(resolution.note.is_some());
//! ```

pub use quantile_forecast;
pub use trade_math;
