//! # Rolling Forecast Workspace
//!
//! Umbrella crate over the workspace members:
//!
//! - [`sweep`]: period splitting, the backtest engine, sweep drivers and gap auditing
//! - [`math`]: the numerical routines behind the native forecasters
//!
//! ## Example
//!
//! ```
//! use rolling_forecast_workspace::sweep::models::ModelRegistry;
//!
//! let registry = ModelRegistry::with_defaults();
//! assert!(registry.requires_retrain("ARIMA").unwrap());
//! assert!(!registry.requires_retrain("XGB").unwrap());
//! ```

pub use forecast_math as math;
pub use forecast_sweep as sweep;
