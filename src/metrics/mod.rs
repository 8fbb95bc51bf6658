// src/metrics/mod.rs

//! Resource accounting for running steps: an append-only [`TimeSeries`]
//! per counter, fed by an adaptive-cadence `/proc` sampler.

pub mod sampler;
pub mod series;

pub use sampler::ResourceMonitor;
pub use series::TimeSeries;
