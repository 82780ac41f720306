// Library exports for mandi-forecast

pub mod config;
pub mod engine;
pub mod errors;
pub mod ml;
pub mod models;
pub mod scheduler;
pub mod services;

pub use engine::{CycleReport, FeatureWeight, ForecastEngine, ForecastStatus};
pub use errors::{ForecastError, ForecastResult};
