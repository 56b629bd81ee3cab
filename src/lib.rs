//! # Helios - PV surplus charge controller
//!
//! Throttles an electric vehicle's charging current to follow photovoltaic
//! surplus. Helios runs next to a home-automation host: it reads meter and
//! vehicle datapoints from the host's state store, decides whether to start,
//! stop or adjust charging, and writes commands back to datapoints that a
//! vehicle telematics adapter turns into API calls.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `store`: Host state store trait, REST and in-memory backends
//! - `vehicle`: Vehicle adapter datapoint layout
//! - `controls`: Gate evaluation and the incremental amperage decision
//! - `driver`: Control loop actor owning all controller state
//! - `web`: HTTP status and mode API

pub mod config;
pub mod controls;
pub mod driver;
pub mod error;
pub mod logging;
pub mod store;
pub mod vehicle;
#[cfg(feature = "web")]
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use driver::ChargeDriver;
pub use error::{HeliosError, Result};
