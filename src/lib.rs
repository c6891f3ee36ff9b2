//! graphsift — historical monitoring data extraction engine.
//!
//! Recovers time series and summary statistics for a monitored metric when
//! the platform's REST API exposes no historical data: the only source is
//! the platform's own web dashboard, which renders charts through an
//! internal, undocumented AJAX protocol. The engine authenticates like a
//! browser, recovers the rendering call's parameters from page scripts,
//! replays the AJAX exchange, and reconstructs a monotonically ordered
//! time series — falling back to rendered summary tables when the graph
//! path is unavailable.
//!
//! Entry point: [`Engine::extract_history`].

#![allow(clippy::new_without_default)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod graph;
pub mod htmlutil;
pub mod model;
pub mod net;
pub mod orchestrator;
pub mod table;

pub use config::{Credentials, EngineConfig, TimeWindow};
pub use error::{ExtractError, StrategyFailure, StrategyKind};
pub use model::{
    ExtractionMethod, HistoricalDataPoint, HistoricalDataResult, PointValue, ResultMetadata,
};
pub use orchestrator::Engine;
