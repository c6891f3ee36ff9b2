//! Recovery of the internal rendering protocol's parameters from HTML.

pub mod jslit;
pub mod params;

pub use params::ParameterExtractor;
