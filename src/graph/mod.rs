//! The internal graph-rendering AJAX protocol: replay and parsing.

pub mod client;
pub mod parser;
pub mod timeline;

pub use client::{GraphProtocolClient, RawGraphResponse};
pub use parser::GraphResponseParser;
pub use timeline::Timeline;
