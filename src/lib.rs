//! Force-directed layout and interaction engine for DMSMS knowledge graphs.
//!
//! The library half is renderer-independent: [`graph`] validates and bounds
//! input graphs, [`engine`] owns the physics, hit-testing and highlight
//! policy. The `dmsms-graph` binary wires it to eframe.

pub mod config;
pub mod engine;
pub mod graph;
pub mod util;
