//! Shared library surface for the SafeRoute server and its tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod state;
