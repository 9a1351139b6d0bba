//! Integration test modules for dearjack

pub mod client;
pub mod engine;
pub mod params;
pub mod poly;
