// Domain layer - Pure time-series engine
pub mod aggregate;
pub mod error;
pub mod filter;
pub mod generator;
pub mod indicators;
pub mod point;
pub mod window;
