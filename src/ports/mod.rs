//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Traits the usecases layer requires from the outside world; adapters
//! implement them. The detection pipeline itself is wired with channels,
//! so the only port is the opportunity sink.

pub mod opportunity_sink;

pub use opportunity_sink::OpportunitySink;
