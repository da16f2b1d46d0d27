//! Persistence Adapters - Opportunity Sinks
//!
//! Two `OpportunitySink` implementations ship: a console printer for
//! interactive runs and a Postgres store mapping opportunities onto a
//! fixed table schema. The detector never knows which one is wired in.

pub mod console;
pub mod postgres;

pub use console::ConsoleSink;
pub use postgres::PostgresSink;
