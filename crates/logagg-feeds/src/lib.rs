//! logagg-feeds: record producers for logagg.
//!
//! A producer only needs [`Aggregator::submit`](logagg_core::Aggregator::submit).
//! Every producer here runs as a background task that stops when its
//! cancellation token fires, which callers derive from
//! [`Aggregator::shutdown_token`](logagg_core::Aggregator::shutdown_token).

pub mod simulator;

pub use simulator::SimulatedProducer;
