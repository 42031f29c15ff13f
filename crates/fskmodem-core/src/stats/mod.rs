//! Receiver telemetry

pub mod store;
