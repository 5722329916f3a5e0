//! Adapters to the outside world: Postgres, telemetry, and the HTTP surface.

pub mod db;
pub mod error;
pub mod http;
pub mod memory;
pub mod telemetry;
